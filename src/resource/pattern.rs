// Location Patterns
// Glob handling shared by the resource loaders

use crate::error::{InitError, InitResult};
use glob::{MatchOptions, Pattern};

/// `*`, `?` and `[..]` stay within one path segment; `**` spans directories
pub const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Whether a location contains glob syntax
pub fn has_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Compile a `/`-separated glob, reporting syntax errors against the location
pub fn compile(location: &str, pattern: &str) -> InitResult<Pattern> {
    Pattern::new(pattern).map_err(|e| invalid(location, e))
}

pub(crate) fn invalid(location: &str, err: glob::PatternError) -> InitError {
    InitError::InvalidLocation {
        location: location.to_string(),
        reason: format!("invalid wildcard at position {}: {}", err.pos, err.msg),
    }
}
