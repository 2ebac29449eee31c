// File System Loader
// Resolves `classpath:`, `classpath*:`, `file:` and bare locations against directories

use crate::error::{InitError, InitResult};
use crate::resource::pattern::{has_wildcard, invalid, MATCH_OPTIONS};
use crate::resource::{ResourceLoader, ScriptHandle};
use glob::Pattern;
use std::path::{Path, PathBuf};

/// Parsed location prefix
#[derive(Debug, PartialEq, Eq)]
enum Location<'a> {
    /// First classpath root with a match
    Classpath(&'a str),
    /// Every classpath root, merged
    ClasspathAll(&'a str),
    /// Absolute, or relative to the base directory
    File(&'a str),
}

impl<'a> Location<'a> {
    fn parse(pattern: &'a str) -> InitResult<Self> {
        if let Some(rest) = pattern.strip_prefix("classpath*:") {
            return Ok(Location::ClasspathAll(rest.trim_start_matches('/')));
        }
        if let Some(rest) = pattern.strip_prefix("classpath:") {
            return Ok(Location::Classpath(rest.trim_start_matches('/')));
        }
        if let Some(rest) = pattern.strip_prefix("file:") {
            // file:///abs/path and file:rel/path
            return Ok(Location::File(rest.strip_prefix("//").unwrap_or(rest)));
        }

        // Anything else that looks like `scheme:` is not servable from disk.
        // Single letters are left alone for Windows drive paths.
        if let Some((scheme, _)) = pattern.split_once(':') {
            let is_scheme = scheme.len() > 1
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
            if is_scheme {
                return Err(InitError::InvalidLocation {
                    location: pattern.to_string(),
                    reason: format!("unsupported location prefix '{}:'", scheme),
                });
            }
        }

        Ok(Location::File(pattern))
    }
}

/// Loader reading scripts from the local file system
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    base_dir: PathBuf,
    classpath_roots: Vec<PathBuf>,
}

impl FileSystemLoader {
    /// Relative and `file:` locations resolve against `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            classpath_roots: Vec::new(),
        }
    }

    /// Loader rooted at the current working directory
    pub fn current_dir() -> InitResult<Self> {
        let dir = std::env::current_dir().map_err(|source| InitError::Io {
            location: ".".to_string(),
            source,
        })?;
        Ok(Self::new(dir))
    }

    /// Add a directory searched by `classpath:` locations, in registration order
    pub fn with_classpath_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.classpath_roots.push(root.into());
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn expand(&self, location: &str, root: &Path, pattern: &str) -> InitResult<Vec<ScriptHandle>> {
        let path = Path::new(pattern);

        if !has_wildcard(pattern) {
            let full = if path.is_absolute() {
                path.to_path_buf()
            } else {
                root.join(path)
            };
            return Ok(if full.is_file() {
                vec![ScriptHandle::file(display_name(&full), full)]
            } else {
                Vec::new()
            });
        }

        // The root is literal text; only the configured pattern carries glob syntax
        let full = if path.is_absolute() {
            pattern.to_string()
        } else {
            format!(
                "{}/{}",
                Pattern::escape(&display_name(root)).trim_end_matches('/'),
                pattern.trim_start_matches("./")
            )
        };

        let mut handles = Vec::new();
        for entry in glob::glob_with(&full, MATCH_OPTIONS).map_err(|e| invalid(location, e))? {
            let path = entry.map_err(|e| InitError::Io {
                location: location.to_string(),
                source: e.into_error(),
            })?;
            if path.is_file() {
                handles.push(ScriptHandle::file(display_name(&path), path));
            }
        }

        Ok(handles)
    }
}

fn display_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

impl ResourceLoader for FileSystemLoader {
    fn resolve(&self, pattern: &str) -> InitResult<Vec<ScriptHandle>> {
        match Location::parse(pattern)? {
            Location::File(path) => self.expand(pattern, &self.base_dir, path),
            Location::Classpath(path) => {
                for root in &self.classpath_roots {
                    let found = self.expand(pattern, root, path)?;
                    if !found.is_empty() {
                        return Ok(found);
                    }
                }
                Ok(Vec::new())
            }
            Location::ClasspathAll(path) => {
                let mut all = Vec::new();
                for root in &self.classpath_roots {
                    all.extend(self.expand(pattern, root, path)?);
                }
                Ok(all)
            }
        }
    }
}
