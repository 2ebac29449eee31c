// In-Memory Loader
// Serves scripts embedded in the binary (e.g. via include_str!) or built in tests

use crate::error::InitResult;
use crate::resource::pattern::{compile, has_wildcard, MATCH_OPTIONS};
use crate::resource::{ResourceLoader, ScriptHandle};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Location prefixes ignored when matching in-memory script names
const IGNORED_PREFIXES: [&str; 3] = ["classpath*:", "classpath:", "file:"];

/// Loader over a fixed set of named scripts
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    scripts: BTreeMap<String, Arc<[u8]>>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a script under a `/`-separated name
    pub fn with_script(mut self, name: impl Into<String>, content: impl AsRef<[u8]>) -> Self {
        self.insert(name, content);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl AsRef<[u8]>) {
        self.scripts
            .insert(name.into(), Arc::from(content.as_ref()));
    }

    fn normalize(pattern: &str) -> &str {
        let stripped = IGNORED_PREFIXES
            .iter()
            .find_map(|prefix| pattern.strip_prefix(prefix))
            .unwrap_or(pattern);
        stripped.trim_start_matches('/')
    }

    fn handle(name: &str, content: &Arc<[u8]>) -> ScriptHandle {
        ScriptHandle::inline(name, Arc::clone(content))
    }
}

impl ResourceLoader for InMemoryLoader {
    fn resolve(&self, pattern: &str) -> InitResult<Vec<ScriptHandle>> {
        let name = Self::normalize(pattern);

        if !has_wildcard(name) {
            return Ok(self
                .scripts
                .get_key_value(name)
                .map(|(name, content)| Self::handle(name, content))
                .into_iter()
                .collect());
        }

        let glob = compile(pattern, name)?;
        Ok(self
            .scripts
            .iter()
            .filter(|(name, _)| glob.matches_with(name, MATCH_OPTIONS))
            .map(|(name, content)| Self::handle(name, content))
            .collect())
    }
}
