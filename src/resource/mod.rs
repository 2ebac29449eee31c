// Script Resources
// Content-access capability, script handles and location resolution

pub mod filesystem;
pub mod memory;
pub mod pattern;

pub use filesystem::FileSystemLoader;
pub use memory::InMemoryLoader;

use crate::error::{InitError, InitResult};
use std::fmt;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;

pub const OPTIONAL_PREFIX: &str = "optional:";

/// An openable source of script bytes
pub trait ScriptSource: Send + Sync + fmt::Debug {
    fn open(&self) -> std::io::Result<Box<dyn Read + Send>>;
}

/// Script stored on disk
#[derive(Debug, Clone)]
pub struct FileSource(pub PathBuf);

impl ScriptSource for FileSource {
    fn open(&self) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(std::fs::File::open(&self.0)?))
    }
}

/// Script held in memory
#[derive(Debug, Clone)]
pub struct InlineSource(pub Arc<[u8]>);

impl ScriptSource for InlineSource {
    fn open(&self) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.0))))
    }
}

/// A named, read-only script produced by a [`ResourceLoader`]
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    name: String,
    source: Arc<dyn ScriptSource>,
}

impl ScriptHandle {
    pub fn new(name: impl Into<String>, source: Arc<dyn ScriptSource>) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(name, Arc::new(FileSource(path.into())))
    }

    pub fn inline(name: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        Self::new(name, Arc::new(InlineSource(content.into())))
    }

    /// Identifying name used in logs and error messages
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the whole script from the start
    pub fn read_bytes(&self) -> InitResult<Vec<u8>> {
        let io_err = |source| InitError::Io {
            location: self.name.clone(),
            source,
        };
        let mut reader = self.source.open().map_err(io_err)?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(io_err)?;
        Ok(bytes)
    }
}

/// Content-access capability: expands location patterns into scripts
pub trait ResourceLoader: Send + Sync {
    /// Expand a location pattern (optional marker already removed) into
    /// zero or more scripts. Callers sort the result by name.
    fn resolve(&self, pattern: &str) -> InitResult<Vec<ScriptHandle>>;

    /// Whether the pattern matches at least one script
    fn exists(&self, pattern: &str) -> InitResult<bool> {
        Ok(!self.resolve(pattern)?.is_empty())
    }
}

/// Marker that makes a location optional
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalMarker {
    prefix: String,
    case_sensitive: bool,
}

impl OptionalMarker {
    pub fn new(prefix: impl Into<String>, case_sensitive: bool) -> Self {
        Self {
            prefix: prefix.into(),
            case_sensitive,
        }
    }

    /// Split a pattern into its optional flag and the pattern to expand
    pub fn strip<'a>(&self, pattern: &'a str) -> (bool, &'a str) {
        let n = self.prefix.len();
        match pattern.get(..n) {
            Some(head)
                if !self.prefix.is_empty()
                    && (head == self.prefix
                        || (!self.case_sensitive && head.eq_ignore_ascii_case(&self.prefix))) =>
            {
                (true, &pattern[n..])
            }
            _ => (false, pattern),
        }
    }
}

impl Default for OptionalMarker {
    fn default() -> Self {
        Self::new(OPTIONAL_PREFIX, true)
    }
}

/// A location pattern and the scripts it resolved to
#[derive(Debug, Clone)]
pub struct ScriptLocation {
    /// Pattern as configured, including any optional marker
    pub pattern: String,
    pub optional: bool,
    /// Sorted by name
    pub scripts: Vec<ScriptHandle>,
}

/// Resolves ordered location lists against a loader
pub struct LocationResolver<'a> {
    loader: &'a dyn ResourceLoader,
    marker: &'a OptionalMarker,
}

impl<'a> LocationResolver<'a> {
    pub fn new(loader: &'a dyn ResourceLoader, marker: &'a OptionalMarker) -> Self {
        Self { loader, marker }
    }

    /// Fail on the first required location that matches nothing, without reading any script
    pub fn check_required(&self, patterns: &[String]) -> InitResult<()> {
        for pattern in patterns {
            let (optional, stripped) = self.marker.strip(pattern);
            if !optional && !self.loader.exists(stripped)? {
                return Err(InitError::LocationNotFound {
                    location: pattern.clone(),
                });
            }
        }
        Ok(())
    }

    /// Resolve patterns in input order. Optional patterns without matches are left out.
    pub fn resolve(&self, patterns: &[String]) -> InitResult<Vec<ScriptLocation>> {
        let mut locations = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let (optional, stripped) = self.marker.strip(pattern);
            let mut scripts = self.loader.resolve(stripped)?;

            if scripts.is_empty() {
                if optional {
                    tracing::debug!(location = %pattern, "skipping optional location with no scripts");
                    continue;
                }
                return Err(InitError::LocationNotFound {
                    location: pattern.clone(),
                });
            }

            scripts.sort_by(|a, b| a.name().cmp(b.name()));
            tracing::debug!(location = %pattern, scripts = scripts.len(), "resolved location");

            locations.push(ScriptLocation {
                pattern: pattern.clone(),
                optional,
                scripts,
            });
        }

        Ok(locations)
    }
}
