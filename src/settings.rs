// Initialization Settings
// Immutable configuration for one initialization run, built in code or loaded from JSON

use crate::error::{InitError, InitResult};
use crate::script::{ScriptEncoding, DEFAULT_SEPARATOR};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// When initialization should run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitializationMode {
    /// Always run
    #[default]
    Always,
    /// Only run against an embedded database
    Embedded,
    /// Never run
    Never,
}

/// Settings for initializing a database from DDL (schema) and DML (data) scripts.
///
/// By default initialization fails when a location does not exist; prefixing a
/// location with `optional:` lets it match nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitializationSettings {
    #[serde(alias = "schema_locations")]
    ddl_locations: Vec<String>,
    #[serde(alias = "data_locations")]
    dml_locations: Vec<String>,
    continue_on_error: bool,
    separator: String,
    encoding: ScriptEncoding,
    mode: InitializationMode,
    ignore_failed_drops: bool,
}

impl Default for InitializationSettings {
    fn default() -> Self {
        Self {
            ddl_locations: Vec::new(),
            dml_locations: Vec::new(),
            continue_on_error: false,
            separator: DEFAULT_SEPARATOR.to_string(),
            encoding: ScriptEncoding::default(),
            mode: InitializationMode::default(),
            ignore_failed_drops: false,
        }
    }
}

impl InitializationSettings {
    pub fn builder() -> InitializationSettingsBuilder {
        InitializationSettingsBuilder::default()
    }

    /// Parse and validate settings from a JSON document
    pub fn from_json_str(json: &str) -> InitResult<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| InitError::InvalidSettings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse and validate settings from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> InitResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| InitError::Io {
            location: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> InitResult<()> {
        if self.separator.is_empty() {
            return Err(InitError::InvalidSettings(
                "statement separator must not be empty".to_string(),
            ));
        }
        if let Some(blank) = self
            .ddl_locations
            .iter()
            .chain(&self.dml_locations)
            .find(|l| l.trim().is_empty())
        {
            return Err(InitError::InvalidSettings(format!(
                "script location must not be blank (got {:?})",
                blank
            )));
        }
        Ok(())
    }

    /// Locations of the DDL (schema) scripts
    pub fn ddl_locations(&self) -> &[String] {
        &self.ddl_locations
    }

    /// Locations of the DML (data) scripts
    pub fn dml_locations(&self) -> &[String] {
        &self.dml_locations
    }

    pub fn continue_on_error(&self) -> bool {
        self.continue_on_error
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn encoding(&self) -> ScriptEncoding {
        self.encoding
    }

    pub fn mode(&self) -> InitializationMode {
        self.mode
    }

    pub fn ignore_failed_drops(&self) -> bool {
        self.ignore_failed_drops
    }
}

/// Default locations for a script kind (`schema`, `data`) and platform
pub fn default_locations(kind: &str, platform: &str) -> Vec<String> {
    vec![
        format!("optional:classpath*:{}-{}.sql", kind, platform),
        format!("optional:classpath*:{}.sql", kind),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct InitializationSettingsBuilder {
    settings: InitializationSettings,
}

impl InitializationSettingsBuilder {
    pub fn ddl_location(mut self, location: impl Into<String>) -> Self {
        self.settings.ddl_locations.push(location.into());
        self
    }

    pub fn ddl_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings
            .ddl_locations
            .extend(locations.into_iter().map(Into::into));
        self
    }

    pub fn dml_location(mut self, location: impl Into<String>) -> Self {
        self.settings.dml_locations.push(location.into());
        self
    }

    pub fn dml_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings
            .dml_locations
            .extend(locations.into_iter().map(Into::into));
        self
    }

    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.settings.continue_on_error = continue_on_error;
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.settings.separator = separator.into();
        self
    }

    pub fn encoding(mut self, encoding: ScriptEncoding) -> Self {
        self.settings.encoding = encoding;
        self
    }

    pub fn mode(mut self, mode: InitializationMode) -> Self {
        self.settings.mode = mode;
        self
    }

    /// Tolerate failing `DROP` statements even when not continuing on error
    pub fn ignore_failed_drops(mut self, ignore: bool) -> Self {
        self.settings.ignore_failed_drops = ignore;
        self
    }

    /// Fill empty location lists with `schema[-platform].sql` / `data[-platform].sql`
    pub fn default_locations(mut self, platform: &str) -> Self {
        if self.settings.ddl_locations.is_empty() {
            self.settings.ddl_locations = default_locations("schema", platform);
        }
        if self.settings.dml_locations.is_empty() {
            self.settings.dml_locations = default_locations("data", platform);
        }
        self
    }

    pub fn build(self) -> InitResult<InitializationSettings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = InitializationSettings::default();
        assert!(settings.ddl_locations().is_empty());
        assert!(!settings.continue_on_error());
        assert_eq!(settings.separator(), ";");
        assert_eq!(settings.encoding(), ScriptEncoding::Utf8);
        assert_eq!(settings.mode(), InitializationMode::Always);
        assert!(!settings.ignore_failed_drops());
    }

    #[test]
    fn test_builder() {
        let settings = InitializationSettings::builder()
            .ddl_location("classpath:/schema.sql")
            .dml_locations(["data/*.sql", "optional:extra.sql"])
            .continue_on_error(true)
            .separator("GO")
            .encoding(ScriptEncoding::Latin1)
            .build()
            .unwrap();

        assert_eq!(settings.ddl_locations(), ["classpath:/schema.sql"]);
        assert_eq!(settings.dml_locations(), ["data/*.sql", "optional:extra.sql"]);
        assert!(settings.continue_on_error());
        assert_eq!(settings.separator(), "GO");
        assert_eq!(settings.encoding(), ScriptEncoding::Latin1);
    }

    #[test]
    fn test_empty_separator_rejected() {
        let result = InitializationSettings::builder().separator("").build();
        assert!(matches!(result, Err(InitError::InvalidSettings(_))));
    }

    #[test]
    fn test_blank_location_rejected() {
        let result = InitializationSettings::builder().ddl_location("  ").build();
        assert!(matches!(result, Err(InitError::InvalidSettings(_))));
    }

    #[test]
    fn test_default_locations_only_fill_empty_lists() {
        let settings = InitializationSettings::builder()
            .ddl_location("db/schema.sql")
            .default_locations("all")
            .build()
            .unwrap();

        assert_eq!(settings.ddl_locations(), ["db/schema.sql"]);
        assert_eq!(
            settings.dml_locations(),
            ["optional:classpath*:data-all.sql", "optional:classpath*:data.sql"]
        );
    }

    #[test]
    fn test_from_json_with_aliases() {
        let settings = InitializationSettings::from_json_str(
            r#"{
                "schema_locations": ["classpath:/schema.sql"],
                "data_locations": ["optional:classpath:/data.sql"],
                "continue_on_error": true,
                "encoding": "ISO-8859-1",
                "mode": "embedded"
            }"#,
        )
        .unwrap();

        assert_eq!(settings.ddl_locations(), ["classpath:/schema.sql"]);
        assert_eq!(settings.dml_locations(), ["optional:classpath:/data.sql"]);
        assert!(settings.continue_on_error());
        assert_eq!(settings.separator(), ";");
        assert_eq!(settings.encoding(), ScriptEncoding::Latin1);
        assert_eq!(settings.mode(), InitializationMode::Embedded);
    }

    #[test]
    fn test_from_json_rejects_bad_values() {
        assert!(InitializationSettings::from_json_str(r#"{"encoding": "EBCDIC"}"#).is_err());
        assert!(InitializationSettings::from_json_str(r#"{"separator": ""}"#).is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("init.json");
        std::fs::write(&path, r#"{"ddl_locations": ["schema.sql"]}"#).unwrap();

        let settings = InitializationSettings::from_json_file(&path).unwrap();
        assert_eq!(settings.ddl_locations(), ["schema.sql"]);

        assert!(matches!(
            InitializationSettings::from_json_file(dir.path().join("missing.json")),
            Err(InitError::Io { .. })
        ));
    }
}
