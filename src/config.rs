use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use duckdb::{AccessMode, Config};
use serde::{Deserialize, Serialize};

use crate::error::{DuckMiddlewareDbError, ErrorCause};

const PROTOCOL: &str = "duckdb:";
const JDBC_PREFIX: &str = "jdbc:";
const MEMORY_PATH: &str = ":memory:";

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum DatabaseMode {
    InMemory,
    Persistent(PathBuf),
}

/// Options for opening a `DuckDB` connection.
///
/// Immutable once built; use [`DuckDbOptionsBuilder`] to assemble one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuckDbOptions {
    mode: DatabaseMode,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    temp_directory: Option<PathBuf>,
    #[serde(default)]
    stream_results: bool,
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

impl DuckDbOptions {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(DatabaseMode::InMemory)
    }

    #[must_use]
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self::new(DatabaseMode::Persistent(path.into()))
    }

    #[must_use]
    pub fn new(mode: DatabaseMode) -> Self {
        Self {
            mode,
            read_only: false,
            temp_directory: None,
            stream_results: false,
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn builder(mode: DatabaseMode) -> DuckDbOptionsBuilder {
        DuckDbOptionsBuilder::new(mode)
    }

    /// Parse `duckdb:` / `jdbc:duckdb:` connection strings.
    ///
    /// An empty path or `:memory:` selects in-memory mode. Extra driver
    /// properties may follow a `?` as `key=value` pairs joined by `&`.
    ///
    /// # Errors
    /// Returns `DuckMiddlewareDbError::ConfigError` for any other protocol or a
    /// malformed property pair.
    pub fn from_connection_string(url: &str) -> Result<Self, DuckMiddlewareDbError> {
        let trimmed = url.trim();
        let rest = trimmed.strip_prefix(JDBC_PREFIX).unwrap_or(trimmed);
        let Some(rest) = rest.strip_prefix(PROTOCOL) else {
            return Err(DuckMiddlewareDbError::config(
                format!("unsupported connection string '{url}', expected '{PROTOCOL}<path>'"),
                None,
            ));
        };

        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        let mut builder = if path.is_empty() || path == MEMORY_PATH {
            DuckDbOptionsBuilder::new(DatabaseMode::InMemory)
        } else {
            DuckDbOptionsBuilder::new(DatabaseMode::Persistent(PathBuf::from(path)))
        };

        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(DuckMiddlewareDbError::config(
                    format!("malformed property '{pair}' in connection string"),
                    None,
                ));
            };
            builder = builder.property(key, value);
        }

        builder.build()
    }

    /// Load options from JSON.
    ///
    /// # Errors
    /// Returns `DuckMiddlewareDbError::ConfigError` if the JSON does not
    /// describe valid options.
    pub fn from_json(json: &str) -> Result<Self, DuckMiddlewareDbError> {
        let opts: Self = serde_json::from_str(json).map_err(|e| {
            DuckMiddlewareDbError::config("invalid options JSON", Some(ErrorCause::Json(e)))
        })?;
        opts.validate()?;
        Ok(opts)
    }

    #[must_use]
    pub fn mode(&self) -> &DatabaseMode {
        &self.mode
    }

    #[must_use]
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    #[must_use]
    pub fn temp_directory(&self) -> Option<&Path> {
        self.temp_directory.as_deref()
    }

    #[must_use]
    pub fn stream_results(&self) -> bool {
        self.stream_results
    }

    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// `duckdb:` for in-memory, `duckdb:<path>` for persistent databases.
    #[must_use]
    pub fn connection_string(&self) -> String {
        match &self.mode {
            DatabaseMode::InMemory => PROTOCOL.to_string(),
            DatabaseMode::Persistent(path) => format!("{PROTOCOL}{}", path.display()),
        }
    }

    /// Check option combinations the engine would reject anyway.
    ///
    /// # Errors
    /// Returns `DuckMiddlewareDbError::ConfigError` describing the first problem found.
    pub fn validate(&self) -> Result<(), DuckMiddlewareDbError> {
        match &self.mode {
            DatabaseMode::InMemory if self.read_only => {
                return Err(DuckMiddlewareDbError::config(
                    "an in-memory database cannot be opened read-only",
                    None,
                ));
            }
            DatabaseMode::Persistent(path) if path.as_os_str().is_empty() => {
                return Err(DuckMiddlewareDbError::config(
                    "persistent mode requires a database path",
                    None,
                ));
            }
            _ => {}
        }

        if let Some(key) = self.properties.keys().find(|k| k.trim().is_empty()) {
            return Err(DuckMiddlewareDbError::config(
                format!("driver property name must not be blank (got '{key}')"),
                None,
            ));
        }
        Ok(())
    }

    /// Build the driver property set.
    ///
    /// `stream_results` is a client-side flag, not an engine setting, so it is
    /// not forwarded.
    pub(crate) fn driver_config(&self) -> Result<Config, DuckMiddlewareDbError> {
        let wrap = |setting: &str| {
            let setting = setting.to_string();
            move |e: duckdb::Error| {
                DuckMiddlewareDbError::config(
                    format!("driver rejected setting '{setting}'"),
                    Some(ErrorCause::DuckDb(e)),
                )
            }
        };

        let mut config = Config::default();
        if self.read_only {
            config = config
                .access_mode(AccessMode::ReadOnly)
                .map_err(wrap("access_mode"))?;
        }
        if let Some(dir) = &self.temp_directory {
            config = config
                .with("temp_directory", &dir.to_string_lossy())
                .map_err(wrap("temp_directory"))?;
        }
        for (key, value) in &self.properties {
            config = config.with(key, value).map_err(wrap(key.as_str()))?;
        }
        Ok(config)
    }
}

impl Default for DuckDbOptions {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Fluent builder for `DuckDB` options.
#[derive(Debug, Clone)]
pub struct DuckDbOptionsBuilder {
    opts: DuckDbOptions,
}

impl DuckDbOptionsBuilder {
    #[must_use]
    pub fn new(mode: DatabaseMode) -> Self {
        Self {
            opts: DuckDbOptions::new(mode),
        }
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.opts.read_only = read_only;
        self
    }

    #[must_use]
    pub fn temp_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.opts.temp_directory = Some(dir.into());
        self
    }

    #[must_use]
    pub fn stream_results(mut self, stream_results: bool) -> Self {
        self.opts.stream_results = stream_results;
        self
    }

    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.properties.insert(key.into(), value.into());
        self
    }

    /// Finish without validation.
    #[must_use]
    pub fn finish(self) -> DuckDbOptions {
        self.opts
    }

    /// Finish and validate.
    ///
    /// # Errors
    /// Returns `DuckMiddlewareDbError::ConfigError` if the combination is invalid.
    pub fn build(self) -> Result<DuckDbOptions, DuckMiddlewareDbError> {
        self.opts.validate()?;
        Ok(self.opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_string_reflects_mode() {
        assert_eq!(DuckDbOptions::in_memory().connection_string(), "duckdb:");
        assert_eq!(
            DuckDbOptions::persistent("/tmp/x.db").connection_string(),
            "duckdb:/tmp/x.db"
        );
    }

    #[test]
    fn parses_jdbc_style_urls() {
        let opts = DuckDbOptions::from_connection_string("jdbc:duckdb:").unwrap();
        assert_eq!(opts.mode(), &DatabaseMode::InMemory);

        let opts =
            DuckDbOptions::from_connection_string("duckdb:/data/a.db?threads=2&max_memory=1GB")
                .unwrap();
        assert_eq!(opts.mode(), &DatabaseMode::Persistent("/data/a.db".into()));
        assert_eq!(opts.properties().get("threads").map(String::as_str), Some("2"));
        assert_eq!(opts.properties().len(), 2);
    }

    #[test]
    fn rejects_foreign_protocols_and_bad_pairs() {
        let err = DuckDbOptions::from_connection_string("sqlite::memory:").unwrap_err();
        assert!(matches!(err, DuckMiddlewareDbError::ConfigError { .. }));

        let err = DuckDbOptions::from_connection_string("duckdb:?threads").unwrap_err();
        assert!(matches!(err, DuckMiddlewareDbError::ConfigError { .. }));
    }

    #[test]
    fn read_only_in_memory_is_rejected() {
        let err = DuckDbOptions::builder(DatabaseMode::InMemory)
            .read_only(true)
            .build()
            .unwrap_err();
        assert!(matches!(err, DuckMiddlewareDbError::ConfigError { .. }));
    }

    #[test]
    fn blank_property_names_are_rejected() {
        let err = DuckDbOptions::builder(DatabaseMode::InMemory)
            .property("  ", "x")
            .build()
            .unwrap_err();
        assert!(err.message().contains("blank"));
    }

    #[test]
    fn options_load_from_json() {
        let json = concat!(
            r#"{"mode":{"kind":"persistent","path":"/tmp/db.duckdb"},"#,
            r#""read_only":true,"properties":{"threads":"4"}}"#,
        );
        let opts = DuckDbOptions::from_json(json).unwrap();
        assert!(opts.read_only());
        assert!(!opts.stream_results());
        assert_eq!(opts.temp_directory(), None);
        assert_eq!(opts.properties().get("threads").map(String::as_str), Some("4"));

        let opts = DuckDbOptions::from_json(r#"{"mode":{"kind":"in_memory"}}"#).unwrap();
        assert_eq!(opts, DuckDbOptions::in_memory());

        let err = DuckDbOptions::from_json(r#"{"mode":"nowhere"}"#).unwrap_err();
        assert!(matches!(err, DuckMiddlewareDbError::ConfigError { .. }));
    }
}
