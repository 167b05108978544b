//! Configuration loading
//!
//! Values come from a TOML file (by default `<config dir>/tollsync/config.toml`),
//! then environment variables override them. Secrets are normally supplied through
//! the environment or a `.env` file.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sheets: SheetsConfig,
    pub graph: GraphConfig,
    pub storage: StorageConfig,
    pub audit: AuditConfig,
    pub http: HttpConfig,
}

/// Spreadsheet holding the source of truth
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub access_token: String,
    pub base_url: String,
}

/// Neo4j connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// HTTP base URI, e.g. `http://localhost:7474`
    pub uri: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

/// Buckets for uploaded business images
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub access_token: String,
    pub base_url: String,
    pub staging_bucket: String,
    pub production_bucket: String,
    /// Extension given to relocated objects
    pub extension: String,
}

/// Sheet receiving audit entries from the upload handler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub sheet_name: String,
    /// Numeric sheet id (the `gid` in the sheet URL)
    pub sheet_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            access_token: String::new(),
            base_url: "https://sheets.googleapis.com".to_string(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:7474".to_string(),
            database: "neo4j".to_string(),
            username: "neo4j".to_string(),
            password: String::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            base_url: "https://storage.googleapis.com".to_string(),
            staging_bucket: String::new(),
            production_bucket: String::new(),
            extension: "png".to_string(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sheet_name: "audit".to_string(),
            sheet_id: 0,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tollsync").join("config.toml"))
    }

    /// Load from `path` (or the default location), then apply environment overrides
    ///
    /// A missing file at the default location is not an error; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => {
                    log::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override values from the environment; `lookup` returns None for unset variables
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *target = value;
            }
        };

        set(&mut self.sheets.spreadsheet_id, "SPREADSHEET_ID");
        set(&mut self.sheets.access_token, "GOOGLE_ACCESS_TOKEN");
        set(&mut self.graph.uri, "NEO4J_URI");
        set(&mut self.graph.database, "NEO4J_DATABASE");
        set(&mut self.graph.username, "NEO4J_USERNAME");
        set(&mut self.graph.password, "NEO4J_PASSWORD");
        set(&mut self.storage.access_token, "STORAGE_ACCESS_TOKEN");
        set(&mut self.storage.staging_bucket, "STAGING_BUCKET");
        set(&mut self.storage.production_bucket, "PRODUCTION_BUCKET");
    }

    /// Check the values a sync run needs
    pub fn validate_for_sync(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.sheets.spreadsheet_id.is_empty() {
            missing.push("sheets.spreadsheet_id (SPREADSHEET_ID)");
        }
        if self.sheets.access_token.is_empty() {
            missing.push("sheets.access_token (GOOGLE_ACCESS_TOKEN)");
        }
        if self.graph.uri.is_empty() {
            missing.push("graph.uri (NEO4J_URI)");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            bail!("Missing configuration: {}", missing.join(", "))
        }
    }

    /// Check the values the upload handler needs on top of a sync run's
    pub fn validate_for_upload(&self) -> Result<()> {
        self.validate_for_sync()?;
        let mut missing = Vec::new();
        if self.storage.staging_bucket.is_empty() {
            missing.push("storage.staging_bucket (STAGING_BUCKET)");
        }
        if self.storage.production_bucket.is_empty() {
            missing.push("storage.production_bucket (PRODUCTION_BUCKET)");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            bail!("Missing configuration: {}", missing.join(", "))
        }
    }
}
