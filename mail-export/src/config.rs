use crate::error::{ExportError, Result};
use crate::export::{ArchiveKind, ExportFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub account_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Where mbox scratch files are created. System temp dir when unset.
    pub scratch_dir: Option<String>,
    pub format: ExportFormat,
    pub archive: ArchiveKind,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            format: ExportFormat::Maildir,
            archive: ArchiveKind::Tar,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl ExportConfig {
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ExportError::Config(e.to_string()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ExportError::Config(e.to_string()))
    }

    pub fn default() -> Self {
        Self {
            store: StoreConfig {
                account_dir: "/var/lib/mail/account".to_string(),
            },
            export: ExportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
