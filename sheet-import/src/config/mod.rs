//! Import settings with sane defaults
//!
//! Loaded from a TOML file; every section and key is optional. The
//! database URL is never stored in the file and comes from
//! `SHEET_IMPORT_DATABASE` (a `.env` file works too).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ImportError;
use crate::services::matching::MatchThresholds;
use crate::transfer::{DateHint, ExecutorOptions, SessionOptions, UploadLimits};

/// Environment variable holding the storage URL
pub const DATABASE_ENV: &str = "SHEET_IMPORT_DATABASE";

const CONFIG_DIR: &str = "sheet-import";
const CONFIG_FILE: &str = "config.toml";

/// Date parsing configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateConfig {
    pub hint: DateHint,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub limits: UploadLimits,
    pub matching: MatchThresholds,
    pub batch: ExecutorOptions,
    pub dates: DateConfig,
}

impl ImportSettings {
    /// `<config dir>/sheet-import/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from `path`, or from the default location when it exists.
    /// A missing default file yields the defaults; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => path,
                None => {
                    log::debug!("No settings file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings = Self::from_toml(&content)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml(input: &str) -> Result<Self> {
        let settings: Self = toml::from_str(input).context("Invalid settings TOML")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Conservative settings: small chunks, one at a time, strict upload caps
    pub fn conservative() -> Self {
        Self {
            limits: UploadLimits {
                max_bytes: 2 * 1024 * 1024,
                max_rows: 2_000,
                max_columns: 50,
            },
            batch: ExecutorOptions::default().with_chunk_size(100),
            ..Self::default()
        }
    }

    pub fn with_limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_date_hint(mut self, hint: DateHint) -> Self {
        self.dates.hint = hint;
        self
    }

    pub fn validate(&self) -> Result<(), ImportError> {
        self.batch.validate()?;

        let m = &self.matching;
        for (name, value) in [
            ("accept", m.accept),
            ("substring", m.substring),
            ("possible", m.possible),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ImportError::InvalidSettings(format!(
                    "matching.{} must be between 0 and 1 (got {})",
                    name, value
                )));
            }
        }
        if m.possible > m.accept {
            return Err(ImportError::InvalidSettings(format!(
                "matching.possible ({}) must not exceed matching.accept ({})",
                m.possible, m.accept
            )));
        }

        if self.limits.max_bytes == 0 || self.limits.max_rows == 0 || self.limits.max_columns == 0 {
            return Err(ImportError::InvalidSettings(
                "upload limits must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Session options carrying these settings
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::default()
            .with_limits(self.limits)
            .with_thresholds(self.matching)
            .with_executor(self.batch)
            .with_date_hint(self.dates.hint)
    }

    /// Storage URL from the environment, if set and non-empty
    pub fn database_url() -> Option<String> {
        std::env::var(DATABASE_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
    }
}
