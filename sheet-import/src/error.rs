//! Session-level import errors
//!
//! Row-level problems never surface here: validation failures stay on the
//! row and storage rejections land in `BatchResult::errors`. An
//! `ImportError` means the run as a whole could not go ahead.

use crate::services::matching::MappingAmbiguity;
use crate::transfer::{BatchResult, DuplicateKey};

#[derive(Debug, Clone)]
pub enum ImportError {
    /// Upload rejected before any row was read
    FatalInput(String),
    /// Required fields could not be mapped with confidence
    MappingAmbiguity(Vec<MappingAmbiguity>),
    /// Business keys repeat within the upload
    DuplicateKeys(Vec<DuplicateKey>),
    /// Storage failed outside any single row; `partial` counts what was
    /// written before the abort
    FatalStorage { message: String, partial: BatchResult },
    /// Settings or options out of range
    InvalidSettings(String),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::FatalInput(msg) => write!(f, "Upload rejected: {}", msg),
            ImportError::MappingAmbiguity(items) => {
                write!(f, "Column mapping needs review: ")?;
                let parts: Vec<String> = items.iter().map(|a| a.to_string()).collect();
                write!(f, "{}", parts.join("; "))
            }
            ImportError::DuplicateKeys(keys) => {
                write!(f, "Duplicate business keys in upload: ")?;
                let parts: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
                write!(f, "{}", parts.join("; "))
            }
            ImportError::FatalStorage { message, partial } => write!(
                f,
                "Storage failure, run aborted after {} created / {} updated / {} failed: {}",
                partial.created, partial.updated, partial.failed, message
            ),
            ImportError::InvalidSettings(msg) => write!(f, "Invalid settings: {}", msg),
        }
    }
}

impl std::error::Error for ImportError {}
