// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Haavi - Error Types
 * Error taxonomy for scan orchestration with thiserror
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::path::PathBuf;
use thiserror::Error;

/// Main scanner error type, one variant per failure class
#[derive(Error, Debug)]
pub enum ScannerError {
    /// Bad input, caught before any process is launched
    #[error("Validation error for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Auth directive cannot be resolved from the supplied configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The engine container could not be created or started
    #[error("Engine launch failed: {reason}")]
    Launch { reason: String },

    /// Findings artifact missing or unusable after a run
    #[error("Collection error for {}: {reason}", path.display())]
    Collection { path: PathBuf, reason: String },

    /// Filesystem errors around the run's working area
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine config document could not be serialized or a preset parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ScannerError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        ScannerError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Pre-launch errors are recoverable by fixing the invocation;
    /// everything else happened after a run was attempted.
    pub fn is_pre_launch(&self) -> bool {
        matches!(
            self,
            ScannerError::Validation { .. } | ScannerError::Configuration(_)
        )
    }

    /// Single-line classification for user-facing output
    pub fn classification(&self) -> &'static str {
        match self {
            ScannerError::Validation { .. } => "VALIDATION",
            ScannerError::Configuration(_) => "CONFIGURATION",
            ScannerError::Launch { .. } => "LAUNCH_FAILED",
            ScannerError::Collection { .. } => "COLLECTION",
            ScannerError::Io(_) => "IO",
            ScannerError::Yaml(_) => "YAML",
        }
    }
}

/// Result type for scanner operations
pub type ScannerResult<T> = Result<T, ScannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_field() {
        let err = ScannerError::validation("target_url", "must be absolute");
        assert!(err.to_string().contains("target_url"));
        assert!(err.is_pre_launch());
    }

    #[test]
    fn test_classification_labels() {
        assert_eq!(
            ScannerError::Configuration("x".into()).classification(),
            "CONFIGURATION"
        );
        let collect = ScannerError::Collection {
            path: PathBuf::from("/tmp/report.json"),
            reason: "missing".into(),
        };
        assert_eq!(collect.classification(), "COLLECTION");
        assert!(!collect.is_pre_launch());
    }
}
