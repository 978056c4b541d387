use rust_decimal::Decimal;
use std::path::PathBuf;
use thiserror::Error;

use crate::loader::REQUIRED_SHEETS;

/// Failures while reading the workbook. Any of these aborts the render.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to open workbook {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("Sheet '{0}' not found in workbook")]
    MissingSheet(String),

    #[error("Failed to read sheet '{sheet}': {reason}")]
    ReadSheet { sheet: String, reason: String },

    #[error("Sheet '{0}' has no header row")]
    EmptySheet(String),

    #[error("Column '{column}' not found in sheet '{sheet}'")]
    MissingColumn { sheet: String, column: String },

    #[error("Invalid value '{value}' in sheet '{sheet}', row {row}, column '{column}'")]
    InvalidValue {
        sheet: String,
        row: usize,
        column: String,
        value: String,
    },
}

/// Invalid goal or settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Monthly goal must be greater than zero (got {0})")]
    NonPositiveGoal(Decimal),

    #[error("Monthly goal {0} is not a usable amount")]
    InvalidGoal(f64),

    #[error("Ideal completion must be between 0 and 1 (got {0})")]
    InvalidIdealFraction(f64),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid date '{0}'. Expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid selection '{0}'")]
    InvalidSelection(String),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    /// Hint shown under the error banner.
    pub fn hint(&self) -> Option<String> {
        match self {
            ReportError::Load(_) => Some(format!(
                "Check that the workbook has sheets named: {}",
                REQUIRED_SHEETS.join(", ")
            )),
            ReportError::Config(ConfigError::NonPositiveGoal(_) | ConfigError::InvalidGoal(_)) => Some(
                "Set a positive goal in the TD sheet (SEDE = TOTAL) or with --goal".to_string(),
            ),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
