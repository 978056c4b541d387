use crate::error::ConfigError;
use crate::types::Goal;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_WORKBOOK: &str = "resumen.xlsx";
pub const DEFAULT_CONFIG_FILE: &str = "clinic_report.toml";
pub const DEFAULT_IDEAL_COMPLETION: f64 = 0.45;
pub const DEFAULT_TOP_PAYERS: usize = 10;
pub const DEFAULT_TAIL_ROWS: usize = 10;

/// Settings from `clinic_report.toml`; every field is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub workbook: PathBuf,
    pub ideal_completion: f64,
    pub top_payers: usize,
    pub tail_rows: usize,
    /// Overrides the monthly goal read from the TD sheet.
    pub total_goal: Option<f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workbook: PathBuf::from(DEFAULT_WORKBOOK),
            ideal_completion: DEFAULT_IDEAL_COMPLETION,
            top_payers: DEFAULT_TOP_PAYERS,
            tail_rows: DEFAULT_TAIL_ROWS,
            total_goal: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from `./clinic_report.toml` when it
    /// exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ConfigFile {
            path: path.clone(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|e| ConfigError::ConfigParse { path, source: e })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.ideal_completion) {
            return Err(ConfigError::InvalidIdealFraction(self.ideal_completion));
        }
        Ok(())
    }

    /// Targets for this run: TD sheet values with the overrides applied.
    pub fn resolve_goal(&self, from_td: &Goal) -> Result<Goal, ConfigError> {
        self.validate()?;
        let mut goal = from_td.clone();
        goal.ideal_fraction = self.ideal_completion;
        if let Some(total) = self.total_goal {
            goal.total_goal =
                Decimal::try_from(total).map_err(|_| ConfigError::InvalidGoal(total))?;
        }
        Ok(goal)
    }
}

/// Template written by `clinic_report init`.
pub const CONFIG_TEMPLATE: &str = r#"# Workbook with the resumen, envios and TD sheets.
workbook = "resumen.xlsx"

# Fraction of the monthly goal expected at this point of the month.
ideal_completion = 0.45

# Rows in the payer ranking and in the recent-invoices table.
top_payers = 10
tail_rows = 10

# Uncomment to override the TOTAL row of the TD sheet.
# total_goal = 10500000000
"#;
