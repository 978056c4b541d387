use crate::error::ConfigError;
use crate::types::BillingRecord;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Selector value meaning "no restriction".
pub const ALL: &str = "ALL";

/// A branch or service selector value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(wanted) => wanted == value,
        }
    }
}

impl FromStr for Selection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::InvalidSelection(s.to_string()));
        }
        if s.eq_ignore_ascii_case(ALL) {
            Ok(Selection::All)
        } else {
            Ok(Selection::Only(s.to_string()))
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::All => f.write_str(ALL),
            Selection::Only(v) => f.write_str(v),
        }
    }
}

/// Branch / service / date-range filter over billing records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub branch: Selection,
    pub service: Selection,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RecordFilter {
    /// Date bounds are inclusive; undated records never pass a bounded filter.
    pub fn matches(&self, record: &BillingRecord) -> bool {
        if !self.branch.matches(&record.branch) || !self.service.matches(&record.service) {
            return false;
        }
        if self.from.is_none() && self.to.is_none() {
            return true;
        }
        let Some(date) = record.invoice_date else {
            return false;
        };
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

pub fn parse_date_arg(s: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ConfigError::InvalidDate(s.to_string()))
}

fn options_for<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = vec![ALL.to_string()];
    for v in values {
        if !v.is_empty() && seen.insert(v) {
            out.push(v.to_string());
        }
    }
    out
}

/// Branch selector values: `ALL` then each branch in first-seen order.
pub fn branch_options(records: &[BillingRecord]) -> Vec<String> {
    options_for(records.iter().map(|r| r.branch.as_str()))
}

/// Service selector values: `ALL` then each service in first-seen order.
pub fn service_options(records: &[BillingRecord]) -> Vec<String> {
    options_for(records.iter().map(|r| r.service.as_str()))
}
