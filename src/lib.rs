pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod output;
pub mod reports;
pub mod types;
pub mod util;

pub use cache::WorkbookCache;
pub use config::Settings;
pub use error::{ConfigError, LoadError, ReportError, Result};
pub use filter::{RecordFilter, Selection};
pub use reports::{aggregate, ReportOptions};
pub use types::{AggregateResult, BillingRecord, Dataset, Goal};
