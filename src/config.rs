//! Run options shared by the binaries. Credential material itself stays out
//! of these structs; the clients receive it directly.

use std::path::PathBuf;

use chrono::{Duration, NaiveDate};
use clap::ValueEnum;

/// Artifact format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Excel,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Excel => "xlsx",
            OutputFormat::Json => "json",
        }
    }
}

pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Dimension/metric sets requested when the caller does not pick their own.
pub const DEFAULT_DIMENSIONS: &[&str] = &["country", "city", "date", "pagePath", "deviceCategory"];
pub const DEFAULT_METRICS: &[&str] = &[
    "sessions",
    "totalUsers",
    "screenPageViews",
    "userEngagementDuration",
];

/// Default report range: the 30 days up to and including yesterday.
pub fn default_date_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today - Duration::days(30), today - Duration::days(1))
}

/// Options for one analytics report run.
#[derive(Debug, Clone)]
pub struct AnalyticsOptions {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub dimensions: Vec<String>,
    pub metrics: Vec<String>,
    pub output_format: OutputFormat,
    pub output_dir: PathBuf,
}

/// Options for one marketing run.
#[derive(Debug, Clone)]
pub struct MailchimpOptions {
    pub include_members: bool,
    /// Explicit list ids for member extraction; empty means "pick for me".
    pub specific_list_ids: Vec<String>,
    /// Only campaigns sent on or after this date.
    pub since_date: Option<NaiveDate>,
    pub output_format: OutputFormat,
    pub output_dir: PathBuf,
}
