use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use outreachetl::config::{
    default_date_range, AnalyticsOptions, OutputFormat, DEFAULT_DIMENSIONS, DEFAULT_METRICS,
    DEFAULT_OUTPUT_DIR,
};
use outreachetl::etl;
use outreachetl::fetch::analytics::AnalyticsClient;

/// Pull an analytics report and export it as CSV, Excel or JSON.
#[derive(Parser, Debug)]
#[command(name = "ga-etl", version, about)]
struct Args {
    /// Property id, with or without the `properties/` prefix.
    #[arg(long, env = "GA_PROPERTY_ID")]
    property_id: String,

    /// OAuth bearer token with analytics read scope.
    #[arg(long, env = "GA_ACCESS_TOKEN")]
    token: Option<String>,

    /// File containing the bearer token.
    #[arg(long, conflicts_with = "token")]
    token_file: Option<PathBuf>,

    /// First day of the report range; defaults to 30 days ago.
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Last day of the report range; defaults to yesterday.
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Report dimension, repeatable; defaults to the standard set.
    #[arg(long = "dimension")]
    dimensions: Vec<String>,

    /// Report metric, repeatable; defaults to the standard set.
    #[arg(long = "metric")]
    metrics: Vec<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    output_format: OutputFormat,

    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let args = Args::parse();

    let token = match (&args.token, &args.token_file) {
        (Some(token), _) => token.trim().to_string(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("reading token file {}", path.display()))?
            .trim()
            .to_string(),
        (None, None) => {
            anyhow::bail!("no credentials: pass --token, --token-file or set GA_ACCESS_TOKEN")
        }
    };

    let (default_start, default_end) = default_date_range(Utc::now().date_naive());
    let opts = AnalyticsOptions {
        start_date: args.start_date.unwrap_or(default_start),
        end_date: args.end_date.unwrap_or(default_end),
        dimensions: if args.dimensions.is_empty() {
            DEFAULT_DIMENSIONS.iter().map(|s| s.to_string()).collect()
        } else {
            args.dimensions
        },
        metrics: if args.metrics.is_empty() {
            DEFAULT_METRICS.iter().map(|s| s.to_string()).collect()
        } else {
            args.metrics
        },
        output_format: args.output_format,
        output_dir: args.output_dir,
    };

    let client = AnalyticsClient::new(reqwest::Client::new(), &args.property_id, token)
        .context("building analytics client")?;
    let paths = etl::run_analytics_etl(&client, &opts)
        .await
        .context("analytics ETL run failed")?;
    for path in &paths {
        info!(path = %path.display(), "artifact ready");
    }
    Ok(())
}
