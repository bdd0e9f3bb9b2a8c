use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use outreachetl::config::{MailchimpOptions, OutputFormat, DEFAULT_OUTPUT_DIR};
use outreachetl::etl;
use outreachetl::fetch::mailchimp::MailchimpClient;

/// Pull lists, campaigns and (optionally) members from the marketing API and
/// export them as CSV, Excel or JSON.
#[derive(Parser, Debug)]
#[command(name = "mailchimp-etl", version, about)]
struct Args {
    #[arg(long, env = "MAILCHIMP_API_KEY")]
    api_key: String,

    /// Datacenter prefix of the account, e.g. us1.
    #[arg(long, env = "MAILCHIMP_SERVER_PREFIX", default_value = "us1")]
    server_prefix: String,

    /// Also extract per-list member data.
    #[arg(long)]
    include_members: bool,

    /// Only campaigns sent on or after this date.
    #[arg(long)]
    since_date: Option<NaiveDate>,

    /// Restrict member extraction to this list id, repeatable.
    #[arg(long = "list-id")]
    list_ids: Vec<String>,

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

    let opts = MailchimpOptions {
        include_members: args.include_members,
        specific_list_ids: args.list_ids,
        since_date: args.since_date,
        output_format: args.output_format,
        output_dir: args.output_dir,
    };

    let client = MailchimpClient::new(reqwest::Client::new(), args.api_key, &args.server_prefix)
        .context("building marketing client")?;
    let paths = etl::run_mailchimp_etl(&client, &opts)
        .await
        .context("mailchimp ETL run failed")?;
    for path in &paths {
        info!(path = %path.display(), "artifact ready");
    }
    Ok(())
}
