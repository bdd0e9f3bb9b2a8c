//! End-to-end runs: extract -> transform -> bundle -> summarize -> load.
//! Each run is a single synchronous sequence; a run either completes with its
//! artifact paths or fails with no partial artifact in place.

use std::path::PathBuf;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::config::{AnalyticsOptions, MailchimpOptions};
use crate::error::Result;
use crate::fetch::analytics::{AnalyticsClient, ReportQuery};
use crate::fetch::mailchimp::MailchimpClient;
use crate::load;
use crate::summary;
use crate::table::ExportBundle;
use crate::transform;

/// How many lists to walk for members when no explicit ids are given.
const DEFAULT_MEMBER_LIST_LIMIT: usize = 3;

/// Run the analytics pipeline once and return the artifact paths.
pub async fn run_analytics_etl(
    client: &AnalyticsClient,
    opts: &AnalyticsOptions,
) -> Result<Vec<PathBuf>> {
    let extracted_at = Utc::now().naive_utc();
    info!(start = %opts.start_date, end = %opts.end_date, "starting analytics ETL run");

    let query = ReportQuery {
        start_date: opts.start_date,
        end_date: opts.end_date,
        dimensions: opts.dimensions.clone(),
        metrics: opts.metrics.clone(),
    };
    let response = client.run_report(&query).await?;
    let report = transform::analytics::transform_report(&query, &response, extracted_at);
    let report_summary = summary::analytics_summary(&report);

    let mut bundle = ExportBundle::new("ga");
    bundle.tables.push(report);
    bundle.summary = Some(report_summary);

    let paths = load::write_bundle(&bundle, opts.output_format, &opts.output_dir, extracted_at)?;
    info!(artifacts = paths.len(), "analytics ETL run complete");
    Ok(paths)
}

/// Which lists to pull members for: the explicit ids when given, otherwise
/// the first few lists of the account.
pub(crate) fn member_list_ids(specific: &[String], lists_raw: &[JsonValue]) -> Vec<String> {
    if !specific.is_empty() {
        return specific.to_vec();
    }
    lists_raw
        .iter()
        .filter_map(|l| l.get("id").and_then(|v| v.as_str()).map(str::to_string))
        .take(DEFAULT_MEMBER_LIST_LIMIT)
        .collect()
}

/// Run the marketing pipeline once and return the artifact paths. The bundle
/// is assembled in a fixed order (lists, campaigns, members) regardless of
/// extraction timing.
pub async fn run_mailchimp_etl(
    client: &MailchimpClient,
    opts: &MailchimpOptions,
) -> Result<Vec<PathBuf>> {
    let extracted_at = Utc::now().naive_utc();
    info!(include_members = opts.include_members, "starting mailchimp ETL run");

    let lists_raw = client.fetch_lists().await?;
    let lists = transform::mailchimp::transform_lists(&lists_raw, extracted_at);

    let campaigns_raw = client.fetch_campaigns(opts.since_date).await?;
    let campaigns = transform::mailchimp::transform_campaigns(&campaigns_raw, extracted_at);

    let members = if opts.include_members {
        let ids = member_list_ids(&opts.specific_list_ids, &lists_raw);
        let members_raw = client.fetch_members(&ids).await?;
        Some(transform::mailchimp::transform_members(
            &members_raw,
            extracted_at,
        ))
    } else {
        None
    };

    let dashboard = summary::mailchimp_dashboard(&lists, &campaigns, members.as_ref());

    let mut bundle = ExportBundle::new("mailchimp");
    bundle.tables.push(lists);
    bundle.tables.push(campaigns);
    if let Some(members) = members {
        bundle.tables.push(members);
    }
    bundle.summary = Some(dashboard);

    let paths = load::write_bundle(&bundle, opts.output_format, &opts.output_dir, extracted_at)?;
    info!(artifacts = paths.len(), "mailchimp ETL run complete");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_member_list_ids_prefers_explicit() {
        let lists = vec![json!({"id": "a"}), json!({"id": "b"})];
        let explicit = vec!["x".to_string()];
        assert_eq!(member_list_ids(&explicit, &lists), vec!["x"]);
    }

    #[test]
    fn test_member_list_ids_takes_first_three() {
        let lists = vec![
            json!({"id": "a"}),
            json!({"no_id": true}),
            json!({"id": "b"}),
            json!({"id": "c"}),
            json!({"id": "d"}),
        ];
        assert_eq!(member_list_ids(&[], &lists), vec!["a", "b", "c"]);
    }
}
