//! Derived summary tables: the analytics top-countries aggregation and the
//! marketing metric/value dashboard.

use std::collections::{BTreeMap, HashMap};

use crate::table::{RowBuilder, Schema, Table, Value};

/// Countries ranked by summed sessions, ties broken by name so the order is
/// stable across runs.
const TOP_COUNTRY_LIMIT: usize = 10;

/// Member countries listed on the dashboard.
const TOP_MEMBER_COUNTRY_LIMIT: usize = 5;

/// Aggregate the report by country: summed sessions, users and page views for
/// the busiest countries. Empty when the report has no country column.
pub fn analytics_summary(report: &Table) -> Table {
    let schema = Schema::analytics_summary();
    let mut table = Table::new(schema.clone());

    let (Some(country_idx), Some(sessions_idx)) = (
        report.schema().index_of("country"),
        report.schema().index_of("sessions"),
    ) else {
        return table;
    };
    let users_idx = report.schema().index_of("totalUsers");
    let views_idx = report.schema().index_of("screenPageViews");

    let mut by_country: BTreeMap<String, (i64, i64, i64)> = BTreeMap::new();
    for row in report.rows() {
        let Some(country) = row[country_idx].as_str() else {
            continue;
        };
        let entry = by_country.entry(country.to_string()).or_default();
        entry.0 += row[sessions_idx].as_i64().unwrap_or(0);
        if let Some(i) = users_idx {
            entry.1 += row[i].as_i64().unwrap_or(0);
        }
        if let Some(i) = views_idx {
            entry.2 += row[i].as_i64().unwrap_or(0);
        }
    }

    let mut ranked: Vec<(String, (i64, i64, i64))> = by_country.into_iter().collect();
    ranked.sort_by(|(name_a, stats_a), (name_b, stats_b)| {
        stats_b.0.cmp(&stats_a.0).then_with(|| name_a.cmp(name_b))
    });

    for (country, (sessions, users, views)) in ranked.into_iter().take(TOP_COUNTRY_LIMIT) {
        let mut b = RowBuilder::new(&schema);
        b.set("metric", Value::Str(format!("Top Country: {}", country)));
        b.set("sessions", Value::Int(sessions));
        b.set("totalUsers", Value::Int(users));
        b.set("screenPageViews", Value::Int(views));
        table.push_row(b);
    }
    table
}

fn push_kv(table: &mut Table, schema: &Schema, metric: String, value: String) {
    let mut b = RowBuilder::new(schema);
    b.set("metric", Value::Str(metric));
    b.set("value", Value::Str(value));
    table.push_row(b);
}

fn column_sum(table: &Table, name: &str) -> i64 {
    table
        .column(name)
        .map(|cells| cells.filter_map(|v| v.as_i64()).sum())
        .unwrap_or(0)
}

fn column_mean(table: &Table, name: &str) -> f64 {
    if table.is_empty() {
        return 0.0;
    }
    let sum: f64 = table
        .column(name)
        .map(|cells| cells.filter_map(|v| v.as_f64()).sum())
        .unwrap_or(0.0);
    sum / table.len() as f64
}

/// Metric/value dashboard over the marketing tables. Sections are skipped
/// when their backing table is empty, so the dashboard never reports
/// averages over nothing.
pub fn mailchimp_dashboard(lists: &Table, campaigns: &Table, members: Option<&Table>) -> Table {
    let schema = Schema::dashboard();
    let mut table = Table::new(schema.clone());

    if !campaigns.is_empty() {
        push_kv(
            &mut table,
            &schema,
            "Total Campaigns".into(),
            campaigns.len().to_string(),
        );
        push_kv(
            &mut table,
            &schema,
            "Avg Open Rate (%)".into(),
            format!("{:.2}", column_mean(campaigns, "open_rate") * 100.0),
        );
        push_kv(
            &mut table,
            &schema,
            "Avg Click Rate (%)".into(),
            format!("{:.2}", column_mean(campaigns, "click_rate") * 100.0),
        );
        push_kv(
            &mut table,
            &schema,
            "Total Emails Sent".into(),
            column_sum(campaigns, "emails_sent").to_string(),
        );
    }

    if !lists.is_empty() {
        push_kv(&mut table, &schema, "Total Lists".into(), lists.len().to_string());
        push_kv(
            &mut table,
            &schema,
            "Total Subscribers".into(),
            column_sum(lists, "member_count").to_string(),
        );
        push_kv(
            &mut table,
            &schema,
            "Total Unsubscribes".into(),
            column_sum(lists, "unsubscribe_count").to_string(),
        );
    }

    if let Some(members) = members {
        let mut counts: HashMap<String, i64> = HashMap::new();
        if let Some(cells) = members.column("country_name") {
            for cell in cells {
                if let Some(name) = cell.as_str() {
                    *counts.entry(name.to_string()).or_default() += 1;
                }
            }
        }
        let mut ranked: Vec<(String, i64)> = counts.into_iter().collect();
        ranked.sort_by(|(name_a, n_a), (name_b, n_b)| n_b.cmp(n_a).then_with(|| name_a.cmp(name_b)));
        for (country, count) in ranked.into_iter().take(TOP_MEMBER_COUNTRY_LIMIT) {
            push_kv(
                &mut table,
                &schema,
                format!("Subscribers in {}", country),
                count.to_string(),
            );
        }
    }

    table
}
