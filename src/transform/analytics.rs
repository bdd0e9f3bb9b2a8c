use chrono::{NaiveDate, NaiveDateTime};
use tracing::{info, warn};

use super::{clean_country, ratio_or_zero};
use crate::fetch::analytics::{ReportQuery, RunReportResponse};
use crate::table::{ColumnDef, ColumnKind, Entity, RowBuilder, Schema, Table, Value};

/// Typing rule table for metric columns: count-like metrics become integers,
/// duration/rate metrics become floats, anything unlisted stays a string.
const INT_METRICS: &[&str] = &[
    "sessions",
    "totalUsers",
    "activeUsers",
    "newUsers",
    "screenPageViews",
    "eventCount",
];
const FLOAT_METRICS: &[&str] = &[
    "userEngagementDuration",
    "engagementRate",
    "bounceRate",
    "averageSessionDuration",
];

fn metric_kind(name: &str) -> ColumnKind {
    if INT_METRICS.contains(&name) {
        ColumnKind::Int
    } else if FLOAT_METRICS.contains(&name) {
        ColumnKind::Float
    } else {
        ColumnKind::Str
    }
}

fn dimension_kind(name: &str) -> ColumnKind {
    if name == "date" {
        ColumnKind::Date
    } else {
        ColumnKind::Str
    }
}

/// Report schema: dimensions, then metrics, then derived and metadata columns.
pub fn report_schema(dimensions: &[String], metrics: &[String]) -> Schema {
    let mut columns = Vec::with_capacity(dimensions.len() + metrics.len() + 3);
    for d in dimensions {
        columns.push(ColumnDef::new(d.clone(), dimension_kind(d)));
    }
    for m in metrics {
        let kind = metric_kind(m);
        let default = match kind {
            ColumnKind::Int => Value::Int(0),
            ColumnKind::Float => Value::Float(0.0),
            _ => Value::Null,
        };
        columns.push(ColumnDef::with_default(m.clone(), kind, default));
    }
    let has = |name: &str| metrics.iter().any(|m| m == name);
    if has("userEngagementDuration") && has("sessions") {
        columns.push(ColumnDef::with_default(
            "avg_engagement_duration",
            ColumnKind::Float,
            Value::Float(0.0),
        ));
    }
    columns.push(ColumnDef::new("extracted_at", ColumnKind::DateTime));
    columns.push(ColumnDef::new("data_source", ColumnKind::Str));
    Schema::new(Entity::Report, columns)
}

/// Reshape a report envelope into a flat typed table.
///
/// Header order wins when the response carries headers; the query order is
/// the fallback, so an empty report still yields the full schema.
pub fn transform_report(
    query: &ReportQuery,
    resp: &RunReportResponse,
    extracted_at: NaiveDateTime,
) -> Table {
    let dimensions: Vec<String> = if resp.dimension_headers.is_empty() {
        query.dimensions.clone()
    } else {
        resp.dimension_headers.iter().map(|h| h.name.clone()).collect()
    };
    let metrics: Vec<String> = if resp.metric_headers.is_empty() {
        query.metrics.clone()
    } else {
        resp.metric_headers.iter().map(|h| h.name.clone()).collect()
    };

    let schema = report_schema(&dimensions, &metrics);
    let has_avg = schema.index_of("avg_engagement_duration").is_some();
    let mut table = Table::new(schema.clone());

    for raw in &resp.rows {
        let mut b = RowBuilder::new(&schema);

        for (i, name) in dimensions.iter().enumerate() {
            let raw_value = raw
                .dimension_values
                .get(i)
                .map(|c| c.value.as_str())
                .unwrap_or("");
            let cell = match dimension_kind(name) {
                ColumnKind::Date => match NaiveDate::parse_from_str(raw_value, "%Y%m%d") {
                    Ok(d) => Value::Date(d),
                    Err(_) => {
                        warn!(value = raw_value, "unparseable report date, leaving null");
                        Value::Null
                    }
                },
                _ if name == "country" => Value::Str(clean_country(raw_value)),
                _ => Value::str(raw_value),
            };
            b.set(name, cell);
        }

        let mut sessions = 0.0;
        let mut engagement_duration = 0.0;
        for (i, name) in metrics.iter().enumerate() {
            let raw_value = raw
                .metric_values
                .get(i)
                .map(|c| c.value.as_str())
                .unwrap_or("");
            match metric_kind(name) {
                ColumnKind::Int => match raw_value.trim().parse::<i64>() {
                    Ok(n) => {
                        if name == "sessions" {
                            sessions = n as f64;
                        }
                        b.set(name, Value::Int(n));
                    }
                    Err(_) => {
                        warn!(metric = %name, value = raw_value, "metric not an integer, using default")
                    }
                },
                ColumnKind::Float => match raw_value.trim().parse::<f64>() {
                    Ok(x) => {
                        if name == "userEngagementDuration" {
                            engagement_duration = x;
                        }
                        b.set(name, Value::Float(x));
                    }
                    Err(_) => {
                        warn!(metric = %name, value = raw_value, "metric not a number, using default")
                    }
                },
                _ => {
                    b.set(name, Value::str(raw_value));
                }
            }
        }

        if has_avg {
            b.set(
                "avg_engagement_duration",
                Value::Float(ratio_or_zero(engagement_duration, sessions)),
            );
        }
        b.set("extracted_at", Value::DateTime(extracted_at));
        b.set("data_source", Value::str("google_analytics"));
        table.push_row(b);
    }

    info!(
        rows = table.len(),
        columns = table.schema().len(),
        "report transform complete"
    );
    table
}
