use chrono::{NaiveDateTime, Timelike};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use super::{country_display_name, json_f64, json_i64, json_str, parse_datetime, ratio_or_zero};
use crate::table::{RowBuilder, Schema, Table, Value};

const DATA_SOURCE: &str = "mailchimp";

/// Ordered open-rate buckets (0-1 scale). Anything past the last threshold
/// is Excellent.
const PERFORMANCE_BUCKETS: &[(f64, &str)] = &[(0.15, "Low"), (0.25, "Medium"), (0.35, "High")];

pub(crate) fn performance_category(open_rate: f64) -> &'static str {
    for (threshold, label) in PERFORMANCE_BUCKETS {
        if open_rate < *threshold {
            return label;
        }
    }
    "Excellent"
}

const ENGAGEMENT_OPEN_WEIGHT: f64 = 0.6;
const ENGAGEMENT_CLICK_WEIGHT: f64 = 0.4;

/// Blended engagement score over the open and click rates.
pub(crate) fn engagement_rate(open_rate: f64, click_rate: f64) -> f64 {
    ENGAGEMENT_OPEN_WEIGHT * open_rate + ENGAGEMENT_CLICK_WEIGHT * click_rate
}

fn datetime_cell(rec: &JsonValue, ptr: &str) -> Option<Value> {
    let raw = json_str(rec, ptr)?;
    match parse_datetime(&raw) {
        Some(dt) => Some(Value::DateTime(dt)),
        None => {
            warn!(field = ptr, value = %raw, "unparseable timestamp, leaving null");
            None
        }
    }
}

/// Mailing lists -> `lists` table, with the unsubscribe-rate health metric.
pub fn transform_lists(records: &[JsonValue], extracted_at: NaiveDateTime) -> Table {
    let schema = Schema::lists();
    let mut table = Table::new(schema.clone());
    for rec in records {
        let mut b = RowBuilder::new(&schema);
        b.set_opt("list_id", json_str(rec, "/id").map(Value::Str));
        b.set_opt("list_name", json_str(rec, "/name").map(Value::Str));
        let member_count = json_i64(rec, "/stats/member_count");
        let unsubscribe_count = json_i64(rec, "/stats/unsubscribe_count");
        b.set_opt("member_count", member_count.map(Value::Int));
        b.set_opt("unsubscribe_count", unsubscribe_count.map(Value::Int));
        b.set_opt("open_rate", json_f64(rec, "/stats/open_rate").map(Value::Float));
        b.set_opt(
            "click_rate",
            json_f64(rec, "/stats/click_rate").map(Value::Float),
        );
        b.set_opt("date_created", datetime_cell(rec, "/date_created"));
        b.set_opt("visibility", json_str(rec, "/visibility").map(Value::Str));
        b.set(
            "unsubscribe_rate",
            Value::Float(ratio_or_zero(
                unsubscribe_count.unwrap_or(0) as f64,
                member_count.unwrap_or(0) as f64,
            )),
        );
        b.set("extracted_at", Value::DateTime(extracted_at));
        b.set("data_source", Value::str(DATA_SOURCE));
        table.push_row(b);
    }
    info!(rows = table.len(), "lists transform complete");
    table
}

/// Sent campaigns (listing merged with detail stats) -> `campaigns` table,
/// with the blended engagement score and the performance bucket.
pub fn transform_campaigns(records: &[JsonValue], extracted_at: NaiveDateTime) -> Table {
    let schema = Schema::campaigns();
    let mut table = Table::new(schema.clone());
    for rec in records {
        let mut b = RowBuilder::new(&schema);
        b.set_opt("campaign_id", json_str(rec, "/id").map(Value::Str));
        b.set_opt(
            "campaign_name",
            json_str(rec, "/settings/subject_line").map(Value::Str),
        );
        b.set_opt("list_id", json_str(rec, "/recipients/list_id").map(Value::Str));

        if let Some(Value::DateTime(sent)) = datetime_cell(rec, "/send_time") {
            b.set("send_time", Value::DateTime(sent));
            b.set("send_date", Value::Date(sent.date()));
            b.set("send_hour", Value::Int(sent.hour() as i64));
        }

        b.set_opt("emails_sent", json_i64(rec, "/emails_sent").map(Value::Int));
        b.set_opt("opens", json_i64(rec, "/opens/opens_total").map(Value::Int));
        b.set_opt(
            "unique_opens",
            json_i64(rec, "/opens/unique_opens").map(Value::Int),
        );
        let open_rate = json_f64(rec, "/opens/open_rate").unwrap_or(0.0);
        b.set("open_rate", Value::Float(open_rate));
        b.set_opt("clicks", json_i64(rec, "/clicks/clicks_total").map(Value::Int));
        b.set_opt(
            "unique_clicks",
            json_i64(rec, "/clicks/unique_clicks").map(Value::Int),
        );
        let click_rate = json_f64(rec, "/clicks/click_rate").unwrap_or(0.0);
        b.set("click_rate", Value::Float(click_rate));
        b.set_opt(
            "unsubscribes",
            json_i64(rec, "/unsubscribed/unsubscribes").map(Value::Int),
        );
        let bounces = json_i64(rec, "/bounces/hard_bounces").unwrap_or(0)
            + json_i64(rec, "/bounces/soft_bounces").unwrap_or(0);
        b.set("bounces", Value::Int(bounces));
        b.set_opt("campaign_type", json_str(rec, "/type").map(Value::Str));
        b.set_opt("status", json_str(rec, "/status").map(Value::Str));
        b.set(
            "engagement_rate",
            Value::Float(engagement_rate(open_rate, click_rate)),
        );
        b.set(
            "performance_category",
            Value::str(performance_category(open_rate)),
        );
        b.set("extracted_at", Value::DateTime(extracted_at));
        b.set("data_source", Value::str(DATA_SOURCE));
        table.push_row(b);
    }
    info!(rows = table.len(), "campaigns transform complete");
    table
}

/// Subscribers -> `members` table, with the location sub-object flattened
/// into scalar geography columns.
pub fn transform_members(records: &[JsonValue], extracted_at: NaiveDateTime) -> Table {
    let schema = Schema::members();
    let mut table = Table::new(schema.clone());
    for rec in records {
        let mut b = RowBuilder::new(&schema);
        b.set_opt("member_id", json_str(rec, "/id").map(Value::Str));
        b.set_opt("email", json_str(rec, "/email_address").map(Value::Str));
        b.set_opt("status", json_str(rec, "/status").map(Value::Str));
        b.set_opt("list_id", json_str(rec, "/list_id").map(Value::Str));

        if let Some(Value::DateTime(signup)) = datetime_cell(rec, "/timestamp_signup") {
            b.set("timestamp_signup", Value::DateTime(signup));
            let tenure = (extracted_at.date() - signup.date()).num_days();
            b.set("days_since_signup", Value::Int(tenure));
        }
        b.set_opt("timestamp_opt", datetime_cell(rec, "/timestamp_opt"));

        if let Some(code) = json_str(rec, "/location/country_code").filter(|c| !c.is_empty()) {
            b.set("country_name", Value::Str(country_display_name(&code)));
            b.set("country_code", Value::Str(code));
        }
        b.set_opt(
            "timezone",
            json_str(rec, "/location/timezone").map(Value::Str),
        );
        b.set_opt(
            "latitude",
            json_f64(rec, "/location/latitude").map(Value::Float),
        );
        b.set_opt(
            "longitude",
            json_f64(rec, "/location/longitude").map(Value::Float),
        );
        b.set_opt("ip_signup", json_str(rec, "/ip_signup").map(Value::Str));
        b.set_opt("ip_opt", json_str(rec, "/ip_opt").map(Value::Str));
        b.set_opt("language", json_str(rec, "/language").map(Value::Str));
        b.set_opt("member_rating", json_i64(rec, "/member_rating").map(Value::Int));
        b.set_opt("email_client", json_str(rec, "/email_client").map(Value::Str));
        b.set_opt("tags_count", json_i64(rec, "/tags_count").map(Value::Int));
        b.set("extracted_at", Value::DateTime(extracted_at));
        b.set("data_source", Value::str(DATA_SOURCE));
        table.push_row(b);
    }
    info!(rows = table.len(), "members transform complete");
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_unsubscribe_rate_zero_members_is_sentinel() {
        let records = vec![json!({
            "id": "l1",
            "name": "Empty list",
            "stats": {"member_count": 0, "unsubscribe_count": 0}
        })];
        let table = transform_lists(&records, at());
        assert_eq!(table.cell(0, "unsubscribe_rate"), Some(&Value::Float(0.0)));
    }

    #[test]
    fn test_unsubscribe_rate_within_unit_interval() {
        let records = vec![json!({
            "id": "l2",
            "name": "Active list",
            "stats": {"member_count": 200, "unsubscribe_count": 14}
        })];
        let table = transform_lists(&records, at());
        let rate = table
            .cell(0, "unsubscribe_rate")
            .and_then(|v| v.as_f64())
            .unwrap();
        assert!((rate - 0.07).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&rate));
    }

    #[test]
    fn test_list_defaults_for_missing_fields() {
        let records = vec![json!({"id": "l3"})];
        let table = transform_lists(&records, at());
        assert_eq!(table.cell(0, "member_count"), Some(&Value::Int(0)));
        assert_eq!(table.cell(0, "visibility"), Some(&Value::str("private")));
        assert_eq!(table.cell(0, "date_created"), Some(&Value::Null));
    }

    #[test]
    fn test_engagement_rate_is_weighted_blend() {
        let records = vec![json!({
            "id": "c1",
            "settings": {"subject_line": "May update"},
            "opens": {"open_rate": 0.5},
            "clicks": {"click_rate": 0.25}
        })];
        let table = transform_campaigns(&records, at());
        let rate = table
            .cell(0, "engagement_rate")
            .and_then(|v| v.as_f64())
            .unwrap();
        assert!((rate - (0.6 * 0.5 + 0.4 * 0.25)).abs() < 1e-12);
    }

    #[test]
    fn test_performance_buckets() {
        assert_eq!(performance_category(0.0), "Low");
        assert_eq!(performance_category(0.1499), "Low");
        assert_eq!(performance_category(0.15), "Medium");
        assert_eq!(performance_category(0.2499), "Medium");
        assert_eq!(performance_category(0.25), "High");
        assert_eq!(performance_category(0.34), "High");
        assert_eq!(performance_category(0.35), "Excellent");
        assert_eq!(performance_category(0.9), "Excellent");
    }

    #[test]
    fn test_campaign_missing_subject_defaults_to_unknown() {
        let records = vec![json!({"id": "c2", "status": "sent"})];
        let table = transform_campaigns(&records, at());
        assert_eq!(table.cell(0, "campaign_name"), Some(&Value::str("Unknown")));
        assert_eq!(table.cell(0, "campaign_type"), Some(&Value::str("regular")));
    }

    #[test]
    fn test_campaign_send_time_derivations() {
        let records = vec![json!({
            "id": "c3",
            "send_time": "2024-05-20T18:45:00+00:00",
            "bounces": {"hard_bounces": 2, "soft_bounces": 3}
        })];
        let table = transform_campaigns(&records, at());
        assert_eq!(
            table.cell(0, "send_date"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()))
        );
        assert_eq!(table.cell(0, "send_hour"), Some(&Value::Int(18)));
        assert_eq!(table.cell(0, "bounces"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_member_location_flattened() {
        let records = vec![json!({
            "id": "m1",
            "email_address": "a@example.org",
            "status": "subscribed",
            "list_id": "l1",
            "timestamp_signup": "2024-05-02T08:00:00+00:00",
            "location": {
                "country_code": "UA",
                "timezone": "Europe/Kyiv",
                "latitude": 50.45,
                "longitude": 30.52
            },
            "member_rating": 4,
            "tags_count": 2
        })];
        let table = transform_members(&records, at());
        assert_eq!(table.cell(0, "country_code"), Some(&Value::str("UA")));
        assert_eq!(table.cell(0, "country_name"), Some(&Value::str("Ukraine")));
        assert_eq!(table.cell(0, "latitude"), Some(&Value::Float(50.45)));
        assert_eq!(table.cell(0, "days_since_signup"), Some(&Value::Int(30)));
    }

    #[test]
    fn test_member_unknown_country_falls_back_to_code() {
        let records = vec![json!({
            "id": "m2",
            "email_address": "b@example.org",
            "location": {"country_code": "BR"}
        })];
        let table = transform_members(&records, at());
        assert_eq!(table.cell(0, "country_name"), Some(&Value::str("BR")));
        // no signup timestamp -> tenure stays null
        assert_eq!(table.cell(0, "days_since_signup"), Some(&Value::Null));
    }

    #[test]
    fn test_empty_input_keeps_full_schema() {
        let table = transform_campaigns(&[], at());
        assert!(table.is_empty());
        assert_eq!(table.schema().len(), 21);
        assert!(table.schema().index_of("engagement_rate").is_some());
    }

    #[test]
    fn test_transform_is_idempotent() {
        let records = vec![json!({
            "id": "l1",
            "name": "News",
            "stats": {"member_count": 10, "unsubscribe_count": 1, "open_rate": 0.4, "click_rate": 0.1},
            "date_created": "2023-01-01T00:00:00+00:00"
        })];
        let first = transform_lists(&records, at());
        let second = transform_lists(&records, at());
        assert_eq!(first, second);
    }
}
