use std::sync::Arc;

use chrono::NaiveDate;
use futures::{stream, StreamExt, TryStreamExt};
use reqwest::{header::AUTHORIZATION, Client};
use serde_json::Value as JsonValue;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};
use url::Url;

use super::{page_items, send_json};
use crate::error::{EtlError, Result};

pub const SOURCE_NAME: &str = "mailchimp";

const PAGE_SIZE: u64 = 1000;

/// Concurrent per-list member extractions. Small on purpose so the vendor's
/// rate limiter stays quiet.
const MEMBER_FETCH_CONCURRENCY: usize = 3;

/// Concurrent per-campaign detail requests, same reasoning.
const CAMPAIGN_DETAIL_CONCURRENCY: usize = 3;

/// Client for the marketing API. One instance per (api key, server prefix).
#[derive(Clone)]
pub struct MailchimpClient {
    http: Client,
    base: Url,
    api_key: String,
}

impl MailchimpClient {
    pub fn new(http: Client, api_key: impl Into<String>, server_prefix: &str) -> Result<Self> {
        let base = format!("https://{}.api.mailchimp.com/3.0/", server_prefix);
        Self::with_base(http, &base, api_key)
    }

    /// Same as [`MailchimpClient::new`] but against a different endpoint, so
    /// tests can point at a local fixture server.
    pub fn with_base(http: Client, base: &str, api_key: impl Into<String>) -> Result<Self> {
        let mut base = Url::parse(base)
            .map_err(|e| EtlError::Config(format!("invalid marketing base URL {base}: {e}")))?;
        // joins below are relative, so the base path must end in a slash
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Ok(MailchimpClient {
            http,
            base,
            api_key: api_key.into(),
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<JsonValue> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| EtlError::Config(format!("building URL for {path}: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        let req = self
            .http
            .get(url.clone())
            .header(AUTHORIZATION, format!("apikey {}", self.api_key));
        send_json(req, url.as_str(), SOURCE_NAME).await
    }

    /// Enumerate every page of `path`, reading records from the `key` array
    /// of each envelope.
    async fn get_all(
        &self,
        path: &str,
        key: &str,
        extra: &[(&str, String)],
    ) -> Result<Vec<JsonValue>> {
        let mut out = Vec::new();
        let mut offset = 0u64;
        loop {
            let mut query = vec![
                ("count", PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
            ];
            query.extend_from_slice(extra);
            let envelope = self.get_json(path, &query).await?;
            let (items, total) = page_items(&envelope, key);
            let fetched = items.len() as u64;
            out.extend(items);
            offset += fetched;
            let done = fetched == 0 || total.map_or(fetched < PAGE_SIZE, |t| offset >= t);
            if done {
                break;
            }
        }
        Ok(out)
    }

    /// Extract every mailing list.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_lists(&self) -> Result<Vec<JsonValue>> {
        let lists = self.get_all("lists", "lists", &[]).await?;
        info!(count = lists.len(), "extracted mailing lists");
        Ok(lists)
    }

    /// Extract sent campaigns, each merged with its detail record (the
    /// listing alone does not carry the open/click stats).
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_campaigns(&self, since_date: Option<NaiveDate>) -> Result<Vec<JsonValue>> {
        let mut extra = vec![("status", "sent".to_string())];
        if let Some(d) = since_date {
            extra.push(("since_send_time", d.format("%Y-%m-%d").to_string()));
        }
        let campaigns = self.get_all("campaigns", "campaigns", &extra).await?;

        // `buffered` keeps listing order, so the output is deterministic even
        // though details arrive concurrently
        let detailed: Vec<JsonValue> = stream::iter(campaigns.into_iter().map(|campaign| {
            async move {
                let id = match campaign.get("id").and_then(|v| v.as_str()) {
                    Some(id) => id.to_string(),
                    None => {
                        warn!("campaign record without id, keeping listing record");
                        return Ok(campaign);
                    }
                };
                match self.get_json(&format!("campaigns/{}", id), &[]).await {
                    Ok(detail) => Ok(merge_records(campaign, detail)),
                    Err(err)
                        if matches!(
                            err,
                            EtlError::Authentication { .. } | EtlError::QuotaExceeded { .. }
                        ) =>
                    {
                        Err(err)
                    }
                    Err(err) => {
                        warn!(campaign = %id, error = %err, "detail fetch failed, keeping listing record");
                        Ok(campaign)
                    }
                }
            }
        }))
        .buffered(CAMPAIGN_DETAIL_CONCURRENCY)
        .try_collect()
        .await?;

        info!(count = detailed.len(), "extracted campaigns");
        Ok(detailed)
    }

    /// Extract subscribed members for the given lists, a bounded number of
    /// lists at a time. Results are reassembled in list-id order so the final
    /// table is deterministic regardless of completion order.
    #[instrument(level = "info", skip(self, list_ids), fields(lists = list_ids.len()))]
    pub async fn fetch_members(&self, list_ids: &[String]) -> Result<Vec<JsonValue>> {
        let sem = Arc::new(Semaphore::new(MEMBER_FETCH_CONCURRENCY));
        let mut handles = Vec::with_capacity(list_ids.len());
        for list_id in list_ids {
            let client = self.clone();
            let list_id = list_id.clone();
            let sem = Arc::clone(&sem);
            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                let members = client
                    .get_all(
                        &format!("lists/{}/members", list_id),
                        "members",
                        &[("status", "subscribed".to_string())],
                    )
                    .await?;
                info!(list = %list_id, count = members.len(), "extracted members");
                Ok::<_, EtlError>((list_id, members))
            }));
        }

        let mut groups = Vec::with_capacity(handles.len());
        for handle in handles {
            let group = handle.await.expect("member fetch task panicked")?;
            groups.push(group);
        }
        groups.sort_by(|a, b| a.0.cmp(&b.0));

        let mut flat = Vec::new();
        for (list_id, members) in groups {
            for mut member in members {
                if let Some(obj) = member.as_object_mut() {
                    obj.entry("list_id")
                        .or_insert_with(|| JsonValue::String(list_id.clone()));
                }
                flat.push(member);
            }
        }
        Ok(flat)
    }
}

/// Overlay `detail` onto `listing`; detail fields win on conflicts.
fn merge_records(listing: JsonValue, detail: JsonValue) -> JsonValue {
    match (listing, detail) {
        (JsonValue::Object(mut base), JsonValue::Object(overlay)) => {
            for (k, v) in overlay {
                base.insert(k, v);
            }
            JsonValue::Object(base)
        }
        (_, detail) => detail,
    }
}
