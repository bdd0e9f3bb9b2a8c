//! Vendor API clients. Auth, pagination and rate-limit handling live here so
//! the transform layer only ever sees raw records.

pub mod analytics;
pub mod mailchimp;

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value as JsonValue;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{EtlError, Result};

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

/// Send a request and decode the JSON body, retrying transient failures and
/// 429s with exponential backoff. 401/403 fail immediately as authentication
/// errors; a 429 that survives the retry budget surfaces as quota exhaustion.
pub(crate) async fn send_json(
    req: RequestBuilder,
    url: &str,
    source_name: &'static str,
) -> Result<JsonValue> {
    let mut attempts: u32 = 0;
    loop {
        let attempt = req.try_clone().ok_or_else(|| EtlError::UnexpectedPayload {
            url: url.to_string(),
            detail: "request is not retryable".into(),
        })?;
        match attempt.send().await {
            Ok(resp) => {
                let status = resp.status();
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                    return Err(EtlError::Authentication {
                        source_name,
                        status: status.as_u16(),
                    });
                }
                if status == StatusCode::TOO_MANY_REQUESTS {
                    attempts += 1;
                    if attempts > MAX_RETRIES {
                        return Err(EtlError::QuotaExceeded {
                            source_name,
                            attempts,
                        });
                    }
                    let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempts - 1);
                    warn!(%url, attempt = attempts, delay_ms = backoff, "rate limited, backing off");
                    sleep(Duration::from_millis(backoff)).await;
                    continue;
                }
                if !status.is_success() {
                    return Err(EtlError::Api {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
                return resp.json::<JsonValue>().await.map_err(|e| EtlError::Http {
                    url: url.to_string(),
                    source: e,
                });
            }
            Err(e) if attempts < MAX_RETRIES => {
                attempts += 1;
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempts - 1);
                warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "request failed, retrying");
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                return Err(EtlError::Http {
                    url: url.to_string(),
                    source: e,
                })
            }
        }
    }
}

/// Pull the record array and `total_items` out of a paginated envelope.
/// A missing or non-array key reads as an empty page.
pub(crate) fn page_items(envelope: &JsonValue, key: &str) -> (Vec<JsonValue>, Option<u64>) {
    let items = envelope
        .get(key)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let total = envelope.get("total_items").and_then(|v| v.as_u64());
    (items, total)
}
