use bulksink::{BulkClient, BulkResponse, IndexRecord, Result, SinkError};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const NDJSON: &str = "application/x-ndjson";

/// HTTP client for a `_bulk` endpoint (Elasticsearch/OpenSearch wire format).
pub struct HttpBulkClient {
    base_url: String,
    http_client: reqwest::Client,
    last_success: Arc<AtomicU64>, // Unix timestamp in seconds
}

impl HttpBulkClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            last_success: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Unix seconds of the last bulk call that got a parsable answer; 0 = never.
    pub fn last_success_timestamp(&self) -> u64 {
        self.last_success.load(Ordering::Relaxed)
    }

    async fn send_bulk(&self, body: String, count: usize) -> Result<BulkResponse> {
        let url = format!("{}/_bulk", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, NDJSON)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                SinkError::Transport(format!("Failed to send bulk request to {}: {}", url, e))
            })?;

        if !response.status().is_success() {
            return Err(SinkError::Transport(format!(
                "Bulk endpoint {} returned error: {}",
                url,
                response.status()
            )));
        }

        let resp: BulkResponse = response.json().await.map_err(|e| {
            SinkError::Transport(format!("Failed to parse bulk response from {}: {}", url, e))
        })?;

        if resp.items.len() != count {
            tracing::warn!(
                "[BULK] {} answered {} items for {} submitted records",
                url,
                resp.items.len(),
                count
            );
        }

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.last_success.store(now, Ordering::Relaxed);

        Ok(resp)
    }
}

impl BulkClient for HttpBulkClient {
    fn submit(
        &self,
        batch: Vec<IndexRecord>,
    ) -> impl Future<Output = Result<BulkResponse>> + Send {
        async move {
            let body = encode_bulk_body(&batch)?;
            tracing::debug!(
                "[BULK] POST {}/_bulk: {} records",
                self.base_url,
                batch.len()
            );
            self.send_bulk(body, batch.len()).await
        }
    }
}

/// Newline-delimited action + source pairs, terminated by a newline.
pub fn encode_bulk_body(batch: &[IndexRecord]) -> Result<String> {
    let mut body = String::new();
    for record in batch {
        let (action, source) = record.to_bulk_lines();
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&source)?);
        body.push('\n');
    }
    Ok(body)
}
