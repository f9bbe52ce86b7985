//! Event feed access and payload parsing.
//!
//! The feed is a newest-first, paginated log of webhook deliveries. Each
//! delivery carries an opaque JSON body holding one or more parsed
//! transactions, each listing its token transfers.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, instrument, warn};

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::types::MintId;

/// One delivery in the event feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedEvent {
    /// Unique, stable event identifier
    #[serde(rename = "uuid")]
    pub id: String,
    /// Raw request body
    #[serde(default)]
    pub content: Option<String>,
}

impl FeedEvent {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: Some(content.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedPage {
    #[serde(default)]
    data: Vec<FeedEvent>,
}

/// Source of feed events, newest first. Pages start at 1.
#[async_trait]
pub trait EventFeed: Send + Sync {
    async fn fetch_page(&self, page: u32, limit: u32) -> TrackerResult<Vec<FeedEvent>>;
}

/// HTTP client for a webhook.site-style request log.
pub struct WebhookFeedClient {
    http: Client,
    requests_url: String,
    api_key: Option<String>,
    retry_attempts: usize,
}

impl WebhookFeedClient {
    pub fn new(http: Client, config: &TrackerConfig) -> Self {
        let base = config.feed.base_url.trim_end_matches('/');
        Self {
            http,
            requests_url: format!("{}/token/{}/requests", base, config.feed.token_id),
            api_key: config.feed.api_key.clone(),
            retry_attempts: config.transport.retry_attempts,
        }
    }

    async fn fetch_page_once(&self, page: u32, limit: u32) -> TrackerResult<Vec<FeedEvent>> {
        let mut request = self
            .http
            .get(&self.requests_url)
            .header("Accept", "application/json")
            .query(&[("page", page), ("limit", limit)]);
        if let Some(key) = &self.api_key {
            request = request.header("Api-Key", key);
        }

        let body = request.send().await?.error_for_status()?.text().await?;
        let page: FeedPage = serde_json::from_str(&body)
            .map_err(|e| TrackerError::parse(format!("feed page {}", page), e))?;
        Ok(page.data)
    }
}

#[async_trait]
impl EventFeed for WebhookFeedClient {
    #[instrument(skip(self))]
    async fn fetch_page(&self, page: u32, limit: u32) -> TrackerResult<Vec<FeedEvent>> {
        let retry_strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(2))
            .take(self.retry_attempts);

        let events = Retry::spawn(retry_strategy, || self.fetch_page_once(page, limit)).await?;
        debug!("Fetched {} feed events from page {}", events.len(), page);
        Ok(events)
    }
}

#[derive(Debug, Deserialize)]
struct ParsedTransaction {
    #[serde(rename = "tokenTransfers", default)]
    token_transfers: Vec<TokenTransfer>,
}

#[derive(Debug, Deserialize)]
struct TokenTransfer {
    #[serde(default)]
    mint: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Many(Vec<ParsedTransaction>),
    One(ParsedTransaction),
}

/// True when `mint` ends with `suffix`, ignoring ASCII and Unicode case.
pub fn matches_suffix(mint: &str, suffix: &str) -> bool {
    mint.to_lowercase().ends_with(&suffix.to_lowercase())
}

/// Extract every eligible mint referenced by one event's payload, in order
/// of appearance. Duplicates are kept; callers collect into a set.
pub fn extract_mints(event: &FeedEvent, suffix: &str) -> TrackerResult<Vec<MintId>> {
    let content = match event.content.as_deref() {
        Some(content) => content,
        None => {
            warn!("Feed event {} has no content", event.id);
            return Ok(Vec::new());
        }
    };

    let payload: Payload = serde_json::from_str(content)
        .map_err(|e| TrackerError::parse(format!("event {}", event.id), e))?;
    let transactions = match payload {
        Payload::Many(txs) => txs,
        Payload::One(tx) => vec![tx],
    };

    Ok(transactions
        .into_iter()
        .flat_map(|tx| tx.token_transfers)
        .map(|transfer| transfer.mint)
        .filter(|mint| !mint.is_empty() && matches_suffix(mint, suffix))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_match_is_case_insensitive() {
        assert!(matches_suffix("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgPUMP", "pump"));
        assert!(matches_suffix("abcpump", "PUMP"));
        assert!(!matches_suffix("pumpabc", "pump"));
        assert!(matches_suffix("anything", ""));
    }

    #[test]
    fn test_extract_mints_scans_all_transactions() {
        let event = FeedEvent::new(
            "e1",
            r#"[
                {"signature": "s1", "tokenTransfers": [{"mint": "AaaPump", "tokenAmount": 5}, {"mint": "So11111111111111111111111111111111111111112"}]},
                {"signature": "s2", "tokenTransfers": [{"mint": "BbbPUMP"}]}
            ]"#,
        );

        let mints = extract_mints(&event, "pump").unwrap();
        assert_eq!(mints, vec!["AaaPump".to_string(), "BbbPUMP".to_string()]);
    }

    #[test]
    fn test_extract_mints_accepts_single_object() {
        let event = FeedEvent::new("e1", r#"{"tokenTransfers": [{"mint": "CccPump"}]}"#);
        assert_eq!(extract_mints(&event, "pump").unwrap(), vec!["CccPump".to_string()]);
    }

    #[test]
    fn test_extract_mints_without_transfers() {
        let event = FeedEvent::new("e1", r#"[{"type": "UNKNOWN"}]"#);
        assert!(extract_mints(&event, "pump").unwrap().is_empty());
    }

    #[test]
    fn test_extract_mints_malformed_payload() {
        let event = FeedEvent::new("e1", "not json");
        let err = extract_mints(&event, "pump").unwrap_err();
        assert!(matches!(err, TrackerError::Parse { .. }));
    }

    #[test]
    fn test_missing_content_yields_nothing() {
        let event = FeedEvent {
            id: "e1".to_string(),
            content: None,
        };
        assert!(extract_mints(&event, "pump").unwrap().is_empty());
    }

    #[test]
    fn test_feed_page_deserializes() {
        let page: FeedPage = serde_json::from_str(
            r#"{"data": [{"uuid": "u1", "content": "[]", "ip": "1.2.3.4"}, {"uuid": "u2", "content": null}], "total": 2}"#,
        )
        .unwrap();

        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].id, "u1");
        assert_eq!(page.data[1].content, None);
    }

    #[test]
    fn test_client_builds_requests_url() {
        let mut config = TrackerConfig::default();
        config.feed.base_url = "https://feed.example/".to_string();
        config.feed.token_id = "tok".to_string();

        let client = WebhookFeedClient::new(Client::new(), &config);
        assert_eq!(client.requests_url, "https://feed.example/token/tok/requests");
    }
}
