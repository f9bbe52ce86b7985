//! Holder enumeration over a paginated token-accounts RPC.
//!
//! An owner may hold several token accounts of the same mint, so the holder
//! count is the number of distinct owners across every page, not the number
//! of accounts.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, instrument};

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::tracker::rate_limit::RequestLimiter;

/// Paginated source of token-account owners for a mint. Pages start at 1;
/// an empty page ends the enumeration.
#[async_trait]
pub trait HolderSource: Send + Sync {
    async fn fetch_owners_page(&self, mint: &str, page: u32, limit: u32) -> TrackerResult<Vec<String>>;
}

/// Walk every page for `mint` and count distinct owners.
///
/// Any page failure aborts the whole enumeration; the partial owner set is
/// discarded so a truncated count is never reported.
#[instrument(skip(source))]
pub async fn count_distinct_owners(
    source: &dyn HolderSource,
    mint: &str,
    page_size: u32,
) -> TrackerResult<u64> {
    let mut owners: HashSet<String> = HashSet::new();
    let mut page = 1;

    loop {
        let batch = source.fetch_owners_page(mint, page, page_size).await?;
        if batch.is_empty() {
            break;
        }
        owners.extend(batch);
        page += 1;
    }

    debug!("Mint {} has {} distinct owners over {} pages", mint, owners.len(), page - 1);
    Ok(owners.len() as u64)
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<TokenAccountsResult>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct TokenAccountsResult {
    #[serde(default)]
    token_accounts: Vec<TokenAccount>,
}

#[derive(Debug, Deserialize)]
struct TokenAccount {
    owner: String,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// JSON-RPC client for the `getTokenAccounts` method.
pub struct TokenAccountsClient {
    http: Client,
    rpc_url: String,
    limiter: Arc<RequestLimiter>,
    retry_attempts: usize,
}

impl TokenAccountsClient {
    pub fn new(http: Client, config: &TrackerConfig) -> Self {
        let rpc_url = match &config.holders.api_key {
            Some(key) => format!("{}/?api-key={}", config.holders.rpc_url.trim_end_matches('/'), key),
            None => config.holders.rpc_url.clone(),
        };

        Self {
            http,
            rpc_url,
            limiter: Arc::new(RequestLimiter::new(config.holders.requests_per_second)),
            retry_attempts: config.transport.retry_attempts,
        }
    }

    async fn fetch_once(&self, mint: &str, page: u32, limit: u32) -> TrackerResult<Vec<String>> {
        self.limiter.acquire().await;

        let body = json!({
            "jsonrpc": "2.0",
            "method": "getTokenAccounts",
            "id": "mint-pulse",
            "params": {
                "page": page,
                "limit": limit,
                "displayOptions": {},
                "mint": mint,
            },
        });

        let text = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_owners_response(&text, mint, page)
    }
}

fn parse_owners_response(text: &str, mint: &str, page: u32) -> TrackerResult<Vec<String>> {
    let response: RpcResponse = serde_json::from_str(text)
        .map_err(|e| TrackerError::parse(format!("getTokenAccounts {} page {}", mint, page), e))?;

    if let Some(err) = response.error {
        return Err(TrackerError::Rpc(format!("{} (code {})", err.message, err.code)));
    }

    let result = response
        .result
        .ok_or_else(|| TrackerError::Rpc(format!("no result for {} page {}", mint, page)))?;
    Ok(result.token_accounts.into_iter().map(|a| a.owner).collect())
}

#[async_trait]
impl HolderSource for TokenAccountsClient {
    #[instrument(skip(self))]
    async fn fetch_owners_page(&self, mint: &str, page: u32, limit: u32) -> TrackerResult<Vec<String>> {
        let retry_strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(2))
            .take(self.retry_attempts);

        Retry::spawn(retry_strategy, || self.fetch_once(mint, page, limit)).await
    }
}
