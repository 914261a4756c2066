//! Finnhub REST client.

use std::time::Duration;

use async_trait::async_trait;
use pulse_core::error::{PulseError, PulseResult};
use tracing::debug;

use super::json_parser;
use crate::provider::{NewsArticle, Quote, QuoteProvider};

/// Finnhub REST client implementing [`QuoteProvider`].
pub struct FinnhubClient {
    /// Shared HTTP client.
    http: reqwest::Client,
    /// REST base URL (e.g. `https://finnhub.io/api/v1`).
    base_url: String,
    /// API token; requests go out unauthenticated without one and the
    /// provider rejects them.
    api_key: Option<String>,
}

impl FinnhubClient {
    /// Create a client with a per-request timeout.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> PulseResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PulseError::Transport(format!("http client init: {e}")))?;
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_string(), api_key })
    }

    /// GET `path` and return the body of a successful response.
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> PulseResult<Vec<u8>> {
        let url = format!("{}{path}", self.base_url);
        let mut req = self.http.get(&url).query(query);
        if let Some(ref key) = self.api_key {
            req = req.header("X-Finnhub-Token", key);
        }

        let resp = req.send().await.map_err(|e| PulseError::Transport(format!("{path}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PulseError::Http { status: status.as_u16(), endpoint: path.to_string() });
        }

        let body = resp.bytes().await.map_err(|e| PulseError::Transport(format!("{path}: {e}")))?;
        debug!("[finnhub] GET {path} -> {} bytes", body.len());
        Ok(body.to_vec())
    }
}

#[async_trait]
impl QuoteProvider for FinnhubClient {
    fn name(&self) -> &str {
        "finnhub"
    }

    async fn quote(&self, symbol: &str) -> PulseResult<Quote> {
        let body = self.get("/quote", &[("symbol", symbol)]).await?;
        json_parser::parse_quote(&body).map_err(|e| PulseError::Parse(format!("/quote {symbol}: {e}")))
    }

    async fn general_news(&self, category: &str) -> PulseResult<Vec<NewsArticle>> {
        let body = self.get("/news", &[("category", category), ("minId", "0")]).await?;
        json_parser::parse_news(&body).map_err(|e| PulseError::Parse(format!("/news: {e}")))
    }
}
