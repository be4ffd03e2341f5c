//! Live ingredient fetcher
//!
//! Downloads a recipe page as a browser would and extracts the text of every
//! element carrying the ingredient marker (`[data-ingredient]` by default).
//! A single attempt per call: failures are logged with the URL and reported
//! as `None`, never as an error. Retrying is the caller's decision.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use pmon_common::config::AccuracyConfig;

/// Fetcher construction errors
#[derive(Debug, Error)]
pub enum FetcherError {
    #[error("Invalid ingredient selector '{0}': {1}")]
    InvalidSelector(String, String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Source of live ingredient lines for a recipe URL
#[async_trait]
pub trait IngredientFetcher: Send + Sync {
    /// Ingredient lines currently shown at `url`, or `None` if unavailable
    async fn fetch_ingredients(&self, url: &str) -> Option<Vec<String>>;
}

/// HTTP implementation of [`IngredientFetcher`]
pub struct LiveFetcher {
    http_client: reqwest::Client,
    selector: Selector,
}

impl LiveFetcher {
    pub fn new(user_agent: &str, timeout: Duration, selector: &str) -> Result<Self, FetcherError> {
        let selector = Selector::parse(selector)
            .map_err(|e| FetcherError::InvalidSelector(selector.to_string(), e.to_string()))?;

        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FetcherError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            selector,
        })
    }

    pub fn from_config(config: &AccuracyConfig) -> Result<Self, FetcherError> {
        Self::new(
            &config.user_agent,
            Duration::from_secs(config.fetch_timeout_secs),
            &config.ingredient_selector,
        )
    }
}

#[async_trait]
impl IngredientFetcher for LiveFetcher {
    async fn fetch_ingredients(&self, url: &str) -> Option<Vec<String>> {
        debug!(url = %url, "Fetching live recipe page");

        let response = match self.http_client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Error fetching live data");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Live page returned non-success status");
            return None;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to read live page body");
                return None;
            }
        };

        let ingredients = extract_ingredients(&body, &self.selector);
        if ingredients.is_empty() {
            warn!(url = %url, "No ingredient markers found on live page");
            return None;
        }

        debug!(url = %url, count = ingredients.len(), "Extracted live ingredients");
        Some(ingredients)
    }
}

/// Trimmed text of every element matching `selector`, in document order
pub fn extract_ingredients(html: &str, selector: &Selector) -> Vec<String> {
    let document = Html::parse_document(html);

    document
        .select(selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .collect()
}
