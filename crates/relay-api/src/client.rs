//! HTTP client for the upstream pricing REST API.
//!
//! Covers the token endpoint, single-item price fetches, paginated pricelist
//! pages, and price-check requests. All numeric prices arrive as integer
//! half-scrap and key counts; conversion to `Currencies` happens in
//! `PricelistItem::into_update`.

use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use relay_core::{Currencies, PriceUpdate, Sku};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Response from the token endpoint.
#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// Response from a price-check request.
#[derive(Debug, Deserialize)]
struct PriceCheckResponse {
    enqueued: bool,
}

/// One item record as returned by the pricelist endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct PricelistItem {
    pub sku: String,
    #[serde(rename = "buyHalfScrap")]
    pub buy_half_scrap: i64,
    #[serde(rename = "buyKeys")]
    pub buy_keys: i64,
    #[serde(rename = "sellHalfScrap")]
    pub sell_half_scrap: i64,
    #[serde(rename = "sellKeys")]
    pub sell_keys: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl PricelistItem {
    /// Convert the wire record into a domain price update.
    pub fn into_update(self) -> PriceUpdate {
        PriceUpdate {
            sku: Sku::new(self.sku),
            buy: Currencies::from_half_scrap(self.buy_keys, self.buy_half_scrap),
            sell: Currencies::from_half_scrap(self.sell_keys, self.sell_half_scrap),
            updated_at: self.updated_at,
        }
    }
}

/// Pagination metadata on a pricelist page.
#[derive(Debug, Clone, Deserialize)]
pub struct PageMeta {
    #[serde(rename = "currentPage")]
    pub current_page: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: u32,
}

/// One page of the pricelist.
#[derive(Debug, Deserialize)]
pub struct PricelistPage {
    pub items: Vec<PricelistItem>,
    pub meta: PageMeta,
}

/// Client for the upstream pricing REST API.
pub struct PricesApi {
    /// HTTP client.
    client: Client,
    /// API base URL.
    base_url: String,
}

impl PricesApi {
    /// Create a new API client.
    ///
    /// # Arguments
    /// * `base_url` - API base (e.g., "https://api2.prices.tf")
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Request a fresh bearer token.
    ///
    /// One POST to the token endpoint. Any failure (transport or non-success
    /// status) is an `AuthFailure`; the caller owns retry policy.
    pub async fn request_access_token(&self) -> ApiResult<String> {
        let url = format!("{}/auth/access", self.base_url);
        debug!(url = %url, "Requesting access token");

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| ApiError::AuthFailure(format!("Token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::AuthFailure(format!("HTTP {status}: {body}")));
        }

        let token: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::AuthFailure(format!("Failed to parse token response: {e}")))?;

        info!("Acquired new access token");
        Ok(token.access_token)
    }

    /// Fetch the current price of a single item.
    pub async fn get_price(&self, sku: &Sku) -> ApiResult<PricelistItem> {
        let url = format!("{}/prices/{}", self.base_url, sku);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::HttpClient(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("Failed to parse price response: {e}")))
    }

    /// Fetch one page of the pricelist.
    pub async fn get_pricelist_page(&self, page: u32, limit: u32) -> ApiResult<PricelistPage> {
        let url = format!("{}/prices", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await
            .map_err(|e| ApiError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::HttpClient(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("Failed to parse pricelist page: {e}")))
    }

    /// Ask the upstream to re-check an item's price.
    ///
    /// Returns whether the check was enqueued.
    pub async fn request_check(&self, sku: &Sku) -> ApiResult<bool> {
        let url = format!("{}/prices/{}/refresh", self.base_url, sku);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| ApiError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::HttpClient(format!("HTTP {status}: {body}")));
        }

        let check: PriceCheckResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("Failed to parse check response: {e}")))?;

        Ok(check.enqueued)
    }
}
