//! Sequential snapshot of the full pricelist.
//!
//! Pages are fetched one at a time with a fixed minimum delay between
//! requests; time already spent on the request counts against the delay.
//! No retries and no concurrency — a failed page aborts the snapshot.

use crate::client::{PricesApi, PricelistItem};
use crate::error::ApiResult;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Snapshot fetch configuration.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Items per page.
    pub page_limit: u32,
    /// Minimum delay between page requests.
    pub min_page_delay: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            page_limit: 100,
            min_page_delay: Duration::from_millis(200),
        }
    }
}

/// Fetch every page of the pricelist.
pub async fn fetch_pricelist(
    api: &PricesApi,
    config: &SnapshotConfig,
) -> ApiResult<Vec<PricelistItem>> {
    let mut items = Vec::new();
    let mut page = 1;
    let mut delay = Duration::ZERO;

    loop {
        tokio::time::sleep(delay).await;
        let started = Instant::now();

        let response = api.get_pricelist_page(page, config.page_limit).await?;
        let total_pages = response.meta.total_pages;
        debug!(page, total_pages, count = response.items.len(), "Fetched pricelist page");
        items.extend(response.items);

        if page >= total_pages {
            break;
        }
        page += 1;
        delay = config.min_page_delay.saturating_sub(started.elapsed());
    }

    info!(items = items.len(), pages = page, "Pricelist snapshot complete");
    Ok(items)
}
