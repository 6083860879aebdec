//! Main application orchestration.
//!
//! Startup order: catalogue, initial credential, pricelist snapshot into the
//! price book, then the stream connection. Price updates flow from the
//! dispatcher into the book, get rendered, and land in the delivery queue;
//! key-currency updates go straight to their dedicated webhook.

use crate::config::AppConfig;
use crate::error::AppResult;
use parking_lot::Mutex;
use relay_api::{fetch_pricelist, PricesApi, TokenProvider};
use relay_core::{Catalogue, PriceBook, PriceEntry, KEY_SKU};
use relay_notify::{
    render_key_update, render_price_update, DeliverySink, DeliveryQueue, WebhookClient,
};
use relay_ws::{ConnectionManager, EventDispatcher, TokenSource};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Main application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    /// Create a new application from validated configuration.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run the pipeline until a shutdown signal arrives.
    pub async fn run(&self) -> AppResult<()> {
        let catalogue = Arc::new(Catalogue::load(&self.config.catalogue_path)?);
        info!(items = catalogue.len(), "Catalogue loaded");

        let api = Arc::new(PricesApi::new(&self.config.api_url)?);
        let tokens = Arc::new(TokenProvider::new(Arc::clone(&api)));
        tokens.acquire().await?;

        let book = Arc::new(Mutex::new(PriceBook::new()));
        if self.config.snapshot.enabled {
            let items = fetch_pricelist(&api, &self.config.snapshot_config()).await?;
            let entries: Vec<PriceEntry> = items
                .into_iter()
                .map(|item| {
                    let update = item.into_update();
                    let name = catalogue
                        .name_for(&update.sku)
                        .unwrap_or(update.sku.as_str())
                        .to_string();
                    PriceEntry {
                        sku: update.sku.clone(),
                        name,
                        buy: update.buy,
                        sell: update.sell,
                        time: update.updated_at,
                    }
                })
                .collect();

            let mut book = book.lock();
            book.seed(entries);
            info!(items = book.len(), "Price book seeded from snapshot");
        } else {
            info!("Snapshot disabled, price book starts empty");
        }

        let sink: Arc<dyn DeliverySink> = Arc::new(WebhookClient::new()?);
        let queue = DeliveryQueue::new(
            self.config.webhook_urls.clone(),
            Arc::clone(&sink),
            self.config.queue_config(),
        );

        let dispatcher = Arc::new(EventDispatcher::new());
        {
            let book = Arc::clone(&book);
            let catalogue = Arc::clone(&catalogue);
            let queue = Arc::clone(&queue);
            let sink = Arc::clone(&sink);
            let render_options = self.config.render_options();
            let key_webhook_url = self.config.keyprice_webhook_url.clone();

            dispatcher.subscribe(move |update| {
                let name = catalogue
                    .name_for(&update.sku)
                    .unwrap_or(update.sku.as_str())
                    .to_string();

                let (change, key_price) = {
                    let mut book = book.lock();
                    let change = book.apply(update, &name);
                    (change, book.key_price().unwrap_or(Decimal::ZERO))
                };

                if update.sku.as_str() == KEY_SKU {
                    // Key updates bypass the queue and go to their own hook.
                    let Some(url) = key_webhook_url.clone() else {
                        return;
                    };
                    let payload = render_key_update(&render_options, &catalogue, &change);
                    let sink = Arc::clone(&sink);
                    tokio::spawn(async move {
                        match sink.deliver(&url, &payload).await {
                            Ok(()) => info!("Sent key price update"),
                            Err(e) => warn!(error = %e, "Failed to send key price update"),
                        }
                    });
                } else {
                    let payload =
                        render_price_update(&render_options, &catalogue, &change, key_price);
                    queue.enqueue(update.sku.clone(), payload);
                }
            });
        }

        let connection = Arc::new(ConnectionManager::new(
            self.config.connection_config(),
            Arc::clone(&tokens) as Arc<dyn TokenSource>,
            Arc::clone(&dispatcher),
        ));

        let connection_task = {
            let connection = Arc::clone(&connection);
            tokio::spawn(async move {
                if let Err(e) = connection.run().await {
                    error!(error = %e, "Connection loop terminated");
                }
            })
        };

        tokio::signal::ctrl_c().await?;
        info!("Received shutdown signal");

        connection.shutdown();
        let _ = connection_task.await;
        info!("Shutdown complete");
        Ok(())
    }
}
