//! Application configuration.

use crate::error::{AppError, AppResult};
use relay_api::SnapshotConfig;
use relay_notify::{QueueConfig, RenderOptions};
use relay_ws::{BackoffConfig, ConnectionConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream REST API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Stream endpoint URL.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Path to the item catalogue JSON file.
    #[serde(default = "default_catalogue_path")]
    pub catalogue_path: String,
    /// Destination webhook URLs for price updates.
    #[serde(default)]
    pub webhook_urls: Vec<String>,
    /// Dedicated webhook for key-currency updates.
    #[serde(default)]
    pub keyprice_webhook_url: Option<String>,
    /// Webhook presentation settings.
    #[serde(default)]
    pub display: DisplayConfig,
    /// Stream connection settings.
    #[serde(default)]
    pub websocket: WsSettings,
    /// Delivery queue settings.
    #[serde(default)]
    pub queue: QueueSettings,
    /// Startup snapshot settings.
    #[serde(default)]
    pub snapshot: SnapshotSettings,
}

fn default_api_url() -> String {
    "https://api2.prices.tf".to_string()
}

fn default_ws_url() -> String {
    "wss://ws.prices.tf".to_string()
}

fn default_catalogue_path() -> String {
    "config/catalogue.json".to_string()
}

/// Webhook presentation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Webhook display name.
    #[serde(default)]
    pub username: Option<String>,
    /// Webhook avatar URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Note shown as the embed description.
    #[serde(default)]
    pub note: Option<String>,
    /// Role to mention on key-currency updates.
    #[serde(default)]
    pub keyprice_role_id: Option<String>,
}

/// Stream connection settings subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsSettings {
    /// Delay after the first failed token acquisition (ms).
    #[serde(default = "default_backoff_floor_ms")]
    pub backoff_floor_ms: u64,
    /// Maximum reauthentication retry delay (ms).
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Delay before reconnecting after a non-auth transport failure (ms).
    #[serde(default = "default_transport_retry_delay_ms")]
    pub transport_retry_delay_ms: u64,
}

fn default_backoff_floor_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_transport_retry_delay_ms() -> u64 {
    1_000
}

impl Default for WsSettings {
    fn default() -> Self {
        Self {
            backoff_floor_ms: default_backoff_floor_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            transport_retry_delay_ms: default_transport_retry_delay_ms(),
        }
    }
}

/// Delivery queue settings subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Pending-key count above which deliveries are paused.
    #[serde(default = "default_pause_threshold")]
    pub pause_threshold: usize,
    /// Throttle pause before a delivery while above the threshold (ms).
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

fn default_pause_threshold() -> usize {
    5
}

fn default_pause_ms() -> u64 {
    500
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            pause_threshold: default_pause_threshold(),
            pause_ms: default_pause_ms(),
        }
    }
}

/// Startup snapshot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSettings {
    /// Whether to seed the price book from a full pricelist snapshot.
    #[serde(default = "default_snapshot_enabled")]
    pub enabled: bool,
    /// Items per page.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Minimum delay between page requests (ms).
    #[serde(default = "default_min_page_delay_ms")]
    pub min_page_delay_ms: u64,
}

fn default_snapshot_enabled() -> bool {
    true
}

fn default_page_limit() -> u32 {
    100
}

fn default_min_page_delay_ms() -> u64 {
    200
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            enabled: default_snapshot_enabled(),
            page_limit: default_page_limit(),
            min_page_delay_ms: default_min_page_delay_ms(),
        }
    }
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load from `RELAY_CONFIG` or the default path, falling back to
    /// defaults when the file is absent.
    pub fn load() -> AppResult<Self> {
        let config_path =
            std::env::var("RELAY_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate the parts the pipeline cannot run without.
    pub fn validate(&self) -> AppResult<()> {
        if self.webhook_urls.is_empty() {
            return Err(AppError::Config(
                "webhook_urls must list at least one destination".to_string(),
            ));
        }
        if self.ws_url.is_empty() {
            return Err(AppError::Config("ws_url must not be empty".to_string()));
        }
        if self.api_url.is_empty() {
            return Err(AppError::Config("api_url must not be empty".to_string()));
        }
        Ok(())
    }

    /// Stream connection configuration.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: self.ws_url.clone(),
            backoff: BackoffConfig {
                floor: Duration::from_millis(self.websocket.backoff_floor_ms),
                max: Duration::from_millis(self.websocket.backoff_max_ms),
            },
            transport_retry_delay: Duration::from_millis(self.websocket.transport_retry_delay_ms),
        }
    }

    /// Delivery queue configuration.
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            pause_threshold: self.queue.pause_threshold,
            pause: Duration::from_millis(self.queue.pause_ms),
        }
    }

    /// Snapshot fetch configuration.
    pub fn snapshot_config(&self) -> SnapshotConfig {
        SnapshotConfig {
            page_limit: self.snapshot.page_limit,
            min_page_delay: Duration::from_millis(self.snapshot.min_page_delay_ms),
        }
    }

    /// Rendering options for webhook payloads.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            username: self.display.username.clone(),
            avatar_url: self.display.avatar_url.clone(),
            note: self.display.note.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            keyprice_role_id: self.display.keyprice_role_id.clone(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: default_ws_url(),
            catalogue_path: default_catalogue_path(),
            webhook_urls: Vec::new(),
            keyprice_webhook_url: None,
            display: DisplayConfig::default(),
            websocket: WsSettings::default(),
            queue: QueueSettings::default(),
            snapshot: SnapshotSettings::default(),
        }
    }
}
