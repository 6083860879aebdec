//! Notification delivery for the price-relay bot.
//!
//! Provides:
//! - Webhook payload types and the HTTP sender (success = 204 only)
//! - `DeliveryQueue`: keyed coalescing queue with a single-flight drain and
//!   load-based throttling
//! - Rendering of price changes into webhook embeds

pub mod error;
pub mod queue;
pub mod render;
pub mod webhook;

pub use error::{NotifyError, NotifyResult};
pub use queue::{DeliveryQueue, QueueConfig};
pub use render::{quality_color, render_key_update, render_price_update, RenderOptions};
pub use webhook::{
    Author, DeliverySink, Embed, EmbedField, Footer, Image, Thumbnail, Webhook, WebhookClient,
};
