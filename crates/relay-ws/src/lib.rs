//! Streaming connection layer for the price-relay bot.
//!
//! Provides:
//! - `ConnectionManager`: authenticated connect, reauthentication with
//!   exponential backoff on 401, clean cancellation-token shutdown
//! - `EventDispatcher`: tagged-frame decoding and ordered subscriber fan-out
//! - Wire message types, including the outbound `AUTH` control frame

pub mod backoff;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod message;

pub use backoff::{BackoffConfig, ReauthBackoff};
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, TokenSource};
pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use error::{WsError, WsResult};
pub use message::{AuthFrame, PriceRecord, StreamMessage};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
