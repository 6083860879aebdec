//! Stream wire messages.
//!
//! Inbound frames are JSON objects tagged by a `type` field. Two tags are
//! recognized; anything else deserializes to `Unknown` and is ignored for
//! forward compatibility. The only outbound control frame is `AUTH`, sent
//! after a mid-session reauthentication.

use chrono::{DateTime, Utc};
use relay_core::{Currencies, PriceUpdate, Sku};
use serde::{Deserialize, Serialize};

/// Inbound stream frame.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum StreamMessage {
    /// An item's price changed.
    #[serde(rename = "PRICE_UPDATED")]
    PriceUpdated { data: PriceRecord },

    /// The server requires a fresh credential before sending more data.
    #[serde(rename = "AUTH_REQUIRED")]
    AuthRequired,

    /// Unrecognized tag, ignored silently.
    #[serde(other)]
    Unknown,
}

/// Embedded item record of a `PRICE_UPDATED` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceRecord {
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

impl PriceRecord {
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

/// Outbound control frame presenting a fresh credential on the live socket.
#[derive(Debug, Clone, Serialize)]
pub struct AuthFrame {
    #[serde(rename = "type")]
    frame_type: &'static str,
    data: AuthData,
}

#[derive(Debug, Clone, Serialize)]
struct AuthData {
    #[serde(rename = "accessToken")]
    access_token: String,
}

impl AuthFrame {
    /// Create an `AUTH` frame carrying the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            frame_type: "AUTH",
            data: AuthData {
                access_token: token.into(),
            },
        }
    }

    /// Serialize to the wire text form.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_price_updated() {
        let json = r#"{
            "type": "PRICE_UPDATED",
            "data": {
                "sku": "200;6",
                "buyHalfScrap": 22,
                "buyKeys": 0,
                "sellHalfScrap": 24,
                "sellKeys": 1,
                "updatedAt": "2024-03-01T12:00:00Z"
            }
        }"#;
        let message: StreamMessage = serde_json::from_str(json).unwrap();
        let StreamMessage::PriceUpdated { data } = message else {
            panic!("expected PRICE_UPDATED");
        };
        let update = data.into_update();
        assert_eq!(update.sku.as_str(), "200;6");
        assert_eq!(update.buy, Currencies::new(0, dec!(1.22)));
        assert_eq!(update.sell, Currencies::new(1, dec!(1.33)));
    }

    #[test]
    fn test_parse_auth_required() {
        let message: StreamMessage = serde_json::from_str(r#"{"type":"AUTH_REQUIRED"}"#).unwrap();
        assert!(matches!(message, StreamMessage::AuthRequired));
    }

    #[test]
    fn test_unknown_tag_is_ignored() {
        let message: StreamMessage =
            serde_json::from_str(r#"{"type":"SOMETHING_NEW","data":{"x":1}}"#).unwrap();
        assert!(matches!(message, StreamMessage::Unknown));
    }

    #[test]
    fn test_auth_frame_wire_form() {
        let frame = AuthFrame::new("fresh-token");
        assert_eq!(
            frame.to_text().unwrap(),
            r#"{"type":"AUTH","data":{"accessToken":"fresh-token"}}"#
        );
    }
}
