//! Rendering price changes into webhook payloads.
//!
//! Each update becomes one embed: author links to the item's upstream page,
//! the two fields show `old → new (±delta)` for buy and sell valued in
//! refined metal, the colour follows the item quality, and images come from
//! the catalogue (with a placeholder fallback) plus the particle-effect CDN
//! for unusuals. The key-currency item gets its own webhook with a role
//! mention and inline fields.

use crate::webhook::{Author, Embed, EmbedField, Footer, Image, Thumbnail, Webhook};
use relay_core::{Catalogue, Currencies, PriceChange};
use rust_decimal::Decimal;

/// Placeholder shown when the catalogue has no image for an item.
const FALLBACK_IMAGE_URL: &str =
    "https://jberlife.com/wp-content/uploads/2019/07/sorry-image-not-available.jpg";

/// Avatar used for the embed author line.
const AUTHOR_ICON_URL: &str = "https://steamcdn-a.akamaihd.net/steamcommunity/public/images/avatars/3d/3dba19679c4a689b9d24fa300856cbf3d948d631_full.jpg";

/// Particle-effect image base for unusual items.
const PARTICLE_IMAGE_BASE: &str = "https://marketplace.tf/images/particles";

/// Presentation options for rendered payloads.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Webhook display name.
    pub username: Option<String>,
    /// Webhook avatar URL.
    pub avatar_url: Option<String>,
    /// Free-form note shown as the embed description.
    pub note: Option<String>,
    /// Bot version shown in the footer.
    pub version: String,
    /// Role to mention on key-currency updates.
    pub keyprice_role_id: Option<String>,
}

/// Embed colour for an item quality.
pub fn quality_color(quality: Option<u8>) -> u32 {
    match quality {
        Some(0) => 0xB2B2B2,  // Normal
        Some(1) => 0x4D7455,  // Genuine
        Some(3) => 0x476291,  // Vintage
        Some(5) => 0x8650AC,  // Unusual
        Some(6) => 0xFFD700,  // Unique
        Some(7) => 0x70B04A,  // Community
        Some(8) => 0xA50F79,  // Valve
        Some(9) => 0x70B04A,  // Self-Made
        Some(11) => 0xCF6A32, // Strange
        Some(13) => 0x38F3AB, // Haunted
        Some(14) => 0xAA0000, // Collector's
        Some(15) => 0xFEFEFE, // Decorated Weapon
        _ => 0xFFD700,
    }
}

/// `old → new (±delta)` with the delta valued in refined metal.
fn format_shift(old: &Currencies, new: &Currencies, key_price: Decimal) -> String {
    let delta = (new.to_value(key_price) - old.to_value(key_price)).round_dp(2);
    let delta_text = if delta.is_zero() {
        "0 ref".to_string()
    } else if delta.is_sign_positive() {
        format!("+{delta} ref")
    } else {
        format!("{delta} ref")
    };
    format!("{old} → {new} ({delta_text})")
}

fn footer_text(change: &PriceChange, version: &str) -> String {
    let time = change.time.format("%a %b %d %Y %H:%M:%S UTC");
    format!("{} • {} • v{}", change.sku, time, version)
}

fn item_author(change: &PriceChange) -> Author {
    Author {
        name: change.name.clone(),
        url: Some(format!("https://prices.tf/items/{}", change.sku)),
        icon_url: Some(AUTHOR_ICON_URL.to_string()),
    }
}

/// Render a regular price update for the delivery queue.
pub fn render_price_update(
    options: &RenderOptions,
    catalogue: &Catalogue,
    change: &PriceChange,
    key_price: Decimal,
) -> Webhook {
    let thumbnail_url = catalogue
        .image_for(&change.sku)
        .unwrap_or(FALLBACK_IMAGE_URL)
        .to_string();

    let image = change
        .sku
        .effect_id()
        .map(|effect| Image {
            url: format!("{PARTICLE_IMAGE_BASE}/{effect}_94x94.png"),
        });

    Webhook {
        username: options.username.clone(),
        avatar_url: options.avatar_url.clone(),
        content: None,
        embeds: Some(vec![Embed {
            color: Some(quality_color(change.sku.quality())),
            author: Some(item_author(change)),
            footer: Some(Footer {
                text: footer_text(change, &options.version),
                icon_url: None,
            }),
            thumbnail: Some(Thumbnail { url: thumbnail_url }),
            image,
            description: options.note.clone(),
            fields: Some(vec![
                EmbedField {
                    name: "Buying for".to_string(),
                    value: format_shift(&change.old_buy, &change.buy, key_price),
                    inline: None,
                },
                EmbedField {
                    name: "Selling for".to_string(),
                    value: format_shift(&change.old_sell, &change.sell, key_price),
                    inline: None,
                },
            ]),
            ..Embed::default()
        }]),
    }
}

/// Render a key-currency update for the dedicated key webhook.
pub fn render_key_update(
    options: &RenderOptions,
    catalogue: &Catalogue,
    change: &PriceChange,
) -> Webhook {
    let content = options
        .keyprice_role_id
        .as_ref()
        .map(|role| format!("<@&{role}>"));

    let thumbnail_url = catalogue
        .image_for(&change.sku)
        .unwrap_or(FALLBACK_IMAGE_URL)
        .to_string();

    Webhook {
        username: options.username.clone(),
        avatar_url: options.avatar_url.clone(),
        content,
        embeds: Some(vec![Embed {
            color: Some(quality_color(change.sku.quality())),
            author: Some(item_author(change)),
            footer: Some(Footer {
                text: footer_text(change, &options.version),
                icon_url: None,
            }),
            thumbnail: Some(Thumbnail { url: thumbnail_url }),
            description: options.note.clone(),
            fields: Some(vec![
                EmbedField {
                    name: "Buying for".to_string(),
                    value: change.buy.to_string(),
                    inline: Some(true),
                },
                EmbedField {
                    name: "Selling for".to_string(),
                    value: change.sell.to_string(),
                    inline: Some(true),
                },
            ]),
            ..Embed::default()
        }]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use relay_core::{CatalogueItem, Sku};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn catalogue() -> Catalogue {
        let mut items = HashMap::new();
        items.insert(
            "5021;6".to_string(),
            CatalogueItem {
                name: "Mann Co. Supply Crate Key".to_string(),
                image_url: Some("https://example.com/key.png".to_string()),
            },
        );
        Catalogue::from_items(items)
    }

    fn change(sku: &str) -> PriceChange {
        PriceChange {
            sku: Sku::new(sku),
            name: "Test Item".to_string(),
            old_buy: Currencies::new(0, dec!(1.22)),
            old_sell: Currencies::new(0, dec!(1.44)),
            buy: Currencies::new(0, dec!(1.33)),
            sell: Currencies::new(0, dec!(1.44)),
            time: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    fn options() -> RenderOptions {
        RenderOptions {
            username: Some("price-relay".to_string()),
            avatar_url: None,
            note: Some("automated update".to_string()),
            version: "0.1.0".to_string(),
            keyprice_role_id: Some("1234".to_string()),
        }
    }

    #[test]
    fn test_format_shift_positive_zero_negative() {
        let key_price = dec!(60);
        let low = Currencies::new(0, dec!(1.22));
        let high = Currencies::new(0, dec!(1.33));

        assert_eq!(format_shift(&low, &high, key_price), "1.22 ref → 1.33 ref (+0.11 ref)");
        assert_eq!(format_shift(&low, &low, key_price), "1.22 ref → 1.22 ref (0 ref)");
        assert_eq!(format_shift(&high, &low, key_price), "1.33 ref → 1.22 ref (-0.11 ref)");
    }

    #[test]
    fn test_format_shift_values_keys() {
        // One key difference valued at the key price
        let old = Currencies::new(1, dec!(0));
        let new = Currencies::new(2, dec!(0));
        assert_eq!(format_shift(&old, &new, dec!(60)), "1 key → 2 keys (+60 ref)");
    }

    #[test]
    fn test_render_price_update_fields_and_colour() {
        let payload = render_price_update(&options(), &catalogue(), &change("200;6"), dec!(60));
        let embeds = payload.embeds.unwrap();
        let embed = &embeds[0];

        assert_eq!(embed.color, Some(0xFFD700));
        let fields = embed.fields.as_ref().unwrap();
        assert_eq!(fields[0].name, "Buying for");
        assert!(fields[0].value.contains("+0.11 ref"));
        assert_eq!(fields[1].name, "Selling for");
        assert!(fields[1].value.contains("(0 ref)"));

        // Unknown item falls back to the placeholder image
        assert_eq!(embed.thumbnail.as_ref().unwrap().url, FALLBACK_IMAGE_URL);
        assert!(embed.image.is_none());

        let footer = embed.footer.as_ref().unwrap();
        assert!(footer.text.starts_with("200;6 • "));
        assert!(footer.text.ends_with("v0.1.0"));
    }

    #[test]
    fn test_render_unusual_carries_effect_image() {
        let payload =
            render_price_update(&options(), &catalogue(), &change("30911;5;u703"), dec!(60));
        let embeds = payload.embeds.unwrap();
        let embed = &embeds[0];

        assert_eq!(embed.color, Some(0x8650AC));
        assert_eq!(
            embed.image.as_ref().unwrap().url,
            "https://marketplace.tf/images/particles/703_94x94.png"
        );
    }

    #[test]
    fn test_render_key_update_mentions_role() {
        let payload = render_key_update(&options(), &catalogue(), &change("5021;6"));
        assert_eq!(payload.content.as_deref(), Some("<@&1234>"));

        let embeds = payload.embeds.unwrap();
        let embed = &embeds[0];
        assert_eq!(
            embed.thumbnail.as_ref().unwrap().url,
            "https://example.com/key.png"
        );
        let fields = embed.fields.as_ref().unwrap();
        assert_eq!(fields[0].inline, Some(true));
        assert_eq!(fields[0].value, "1.33 ref");
    }

    #[test]
    fn test_quality_colors() {
        assert_eq!(quality_color(Some(6)), 16766720);
        assert_eq!(quality_color(Some(5)), 8802476);
        assert_eq!(quality_color(Some(11)), 13593138);
        // Unknown qualities fall back to the Unique colour
        assert_eq!(quality_color(None), 16766720);
    }
}
