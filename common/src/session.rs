use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::position::{ScreenPoint, WorldCoordinate};

/// Order in which image pixels are visited when computing tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    Random,
    #[default]
    Down,
    Up,
    Left,
    Right,
    SpiralFromCenter,
    SpiralToCenter,
}

/// The single persisted session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Base64 of the encoded target image, exactly as selected.
    pub image: String,
    pub origin_screen: ScreenPoint,
    pub origin_world: WorldCoordinate,
    pub pixel_size: f64,
    pub widget_x: f64,
    pub widget_y: f64,
    pub overlay_opacity: u8,
    pub scale: u32,
    pub strategy: Strategy,
}

impl SessionRecord {
    /// Parse a stored record. Anything that is not a complete, valid record
    /// (including an undecodable image payload) yields `None`.
    pub fn decode(raw: &str) -> Option<Self> {
        let record: SessionRecord = serde_json::from_str(raw).ok()?;
        if !record.pixel_size.is_finite() || record.pixel_size <= 0.0 {
            return None;
        }
        record.image_bytes()?;
        Some(record)
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn image_bytes(&self) -> Option<Vec<u8>> {
        STANDARD.decode(&self.image).ok()
    }

    pub fn encode_image(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SessionRecord {
        SessionRecord {
            image: SessionRecord::encode_image(b"\x89PNG"),
            origin_screen: ScreenPoint { x: 10.0, y: 20.0 },
            origin_world: WorldCoordinate::new(1, 2, 3, 4),
            pixel_size: 2.5,
            widget_x: 64.0,
            widget_y: 64.0,
            overlay_opacity: 50,
            scale: 100,
            strategy: Strategy::SpiralFromCenter,
        }
    }

    #[test]
    fn encode_decode_preserves_record() {
        let r = record();
        let raw = r.encode();
        assert!(raw.contains("\"originWorld\":[1,2,3,4]"));
        assert!(raw.contains("\"strategy\":\"SPIRAL_FROM_CENTER\""));
        assert_eq!(SessionRecord::decode(&raw), Some(r));
    }

    #[test]
    fn corrupt_records_are_discarded() {
        assert!(SessionRecord::decode("").is_none());
        assert!(SessionRecord::decode("{\"image\":\"abc\"}").is_none());

        let mut r = record();
        r.image = "***".into();
        assert!(SessionRecord::decode(&r.encode()).is_none());

        let mut r = record();
        r.pixel_size = 0.0;
        assert!(SessionRecord::decode(&r.encode()).is_none());
    }
}
