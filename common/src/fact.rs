use serde::{Deserialize, Serialize};

use crate::position::WorldCoordinate;

/// Who last painted a pixel, as returned in the body of a pixel request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelOwnership {
    pub painted_by: Painter,
    #[serde(default)]
    pub region: Option<PixelRegion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Painter {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub alliance_id: u64,
    #[serde(default)]
    pub alliance_name: String,
    #[serde(default)]
    pub equipped_flag: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelRegion {
    pub id: u64,
    #[serde(default)]
    pub city_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub country_id: u64,
}

/// Paint charges of the logged-in account (the `/me` response's `charges`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charges {
    /// Fractional: charges regenerate continuously.
    pub count: f64,
    pub max: u32,
    pub cooldown_ms: u64,
}

/// Envelope of the `/me` response; only the charges are of interest.
#[derive(Debug, Clone, Deserialize)]
pub struct MeResponse {
    pub charges: Charges,
}

impl Charges {
    /// Milliseconds until every charge is regenerated.
    pub fn ms_until_full(&self) -> u64 {
        let missing = (self.max as f64 - self.count).max(0.0);
        (missing * self.cooldown_ms as f64).ceil() as u64
    }
}

/// Match a "paint a pixel" request URL and extract the pixel it targets.
///
/// Accepts `/s{season}/pixel/{tileX}/{tileY}?x={x}&y={y}` with any scheme,
/// host or extra query parameters.
pub fn paint_target(url: &str) -> Option<WorldCoordinate> {
    let without_fragment = url.split('#').next()?;
    let (path, query) = without_fragment
        .split_once('?')
        .unwrap_or((without_fragment, ""));

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let at = segments.iter().position(|s| *s == "pixel")?;
    let season = segments.get(at.checked_sub(1)?)?;
    if !season.starts_with('s') || season[1..].parse::<u32>().is_err() {
        return None;
    }
    if segments.len() != at + 3 {
        return None;
    }
    let tile_x: i64 = segments[at + 1].parse().ok()?;
    let tile_y: i64 = segments[at + 2].parse().ok()?;

    let mut x = None;
    let mut y = None;
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("x", v)) => x = v.parse::<i64>().ok(),
            Some(("y", v)) => y = v.parse::<i64>().ok(),
            _ => {}
        }
    }

    Some(WorldCoordinate::new(tile_x, tile_y, x?, y?))
}
