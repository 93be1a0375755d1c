//! Target vs. live canvas comparison.

use std::collections::HashMap;

use common::{Calibration, Palette, ScreenPoint, Strategy, TILE_SIZE};
use image::{Rgba, RgbaImage};
use serde::Serialize;

use crate::context::Context;
use crate::error::{PainterError, Result, Suspension};
use crate::quantize::{quantize_canvas, QuantizedImage, SourceImage};
use crate::strategy::traversal;
use crate::suspend::bounded;
use crate::surface::ActionSurface;

/// One pixel that still needs a paint action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub screen: ScreenPoint,
    pub palette_id: String,
    /// Image pixel the task was computed for.
    pub pixel: (u32, u32),
}

/// Quantized remote tiles, each downloaded at most once per pass.
pub struct TileCache<'a, S> {
    ctx: Context<'a, S>,
    palette: &'a Palette,
    tiles: HashMap<(i64, i64), QuantizedImage>,
}

/// A fully transparent tile, used when the real one cannot be had.
pub fn blank_tile() -> SourceImage {
    SourceImage::from_rgba(RgbaImage::from_pixel(
        TILE_SIZE as u32,
        TILE_SIZE as u32,
        Rgba([0, 0, 0, 0]),
    ))
}

impl<'a, S: ActionSurface> TileCache<'a, S> {
    pub fn new(ctx: Context<'a, S>, palette: &'a Palette) -> Self {
        Self {
            ctx,
            palette,
            tiles: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub async fn get(&mut self, tile: (i64, i64)) -> Result<&QuantizedImage> {
        if !self.tiles.contains_key(&tile) {
            let source = self.download(tile).await?;
            self.tiles.insert(tile, quantize_canvas(&source, self.palette));
        }
        self.tiles
            .get(&tile)
            .ok_or_else(|| PainterError::Surface("tile cache lost an entry".into()))
    }

    /// Fetch and decode; any failure short of cancellation degrades to a
    /// blank tile.
    async fn download(&self, (tile_x, tile_y): (i64, i64)) -> Result<SourceImage> {
        let fetched = bounded(
            Suspension::TileFetch,
            self.ctx.config.deadlines.tile(),
            self.ctx.cancel,
            self.ctx.surface.fetch_tile_image(tile_x, tile_y),
        )
        .await;
        let bytes = match fetched {
            Err(PainterError::Cancelled) => return Err(PainterError::Cancelled),
            Err(e) | Ok(Err(e)) => {
                tracing::warn!("Tile ({},{}) unavailable, assuming blank: {}", tile_x, tile_y, e);
                return Ok(blank_tile());
            }
            Ok(Ok(bytes)) => bytes,
        };
        match SourceImage::decode(bytes) {
            Ok(source) => Ok(source),
            Err(e) => {
                tracing::warn!("Tile ({},{}) undecodable, assuming blank: {}", tile_x, tile_y, e);
                Ok(blank_tile())
            }
        }
    }
}

/// Every target pixel whose palette entry differs from the live canvas, in
/// `strategy` order. Transparent target pixels are never painted.
pub async fn compute_tasks<S: ActionSurface>(
    ctx: Context<'_, S>,
    target: Option<&QuantizedImage>,
    calibration: Option<&Calibration>,
    strategy: Strategy,
    seed: u64,
) -> Result<Vec<Task>> {
    let calibration = calibration.ok_or(PainterError::NoMarker)?;
    let target = target.ok_or(PainterError::NoImage)?;
    let palette = target.palette();
    let mut tiles = TileCache::new(ctx, palette);
    let mut tasks = Vec::new();

    for (x, y) in traversal(strategy, target.width(), target.height(), seed) {
        ctx.cancel.check()?;
        if target.is_transparent_at(x, y) {
            continue;
        }
        let Some(wanted) = target.entry_at(x, y) else {
            continue;
        };

        let world = calibration.origin_world.add(x as i64, y as i64);
        let remote = tiles.get(world.tile()).await?;
        let current = remote.index_at(world.local_x() as u32, world.local_y() as u32);
        if current.and_then(|index| palette.get(index)).map(|e| &e.id) == Some(&wanted.id) {
            continue;
        }

        tasks.push(Task {
            screen: calibration.to_screen(&world),
            palette_id: wanted.id.clone(),
            pixel: (x, y),
        });
    }

    tracing::info!(
        tasks = tasks.len(),
        tiles = tiles.len(),
        "Diff pass over {}x{} image",
        target.width(),
        target.height()
    );
    Ok(tasks)
}
