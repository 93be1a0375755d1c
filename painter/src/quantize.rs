//! Palette quantization of target images and remote tiles.

use std::sync::Arc;

use common::{Palette, PaletteEntry};
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};

use crate::error::{PainterError, Result};

/// Pixels with alpha below this are "no paint".
pub const ALPHA_THRESHOLD: u8 = 100;

/// Largest accepted image scale, in percent.
pub const MAX_SCALE: u32 = 1_000;

/// Accept a scale in `1..=MAX_SCALE` percent.
pub fn check_scale(scale: u32) -> Result<u32> {
    if (1..=MAX_SCALE).contains(&scale) {
        Ok(scale)
    } else {
        Err(PainterError::InvalidScale(scale))
    }
}

/// A decoded source image together with the bytes it was decoded from.
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Arc<[u8]>,
    image: Arc<DynamicImage>,
}

/// An image mapped onto a palette.
///
/// Regenerated wholesale whenever the scale or the palette changes.
#[derive(Debug, Clone)]
pub struct QuantizedImage {
    source: SourceImage,
    scale: u32,
    palette: Palette,
    width: u32,
    height: u32,
    /// Row-major palette indices.
    pixels: Vec<usize>,
    colors_to_buy: Vec<(PaletteEntry, usize)>,
}

impl SourceImage {
    pub fn decode(bytes: Vec<u8>) -> Result<Self> {
        let image = image::load_from_memory(&bytes)?;
        Ok(Self {
            bytes: bytes.into(),
            image: Arc::new(image),
        })
    }

    /// An image with no backing file, e.g. a blank placeholder tile.
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self {
            bytes: Arc::from(Vec::new()),
            image: Arc::new(DynamicImage::ImageRgba8(image)),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Resample to `scale` percent. Dimensions are floored; an unchanged size
    /// is returned without resampling.
    pub fn rasterize(&self, scale: u32) -> RgbaImage {
        let width = (self.image.width() as u64 * scale as u64 / 100) as u32;
        let height = (self.image.height() as u64 * scale as u64 / 100) as u32;
        if width == 0 || height == 0 {
            return RgbaImage::new(width, height);
        }
        let rgba = self.image.to_rgba8();
        if (width, height) == rgba.dimensions() {
            return rgba;
        }
        image::imageops::resize(&rgba, width, height, FilterType::Triangle)
    }
}

/// Nearest palette entries for one opaque colour: (available, any).
///
/// Every entry competes, the sentinel included. Ties keep the earliest entry.
fn nearest(palette: &Palette, r: u8, g: u8, b: u8) -> (usize, usize) {
    let sentinel = palette.transparent_index();
    let mut best_available: Option<(usize, u32)> = None;
    let mut best_any: Option<(usize, u32)> = None;

    for (index, entry) in palette.entries().iter().enumerate() {
        let delta = entry.distance_sq(r, g, b);
        if entry.available && best_available.map_or(true, |(_, d)| delta < d) {
            best_available = Some((index, delta));
        }
        if best_any.map_or(true, |(_, d)| delta < d) {
            best_any = Some((index, delta));
        }
    }

    let available = best_available.map_or(sentinel, |(index, _)| index);
    let any = best_any.map_or(sentinel, |(index, _)| index);
    (available, any)
}

/// Quantize `source` at `scale` percent onto `palette`, choosing the nearest
/// paintable colour for every pixel.
pub fn quantize(source: &SourceImage, palette: &Palette, scale: u32) -> QuantizedImage {
    build(source, palette, scale, false)
}

/// Quantize a live canvas tile. Pixels there already carry palette colours,
/// purchased or not, so the nearest colour over the whole palette is used
/// and no purchase deficit is tracked.
pub fn quantize_canvas(source: &SourceImage, palette: &Palette) -> QuantizedImage {
    build(source, palette, 100, true)
}

fn build(source: &SourceImage, palette: &Palette, scale: u32, exact: bool) -> QuantizedImage {
    let raster = source.rasterize(scale);
    let (width, height) = raster.dimensions();
    let sentinel = palette.transparent_index();

    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    let mut deficit = vec![0usize; palette.len()];

    for pixel in raster.pixels() {
        let [r, g, b, a] = pixel.0;
        if a < ALPHA_THRESHOLD {
            pixels.push(sentinel);
            continue;
        }
        let (available, any) = nearest(palette, r, g, b);
        if exact {
            pixels.push(any);
            continue;
        }
        pixels.push(available);
        if any != available {
            deficit[any] += 1;
        }
    }

    let mut colors_to_buy: Vec<(PaletteEntry, usize)> = deficit
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .filter_map(|(index, count)| Some((palette.get(index)?.clone(), *count)))
        .collect();
    // Stable: equal counts stay in palette order.
    colors_to_buy.sort_by(|a, b| b.1.cmp(&a.1));

    QuantizedImage {
        source: source.clone(),
        scale,
        palette: palette.clone(),
        width,
        height,
        pixels,
        colors_to_buy,
    }
}

impl QuantizedImage {
    /// Decode `bytes` and quantize them.
    pub fn from_bytes(bytes: Vec<u8>, palette: &Palette, scale: u32) -> Result<Self> {
        Ok(quantize(&SourceImage::decode(bytes)?, palette, scale))
    }

    /// Re-run quantization from the same source under new inputs.
    pub fn requantize(&self, palette: &Palette, scale: u32) -> Self {
        quantize(&self.source, palette, scale)
    }

    pub fn source(&self) -> &SourceImage {
        &self.source
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Palette index at (x, y), `None` outside the grid.
    pub fn index_at(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn entry_at(&self, x: u32, y: u32) -> Option<&PaletteEntry> {
        self.palette.get(self.index_at(x, y)?)
    }

    pub fn is_transparent_at(&self, x: u32, y: u32) -> bool {
        self.index_at(x, y)
            .map_or(true, |index| index == self.palette.transparent_index())
    }

    /// Colours that would be nearer than the chosen ones if purchased, with
    /// the number of pixels affected, most affected first.
    pub fn colors_to_buy(&self) -> &[(PaletteEntry, usize)] {
        &self.colors_to_buy
    }

    /// Row-major palette indices.
    pub fn indices(&self) -> &[usize] {
        &self.pixels
    }
}
