use serde::{Deserialize, Serialize};

/// Tile size in world pixels (1000x1000).
pub const TILE_SIZE: i64 = 1000;

/// Horizontal period after which the world wraps, in world pixels.
pub const WORLD_PERIOD: i64 = 4000;

/// A world-space pixel position, stored tile-relative.
///
/// The local components are always kept in `[0, TILE_SIZE)`; anything outside
/// that range is carried into the tile index, so `global_x`/`global_y` are
/// preserved by every constructor and by [`WorldCoordinate::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i64; 4]", into = "[i64; 4]")]
pub struct WorldCoordinate {
    tile_x: i64,
    tile_y: i64,
    local_x: i64,
    local_y: i64,
}

/// A point on the display surface, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// The affine world -> screen mapping established by calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calibration {
    pub origin_world: WorldCoordinate,
    pub origin_screen: ScreenPoint,
    pub pixel_size: f64,
}

/// Split one axis into (tile, local) with the carry applied.
fn normalize_axis(tile: i64, local: i64) -> (i64, i64) {
    (
        tile + local.div_euclid(TILE_SIZE),
        local.rem_euclid(TILE_SIZE),
    )
}

impl WorldCoordinate {
    pub fn new(tile_x: i64, tile_y: i64, local_x: i64, local_y: i64) -> Self {
        let (tile_x, local_x) = normalize_axis(tile_x, local_x);
        let (tile_y, local_y) = normalize_axis(tile_y, local_y);
        Self {
            tile_x,
            tile_y,
            local_x,
            local_y,
        }
    }

    /// Build from canonical linear coordinates.
    pub fn from_global(x: i64, y: i64) -> Self {
        Self::new(0, 0, x, y)
    }

    pub fn tile_x(&self) -> i64 {
        self.tile_x
    }

    pub fn tile_y(&self) -> i64 {
        self.tile_y
    }

    pub fn local_x(&self) -> i64 {
        self.local_x
    }

    pub fn local_y(&self) -> i64 {
        self.local_y
    }

    /// Tile index pair, the key remote tile images are addressed by.
    pub fn tile(&self) -> (i64, i64) {
        (self.tile_x, self.tile_y)
    }

    pub fn global_x(&self) -> i64 {
        self.tile_x * TILE_SIZE + self.local_x
    }

    pub fn global_y(&self) -> i64 {
        self.tile_y * TILE_SIZE + self.local_y
    }

    /// Offset by a delta, returning a new normalized coordinate.
    pub fn add(&self, dx: i64, dy: i64) -> Self {
        Self::new(
            self.tile_x,
            self.tile_y,
            self.local_x + dx,
            self.local_y + dy,
        )
    }

    /// Screen position of the centre of this pixel's footprint.
    pub fn to_screen(
        &self,
        origin_world: &WorldCoordinate,
        origin_screen: ScreenPoint,
        pixel_size: f64,
    ) -> ScreenPoint {
        ScreenPoint {
            x: (self.global_x() - origin_world.global_x()) as f64 * pixel_size
                + origin_screen.x
                + pixel_size / 2.0,
            y: (self.global_y() - origin_world.global_y()) as f64 * pixel_size
                + origin_screen.y
                + pixel_size / 2.0,
        }
    }
}

impl From<[i64; 4]> for WorldCoordinate {
    fn from([tile_x, tile_y, local_x, local_y]: [i64; 4]) -> Self {
        Self::new(tile_x, tile_y, local_x, local_y)
    }
}

impl From<WorldCoordinate> for [i64; 4] {
    fn from(p: WorldCoordinate) -> Self {
        [p.tile_x, p.tile_y, p.local_x, p.local_y]
    }
}

impl Calibration {
    /// Screen point at which a click lands on `world`.
    pub fn to_screen(&self, world: &WorldCoordinate) -> ScreenPoint {
        world.to_screen(&self.origin_world, self.origin_screen, self.pixel_size)
    }

    /// Screen point for an image pixel, the image's top-left sitting at the origin.
    pub fn image_pixel_to_screen(&self, x: u32, y: u32) -> ScreenPoint {
        self.to_screen(&self.origin_world.add(x as i64, y as i64))
    }
}

/// Distance between two positions on an axis that wraps every `period` units.
pub fn circular_distance(a: i64, b: i64, period: i64) -> i64 {
    let d = (a - b).rem_euclid(period);
    d.min(period - d)
}
