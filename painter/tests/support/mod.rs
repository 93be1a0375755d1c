//! A scripted host page for driving the engine end to end.
//!
//! The page keeps a real canvas split into tiles, moves its marker to every
//! clicked pixel and issues the same pixel request the live site does, fed
//! straight into the attached correlator.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::{Arc, Mutex, OnceLock};

use common::{
    Charges, Painter, PaletteEntry, PixelOwnership, ScreenPoint, SessionRecord, Strategy,
    WorldCoordinate, TILE_SIZE,
};
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use painter::{
    ActionSurface, Controller, Correlator, FactKind, PainterConfig, PainterError, Result,
};

pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const NEAR_BLUE: Rgba<u8> = Rgba([20, 20, 230, 255]);

pub fn entry(id: &str, (r, g, b): (u8, u8, u8), available: bool) -> PaletteEntry {
    PaletteEntry {
        r,
        g,
        b,
        available,
        id: id.to_string(),
    }
}

/// Red and white are owned, blue is locked, and the sentinel closes the list.
pub fn palette() -> Vec<PaletteEntry> {
    vec![
        entry("red", (255, 0, 0), true),
        entry("blue", (0, 0, 255), false),
        entry("white", (255, 255, 255), true),
        entry("transparent", (255, 255, 255), true),
    ]
}

pub fn png(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

/// The 2x2 target most tests paint:
///
/// ```text
/// red       white
/// near-blue red
/// ```
pub fn target() -> RgbaImage {
    let mut image = RgbaImage::new(2, 2);
    image.put_pixel(0, 0, RED);
    image.put_pixel(1, 0, WHITE);
    image.put_pixel(0, 1, NEAR_BLUE);
    image.put_pixel(1, 1, RED);
    image
}

/// What the target looks like once painted with the owned colours.
pub fn painted_target() -> [((i64, i64), Rgba<u8>); 4] {
    [((0, 0), RED), ((1, 0), WHITE), ((0, 1), RED), ((1, 1), RED)]
}

pub fn test_config() -> PainterConfig {
    let mut config = PainterConfig::default();
    config.pacing.input_delay_ms = 0;
    config.pacing.focus_settle_ms = 0;
    config.dedupe_window_ms = 0;
    config.deadlines.fact_ms = 200;
    config.deadlines.tile_ms = 1_000;
    config.shuffle_seed = Some(7);
    config.status_hold_ms = 50;
    config
}

pub fn painter_named(id: u64, name: &str) -> Painter {
    Painter {
        id,
        name: name.to_string(),
        alliance_id: 0,
        alliance_name: String::new(),
        equipped_flag: 0,
    }
}

#[derive(Default)]
struct PageState {
    palette: Vec<PaletteEntry>,
    file: Option<Vec<u8>>,
    canvas: HashMap<(i64, i64), RgbaImage>,
    owners: HashMap<(i64, i64), Painter>,
    muted: HashSet<(i64, i64)>,
    marker: Option<ScreenPoint>,
    selected: Option<String>,
    selections: usize,
    clicks: Vec<WorldCoordinate>,
    painted: Vec<(String, WorldCoordinate)>,
    rate_limit_after: Option<usize>,
    reject_paints_after: Option<usize>,
    tile_fetches: Vec<(i64, i64)>,
    charges: Option<Charges>,
}

pub struct FakePage {
    /// World pixel whose top-left corner is drawn at `screen_origin`.
    pub view_origin: WorldCoordinate,
    pub screen_origin: ScreenPoint,
    pub pixel_size: f64,
    pub viewport: ScreenPoint,
    state: Mutex<PageState>,
    network: OnceLock<Arc<Correlator>>,
}

impl FakePage {
    pub fn new(palette: Vec<PaletteEntry>) -> Self {
        Self {
            view_origin: WorldCoordinate::from_global(1500, 2500),
            screen_origin: ScreenPoint { x: 20.0, y: 30.0 },
            pixel_size: 4.0,
            viewport: ScreenPoint { x: 800.0, y: 600.0 },
            state: Mutex::new(PageState {
                palette,
                ..PageState::default()
            }),
            network: OnceLock::new(),
        }
    }

    /// Route the page's pixel requests into `correlator`.
    pub fn attach(&self, correlator: Arc<Correlator>) {
        let _ = self.network.set(correlator);
    }

    fn state(&self) -> std::sync::MutexGuard<'_, PageState> {
        self.state.lock().unwrap()
    }

    pub fn set_file(&self, bytes: Option<Vec<u8>>) {
        self.state().file = bytes;
    }

    pub fn set_palette(&self, palette: Vec<PaletteEntry>) {
        self.state().palette = palette;
    }

    pub fn fill_tile(&self, tile: (i64, i64), color: Rgba<u8>) {
        let size = TILE_SIZE as u32;
        self.state()
            .canvas
            .insert(tile, RgbaImage::from_pixel(size, size, color));
    }

    pub fn set_pixel(&self, at: WorldCoordinate, color: Rgba<u8>) {
        let mut state = self.state();
        let size = TILE_SIZE as u32;
        state
            .canvas
            .entry(at.tile())
            .or_insert_with(|| RgbaImage::new(size, size))
            .put_pixel(at.local_x() as u32, at.local_y() as u32, color);
    }

    pub fn pixel(&self, at: WorldCoordinate) -> Rgba<u8> {
        self.state()
            .canvas
            .get(&at.tile())
            .map_or(Rgba([0, 0, 0, 0]), |tile| {
                *tile.get_pixel(at.local_x() as u32, at.local_y() as u32)
            })
    }

    pub fn set_owner(&self, at: WorldCoordinate, painter: Painter) {
        self.state()
            .owners
            .insert((at.global_x(), at.global_y()), painter);
    }

    /// Clicks on `at` move the marker but send no pixel request.
    pub fn mute(&self, at: WorldCoordinate) {
        self.state().muted.insert((at.global_x(), at.global_y()));
    }

    pub fn rate_limit_after(&self, paints: usize) {
        self.state().rate_limit_after = Some(paints);
    }

    /// Paint gestures past the first `paints` fail as if the page went away.
    pub fn reject_paints_after(&self, paints: usize) {
        self.state().reject_paints_after = Some(paints);
    }

    pub fn set_charges(&self, charges: Option<Charges>) {
        self.state().charges = charges;
    }

    pub fn painted(&self) -> Vec<(String, WorldCoordinate)> {
        self.state().painted.clone()
    }

    pub fn clicks(&self) -> Vec<WorldCoordinate> {
        self.state().clicks.clone()
    }

    pub fn selections(&self) -> usize {
        self.state().selections
    }

    pub fn tile_fetches(&self) -> Vec<(i64, i64)> {
        self.state().tile_fetches.clone()
    }

    /// Screen position of the top-left corner of `at`.
    pub fn top_left(&self, at: WorldCoordinate) -> ScreenPoint {
        ScreenPoint {
            x: self.screen_origin.x
                + (at.global_x() - self.view_origin.global_x()) as f64 * self.pixel_size,
            y: self.screen_origin.y
                + (at.global_y() - self.view_origin.global_y()) as f64 * self.pixel_size,
        }
    }

    pub fn world_at(&self, at: ScreenPoint) -> WorldCoordinate {
        let dx = ((at.x - self.screen_origin.x) / self.pixel_size).floor() as i64;
        let dy = ((at.y - self.screen_origin.y) / self.pixel_size).floor() as i64;
        self.view_origin.add(dx, dy)
    }

    /// The operator clicks the map by hand.
    pub fn user_clicks(&self, at: WorldCoordinate) {
        let corner = self.top_left(at);
        self.click(ScreenPoint {
            x: corner.x + self.pixel_size / 2.0,
            y: corner.y + self.pixel_size / 2.0,
        });
    }

    fn click(&self, at: ScreenPoint) {
        let world = self.world_at(at);
        let key = (world.global_x(), world.global_y());
        let (owner, muted) = {
            let mut state = self.state();
            let corner = self.top_left(world);
            // The marker pin is anchored half a pixel right of the corner.
            state.marker = Some(ScreenPoint {
                x: corner.x + self.pixel_size / 2.0,
                y: corner.y,
            });
            state.clicks.push(world);
            (
                state
                    .owners
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| painter_named(0, "")),
                state.muted.contains(&key),
            )
        };
        if muted {
            return;
        }
        let url = format!(
            "https://backend.wplace.live/s0/pixel/{}/{}?x={}&y={}",
            world.tile_x(),
            world.tile_y(),
            world.local_x(),
            world.local_y()
        );
        let body = serde_json::to_string(&PixelOwnership {
            painted_by: owner,
            region: None,
        })
        .unwrap();
        if let Some(network) = self.network.get() {
            network.observe(&url, &body);
        }
    }
}

impl ActionSurface for FakePage {
    async fn select_image_file(&self) -> Result<Vec<u8>> {
        self.state().file.clone().ok_or(PainterError::NoFileSelected)
    }

    async fn read_palette(&self) -> Result<Vec<PaletteEntry>> {
        Ok(self.state().palette.clone())
    }

    async fn trigger_color_selection(&self, id: &str) -> Result<()> {
        let mut state = self.state();
        state.selected = Some(id.to_string());
        state.selections += 1;
        Ok(())
    }

    async fn marker_screen_position(&self) -> Result<ScreenPoint> {
        self.state().marker.ok_or(PainterError::NoMarker)
    }

    async fn viewport_size(&self) -> Result<ScreenPoint> {
        Ok(self.viewport)
    }

    async fn dispatch_synthetic_click(&self, at: ScreenPoint) -> Result<()> {
        self.click(at);
        Ok(())
    }

    async fn dispatch_paint_gesture(&self, at: ScreenPoint) -> Result<()> {
        let world = self.world_at(at);
        let color = {
            let state = self.state();
            if state
                .reject_paints_after
                .is_some_and(|limit| state.painted.len() >= limit)
            {
                return Err(PainterError::Surface("page closed".into()));
            }
            let selected = state
                .selected
                .clone()
                .ok_or_else(|| PainterError::Surface("no colour selected".into()))?;
            let entry = state
                .palette
                .iter()
                .find(|e| e.id == selected)
                .cloned()
                .ok_or_else(|| PainterError::Surface(format!("unknown colour {selected}")))?;
            (selected, Rgba([entry.r, entry.g, entry.b, 255]))
        };
        self.set_pixel(world, color.1);
        self.state().painted.push((color.0, world));
        Ok(())
    }

    async fn is_rate_limit_modal_visible(&self) -> Result<bool> {
        let state = self.state();
        Ok(state
            .rate_limit_after
            .is_some_and(|limit| state.painted.len() >= limit))
    }

    async fn fetch_tile_image(&self, tile_x: i64, tile_y: i64) -> Result<Vec<u8>> {
        let tile = {
            let mut state = self.state();
            state.tile_fetches.push((tile_x, tile_y));
            state.canvas.get(&(tile_x, tile_y)).cloned()
        };
        tile.map(|image| png(&image))
            .ok_or_else(|| PainterError::Surface(format!("tile {tile_x},{tile_y}: 404")))
    }

    async fn fetch_charges(&self) -> Result<Charges> {
        self.state()
            .charges
            .ok_or_else(|| PainterError::Api("503 Service Unavailable".into()))
    }
}

/// A controller over a fresh page whose tile (1, 2) is solid blue and whose
/// file dialog returns the target. The window starts out unfocused.
pub fn controller() -> Controller<FakePage> {
    let page = FakePage::new(palette());
    page.fill_tile((1, 2), BLUE);
    page.set_file(Some(png(&target())));
    let controller = Controller::new(page, test_config());
    controller
        .surface()
        .attach(Arc::clone(controller.correlator()));
    controller.focus().set_focused(false);
    controller
}

/// Where the operator drops the marker in these tests.
pub fn marker_spot(page: &FakePage) -> WorldCoordinate {
    page.view_origin.add(10, 10)
}

/// Play the operator: wait until calibration asks for the marker, then click.
pub async fn place_marker_when_asked(controller: &Controller<FakePage>, at: WorldCoordinate) {
    while controller.correlator().pending(FactKind::WorldPosition) == 0 {
        tokio::task::yield_now().await;
    }
    controller.surface().user_clicks(at);
}

/// Select the target and calibrate with the marker on [`marker_spot`].
pub async fn prepared() -> Controller<FakePage> {
    let controller = controller();
    controller.select_image().await.unwrap();
    let at = marker_spot(controller.surface());
    let (calibrated, ()) = tokio::join!(
        controller.calibrate(),
        place_marker_when_asked(&controller, at)
    );
    calibrated.unwrap();
    controller
}

/// A record placing the target's top-left on `origin` of `page`.
pub fn record_at(page: &FakePage, origin: WorldCoordinate) -> SessionRecord {
    SessionRecord {
        image: SessionRecord::encode_image(&png(&target())),
        origin_screen: page.top_left(origin),
        origin_world: origin,
        pixel_size: page.pixel_size,
        widget_x: 10.0,
        widget_y: 20.0,
        overlay_opacity: 40,
        scale: 100,
        strategy: Strategy::Down,
    }
}
