use std::future::Future;

use common::{Charges, PaletteEntry, ScreenPoint};

use crate::error::Result;

/// Every interaction with the host page the engine needs.
///
/// Implementations talk to the live page; the engine never touches it any
/// other way. Intercepted outgoing calls flow the other direction, into
/// [`crate::correlator::Correlator::observe`].
pub trait ActionSurface: Send + Sync {
    /// Ask the operator for an image file and return its encoded bytes.
    /// Fails with `NoFileSelected` when the dialog is dismissed.
    fn select_image_file(&self) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Read the colour panel. The last entry is the transparent sentinel.
    fn read_palette(&self) -> impl Future<Output = Result<Vec<PaletteEntry>>> + Send;

    fn trigger_color_selection(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Fails with `NoMarker` when no marker is on the map.
    fn marker_screen_position(&self) -> impl Future<Output = Result<ScreenPoint>> + Send;

    /// Size of the page viewport in screen pixels.
    fn viewport_size(&self) -> impl Future<Output = Result<ScreenPoint>> + Send;

    fn dispatch_synthetic_click(&self, at: ScreenPoint) -> impl Future<Output = Result<()>> + Send;

    fn dispatch_paint_gesture(&self, at: ScreenPoint) -> impl Future<Output = Result<()>> + Send;

    fn is_rate_limit_modal_visible(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Encoded image of a remote tile.
    fn fetch_tile_image(&self, tile_x: i64, tile_y: i64)
        -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Charges of the logged-in account. Fails with `Api` when the service
    /// cannot be queried.
    fn fetch_charges(&self) -> impl Future<Output = Result<Charges>> + Send;
}
