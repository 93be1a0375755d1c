pub mod fact;
pub mod palette;
pub mod position;
pub mod session;
pub mod valkey;

pub use fact::{Charges, Painter, PixelOwnership};
pub use palette::{Palette, PaletteEntry, Swatch};
pub use position::{circular_distance, Calibration, ScreenPoint, WorldCoordinate, TILE_SIZE, WORLD_PERIOD};
pub use session::{SessionRecord, Strategy};
