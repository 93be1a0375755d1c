use std::fmt;

use thiserror::Error;

use crate::controller::Phase;

/// Points at which an operation waits on something outside its control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspension {
    MarkerPlacement,
    FileSelection,
    FocusLoss,
    NetworkFact,
    TileFetch,
}

impl fmt::Display for Suspension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self {
            Suspension::MarkerPlacement => "marker placement",
            Suspension::FileSelection => "file selection",
            Suspension::FocusLoss => "window to lose focus",
            Suspension::NetworkFact => "network response",
            Suspension::TileFetch => "tile download",
        };
        f.write_str(what)
    }
}

#[derive(Debug, Error)]
pub enum PainterError {
    #[error("❌ Place marker on the map")]
    NoMarker,
    #[error("❌ No image is selected")]
    NoImage,
    #[error("❌ Can not read colors panel")]
    NoColors,
    #[error("❌ Can not connect to server")]
    Api(String),
    #[error("❌ No file selected")]
    NoFileSelected,
    #[error("❌ Busy: {0} is in progress")]
    Busy(Phase),
    #[error("❌ Timed out waiting for {0}")]
    TimedOut(Suspension),
    #[error("❌ Cancelled")]
    Cancelled,
    #[error("❌ Scale must be between 1 and {max}%, got {0}%", max = crate::quantize::MAX_SCALE)]
    InvalidScale(u32),
    #[error("calibration samples do not determine a pixel size: {0}")]
    DegenerateCalibration(String),
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("action surface failed: {0}")]
    Surface(String),
}

impl PainterError {
    /// Errors that carry their own status line; everything else is logged
    /// and reported generically.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            PainterError::DegenerateCalibration(_)
                | PainterError::Image(_)
                | PainterError::Surface(_)
        )
    }
}

pub type Result<T, E = PainterError> = std::result::Result<T, E>;
