//! Reproduces a target image on a shared tiled canvas through the host
//! page's "paint one pixel" action.

pub mod calibrate;
pub mod census;
pub mod config;
pub mod context;
pub mod controller;
pub mod correlator;
pub mod diff;
pub mod error;
pub mod focus;
pub mod quantize;
pub mod scheduler;
pub mod strategy;
pub mod surface;
pub mod suspend;

pub use config::PainterConfig;
pub use controller::{Controller, ImageSummary, Phase, Progress};
pub use correlator::{Correlator, FactKind, OwnershipFact};
pub use diff::Task;
pub use error::{PainterError, Result, Suspension};
pub use quantize::{QuantizedImage, MAX_SCALE};
pub use scheduler::{DrawOutcome, StopReason};
pub use surface::ActionSurface;
