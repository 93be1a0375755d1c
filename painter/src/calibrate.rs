//! Derives the world -> screen mapping from two observed clicks.
//!
//! The host page never reports the world coordinate under a screen point.
//! It does, however, request `/pixel/{tile}?x&y` whenever the map is
//! clicked, and it moves its marker to the clicked pixel. Sampling the
//! marker's screen position together with the intercepted world position
//! twice, far apart, gives both the pixel size and the origin.

use common::{circular_distance, Calibration, ScreenPoint, WorldCoordinate, WORLD_PERIOD};

use crate::context::Context;
use crate::error::{PainterError, Result, Suspension};
use crate::surface::ActionSurface;

/// One observed (world, screen) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub world: WorldCoordinate,
    pub screen: ScreenPoint,
}

/// Pure arithmetic of the calibration: pixel size from the horizontal span
/// between the samples, origin at the first sample shifted by half a pixel to
/// undo the marker's anchor offset.
pub fn derive(a: Sample, b: Sample) -> Result<Calibration> {
    let span = circular_distance(b.world.global_x(), a.world.global_x(), WORLD_PERIOD);
    if span == 0 {
        return Err(PainterError::DegenerateCalibration(format!(
            "both samples at world x {}",
            a.world.global_x()
        )));
    }
    let pixel_size = (b.screen.x - a.screen.x) / span as f64;
    if !pixel_size.is_finite() || pixel_size <= 0.0 {
        return Err(PainterError::DegenerateCalibration(format!(
            "pixel size {pixel_size}"
        )));
    }

    let mut origin_screen = a.screen;
    origin_screen.x -= pixel_size / 2.0;

    Ok(Calibration {
        origin_world: a.world,
        origin_screen,
        pixel_size,
    })
}

/// Run the two-sample protocol against the live page.
pub async fn calibrate<S: ActionSurface>(ctx: Context<'_, S>) -> Result<Calibration> {
    // 1. The operator places the marker; its click yields the first fact.
    let pending = ctx.correlator.next_world_position();
    tracing::info!("Waiting for the marker to be placed");
    let world_a = ctx
        .fact(pending, Suspension::MarkerPlacement, ctx.config.deadlines.marker())
        .await?;
    // 2.
    let screen_a = ctx.surface.marker_screen_position().await?;
    tracing::info!(?world_a, ?screen_a, "First calibration sample");

    // 3. Click the far corner so the span between samples is as wide as possible.
    let viewport = ctx.surface.viewport_size().await?;
    let corner = ScreenPoint {
        x: (viewport.x - 1.0).max(0.0),
        y: (viewport.y - 1.0).max(0.0),
    };
    ctx.unfocused().await?;
    let pending = ctx.correlator.next_world_position();
    ctx.surface.dispatch_synthetic_click(corner).await?;
    let world_b = ctx
        .fact(pending, Suspension::NetworkFact, ctx.config.deadlines.fact())
        .await?;
    ctx.pause().await;
    // 4.
    let screen_b = ctx.surface.marker_screen_position().await?;
    tracing::info!(?world_b, ?screen_b, "Second calibration sample");

    // 5-6.
    let calibration = derive(
        Sample {
            world: world_a,
            screen: screen_a,
        },
        Sample {
            world: world_b,
            screen: screen_b,
        },
    )?;
    tracing::info!(
        pixel_size = calibration.pixel_size,
        "Calibrated at {:?}",
        calibration.origin_world
    );
    Ok(calibration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(global_x: i64, screen_x: f64) -> Sample {
        Sample {
            world: WorldCoordinate::from_global(global_x, 500),
            screen: ScreenPoint { x: screen_x, y: 80.0 },
        }
    }

    #[test]
    fn pixel_size_from_two_samples() {
        let c = derive(sample(100, 50.0), sample(150, 150.0)).unwrap();
        assert_eq!(c.pixel_size, 2.0);
        assert_eq!(c.origin_screen, ScreenPoint { x: 49.0, y: 80.0 });
        assert_eq!(c.origin_world.global_x(), 100);
    }

    #[test]
    fn span_wraps_at_world_boundary() {
        // Second sample wrapped past the boundary: 3990 -> 10 is 20 pixels.
        let c = derive(sample(3990, 0.0), sample(4010, 80.0)).unwrap();
        assert_eq!(c.pixel_size, 4.0);
        let c = derive(sample(3990, 0.0), sample(10, 80.0)).unwrap();
        assert_eq!(c.pixel_size, 4.0);
    }

    #[test]
    fn degenerate_samples_are_rejected() {
        assert!(matches!(
            derive(sample(100, 50.0), sample(100, 90.0)),
            Err(PainterError::DegenerateCalibration(_))
        ));
        assert!(matches!(
            derive(sample(100, 50.0), sample(150, 50.0)),
            Err(PainterError::DegenerateCalibration(_))
        ));
    }
}
