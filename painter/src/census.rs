//! Who painted the pixels the target image covers.

use std::collections::HashMap;

use common::{Calibration, Painter};
use serde::Serialize;

use crate::context::Context;
use crate::error::{PainterError, Result, Suspension};
use crate::quantize::QuantizedImage;
use crate::surface::ActionSurface;

/// Painters of the covered area, most pixels first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Census {
    pub painters: Vec<(Painter, usize)>,
    /// Pixels that were clicked but never answered with ownership data.
    pub unanswered: usize,
}

/// Click every paintable target pixel and tally the reported painters.
pub async fn census<S: ActionSurface>(
    ctx: Context<'_, S>,
    target: Option<&QuantizedImage>,
    calibration: Option<&Calibration>,
) -> Result<Census> {
    let calibration = calibration.ok_or(PainterError::NoMarker)?;
    let target = target.ok_or(PainterError::NoImage)?;

    let mut counts: HashMap<u64, (Painter, usize)> = HashMap::new();
    let mut unanswered = 0;

    for y in 0..target.height() {
        for x in 0..target.width() {
            ctx.cancel.check()?;
            if target.is_transparent_at(x, y) {
                continue;
            }
            ctx.unfocused().await?;
            let pending = ctx.correlator.next_pixel_ownership();
            ctx.surface
                .dispatch_synthetic_click(calibration.image_pixel_to_screen(x, y))
                .await?;
            match ctx
                .fact(pending, Suspension::NetworkFact, ctx.config.deadlines.fact())
                .await
            {
                Ok(fact) => {
                    let painter = fact.ownership.painted_by;
                    counts.entry(painter.id).or_insert((painter, 0)).1 += 1;
                }
                Err(PainterError::TimedOut(_)) => {
                    tracing::warn!(x, y, "No ownership data for pixel");
                    unanswered += 1;
                }
                Err(e) => return Err(e),
            }
            ctx.pause().await;
        }
    }

    let mut painters: Vec<(Painter, usize)> = counts.into_values().collect();
    painters.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.id.cmp(&b.0.id)));
    tracing::info!(painters = painters.len(), unanswered, "Census finished");
    Ok(Census {
        painters,
        unanswered,
    })
}
