//! The draw loop.

use serde::Serialize;

use crate::context::Context;
use crate::diff::Task;
use crate::error::Result;
use crate::surface::ActionSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    /// The page showed its rate-limit modal; untried tasks are left for the
    /// next diff pass.
    RateLimited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrawOutcome {
    pub painted: usize,
    pub remaining: usize,
    pub stop: StopReason,
}

/// Paint `tasks` in order until done or rate limited.
///
/// `painted` counts the gestures the page accepted and stays accurate when the
/// pass ends early with an error, so callers can drop exactly those tasks.
pub async fn draw<S: ActionSurface>(
    ctx: Context<'_, S>,
    tasks: &[Task],
    painted: &mut usize,
) -> Result<DrawOutcome> {
    *painted = 0;
    let mut selected: Option<&str> = None;

    for task in tasks {
        ctx.cancel.check()?;

        if selected != Some(task.palette_id.as_str()) {
            ctx.surface.trigger_color_selection(&task.palette_id).await?;
            ctx.pause().await;
            selected = Some(task.palette_id.as_str());
        }
        ctx.surface.dispatch_paint_gesture(task.screen).await?;
        *painted += 1;
        ctx.pause().await;

        if ctx.surface.is_rate_limit_modal_visible().await? {
            tracing::info!(painted = *painted, "Rate limited, stopping draw");
            return Ok(DrawOutcome {
                painted: *painted,
                remaining: tasks.len() - *painted,
                stop: StopReason::RateLimited,
            });
        }
    }

    tracing::info!(painted = tasks.len(), "Draw finished");
    Ok(DrawOutcome {
        painted: tasks.len(),
        remaining: 0,
        stop: StopReason::Completed,
    })
}
