use std::time::Duration;

use crate::config::PainterConfig;
use crate::correlator::{Correlator, Pending};
use crate::error::{PainterError, Result, Suspension};
use crate::focus::FocusGate;
use crate::suspend::{bounded, CancelToken};

/// Everything a running operation borrows from the controller.
pub struct Context<'a, S> {
    pub surface: &'a S,
    pub correlator: &'a Correlator,
    pub focus: &'a FocusGate,
    pub config: &'a PainterConfig,
    pub cancel: &'a CancelToken,
}

impl<S> Clone for Context<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Context<'_, S> {}

impl<S> Context<'_, S> {
    /// Await a correlated fact under `deadline`.
    pub async fn fact<T>(
        &self,
        pending: Pending<T>,
        what: Suspension,
        deadline: Option<Duration>,
    ) -> Result<T> {
        bounded(what, deadline, self.cancel, pending)
            .await?
            .map_err(|_| PainterError::Surface("fact channel closed".into()))
    }

    /// Wait for the controlling window to lose focus.
    pub async fn unfocused(&self) -> Result<()> {
        bounded(
            Suspension::FocusLoss,
            self.config.deadlines.focus(),
            self.cancel,
            self.focus.wait_unfocused(),
        )
        .await
    }

    /// Let the page's own handlers run between synthetic events.
    pub async fn pause(&self) {
        tokio::time::sleep(self.config.pacing.input_delay()).await;
    }
}
