use std::time::Duration;

use tokio::sync::watch;

/// Tracks whether the controlling window has input focus.
///
/// The host page only dispatches some click handlers while the controlling
/// window is unfocused, so synthetic clicks that must produce a network call
/// wait here first.
#[derive(Debug)]
pub struct FocusGate {
    focused: watch::Sender<bool>,
    settle: Duration,
}

impl FocusGate {
    pub fn new(initially_focused: bool, settle: Duration) -> Self {
        let (focused, _) = watch::channel(initially_focused);
        Self { focused, settle }
    }

    /// Feed a focus-change event from the page.
    pub fn set_focused(&self, focused: bool) {
        let changed = self.focused.send_if_modified(|current| {
            let changed = *current != focused;
            *current = focused;
            changed
        });
        if changed {
            tracing::debug!(focused, "Controlling window focus changed");
        }
    }

    pub fn is_focused(&self) -> bool {
        *self.focused.borrow()
    }

    /// Resolve once the window is unfocused, plus the settle delay after a
    /// blur. Returns immediately when already unfocused.
    pub async fn wait_unfocused(&self) {
        let mut rx = self.focused.subscribe();
        if !*rx.borrow_and_update() {
            return;
        }
        tracing::info!("Waiting for the controlling window to lose focus");
        let _ = rx.wait_for(|focused| !*focused).await;
        tokio::time::sleep(self.settle).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn unfocused_window_passes_immediately() {
        let gate = FocusGate::new(false, Duration::ZERO);
        gate.wait_unfocused().await;
    }

    #[tokio::test]
    async fn waits_for_blur() {
        let gate = Arc::new(FocusGate::new(true, Duration::from_millis(1)));
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_unfocused().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        gate.set_focused(false);
        waiter.await.unwrap();
        assert!(!gate.is_focused());
    }
}
