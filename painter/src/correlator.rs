//! Matches the host page's own outgoing calls to the queries waiting on them.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use common::fact::paint_target;
use common::{PixelOwnership, WorldCoordinate};
use lru::LruCache;
use tokio::sync::oneshot;

/// Fact categories a query can wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactKind {
    WorldPosition,
    PixelOwnership,
}

/// Ownership of the pixel a paint request targeted.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnershipFact {
    pub at: WorldCoordinate,
    pub ownership: PixelOwnership,
}

/// A FIFO of waiters for one fact category. A delivery reaches every
/// waiter queued at that moment and empties the queue.
#[derive(Debug)]
struct Subscribers<T> {
    waiting: Mutex<Vec<oneshot::Sender<T>>>,
}

impl<T: Clone> Subscribers<T> {
    fn new() -> Self {
        Self {
            waiting: Mutex::new(Vec::new()),
        }
    }

    fn subscribe(&self) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        self.lock().push(tx);
        rx
    }

    fn deliver(&self, fact: T) -> usize {
        let waiting = std::mem::take(&mut *self.lock());
        waiting
            .into_iter()
            .map(|tx| tx.send(fact.clone()).is_ok())
            .filter(|delivered| *delivered)
            .count()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<oneshot::Sender<T>>> {
        // Senders are plain data; a poisoned queue is still consistent.
        self.waiting.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Typed publish/subscribe over intercepted network calls.
#[derive(Debug)]
pub struct Correlator {
    world: Subscribers<WorldCoordinate>,
    ownership: Subscribers<OwnershipFact>,
    recent: Mutex<LruCache<String, Seen>>,
    dedupe_window: Duration,
}

/// What a paint URL yielded the last time it was parsed.
#[derive(Debug)]
struct Seen {
    at: Instant,
    ownership: Option<PixelOwnership>,
}

/// A pending query; resolves with the next matching fact.
pub type Pending<T> = oneshot::Receiver<T>;

impl Correlator {
    pub fn new(dedupe_window: Duration, dedupe_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(dedupe_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            world: Subscribers::new(),
            ownership: Subscribers::new(),
            recent: Mutex::new(LruCache::new(capacity)),
            dedupe_window,
        }
    }

    /// Wait for the world position of the next paint request. Subscribe
    /// before triggering the click that produces it.
    pub fn next_world_position(&self) -> Pending<WorldCoordinate> {
        self.world.subscribe()
    }

    /// Wait for the ownership metadata of the next paint request.
    pub fn next_pixel_ownership(&self) -> Pending<OwnershipFact> {
        self.ownership.subscribe()
    }

    pub fn pending(&self, kind: FactKind) -> usize {
        match kind {
            FactKind::WorldPosition => self.world.len(),
            FactKind::PixelOwnership => self.ownership.len(),
        }
    }

    /// Feed one completed outgoing call. Returns true when it matched the
    /// paint pattern; its facts then reach every waiter queued so far.
    ///
    /// A URL repeated inside the de-duplication window is not parsed again:
    /// the facts from its first sighting are replayed instead.
    pub fn observe(&self, url: &str, body: &str) -> bool {
        let Some(at) = paint_target(url) else {
            return false;
        };
        let ownership = match self.recent_ownership(url) {
            Some(cached) => {
                tracing::trace!(url, "Replaying facts of repeated request");
                cached
            }
            None => {
                let parsed = match serde_json::from_str::<PixelOwnership>(body) {
                    Ok(ownership) => Some(ownership),
                    Err(e) => {
                        tracing::debug!(?at, "Paint response carried no ownership metadata: {}", e);
                        None
                    }
                };
                self.remember(url, parsed.clone());
                parsed
            }
        };

        let reached = self.world.deliver(at);
        tracing::debug!(?at, reached, "Delivered world position");

        if let Some(ownership) = ownership {
            let reached = self.ownership.deliver(OwnershipFact { at, ownership });
            tracing::debug!(?at, reached, "Delivered pixel ownership");
        }
        true
    }

    /// Ownership parsed for `url` inside the window, if it was seen there.
    fn recent_ownership(&self, url: &str) -> Option<Option<PixelOwnership>> {
        let now = Instant::now();
        let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        let seen = recent.get(url)?;
        (now.duration_since(seen.at) < self.dedupe_window).then(|| seen.ownership.clone())
    }

    fn remember(&self, url: &str, ownership: Option<PixelOwnership>) {
        let seen = Seen {
            at: Instant::now(),
            ownership,
        };
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(url.to_string(), seen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://backend.wplace.live/s0/pixel/10/20?x=5&y=6";
    const BODY: &str = r#"{"paintedBy":{"id":7,"name":"bob"}}"#;

    #[tokio::test]
    async fn world_position_fans_out_and_drains() {
        let correlator = Correlator::new(Duration::from_secs(1), 16);
        let a = correlator.next_world_position();
        let b = correlator.next_world_position();
        assert_eq!(correlator.pending(FactKind::WorldPosition), 2);

        assert!(correlator.observe(URL, BODY));
        assert_eq!(correlator.pending(FactKind::WorldPosition), 0);

        let expected = WorldCoordinate::new(10, 20, 5, 6);
        assert_eq!(a.await.unwrap(), expected);
        assert_eq!(b.await.unwrap(), expected);
    }

    #[tokio::test]
    async fn ownership_parsed_from_body() {
        let correlator = Correlator::new(Duration::from_secs(1), 16);
        let pending = correlator.next_pixel_ownership();
        correlator.observe(URL, BODY);
        let fact = pending.await.unwrap();
        assert_eq!(fact.ownership.painted_by.id, 7);
        assert_eq!(fact.at, WorldCoordinate::new(10, 20, 5, 6));
    }

    #[tokio::test]
    async fn unparsable_body_leaves_ownership_waiters_queued() {
        let correlator = Correlator::new(Duration::from_secs(1), 16);
        let _pending = correlator.next_pixel_ownership();
        assert!(correlator.observe(URL, "not json"));
        assert_eq!(correlator.pending(FactKind::PixelOwnership), 1);
    }

    #[test]
    fn unrelated_urls_are_ignored() {
        let correlator = Correlator::new(Duration::from_secs(1), 16);
        let _pending = correlator.next_world_position();
        assert!(!correlator.observe("https://backend.wplace.live/me", "{}"));
        assert_eq!(correlator.pending(FactKind::WorldPosition), 1);
    }

    #[tokio::test]
    async fn repeated_url_inside_window_still_reaches_new_waiters() {
        let correlator = Correlator::new(Duration::from_secs(60), 16);
        assert!(correlator.observe(URL, BODY));

        let world = correlator.next_world_position();
        let ownership = correlator.next_pixel_ownership();
        // The body is not parsed again; the first sighting's facts are replayed.
        assert!(correlator.observe(URL, "not json"));
        assert_eq!(correlator.pending(FactKind::WorldPosition), 0);
        assert_eq!(correlator.pending(FactKind::PixelOwnership), 0);
        assert_eq!(world.await.unwrap(), WorldCoordinate::new(10, 20, 5, 6));
        assert_eq!(ownership.await.unwrap().ownership.painted_by.id, 7);
    }

    #[test]
    fn repeated_url_outside_window_is_parsed_again() {
        let correlator = Correlator::new(Duration::ZERO, 16);
        assert!(correlator.observe(URL, BODY));
        let _pending = correlator.next_pixel_ownership();
        assert!(correlator.observe(URL, "not json"));
        assert_eq!(correlator.pending(FactKind::PixelOwnership), 1);
    }
}
