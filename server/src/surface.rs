//! Action Surface implemented by remote calls into the in-page shim.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::fact::MeResponse;
use common::{Charges, Palette, PaletteEntry, ScreenPoint, Swatch};
use painter::{ActionSurface, PainterError, Result};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

use crate::protocol::{Encoded, PageFailure, ToPage};

type Reply = std::result::Result<Value, PageFailure>;

/// The page connection currently serving calls.
struct Link {
    generation: u64,
    outgoing: mpsc::Sender<String>,
}

pub struct WsSurface {
    link: Mutex<Option<Link>>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
    next_id: AtomicU64,
    generations: AtomicU64,
}

/// Removes an unanswered call when its future is dropped.
struct PendingCall<'a> {
    surface: &'a WsSurface,
    id: u64,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        lock(&self.surface.pending).remove(&self.id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn closed() -> PainterError {
    PainterError::Surface("page connection closed".into())
}

impl WsSurface {
    pub fn new() -> Self {
        Self {
            link: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            generations: AtomicU64::new(1),
        }
    }

    /// Make `outgoing` the page connection. A newer connection replaces an
    /// older one; the returned generation identifies it on disconnect.
    pub fn connect(&self, outgoing: mpsc::Sender<String>) -> u64 {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let replaced = lock(&self.link).replace(Link {
            generation,
            outgoing,
        });
        if replaced.is_some() {
            tracing::warn!("Page connection {} replaces an older one", generation);
        }
        generation
    }

    /// Forget the connection if it is still `generation`, failing every call
    /// waiting on it.
    pub fn disconnect(&self, generation: u64) {
        let mut link = lock(&self.link);
        if link.as_ref().map(|l| l.generation) != Some(generation) {
            return;
        }
        *link = None;
        drop(link);
        let orphaned = std::mem::take(&mut *lock(&self.pending));
        if !orphaned.is_empty() {
            tracing::warn!("Page disconnected with {} calls in flight", orphaned.len());
        }
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.link).is_some()
    }

    /// Hand a reply to the call waiting on `id`.
    pub fn resolve(&self, id: u64, reply: Reply) {
        match lock(&self.pending).remove(&id) {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => tracing::debug!(id, "Reply for a call nobody waits on"),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let outgoing = lock(&self.link)
            .as_ref()
            .map(|l| l.outgoing.clone())
            .ok_or_else(|| PainterError::Surface("no page connected".into()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let message = serde_json::to_string(&ToPage::Call { id, method, params })
            .map_err(|e| PainterError::Surface(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);
        let _pending = PendingCall { surface: self, id };

        outgoing.send(message).await.map_err(|_| closed())?;
        let value = rx.await.map_err(|_| closed())??;
        serde_json::from_value(value)
            .map_err(|e| PainterError::Surface(format!("{method}: malformed reply: {e}")))
    }

    async fn call_bytes(&self, method: &str, params: Value) -> Result<Vec<u8>> {
        let encoded: Encoded = self.call(method, params).await?;
        STANDARD
            .decode(encoded.data)
            .map_err(|e| PainterError::Surface(format!("{method}: {e}")))
    }
}

impl Default for WsSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionSurface for WsSurface {
    async fn select_image_file(&self) -> Result<Vec<u8>> {
        self.call_bytes("select_image_file", Value::Null).await
    }

    async fn read_palette(&self) -> Result<Vec<PaletteEntry>> {
        let swatches: Vec<Swatch> = self.call("read_palette", Value::Null).await?;
        let palette = Palette::from_swatches(&swatches).ok_or(PainterError::NoColors)?;
        Ok(palette.entries().to_vec())
    }

    async fn trigger_color_selection(&self, id: &str) -> Result<()> {
        self.call("select_color", json!({ "id": id })).await
    }

    async fn marker_screen_position(&self) -> Result<ScreenPoint> {
        self.call("marker_position", Value::Null).await
    }

    async fn viewport_size(&self) -> Result<ScreenPoint> {
        self.call("viewport_size", Value::Null).await
    }

    async fn dispatch_synthetic_click(&self, at: ScreenPoint) -> Result<()> {
        self.call("click", json!(at)).await
    }

    async fn dispatch_paint_gesture(&self, at: ScreenPoint) -> Result<()> {
        self.call("paint", json!(at)).await
    }

    async fn is_rate_limit_modal_visible(&self) -> Result<bool> {
        self.call("rate_limit_modal", Value::Null).await
    }

    async fn fetch_tile_image(&self, tile_x: i64, tile_y: i64) -> Result<Vec<u8>> {
        self.call_bytes("fetch_tile", json!({ "tileX": tile_x, "tileY": tile_y }))
            .await
    }

    async fn fetch_charges(&self) -> Result<Charges> {
        let me: MeResponse = self
            .call("fetch_me", Value::Null)
            .await
            .map_err(|e| match e {
                PainterError::Api(_) => e,
                other => PainterError::Api(other.to_string()),
            })?;
        Ok(me.charges)
    }
}
