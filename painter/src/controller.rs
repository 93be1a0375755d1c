//! The single owner of session state, and the only way operations start.
//!
//! Operations move the controller out of `Idle` through a guarded
//! transition; a second operation while one is in flight fails with
//! [`PainterError::Busy`] instead of interleaving with it.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use common::{Calibration, Charges, Palette, PaletteEntry, SessionRecord, Strategy};
use serde::Serialize;
use tokio::sync::watch;

use crate::calibrate;
use crate::census::{self, Census};
use crate::config::PainterConfig;
use crate::context::Context;
use crate::correlator::Correlator;
use crate::diff::{self, Task};
use crate::error::{PainterError, Result, Suspension};
use crate::focus::FocusGate;
use crate::quantize::{self, QuantizedImage};
use crate::scheduler::{self, DrawOutcome};
use crate::suspend::{bounded, CancelToken};
use crate::surface::ActionSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    SelectingImage,
    Calibrating,
    Diffing,
    Drawing,
    Census,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "nothing",
            Phase::SelectingImage => "image selection",
            Phase::Calibrating => "calibration",
            Phase::Diffing => "diff",
            Phase::Drawing => "drawing",
            Phase::Census => "census",
        };
        f.write_str(name)
    }
}

/// Proof that an operation owns the controller. Dropping it returns to `Idle`.
pub struct PhaseGuard<'a> {
    phase: &'a Mutex<Phase>,
    cancel: CancelToken,
}

impl PhaseGuard<'_> {
    fn advance(&self, next: Phase) {
        *lock(self.phase) = next;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *lock(self.phase) = Phase::Idle;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Paintable pixels in the target.
    pub total: usize,
    /// Tasks still outstanding after the last pass.
    pub remaining: usize,
}

impl Progress {
    pub fn done(&self) -> usize {
        self.total.saturating_sub(self.remaining)
    }

    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        (self.done() * 100 / self.total) as u8
    }
}

/// What the operator learns after picking an image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSummary {
    pub width: u32,
    pub height: u32,
    pub colors_to_buy: Vec<(PaletteEntry, usize)>,
}

#[derive(Debug)]
struct Session {
    palette: Option<Palette>,
    image: Option<QuantizedImage>,
    calibration: Option<Calibration>,
    strategy: Strategy,
    scale: u32,
    overlay_opacity: u8,
    widget: (f64, f64),
    tasks: Vec<Task>,
    census: Option<Census>,
}

pub struct Controller<S> {
    surface: S,
    correlator: Arc<Correlator>,
    focus: FocusGate,
    config: PainterConfig,
    phase: Mutex<Phase>,
    cancel: Mutex<CancelToken>,
    progress: Mutex<Progress>,
    status: Arc<watch::Sender<String>>,
    session: tokio::sync::Mutex<Session>,
}

impl<S: ActionSurface> Controller<S> {
    pub fn new(surface: S, config: PainterConfig) -> Self {
        let (status, _) = watch::channel(String::new());
        Self {
            correlator: Arc::new(Correlator::new(
                config.dedupe_window(),
                config.dedupe_capacity,
            )),
            focus: FocusGate::new(true, config.pacing.focus_settle()),
            session: tokio::sync::Mutex::new(Session {
                palette: None,
                image: None,
                calibration: None,
                strategy: Strategy::default(),
                scale: config.default_scale.clamp(1, quantize::MAX_SCALE),
                overlay_opacity: 50,
                widget: (64.0, 64.0),
                tasks: Vec::new(),
                census: None,
            }),
            surface,
            config,
            phase: Mutex::new(Phase::Idle),
            cancel: Mutex::new(CancelToken::new()),
            progress: Mutex::new(Progress::default()),
            status: Arc::new(status),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Where intercepted outgoing calls are fed.
    pub fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    /// Where focus-change events are fed.
    pub fn focus(&self) -> &FocusGate {
        &self.focus
    }

    pub fn config(&self) -> &PainterConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        *lock(&self.phase)
    }

    pub fn progress(&self) -> Progress {
        *lock(&self.progress)
    }

    pub fn status(&self) -> String {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<String> {
        self.status.subscribe()
    }

    /// Abort whatever operation is in flight at its next suspension point.
    pub fn cancel(&self) {
        lock(&self.cancel).cancel();
    }

    // ---- operations ----

    /// Ask for an image file, read the palette and quantize.
    pub async fn select_image(&self) -> Result<ImageSummary> {
        self.operation(Phase::SelectingImage, "Selecting image", |guard| {
            self.select_image_inner(guard)
        })
        .await
    }

    /// Run the two-sample calibration against the page.
    pub async fn calibrate(&self) -> Result<Calibration> {
        self.operation(Phase::Calibrating, "Calibrating", |guard| {
            self.calibrate_inner(guard)
        })
        .await
    }

    /// Diff against the live canvas, then paint until done or rate limited.
    pub async fn draw(&self) -> Result<DrawOutcome> {
        self.operation(Phase::Diffing, "Drawing", |guard| self.draw_inner(guard))
            .await
    }

    /// Tally who painted the pixels under the target image.
    pub async fn census(&self) -> Result<Census> {
        self.operation(Phase::Census, "Counting users", |guard| {
            self.census_inner(guard)
        })
        .await
    }

    /// Current paint charges of the account.
    pub async fn charges(&self) -> Result<Charges> {
        self.surface.fetch_charges().await.map_err(|e| match e {
            PainterError::Api(_) => e,
            other => PainterError::Api(other.to_string()),
        })
    }

    /// Rescale the target, in percent. Scales outside `1..=MAX_SCALE` are
    /// refused with [`PainterError::InvalidScale`].
    pub fn set_scale(&self, scale: u32) -> Result<Option<ImageSummary>> {
        let scale = quantize::check_scale(scale)?;
        let mut session = self.idle_session()?;
        session.scale = scale;
        let Some(palette) = session.palette.clone() else {
            return Ok(None);
        };
        let Some(image) = session.image.as_ref() else {
            return Ok(None);
        };
        let image = image.requantize(&palette, scale);
        let summary = summarize(&image);
        self.reset_progress(&image);
        session.image = Some(image);
        session.tasks.clear();
        Ok(Some(summary))
    }

    pub fn set_strategy(&self, strategy: Strategy) -> Result<()> {
        self.idle_session()?.strategy = strategy;
        Ok(())
    }

    pub fn set_overlay_opacity(&self, opacity: u8) -> Result<()> {
        self.idle_session()?.overlay_opacity = opacity.min(100);
        Ok(())
    }

    pub fn set_widget_position(&self, x: f64, y: f64) -> Result<()> {
        self.idle_session()?.widget = (x, y);
        Ok(())
    }

    /// A colour was bought; the palette's availability is stale.
    pub fn purchase_completed(&self) -> Result<()> {
        self.idle_session()?.palette = None;
        Ok(())
    }

    /// Tasks left untried by the last draw pass.
    pub async fn pending_tasks(&self) -> Vec<Task> {
        self.session.lock().await.tasks.clone()
    }

    pub async fn last_census(&self) -> Option<Census> {
        self.session.lock().await.census.clone()
    }

    /// Snapshot for persistence; `None` until an image and a calibration exist.
    pub async fn to_record(&self) -> Option<SessionRecord> {
        let session = self.session.lock().await;
        let image = session.image.as_ref()?;
        let calibration = session.calibration?;
        Some(SessionRecord {
            image: SessionRecord::encode_image(image.source().bytes()),
            origin_screen: calibration.origin_screen,
            origin_world: calibration.origin_world,
            pixel_size: calibration.pixel_size,
            widget_x: session.widget.0,
            widget_y: session.widget.1,
            overlay_opacity: session.overlay_opacity,
            scale: session.scale,
            strategy: session.strategy,
        })
    }

    /// Rebuild the session from a stored record, re-reading the palette and
    /// re-quantizing the stored image.
    pub async fn restore(&self, record: SessionRecord) -> Result<ImageSummary> {
        self.operation(Phase::SelectingImage, "Restoring session", |guard| {
            self.restore_inner(guard, record)
        })
        .await
    }

    // ---- internals ----

    fn begin(&self, phase: Phase) -> Result<PhaseGuard<'_>> {
        let mut current = lock(&self.phase);
        if *current != Phase::Idle {
            return Err(PainterError::Busy(*current));
        }
        *current = phase;
        let cancel = CancelToken::new();
        *lock(&self.cancel) = cancel.clone();
        Ok(PhaseGuard {
            phase: &self.phase,
            cancel,
        })
    }

    fn idle_session(&self) -> Result<tokio::sync::MutexGuard<'_, Session>> {
        let phase = self.phase();
        if phase != Phase::Idle {
            return Err(PainterError::Busy(phase));
        }
        self.session
            .try_lock()
            .map_err(|_| PainterError::Busy(self.phase()))
    }

    async fn operation<'a, T, F, Fut>(&'a self, phase: Phase, label: &str, op: F) -> Result<T>
    where
        F: FnOnce(PhaseGuard<'a>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let guard = match self.begin(phase) {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!("{} rejected: {}", label, e);
                return Err(e);
            }
        };
        let previous = self.status.send_replace(format!("⌛ {label}"));
        let result = op(guard).await;
        self.finish_status(previous, label, &result);
        result
    }

    fn finish_status<T>(&self, previous: String, label: &str, result: &Result<T>) {
        let shown = match result {
            Ok(_) => {
                let text = if previous.is_empty() {
                    format!("✅ {label}")
                } else {
                    previous
                };
                self.status.send_replace(text);
                return;
            }
            Err(e) if e.is_user_facing() => {
                tracing::warn!("{} aborted: {}", label, e);
                e.to_string()
            }
            Err(e) => {
                tracing::error!("{} failed: {}", label, e);
                format!("❌ {label}")
            }
        };
        self.status.send_replace(shown.clone());

        let status = Arc::clone(&self.status);
        let hold = self.config.status_hold();
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            status.send_if_modified(|current| {
                if *current != shown {
                    return false;
                }
                *current = previous;
                true
            });
        });
    }

    fn context<'a>(&'a self, cancel: &'a CancelToken) -> Context<'a, S> {
        Context {
            surface: &self.surface,
            correlator: &self.correlator,
            focus: &self.focus,
            config: &self.config,
            cancel,
        }
    }

    /// Re-read the palette; the target is re-quantized when it changed.
    async fn refresh_palette(&self, session: &mut Session, ctx: Context<'_, S>) -> Result<Palette> {
        ctx.cancel.check()?;
        let entries = ctx.surface.read_palette().await.map_err(|e| match e {
            PainterError::Cancelled | PainterError::TimedOut(_) => e,
            other => {
                tracing::warn!("Palette unreadable: {}", other);
                PainterError::NoColors
            }
        })?;
        let palette = Palette::new(entries).ok_or(PainterError::NoColors)?;

        if session.palette.as_ref() != Some(&palette) {
            tracing::info!(colors = palette.len(), "Palette changed");
            if let Some(image) = session.image.as_ref() {
                session.image = Some(image.requantize(&palette, session.scale));
            }
            session.palette = Some(palette.clone());
        }
        Ok(palette)
    }

    fn reset_progress(&self, image: &QuantizedImage) {
        let total = paintable(image);
        *lock(&self.progress) = Progress {
            total,
            remaining: total,
        };
    }

    async fn select_image_inner(&self, guard: PhaseGuard<'_>) -> Result<ImageSummary> {
        let ctx = self.context(&guard.cancel);
        let bytes = bounded(
            Suspension::FileSelection,
            self.config.deadlines.file(),
            ctx.cancel,
            self.surface.select_image_file(),
        )
        .await??;

        let mut session = self.session.lock().await;
        let palette = self.refresh_palette(&mut session, ctx).await?;
        let image = QuantizedImage::from_bytes(bytes, &palette, session.scale)?;
        tracing::info!(
            width = image.width(),
            height = image.height(),
            to_buy = image.colors_to_buy().len(),
            "Image selected"
        );

        let summary = summarize(&image);
        self.reset_progress(&image);
        session.image = Some(image);
        session.tasks.clear();
        Ok(summary)
    }

    async fn calibrate_inner(&self, guard: PhaseGuard<'_>) -> Result<Calibration> {
        let calibration = calibrate::calibrate(self.context(&guard.cancel)).await?;
        self.session.lock().await.calibration = Some(calibration);
        Ok(calibration)
    }

    async fn draw_inner(&self, guard: PhaseGuard<'_>) -> Result<DrawOutcome> {
        let ctx = self.context(&guard.cancel);
        let mut session = self.session.lock().await;
        self.refresh_palette(&mut session, ctx).await?;

        let seed = self.config.shuffle_seed.unwrap_or_else(rand::random);
        let tasks = diff::compute_tasks(
            ctx,
            session.image.as_ref(),
            session.calibration.as_ref(),
            session.strategy,
            seed,
        )
        .await?;
        let total = session.image.as_ref().map_or(0, paintable);
        *lock(&self.progress) = Progress {
            total,
            remaining: tasks.len(),
        };

        guard.advance(Phase::Drawing);
        let mut painted = 0;
        let outcome = scheduler::draw(ctx, &tasks, &mut painted).await;
        // Cancelled or failed passes still drop what reached the canvas.
        session.tasks = tasks[painted..].to_vec();
        lock(&self.progress).remaining = session.tasks.len();
        outcome
    }

    async fn census_inner(&self, guard: PhaseGuard<'_>) -> Result<Census> {
        let ctx = self.context(&guard.cancel);
        let mut session = self.session.lock().await;
        let result =
            census::census(ctx, session.image.as_ref(), session.calibration.as_ref()).await?;
        session.census = Some(result.clone());
        Ok(result)
    }

    async fn restore_inner(
        &self,
        guard: PhaseGuard<'_>,
        record: SessionRecord,
    ) -> Result<ImageSummary> {
        let ctx = self.context(&guard.cancel);
        let scale = quantize::check_scale(record.scale)?;
        let bytes = record.image_bytes().ok_or(PainterError::NoImage)?;

        let mut session = self.session.lock().await;
        let palette = self.refresh_palette(&mut session, ctx).await?;
        let image = QuantizedImage::from_bytes(bytes, &palette, scale)?;

        let summary = summarize(&image);
        self.reset_progress(&image);
        session.image = Some(image);
        session.calibration = Some(Calibration {
            origin_world: record.origin_world,
            origin_screen: record.origin_screen,
            pixel_size: record.pixel_size,
        });
        session.scale = scale;
        session.strategy = record.strategy;
        session.overlay_opacity = record.overlay_opacity;
        session.widget = (record.widget_x, record.widget_y);
        session.tasks.clear();
        tracing::info!("Session restored");
        Ok(summary)
    }
}

fn summarize(image: &QuantizedImage) -> ImageSummary {
    ImageSummary {
        width: image.width(),
        height: image.height(),
        colors_to_buy: image.colors_to_buy().to_vec(),
    }
}

fn paintable(image: &QuantizedImage) -> usize {
    let sentinel = image.palette().transparent_index();
    image.indices().iter().filter(|&&i| i != sentinel).count()
}
