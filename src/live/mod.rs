//! Live recognition session.
//!
//! A `LiveSession` turns an attached camera into a stream of predictions:
//!
//! - The session is `Active` only while a source is attached AND live mode is
//!   enabled; otherwise it is `Idle` and `tick` does nothing.
//! - Each `tick` is one capture-predict cycle. The prediction request runs on
//!   a worker thread; while it is outstanding further ticks are skipped, so
//!   at most one request is ever in flight and results arrive in order. A
//!   cancelled request still counts until it returns.
//! - Every cycle owns a `CancelToken`. Going idle or swapping the source
//!   cancels it; the worker checks the token while holding the result-slot
//!   lock, so a cancelled cycle never writes a result or an error.
//! - Failures land in the error slot and keep the last good prediction on
//!   screen. The next scheduled tick is the only retry.
//!
//! `LiveRunner` drives `tick` on a fixed period from a background thread.

mod runner;

pub use runner::{LiveCommand, LiveHandle, LiveRunner};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::LiveError;
use crate::frame::{frame_file_name, Encoder, FrameRead, FrameSource};
use crate::locale::Language;
use crate::overlay::{top_overlay, DisplayMapping, OverlayRect};
use crate::predict::{Prediction, PredictionBatch, Predictor};

/// Cadence of capture-predict cycles.
pub const DEFAULT_LIVE_PERIOD: Duration = Duration::from_millis(800);

/// File name prefix of live uploads.
pub const LIVE_FILE_PREFIX: &str = "webcam-live";

// ----------------------------------------------------------------------------
// CancelToken
// ----------------------------------------------------------------------------

/// Cancellation signal owned by one capture-predict cycle.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ----------------------------------------------------------------------------
// Result slots
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiveSessionState {
    Idle,
    Active,
}

/// Copy of the latest-prediction and latest-error slots, taken atomically.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LiveSnapshot {
    pub prediction: Option<PredictionBatch>,
    /// Pixel size of the frame `prediction` was computed on.
    pub frame_size: Option<(u32, u32)>,
    pub error: Option<LiveError>,
}

impl LiveSnapshot {
    pub fn top(&self) -> Option<&Prediction> {
        self.prediction.as_ref().and_then(PredictionBatch::top)
    }

    /// Caption shown over the live video while the session is active.
    pub fn caption(&self, language: Language) -> String {
        let text = language.text();
        if let Some(err) = &self.error {
            return format!("{}: {}", text.live_error, err);
        }
        match (&self.prediction, self.top()) {
            (None, _) => text.live_starting.to_string(),
            (Some(_), Some(top)) => {
                format!("{}: {} ({}%)", text.detected, top.label, top.confidence_pct())
            }
            (Some(_), None) => text.no_confident_match.to_string(),
        }
    }

    /// Box of the top prediction, scaled to a video element rendered at
    /// `rendered` display units.
    pub fn overlay(&self, rendered: (f64, f64)) -> Option<OverlayRect> {
        let (width, height) = self.frame_size?;
        let mapping = DisplayMapping::new(
            f64::from(width),
            f64::from(height),
            rendered.0,
            rendered.1,
        );
        top_overlay(self.prediction.as_ref()?, mapping.as_ref())
    }
}

/// Shared handle to the result slots of one session.
#[derive(Clone, Debug, Default)]
pub struct LiveSlots {
    inner: Arc<Mutex<LiveSnapshot>>,
}

impl LiveSlots {
    pub fn snapshot(&self) -> LiveSnapshot {
        self.inner.lock().clone()
    }

    /// Apply a finished cycle. Cancelled cycles write nothing.
    fn apply(
        &self,
        token: &CancelToken,
        frame_size: (u32, u32),
        result: Result<PredictionBatch, LiveError>,
    ) -> bool {
        let mut slots = self.inner.lock();
        if token.is_cancelled() {
            return false;
        }
        match result {
            Ok(batch) => {
                slots.prediction = Some(batch);
                slots.frame_size = Some(frame_size);
                slots.error = None;
                true
            }
            Err(LiveError::Cancelled) => false,
            Err(err) => {
                slots.error = Some(err);
                true
            }
        }
    }

    fn record_error(&self, err: LiveError) {
        if err.is_cancelled() {
            return;
        }
        self.inner.lock().error = Some(err);
    }

    /// Cancel `token` (if any) and clear both slots in one critical section.
    fn cancel_and_clear(&self, token: Option<&CancelToken>) {
        let mut slots = self.inner.lock();
        if let Some(token) = token {
            token.cancel();
        }
        *slots = LiveSnapshot::default();
    }
}

// ----------------------------------------------------------------------------
// LiveSession
// ----------------------------------------------------------------------------

/// What a single `tick` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Session is idle; nothing happens.
    Idle,
    /// The previous request is still outstanding; this cycle is dropped.
    Busy,
    /// Source has no frame yet (zero-sized or warming up).
    NotReady,
    /// Capture or encoding failed; recorded in the error slot.
    CaptureFailed,
    /// A prediction request was started for this cycle number.
    Submitted(u64),
}

struct InFlight {
    cycle: u64,
    token: CancelToken,
    worker: JoinHandle<()>,
}

pub struct LiveSession {
    predictor: Arc<dyn Predictor>,
    encoder: Box<dyn Encoder>,
    source: Option<Box<dyn FrameSource>>,
    live_enabled: bool,
    state: LiveSessionState,
    slots: LiveSlots,
    in_flight: Option<InFlight>,
    /// Cancelled cycle whose request has not returned yet.
    orphan: Option<InFlight>,
    cycle: u64,
}

impl LiveSession {
    /// New idle session. Live mode starts enabled; the session activates as
    /// soon as a source is attached.
    pub fn new(predictor: Arc<dyn Predictor>, encoder: Box<dyn Encoder>) -> Self {
        Self {
            predictor,
            encoder,
            source: None,
            live_enabled: true,
            state: LiveSessionState::Idle,
            slots: LiveSlots::default(),
            in_flight: None,
            orphan: None,
            cycle: 0,
        }
    }

    pub fn state(&self) -> LiveSessionState {
        self.state
    }

    pub fn is_live_enabled(&self) -> bool {
        self.live_enabled
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn slots(&self) -> LiveSlots {
        self.slots.clone()
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        self.slots.snapshot()
    }

    /// Caption for the live view, or `None` while idle.
    pub fn caption(&self, language: Language) -> Option<String> {
        match self.state {
            LiveSessionState::Idle => None,
            LiveSessionState::Active => Some(self.snapshot().caption(language)),
        }
    }

    /// True while a prediction request is outstanding, including one that
    /// was cancelled but has not returned yet.
    pub fn is_busy(&self) -> bool {
        [&self.in_flight, &self.orphan]
            .into_iter()
            .flatten()
            .any(|flight| !flight.worker.is_finished())
    }

    /// Attach a camera, replacing (and releasing) any previous one.
    ///
    /// Any outstanding request belongs to the old source and is cancelled.
    pub fn attach_source(&mut self, source: Box<dyn FrameSource>) {
        log::info!("live: attaching source {}", source.describe());
        self.abandon_cycle();
        self.cycle = 0;
        self.source = Some(source);
        self.reconcile();
    }

    /// Release the camera. Returns false when none was attached.
    pub fn detach_source(&mut self) -> bool {
        let Some(source) = self.source.take() else {
            return false;
        };
        log::info!("live: releasing source {}", source.describe());
        self.reconcile();
        drop(source);
        true
    }

    pub fn set_live_enabled(&mut self, enabled: bool) {
        if self.live_enabled != enabled {
            log::info!("live: recognition {}", if enabled { "enabled" } else { "disabled" });
        }
        self.live_enabled = enabled;
        self.reconcile();
    }

    /// Run one capture-predict cycle.
    pub fn tick(&mut self) -> CycleOutcome {
        if self.state == LiveSessionState::Idle {
            return CycleOutcome::Idle;
        }
        if self.is_busy() {
            log::debug!("live: previous request still in flight, skipping cycle");
            return CycleOutcome::Busy;
        }
        // Previous workers have finished; collect them.
        self.wait_in_flight();
        if let Some(orphan) = self.orphan.take() {
            if orphan.worker.join().is_err() {
                log::debug!("live: cancelled cycle {} worker panicked", orphan.cycle);
            }
        }

        let Some(source) = self.source.as_mut() else {
            return CycleOutcome::Idle;
        };
        let frame = match source.current_frame() {
            Ok(FrameRead::Ready(frame)) if !frame.is_empty() => frame,
            Ok(_) => return CycleOutcome::NotReady,
            Err(err) => {
                log::warn!("live: capture failed: {}", err);
                self.slots.record_error(err);
                return CycleOutcome::CaptureFailed;
            }
        };
        let image = match self
            .encoder
            .encode(&frame, &frame_file_name(LIVE_FILE_PREFIX))
        {
            Ok(image) => image,
            Err(err) => {
                log::warn!("live: encode failed: {}", err);
                self.slots.record_error(err);
                return CycleOutcome::CaptureFailed;
            }
        };
        let frame_size = (frame.width, frame.height);
        drop(frame);

        self.cycle += 1;
        let cycle = self.cycle;
        let token = CancelToken::new();
        let worker_token = token.clone();
        let predictor = Arc::clone(&self.predictor);
        let slots = self.slots.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("vbic-live-{cycle}"))
            .spawn(move || {
                let result = predictor.predict(&image, &worker_token);
                if let Err(err) = &result {
                    if !err.is_cancelled() {
                        log::warn!("live: cycle {} failed: {}", cycle, err);
                    }
                }
                if !slots.apply(&worker_token, frame_size, result) {
                    log::debug!("live: cycle {} result discarded", cycle);
                }
            });
        match spawned {
            Ok(worker) => {
                log::debug!("live: cycle {} submitted", cycle);
                self.in_flight = Some(InFlight {
                    cycle,
                    token,
                    worker,
                });
                CycleOutcome::Submitted(cycle)
            }
            Err(err) => {
                self.slots
                    .record_error(LiveError::PredictionFailed(format!("spawn worker: {err}")));
                CycleOutcome::CaptureFailed
            }
        }
    }

    /// Block until the outstanding request (if any) has been applied.
    pub fn wait_in_flight(&mut self) {
        if let Some(flight) = self.in_flight.take() {
            if flight.worker.join().is_err() && !flight.token.is_cancelled() {
                self.slots.record_error(LiveError::PredictionFailed(
                    "prediction worker panicked".to_string(),
                ));
            }
        }
    }

    /// Go idle and release the source. Used on shutdown.
    pub fn shutdown(&mut self) {
        self.live_enabled = false;
        self.source = None;
        self.reconcile();
    }

    fn reconcile(&mut self) {
        let wanted = if self.source.is_some() && self.live_enabled {
            LiveSessionState::Active
        } else {
            LiveSessionState::Idle
        };
        if wanted == self.state {
            return;
        }
        match wanted {
            LiveSessionState::Active => {
                self.slots.cancel_and_clear(None);
                self.cycle = 0;
                log::info!("live: session active");
            }
            LiveSessionState::Idle => {
                self.abandon_cycle();
                log::info!("live: session idle");
            }
        }
        self.state = wanted;
    }

    /// Cancel the outstanding cycle and clear both slots.
    fn abandon_cycle(&mut self) {
        let flight = self.in_flight.take();
        self.slots
            .cancel_and_clear(flight.as_ref().map(|flight| &flight.token));
        if let Some(flight) = flight {
            log::debug!("live: cycle {} cancelled", flight.cycle);
            // The request keeps running until it returns and its result is
            // discarded; no new cycle starts before then. A new in-flight
            // cycle only exists once any earlier orphan has finished.
            self.orphan = Some(flight);
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        if let Some(flight) = self.in_flight.take() {
            flight.token.cancel();
        }
    }
}
