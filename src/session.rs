//! Session lifecycle controller – bridges transport, tracking, and engine.
//!
//! ## Single-writer discipline
//!
//! Two execution contexts exist: the rendering/frame-update context (read
//! only, paced by the tracking system) and the command-delivery context.
//! Every mutation of live scene state is marshaled onto **one** ordered work
//! queue before touching the engine, so command delivery and surface-change
//! settling never interleave as partial writes. Per-frame rendering queries
//! go through the shared engine lock and observe a consistent snapshot.
//!
//! ## Event contract (inbound work items)
//!
//! | Item                | Source                | Effect                         |
//! |---------------------|-----------------------|--------------------------------|
//! | `Envelope`          | transport             | decode + apply command         |
//! | `Surface(Added)`    | tracking              | register + settle, status msg  |
//! | `Surface(Updated)`  | tracking              | refresh + settle               |
//! | `Surface(Removed)`  | tracking              | deregister                     |
//! | `Tracking`          | tracking              | status feedback / escalation   |
//! | `Fault`             | tracking session      | terminal error, stop           |
//! | `ConnectionOpened`  | transport             | scene reset + guidance         |
//! | `ConnectionClosed`  | transport             | *(engine untouched)*           |
//! | `ImageScaled`       | background scaler     | late image apply + echo        |
//!
//! ## Image downscale ordering
//!
//! Downscaling runs on a blocking worker and its result is delivered back
//! onto the queue. Two overlapping downscales for the same object resolve
//! last-submitted-wins: a downscale started earlier may land after a later
//! one and overwrite it. This weak ordering is a known, deliberate property
//! of the protocol; do not tighten it without flagging the behavior change.

use crate::engine::{CommandEffects, PlacementEngine};
use crate::error::LiveViewError;
use crate::protocol::{Envelope, LiveViewCommand};
use crate::types::{EngineConfig, PlaceableObjectRef, SurfaceRef, TrackingState};
use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

/// Status message categories, used to key scheduled-message cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageCategory {
    PlaneEstimation,
    TrackingStateEscalation,
    ContentPlacement,
}

/// On-screen status / accessibility layer. Message content and timers are
/// owned by the implementation; this crate only decides *when* to speak.
pub trait StatusReporter: Send + Sync {
    fn show_message(&self, message: &str);
    fn show_tracking_quality(&self, state: &TrackingState);
    /// Schedule stronger feedback for a degraded state after `delay_secs`.
    fn escalate_feedback(&self, state: &TrackingState, delay_secs: f32);
    fn cancel_scheduled(&self, category: MessageCategory);
    /// Terminal, user-visible failure. The session does not retry.
    fn display_error(&self, title: &str, message: &str);
    fn announce_placement(&self, objects: &[PlaceableObjectRef]);
}

/// Image rasterization/scaling utility (out of scope for this crate).
pub trait ImageScaler: Send + Sync {
    /// Logical size of an encoded image, or `None` when it cannot be
    /// rasterized.
    fn dimensions(&self, data: &[u8]) -> Option<(u32, u32)>;
    /// Re-encode `data` scaled to fit within `max_edge`, preserving aspect
    /// ratio. `None` when rasterization fails.
    fn scale_to_fit(&self, data: &[u8], max_edge: u32) -> Option<Vec<u8>>;
}

/// Outbound half of the process boundary. Envelopes pushed here are
/// fire-and-forget and never re-decoded by this host.
pub trait OutboundSink: Send + Sync {
    fn send(&self, envelope: Envelope);
}

// ---------------------------------------------------------------------------
// Work queue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum SurfaceEvent {
    Added(SurfaceRef),
    Updated(SurfaceRef),
    Removed(String),
}

#[derive(Debug)]
pub enum WorkItem {
    Envelope(Envelope),
    Surface(SurfaceEvent),
    Tracking(TrackingState),
    Fault { reason: String },
    ConnectionOpened,
    ConnectionClosed,
    ImageScaled {
        object: PlaceableObjectRef,
        image: Vec<u8>,
    },
}

/// Cloneable submission handle for transport and tracking callbacks.
///
/// Sends never block; the controller drains the queue in submission order.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<WorkItem>,
}

impl SessionHandle {
    pub fn deliver_envelope(&self, envelope: Envelope) {
        let _ = self.tx.send(WorkItem::Envelope(envelope));
    }

    pub fn surface_event(&self, event: SurfaceEvent) {
        let _ = self.tx.send(WorkItem::Surface(event));
    }

    pub fn tracking_changed(&self, state: TrackingState) {
        let _ = self.tx.send(WorkItem::Tracking(state));
    }

    pub fn session_fault(&self, reason: impl Into<String>) {
        let _ = self.tx.send(WorkItem::Fault {
            reason: reason.into(),
        });
    }

    pub fn connection_opened(&self) {
        let _ = self.tx.send(WorkItem::ConnectionOpened);
    }

    pub fn connection_closed(&self) {
        let _ = self.tx.send(WorkItem::ConnectionClosed);
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns the engine behind a lock and drives it from the work queue.
pub struct SessionController {
    config: EngineConfig,
    engine: Arc<Mutex<PlacementEngine>>,
    status: Arc<dyn StatusReporter>,
    scaler: Arc<dyn ImageScaler>,
    outbound: Arc<dyn OutboundSink>,
    tx: mpsc::UnboundedSender<WorkItem>,
    rx: mpsc::UnboundedReceiver<WorkItem>,
}

impl SessionController {
    pub fn new(
        config: EngineConfig,
        engine: Arc<Mutex<PlacementEngine>>,
        status: Arc<dyn StatusReporter>,
        scaler: Arc<dyn ImageScaler>,
        outbound: Arc<dyn OutboundSink>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            config,
            engine,
            status,
            scaler,
            outbound,
            tx,
            rx,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.tx.clone(),
        }
    }

    /// Shared engine reference for the read-only rendering context.
    pub fn engine(&self) -> Arc<Mutex<PlacementEngine>> {
        self.engine.clone()
    }

    /// Drain the work queue in submission order until a terminal fault
    /// occurs or the driving task is aborted. The controller keeps its own
    /// sender for background-scaled image results, so dropping the external
    /// handles does not close the queue. Recoverable errors are absorbed
    /// here and never cross this boundary.
    pub async fn run(mut self) -> Result<()> {
        info!("Session controller running");
        while let Some(item) = self.rx.recv().await {
            match item {
                WorkItem::Envelope(envelope) => self.handle_envelope(envelope)?,
                WorkItem::Surface(event) => self.handle_surface_event(event),
                WorkItem::Tracking(state) => self.handle_tracking(state),
                WorkItem::Fault { reason } => {
                    self.status.display_error("The AR session failed.", &reason);
                    return Err(anyhow!(LiveViewError::TransportFault(reason)));
                }
                WorkItem::ConnectionOpened => {
                    // Fresh run: discard live scene state, then guide the
                    // user back into surface detection.
                    self.engine.lock().reset();
                    self.status
                        .show_message("Move the camera around to detect surfaces.");
                }
                WorkItem::ConnectionClosed => {
                    debug!("Command connection closed");
                }
                WorkItem::ImageScaled { object, image } => {
                    self.apply_scaled_image(object, image);
                }
            }
        }
        info!("Session controller stopped");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Command handling
    // -----------------------------------------------------------------------

    fn handle_envelope(&mut self, envelope: Envelope) -> Result<()> {
        let Some(command) = LiveViewCommand::decode(&envelope) else {
            // Malformed traffic is dropped, never raised.
            warn!("Dropping undecodable envelope with tag '{}'", envelope.type_tag);
            return Ok(());
        };

        // Oversized images leave the critical path before the engine sees
        // them; everything else applies synchronously in queue order.
        if let LiveViewCommand::SetObjectImage {
            object,
            image: Some(bytes),
        } = &command
        {
            match self.scaler.dimensions(bytes) {
                None => {
                    warn!("Unrasterizable image for object {}", object.id);
                    return Ok(());
                }
                Some((w, h)) if w == 0 || h == 0 => {
                    debug!("Zero-area image for object {} ignored", object.id);
                    return Ok(());
                }
                Some((w, h)) if w > self.config.max_image_size || h > self.config.max_image_size => {
                    // The shell must exist (and be a shape) before the bytes
                    // leave the critical path, so the late result finds its
                    // target and mismatches surface now.
                    let prepared = self.engine.lock().prepare_image_target(object);
                    if prepared.is_ok() {
                        self.spawn_downscale(object.clone(), bytes.clone());
                    }
                    return self.dispatch_result(prepared.map(|_| CommandEffects::default()));
                }
                Some(_) => {}
            }
        }

        let result = self.engine.lock().apply(command);
        self.dispatch_result(result)
    }

    fn dispatch_result(
        &self,
        result: crate::error::Result<CommandEffects>,
    ) -> Result<()> {
        match result {
            Ok(effects) => {
                self.dispatch_effects(effects);
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                warn!("Command absorbed: {}", e);
                Ok(())
            }
            Err(e) => {
                self.status.display_error("The AR session failed.", &e.to_string());
                Err(anyhow!(e))
            }
        }
    }

    fn dispatch_effects(&self, effects: CommandEffects) {
        for envelope in effects.outbound {
            self.outbound.send(envelope);
        }
        if !effects.announcements.is_empty() {
            self.status.announce_placement(&effects.announcements);
        }
    }

    // -----------------------------------------------------------------------
    // Image downscale offload
    // -----------------------------------------------------------------------

    fn spawn_downscale(&self, object: PlaceableObjectRef, bytes: Vec<u8>) {
        let scaler = self.scaler.clone();
        let max_edge = self.config.max_image_size;
        let tx = self.tx.clone();

        tokio::task::spawn_blocking(move || {
            let scaled = scaler.scale_to_fit(&bytes, max_edge);
            match scaled {
                Some(image) => {
                    // Result re-enters the single-writer queue; if the
                    // session ended meanwhile the send just fails.
                    let _ = tx.send(WorkItem::ImageScaled { object, image });
                }
                None => warn!("Downscale failed for object {}", object.id),
            }
        });
    }

    /// Late delivery of a scaled image. The target may have been discarded
    /// by a reset in the meantime; that result is dropped, not an error.
    fn apply_scaled_image(&self, object: PlaceableObjectRef, image: Vec<u8>) {
        let mut engine = self.engine.lock();
        if engine.object(&object.id).is_none() {
            debug!("Discarding scaled image for vanished object {}", object.id);
            return;
        }
        match engine.set_object_image(&object, image) {
            Ok(envelope) => self.outbound.send(envelope),
            Err(e) => warn!("Scaled image dropped: {}", e),
        }
    }

    // -----------------------------------------------------------------------
    // Surface & tracking events
    // -----------------------------------------------------------------------

    fn handle_surface_event(&self, event: SurfaceEvent) {
        let mut engine = self.engine.lock();
        match event {
            SurfaceEvent::Added(surface) => {
                self.status.cancel_scheduled(MessageCategory::PlaneEstimation);
                self.status.show_message("SURFACE DETECTED");
                let snapped = engine.surface_added(surface);
                if snapped > 0 {
                    debug!("Settled {} object(s) onto new surface", snapped);
                }
            }
            SurfaceEvent::Updated(surface) => {
                engine.surface_updated(surface);
            }
            SurfaceEvent::Removed(id) => {
                engine.surface_removed(&id);
            }
        }
    }

    fn handle_tracking(&self, state: TrackingState) {
        self.status.show_tracking_quality(&state);
        if state.is_degraded() {
            self.status
                .escalate_feedback(&state, self.config.escalation_delay_secs);
        } else {
            self.status
                .cancel_scheduled(MessageCategory::TrackingStateEscalation);
        }
    }
}

// ---------------------------------------------------------------------------
// Headless collaborator implementations
// ---------------------------------------------------------------------------

/// Status layer that only logs. Used by the standalone host binary and in
/// tests; real deployments wrap the platform status view.
pub struct LoggingStatusReporter;

impl StatusReporter for LoggingStatusReporter {
    fn show_message(&self, message: &str) {
        info!("[status] {}", message);
    }

    fn show_tracking_quality(&self, state: &TrackingState) {
        info!("[status] tracking: {:?}", state);
    }

    fn escalate_feedback(&self, state: &TrackingState, delay_secs: f32) {
        info!("[status] escalating {:?} in {}s", state, delay_secs);
    }

    fn cancel_scheduled(&self, category: MessageCategory) {
        debug!("[status] cancel {:?}", category);
    }

    fn display_error(&self, title: &str, message: &str) {
        tracing::error!("[status] {} {}", title, message);
    }

    fn announce_placement(&self, objects: &[PlaceableObjectRef]) {
        for object in objects {
            info!("[status] placed: {}", object.name);
        }
    }
}

/// Scaler for hosts without a rasterization stack: treats any non-empty
/// payload as already within bounds and scaling as identity.
pub struct PassthroughImageScaler;

impl ImageScaler for PassthroughImageScaler {
    fn dimensions(&self, data: &[u8]) -> Option<(u32, u32)> {
        if data.is_empty() {
            None
        } else {
            Some((1, 1))
        }
    }

    fn scale_to_fit(&self, data: &[u8], _max_edge: u32) -> Option<Vec<u8>> {
        Some(data.to_vec())
    }
}
