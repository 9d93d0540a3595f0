//! AR Sandbox Live-View Host
//!
//! The live-view half of an educational augmented-reality sandbox:
//! user-authored code in an isolated process issues placement commands which
//! this host executes against a live camera-tracked 3-D scene.
//!
//! ## Architecture
//!
//! ```text
//! SessionController  (session.rs)  ← work queue, tracking lifecycle
//!   └── PlacementEngine  (engine.rs)  ← live objects/surfaces, settling
//!         └── VirtualObject / SceneRenderer  (scene.rs)
//! LiveViewCommand / Envelope  (protocol.rs)  ← wire codec
//! ```
//!
//! `PlacementEngine` owns the authoritative scene state; `SessionController`
//! serializes command delivery and surface-change events onto it through a
//! single-writer queue and bridges to the status/accessibility layer.

// Protocol and reference types are always available (no host feature needed).
pub mod error;
pub mod protocol;
pub mod types;

// Host-side modules require the `host` feature.
#[cfg(feature = "host")]
pub mod engine;
#[cfg(feature = "host")]
pub mod scene;
#[cfg(feature = "host")]
pub mod session;

// Convenience re-exports (host only)
#[cfg(feature = "host")]
pub use engine::{CommandEffects, PlacementEngine};
#[cfg(feature = "host")]
pub use scene::{HeadlessRenderer, ObjectState, SceneRenderer, VirtualObject};
#[cfg(feature = "host")]
pub use session::{SessionController, SessionHandle, StatusReporter, SurfaceEvent};
pub use error::{LiveViewError, Result};
pub use protocol::{CommandTag, Envelope, LiveViewCommand};
pub use types::{
    ActorAction, Color, EngineConfig, EngineStats, Extent, ObjectKind, PlaceableObjectRef, Point,
    SurfaceRef, TrackingState, Trigger, Vec3,
};
