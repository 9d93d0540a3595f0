//! Core reference types shared across all modules.
//!
//! Everything in this module is a plain value: object/surface references are
//! cheap to clone, carry no host-side state, and are safe to embed in wire
//! payloads. The live counterparts (loaded geometry, reaction lists…) live in
//! the `scene` module and are owned exclusively by the placement engine.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// 2-D coordinate in surface-local space. Used only as a placement hint when
/// binding an object to a surface; never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Horizontal size of a detected surface's footprint (x/z axes, y is up).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Extent {
    pub x: f32,
    pub z: f32,
}

impl Extent {
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }
}

// ---------------------------------------------------------------------------
// Object references
// ---------------------------------------------------------------------------

/// Which family of placeable object a reference denotes.
///
/// The kind gates which command variants may legally target the object:
/// color/image mutations require [`ObjectKind::Shape`], reaction wiring
/// requires [`ObjectKind::Actor`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ObjectKind {
    Unknown,
    Actor,
    Shape,
    Gem,
}

/// Immutable handle to a placeable object, valid across the process boundary.
///
/// Identity is the `id`; `name` is display-only and never compared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaceableObjectRef {
    pub id: String,
    pub name: String,
    pub kind: ObjectKind,
}

impl PlaceableObjectRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }
}

/// Immutable handle to a detected real-world surface.
///
/// The live surface record is refined in place by tracking updates; a ref is
/// only a snapshot used to address the surface in commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurfaceRef {
    pub id: String,
    /// Center of the detected region. Horizontal components address the
    /// footprint; the plane's height lives in `world_height`.
    pub center: Vec3,
    /// Horizontal size of the detected region's footprint.
    pub extent: Extent,
    /// World-space height of the surface plane. Orientation is implicit
    /// from the host surface: horizontal, y-up.
    pub world_height: f32,
}

impl SurfaceRef {
    pub fn new(id: impl Into<String>, center: Vec3, extent: Extent, world_height: f32) -> Self {
        Self {
            id: id.into(),
            center,
            extent,
            world_height,
        }
    }
}

// ---------------------------------------------------------------------------
// Payload value types
// ---------------------------------------------------------------------------

/// Serialized color: four normalized float channels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Color {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub alpha: f32,
}

impl Color {
    pub fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Default shape tint before any user mutation.
    pub fn light_gray() -> Self {
        Self::new(0.8, 0.8, 0.8, 1.0)
    }
}

/// Event category an actor can react to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Trigger {
    ReactBehind,
    ReactRight,
    ReactLeft,
    ReactTooClose,
}

/// One step of an actor reaction sequence.
///
/// `name` selects the host-side animation/behavior; `metadata` carries
/// action-specific parameters opaque to this crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActorAction {
    pub name: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ActorAction {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: serde_json::Value::Null,
        }
    }
}

// ---------------------------------------------------------------------------
// Tracking state
// ---------------------------------------------------------------------------

/// Tracking quality reported by the camera tracking collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
    NotAvailable,
    /// Degraded tracking with a human-readable reason.
    Limited { reason: String },
    Normal,
}

impl TrackingState {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, TrackingState::Normal)
    }
}

// ---------------------------------------------------------------------------
// Stats & config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub objects: usize,
    pub placed_objects: usize,
    pub surfaces: usize,
    pub commands_applied: u64,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fractional widening of a surface footprint when testing containment.
    pub surface_tolerance: f32,
    /// Vertical dead zone below which an object counts as already settled.
    pub settle_epsilon: f32,
    /// Vertical distance at or beyond which an object is unrelated to a
    /// surface and must not snap.
    pub settle_max_distance: f32,
    /// Settling animation speed in meters of travel per second.
    pub settle_rate: f32,
    /// Maximum logical image edge; larger images are downscaled to fit.
    pub max_image_size: u32,
    /// Delay before degraded tracking feedback is escalated, in seconds.
    pub escalation_delay_secs: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            surface_tolerance: 0.10,
            settle_epsilon: 0.001,
            settle_max_distance: 0.05,
            settle_rate: 0.002,
            max_image_size: 1024,
            escalation_delay_secs: 3.0,
        }
    }
}
