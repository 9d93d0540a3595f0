//! Scene subsystem: live virtual objects, their kind-tagged state, and the
//! `SceneRenderer` seam to the platform 3-D engine.
//!
//! A [`VirtualObject`] is the host-side counterpart of a
//! [`PlaceableObjectRef`]: it exists as an empty shell from the first command
//! that references its id, loads geometry lazily on first real placement, and
//! keeps its shell state (color, reaction lists…) across unload/reload so
//! properties set before placement survive.

use crate::types::{
    ActorAction, Color, ObjectKind, PlaceableObjectRef, Trigger, Vec3,
};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Renderer seam
// ---------------------------------------------------------------------------

/// The rendering engine as seen from this crate.
///
/// Implementations wrap the platform scene graph; this crate never touches
/// nodes directly. Rendering correctness is out of scope here.
pub trait SceneRenderer: Send + Sync {
    /// Attach the model at `model_path` under the object's root node.
    /// Returns false when the model asset could not be resolved.
    fn add_geometry(&self, object_id: &str, model_path: &str) -> bool;

    /// Detach all geometry under the object's root node.
    fn remove_geometry(&self, object_id: &str);

    /// Move the object, optionally animating over `animate_secs`.
    fn set_position(&self, object_id: &str, position: Vec3, animate_secs: Option<f32>);

    /// Rotate the object around the vertical axis, optionally animated.
    fn set_rotation(&self, object_id: &str, rotation_y: f32, animate_secs: Option<f32>);

    /// Enumerate light-emitting sub-nodes as `(handle, original_intensity)`.
    fn light_nodes(&self, object_id: &str) -> Vec<(String, f32)>;
}

// ---------------------------------------------------------------------------
// Kind-tagged state
// ---------------------------------------------------------------------------

/// Per-trigger, append-only reaction sequences for one actor.
///
/// Commands only ever grow these lists; they are never replaced wholesale
/// across the lifetime of an actor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorReactionSet {
    pub behind: Vec<ActorAction>,
    pub turn_right: Vec<ActorAction>,
    pub turn_left: Vec<ActorAction>,
    pub too_close: Vec<ActorAction>,
}

impl ActorReactionSet {
    pub fn append(&mut self, trigger: Trigger, actions: Vec<ActorAction>) {
        let list = match trigger {
            Trigger::ReactBehind => &mut self.behind,
            Trigger::ReactRight => &mut self.turn_right,
            Trigger::ReactLeft => &mut self.turn_left,
            Trigger::ReactTooClose => &mut self.too_close,
        };
        list.extend(actions);
    }

    pub fn for_trigger(&self, trigger: Trigger) -> &[ActorAction] {
        match trigger {
            Trigger::ReactBehind => &self.behind,
            Trigger::ReactRight => &self.turn_right,
            Trigger::ReactLeft => &self.turn_left,
            Trigger::ReactTooClose => &self.too_close,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorState {
    pub reactions: ActorReactionSet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeState {
    pub color: Color,
    /// Raw encoded image bytes, already scaled to the host bound.
    pub image: Option<Vec<u8>>,
}

impl Default for ShapeState {
    fn default() -> Self {
        Self {
            color: Color::light_gray(),
            image: None,
        }
    }
}

/// Capability-restricted object state, tagged by kind.
///
/// Color/image live only on shapes and reaction lists only on actors, so an
/// illegal operation is an explicit-check boundary rather than a cast.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectState {
    Unknown,
    Gem,
    Actor(ActorState),
    Shape(ShapeState),
}

impl ObjectState {
    pub fn for_kind(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Unknown => ObjectState::Unknown,
            ObjectKind::Gem => ObjectState::Gem,
            ObjectKind::Actor => ObjectState::Actor(ActorState::default()),
            ObjectKind::Shape => ObjectState::Shape(ShapeState::default()),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectState::Unknown => ObjectKind::Unknown,
            ObjectState::Gem => ObjectKind::Gem,
            ObjectState::Actor(_) => ObjectKind::Actor,
            ObjectState::Shape(_) => ObjectKind::Shape,
        }
    }
}

// ---------------------------------------------------------------------------
// Virtual object
// ---------------------------------------------------------------------------

/// The live, mutable counterpart of a placeable object inside the host.
#[derive(Debug, Clone)]
pub struct VirtualObject {
    pub id: String,
    pub name: String,
    pub state: ObjectState,
    /// Asset location the renderer resolves on load.
    pub model_path: String,
    pub is_model_loaded: bool,
    /// True once the object has actually been placed in the scene and is
    /// visible. Objects can be created and configured without ever being
    /// placed; settling only touches placed objects.
    pub has_been_placed: bool,
    position: Vec3,
    rotation_y: f32,
    /// Light-emitting sub-nodes and their original intensities, captured at
    /// load time for ambient light estimation.
    light_sources: HashMap<String, f32>,
}

impl VirtualObject {
    /// Build an empty shell for a reference. This is the only creation path;
    /// geometry is loaded later, on first real placement.
    pub fn shell(object: &PlaceableObjectRef) -> Self {
        Self {
            id: object.id.clone(),
            name: object.name.clone(),
            state: ObjectState::for_kind(object.kind),
            model_path: String::new(),
            is_model_loaded: false,
            has_been_placed: false,
            position: Vec3::zero(),
            rotation_y: 0.0,
            light_sources: HashMap::new(),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.state.kind()
    }

    /// Rebuild the wire reference for this object.
    pub fn placeable_ref(&self) -> PlaceableObjectRef {
        PlaceableObjectRef::new(self.id.clone(), self.name.clone(), self.kind())
    }

    pub fn as_shape_mut(&mut self) -> Option<&mut ShapeState> {
        match &mut self.state {
            ObjectState::Shape(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_actor_mut(&mut self) -> Option<&mut ActorState> {
        match &mut self.state {
            ObjectState::Actor(a) => Some(a),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Geometry-dependent accessors
    // -----------------------------------------------------------------------

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Current rotation around the vertical axis.
    ///
    /// Panics when the model is not loaded: callers must check
    /// `is_model_loaded` first, an unloaded read is a programming error
    /// rather than a recoverable condition.
    pub fn rotation(&self) -> f32 {
        assert!(
            self.is_model_loaded,
            "rotation read on unloaded object {}",
            self.id
        );
        self.rotation_y
    }

    pub fn set_position(&mut self, renderer: &dyn SceneRenderer, position: Vec3) {
        self.position = position;
        renderer.set_position(&self.id, position, None);
    }

    /// Animate only the vertical coordinate; used by surface settling.
    pub fn animate_height(&mut self, renderer: &dyn SceneRenderer, y: f32, duration_secs: f32) {
        self.position.y = y;
        renderer.set_position(&self.id, self.position, Some(duration_secs));
    }

    pub fn set_rotation(&mut self, renderer: &dyn SceneRenderer, rotation_y: f32) {
        assert!(
            self.is_model_loaded,
            "rotation write on unloaded object {}",
            self.id
        );
        self.rotation_y = rotation_y;
        renderer.set_rotation(&self.id, rotation_y, None);
    }

    // -----------------------------------------------------------------------
    // Model lifecycle
    // -----------------------------------------------------------------------

    pub fn has_built_in_light_sources(&self) -> bool {
        !self.light_sources.is_empty()
    }

    pub fn light_sources(&self) -> &HashMap<String, f32> {
        &self.light_sources
    }

    /// Load geometry and capture light sources. No-op when the asset path is
    /// unset or the model is already attached.
    pub fn load_model(&mut self, renderer: &dyn SceneRenderer) {
        if self.is_model_loaded || self.model_path.is_empty() {
            return;
        }

        if !renderer.add_geometry(&self.id, &self.model_path) {
            log::warn!("Model asset not found for object {}: {}", self.id, self.model_path);
            return;
        }

        self.light_sources = renderer.light_nodes(&self.id).into_iter().collect();
        self.is_model_loaded = true;
    }

    /// Detach geometry and drop light bookkeeping. Shell state (kind state,
    /// name, id) survives so a later reload sees the same properties.
    pub fn unload_model(&mut self, renderer: &dyn SceneRenderer) {
        if self.is_model_loaded {
            renderer.remove_geometry(&self.id);
        }
        self.light_sources.clear();
        self.is_model_loaded = false;
    }
}

// ---------------------------------------------------------------------------
// Headless renderer
// ---------------------------------------------------------------------------

/// Renderer that resolves every asset and renders nothing. Used by the
/// standalone host binary and in tests; real deployments wrap the platform
/// scene graph.
pub struct HeadlessRenderer;

impl SceneRenderer for HeadlessRenderer {
    fn add_geometry(&self, object_id: &str, model_path: &str) -> bool {
        log::debug!("[render] attach {} -> {}", model_path, object_id);
        true
    }

    fn remove_geometry(&self, object_id: &str) {
        log::debug!("[render] detach {}", object_id);
    }

    fn set_position(&self, object_id: &str, position: Vec3, animate_secs: Option<f32>) {
        log::debug!(
            "[render] move {} to {} (animate: {:?})",
            object_id,
            position,
            animate_secs
        );
    }

    fn set_rotation(&self, object_id: &str, rotation_y: f32, animate_secs: Option<f32>) {
        log::debug!(
            "[render] rotate {} to {:.3} (animate: {:?})",
            object_id,
            rotation_y,
            animate_secs
        );
    }

    fn light_nodes(&self, _object_id: &str) -> Vec<(String, f32)> {
        Vec::new()
    }
}
