//! Placement & anchoring engine – the authoritative live scene state.
//!
//! The engine exclusively owns the live collections of [`VirtualObject`]s
//! and surface records and applies decoded commands to them. It is a plain
//! synchronous state machine: the session layer serializes all mutation onto
//! it (single-writer queue), so no locking happens here.
//!
//! The core algorithmic piece is the continuous surface-settling pass: every
//! time the tracking system adds or refines a surface, each placed object is
//! re-tested against that surface's footprint and, when close enough
//! vertically, animated down (or up) onto it.

use crate::error::{LiveViewError, Result};
use crate::protocol::{Envelope, LiveViewCommand};
use crate::scene::{SceneRenderer, VirtualObject};
use crate::types::{
    ActorAction, Color, EngineConfig, EngineStats, ObjectKind, PlaceableObjectRef, Point,
    SurfaceRef, Trigger, Vec3,
};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Command effects
// ---------------------------------------------------------------------------

/// Side effects of applying one command, for the session layer to dispatch.
///
/// The engine never talks to the transport or the status layer itself; it
/// reports what must be sent and the caller publishes it.
#[derive(Debug, Default)]
pub struct CommandEffects {
    /// One-way property-change echoes back to the sandboxed process.
    pub outbound: Vec<Envelope>,
    /// Object refs to hand to the accessibility/status layer.
    pub announcements: Vec<PlaceableObjectRef>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct PlacementEngine {
    config: EngineConfig,
    objects: HashMap<String, VirtualObject>,
    surfaces: HashMap<String, SurfaceRef>,
    renderer: Arc<dyn SceneRenderer>,
    camera_vision_enabled: bool,
    commands_applied: u64,
}

impl PlacementEngine {
    pub fn new(config: EngineConfig, renderer: Arc<dyn SceneRenderer>) -> Self {
        Self {
            config,
            objects: HashMap::new(),
            surfaces: HashMap::new(),
            renderer,
            camera_vision_enabled: false,
            commands_applied: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Lookup-or-create
    // -----------------------------------------------------------------------

    /// Resolve a wire reference to its live object, creating an empty shell
    /// of the ref's declared kind when the id is unseen.
    ///
    /// This is the only creation path for virtual objects and it never fails
    /// for a well-formed ref.
    fn resolve_or_create(&mut self, object: &PlaceableObjectRef) -> &mut VirtualObject {
        self.objects
            .entry(object.id.clone())
            .or_insert_with(|| {
                debug!("Creating shell object {} ({:?})", object.id, object.kind);
                VirtualObject::shell(object)
            })
    }

    pub fn object(&self, id: &str) -> Option<&VirtualObject> {
        self.objects.get(id)
    }

    pub fn surface(&self, id: &str) -> Option<&SurfaceRef> {
        self.surfaces.get(id)
    }

    pub fn camera_vision_enabled(&self) -> bool {
        self.camera_vision_enabled
    }

    // -----------------------------------------------------------------------
    // Command application
    // -----------------------------------------------------------------------

    /// Apply one decoded command.
    ///
    /// A decoded command is fully well-formed (the codec is the single
    /// validation point); failures here are lifecycle races or contract
    /// breaks, classified by the returned error variant.
    pub fn apply(&mut self, command: LiveViewCommand) -> Result<CommandEffects> {
        self.commands_applied += 1;
        let mut effects = CommandEffects::default();

        match command {
            LiveViewCommand::EnableCameraVision => {
                self.camera_vision_enabled = true;
            }

            LiveViewCommand::PlaceObjectOnPlane {
                object,
                plane,
                position,
            } => {
                self.place_object_on_plane(&object, &plane, position)?;
            }

            LiveViewCommand::SetObjectColor { object, color } => {
                effects.outbound.push(self.set_object_color(&object, color)?);
            }

            LiveViewCommand::SetObjectImage { object, image } => {
                // Payload-absent images are silently dropped on the encode
                // side; a missing image here means the same thing.
                match image {
                    Some(bytes) => {
                        effects.outbound.push(self.set_object_image(&object, bytes)?);
                    }
                    None => warn!("No image attached for object {}", object.id),
                }
            }

            LiveViewCommand::SetActorActions {
                actor,
                trigger,
                actions,
            } => {
                self.set_actor_actions(&actor, trigger, actions)?;
            }

            LiveViewCommand::AnnounceObjectPlacement { objects } => {
                effects.announcements = objects;
            }
        }

        Ok(effects)
    }

    /// Bind an object to a detected surface at a surface-local position.
    ///
    /// The plane is resolved against the *live* surface set: the ref in the
    /// command may be stale (surface removed between detection and
    /// placement), which is a recoverable lookup failure, not a crash.
    pub fn place_object_on_plane(
        &mut self,
        object: &PlaceableObjectRef,
        plane: &SurfaceRef,
        position: Point,
    ) -> Result<()> {
        let surface = self
            .surfaces
            .get(&plane.id)
            .cloned()
            .ok_or_else(|| {
                LiveViewError::UnknownReference(format!("no surface with id {}", plane.id))
            })?;

        let world = Vec3::new(
            surface.center.x + position.x,
            surface.world_height,
            surface.center.z + position.y,
        );

        let renderer = self.renderer.clone();
        let obj = self.resolve_or_create(object);
        if obj.model_path.is_empty() && !obj.name.is_empty() {
            obj.model_path = format!("Models/{}.scn", obj.name);
        }

        obj.set_position(renderer.as_ref(), world);
        obj.has_been_placed = true;
        obj.load_model(renderer.as_ref());

        info!(
            "Placed {} on surface {} at {}",
            object.id, surface.id, world
        );
        Ok(())
    }

    /// Set a shape's color and build the one-way outbound echo.
    ///
    /// Host-side mutation notifies the sandboxed process exactly once; the
    /// echo is never re-decoded by this host (no two-way sync).
    pub fn set_object_color(
        &mut self,
        object: &PlaceableObjectRef,
        color: Color,
    ) -> Result<Envelope> {
        let obj = self.resolve_or_create(object);
        let resolved_kind = obj.kind();
        let shape = obj.as_shape_mut().ok_or_else(|| {
            LiveViewError::KindMismatch(format!(
                "setObjectColor targets {} which is {:?}, not a shape",
                object.id, resolved_kind
            ))
        })?;
        shape.color = color;

        Ok(LiveViewCommand::SetObjectColor {
            object: object.clone(),
            color,
        }
        .encode())
    }

    /// Set a shape's image (bytes already within the host size bound) and
    /// build the one-way outbound echo.
    pub fn set_object_image(
        &mut self,
        object: &PlaceableObjectRef,
        image: Vec<u8>,
    ) -> Result<Envelope> {
        let obj = self.resolve_or_create(object);
        let resolved_kind = obj.kind();
        let shape = obj.as_shape_mut().ok_or_else(|| {
            LiveViewError::KindMismatch(format!(
                "setObjectImage targets {} which is {:?}, not a shape",
                object.id, resolved_kind
            ))
        })?;
        shape.image = Some(image.clone());

        Ok(LiveViewCommand::SetObjectImage {
            object: object.clone(),
            image: Some(image),
        }
        .encode())
    }

    /// Resolve-or-create the target of an inbound image command and check
    /// the shape capability before the bytes leave the critical path for
    /// background scaling. The kind mismatch must surface at command time,
    /// not when the scaled result lands.
    pub fn prepare_image_target(&mut self, object: &PlaceableObjectRef) -> Result<()> {
        let obj = self.resolve_or_create(object);
        let resolved_kind = obj.kind();
        if obj.as_shape_mut().is_some() {
            Ok(())
        } else {
            Err(LiveViewError::KindMismatch(format!(
                "setObjectImage targets {} which is {:?}, not a shape",
                object.id, resolved_kind
            )))
        }
    }

    /// Append actions to one of an actor's trigger lists.
    ///
    /// Unlike the color/image path, resolving a non-actor here is fatal:
    /// action wiring only happens for objects the sandboxed process itself
    /// declared as actors, so a mismatch is a contract break, not a race.
    pub fn set_actor_actions(
        &mut self,
        actor: &PlaceableObjectRef,
        trigger: Trigger,
        actions: Vec<ActorAction>,
    ) -> Result<()> {
        let obj = self.resolve_or_create(actor);
        let resolved_kind = obj.kind();
        let state = obj.as_actor_mut().ok_or_else(|| {
            LiveViewError::InvariantViolation(format!(
                "setActorActions targets {} which is {:?}, not an actor",
                actor.id, resolved_kind
            ))
        })?;
        state.reactions.append(trigger, actions);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Surface lifecycle & settling
    // -----------------------------------------------------------------------

    /// Register a newly detected surface and settle placed objects onto it.
    /// Returns how many objects were scheduled to snap.
    pub fn surface_added(&mut self, surface: SurfaceRef) -> usize {
        debug!("Surface {} detected", surface.id);
        self.surfaces.insert(surface.id.clone(), surface.clone());
        self.settle_all_onto(&surface)
    }

    /// Refresh a surface's geometry in place and re-run settling.
    ///
    /// Tracking refines surfaces incrementally, so the settle rule is
    /// re-evaluated independently on every update event.
    pub fn surface_updated(&mut self, surface: SurfaceRef) -> usize {
        self.surfaces.insert(surface.id.clone(), surface.clone());
        self.settle_all_onto(&surface)
    }

    pub fn surface_removed(&mut self, id: &str) {
        if self.surfaces.remove(id).is_some() {
            debug!("Surface {} removed", id);
        }
    }

    fn settle_all_onto(&mut self, surface: &SurfaceRef) -> usize {
        let renderer = self.renderer.clone();
        let config = self.config.clone();
        let mut scheduled = 0;

        for obj in self.objects.values_mut() {
            if !obj.has_been_placed || !obj.is_model_loaded {
                continue;
            }
            if let Some((target_y, duration)) =
                settle_decision(&config, surface, obj.position())
            {
                obj.animate_height(renderer.as_ref(), target_y, duration);
                scheduled += 1;
            }
        }

        scheduled
    }

    // -----------------------------------------------------------------------
    // Frame update
    // -----------------------------------------------------------------------

    /// Read-only per-frame query: ids of loaded actors due a reaction tick.
    ///
    /// Runs at render pace, concurrently with queued writes, so it takes no
    /// references into mutable state.
    pub fn actors_to_tick(&self) -> Vec<String> {
        self.objects
            .values()
            .filter(|o| o.is_model_loaded && o.kind() == ObjectKind::Actor)
            .map(|o| o.id.clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Lifecycle & stats
    // -----------------------------------------------------------------------

    /// Discard live scene state for a fresh run.
    ///
    /// Geometry is detached and surfaces dropped, but object shells (color,
    /// reaction lists…) persist so properties set before placement survive a
    /// reload. In-flight background work targeting removed placements is
    /// dropped safely when it lands.
    pub fn reset(&mut self) {
        info!("Resetting scene state");
        let renderer = self.renderer.clone();
        for obj in self.objects.values_mut() {
            obj.unload_model(renderer.as_ref());
            obj.has_been_placed = false;
        }
        self.surfaces.clear();
        self.camera_vision_enabled = false;
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            objects: self.objects.len(),
            placed_objects: self.objects.values().filter(|o| o.has_been_placed).count(),
            surfaces: self.surfaces.len(),
            commands_applied: self.commands_applied,
        }
    }
}

// ---------------------------------------------------------------------------
// Settle rule
// ---------------------------------------------------------------------------

/// Decide whether an object at `position` should snap onto `surface`.
///
/// Returns `(target_height, animation_duration_secs)` when a snap is due:
/// the object's horizontal position must fall inside the surface footprint
/// widened by the tolerance margin, and its vertical offset must lie
/// strictly between the dead-zone epsilon (already settled) and the maximum
/// snap distance (belongs to some other surface).
pub fn settle_decision(
    config: &EngineConfig,
    surface: &SurfaceRef,
    position: Vec3,
) -> Option<(f32, f32)> {
    let tol = config.surface_tolerance;

    // Footprint half-sizes, each widened by the tolerance margin.
    let half_x = surface.extent.x / 2.0 * (1.0 + tol);
    let half_z = surface.extent.z / 2.0 * (1.0 + tol);

    let min_x = surface.center.x - half_x;
    let max_x = surface.center.x + half_x;
    let min_z = surface.center.z - half_z;
    let max_z = surface.center.z + half_z;

    if position.x < min_x || position.x > max_x || position.z < min_z || position.z > max_z {
        return None;
    }

    let distance = (position.y - surface.world_height).abs();
    if distance <= config.settle_epsilon || distance >= config.settle_max_distance {
        return None;
    }

    Some((surface.world_height, distance / config.settle_rate))
}
