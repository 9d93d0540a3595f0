//! Live-view wire protocol.
//!
//! This module owns **every message that crosses the process boundary**
//! between the sandboxed user process and the live rendering host.
//!
//! ## Envelope
//!
//! One command or notification travels as `(type_tag, payload)` where the
//! payload is an optional JSON byte sequence. Transport delivery order is
//! preserved; the protocol is fire-and-forget (no acknowledgements).
//!
//! | Type tag                  | Direction       | Payload                         |
//! |---------------------------|-----------------|---------------------------------|
//! | `enableCameraVision`      | sandbox → host  | *(none)*                        |
//! | `placeObjectOnPlane`      | sandbox → host  | object, plane, position         |
//! | `setObjectColor`          | both            | object, color                   |
//! | `setObjectImage`          | both            | object, image bytes             |
//! | `setActorActions`         | sandbox → host  | actor, trigger, actions         |
//! | `announceObjectPlacement` | sandbox → host  | ordered object refs             |
//!
//! `setObjectColor` / `setObjectImage` also flow host → sandbox as the
//! one-way property-change echo; the sender never re-decodes them.
//!
//! ## Design rules
//!
//! 1. Every payload struct is `Serialize + Deserialize` with snake_case JSON.
//! 2. [`decode`](LiveViewCommand::decode) is the single point of defensive
//!    validation: it returns `None` for an unknown tag, an absent required
//!    payload, or unparseable payload bytes — it never panics. A decoded
//!    command is fully well-formed; receivers do not re-validate shapes.
//! 3. Encoding is deterministic, so `decode(encode(c)) == c` for every legal
//!    field value.
//! 4. Quirk kept from the source system: encoding `setObjectImage` with no
//!    rasterizable image yields a payload-absent envelope, not an error.
//!    Receivers must treat payload absence there as "do nothing".

use crate::types::{ActorAction, Color, PlaceableObjectRef, Point, SurfaceRef, Trigger};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The transport unit: a string type tag plus optional payload bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub type_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
}

impl Envelope {
    pub fn new(type_tag: impl Into<String>, payload: Option<Vec<u8>>) -> Self {
        Self {
            type_tag: type_tag.into(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Type tags
// ---------------------------------------------------------------------------

/// String-valued enumerator naming each command variant on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandTag {
    EnableCameraVision,
    PlaceObjectOnPlane,
    SetObjectColor,
    SetObjectImage,
    SetActorActions,
    AnnounceObjectPlacement,
}

impl CommandTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandTag::EnableCameraVision => "enableCameraVision",
            CommandTag::PlaceObjectOnPlane => "placeObjectOnPlane",
            CommandTag::SetObjectColor => "setObjectColor",
            CommandTag::SetObjectImage => "setObjectImage",
            CommandTag::SetActorActions => "setActorActions",
            CommandTag::AnnounceObjectPlacement => "announceObjectPlacement",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "enableCameraVision" => Some(CommandTag::EnableCameraVision),
            "placeObjectOnPlane" => Some(CommandTag::PlaceObjectOnPlane),
            "setObjectColor" => Some(CommandTag::SetObjectColor),
            "setObjectImage" => Some(CommandTag::SetObjectImage),
            "setActorActions" => Some(CommandTag::SetActorActions),
            "announceObjectPlacement" => Some(CommandTag::AnnounceObjectPlacement),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlaceObjectOnPlanePayload {
    object: PlaceableObjectRef,
    plane: SurfaceRef,
    position: Point,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectColorPayload {
    object: PlaceableObjectRef,
    color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectImagePayload {
    object: PlaceableObjectRef,
    image_data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActorActionsPayload {
    actor: PlaceableObjectRef,
    trigger: Trigger,
    actions: Vec<ActorAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectsPlacedPayload {
    objects: Vec<PlaceableObjectRef>,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// The closed set of commands understood by the live view.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveViewCommand {
    EnableCameraVision,
    PlaceObjectOnPlane {
        object: PlaceableObjectRef,
        plane: SurfaceRef,
        position: Point,
    },
    SetObjectColor {
        object: PlaceableObjectRef,
        color: Color,
    },
    SetObjectImage {
        object: PlaceableObjectRef,
        /// `None` when the image could not be rasterized on the sending
        /// side. Encodes to a payload-absent envelope (see module docs).
        image: Option<Vec<u8>>,
    },
    SetActorActions {
        actor: PlaceableObjectRef,
        trigger: Trigger,
        actions: Vec<ActorAction>,
    },
    AnnounceObjectPlacement {
        objects: Vec<PlaceableObjectRef>,
    },
}

impl LiveViewCommand {
    pub fn tag(&self) -> CommandTag {
        match self {
            LiveViewCommand::EnableCameraVision => CommandTag::EnableCameraVision,
            LiveViewCommand::PlaceObjectOnPlane { .. } => CommandTag::PlaceObjectOnPlane,
            LiveViewCommand::SetObjectColor { .. } => CommandTag::SetObjectColor,
            LiveViewCommand::SetObjectImage { .. } => CommandTag::SetObjectImage,
            LiveViewCommand::SetActorActions { .. } => CommandTag::SetActorActions,
            LiveViewCommand::AnnounceObjectPlacement { .. } => CommandTag::AnnounceObjectPlacement,
        }
    }

    /// Serialize this command into its wire envelope.
    ///
    /// Serialization of the payload structs cannot fail (no maps with
    /// non-string keys, no non-finite-only types), so this is infallible.
    pub fn encode(&self) -> Envelope {
        let tag = self.tag();
        let payload = match self {
            LiveViewCommand::EnableCameraVision => None,

            LiveViewCommand::PlaceObjectOnPlane {
                object,
                plane,
                position,
            } => to_payload(&PlaceObjectOnPlanePayload {
                object: object.clone(),
                plane: plane.clone(),
                position: *position,
            }),

            LiveViewCommand::SetObjectColor { object, color } => to_payload(&ObjectColorPayload {
                object: object.clone(),
                color: *color,
            }),

            // Quirk kept from the source system: a missing image encodes to
            // no payload at all. The receiving side drops the command
            // silently instead of failing loudly.
            LiveViewCommand::SetObjectImage { object, image } => {
                image.as_ref().and_then(|data| {
                    to_payload(&ObjectImagePayload {
                        object: object.clone(),
                        image_data: data.clone(),
                    })
                })
            }

            LiveViewCommand::SetActorActions {
                actor,
                trigger,
                actions,
            } => to_payload(&ActorActionsPayload {
                actor: actor.clone(),
                trigger: *trigger,
                actions: actions.clone(),
            }),

            LiveViewCommand::AnnounceObjectPlacement { objects } => {
                to_payload(&ObjectsPlacedPayload {
                    objects: objects.clone(),
                })
            }
        };

        Envelope::new(tag.as_str(), payload)
    }

    /// Decode a wire envelope into exactly one command, or `None`.
    ///
    /// `None` means: unrecognized tag, required payload absent, or payload
    /// bytes that do not parse into the expected shape. This is the single
    /// point of defensive validation for inbound traffic.
    pub fn decode(envelope: &Envelope) -> Option<Self> {
        let tag = CommandTag::parse(&envelope.type_tag)?;
        let payload = envelope.payload.as_deref();

        match tag {
            CommandTag::EnableCameraVision => Some(LiveViewCommand::EnableCameraVision),

            CommandTag::PlaceObjectOnPlane => {
                let p: PlaceObjectOnPlanePayload = from_payload(payload?)?;
                Some(LiveViewCommand::PlaceObjectOnPlane {
                    object: p.object,
                    plane: p.plane,
                    position: p.position,
                })
            }

            CommandTag::SetObjectColor => {
                let p: ObjectColorPayload = from_payload(payload?)?;
                Some(LiveViewCommand::SetObjectColor {
                    object: p.object,
                    color: p.color,
                })
            }

            CommandTag::SetObjectImage => {
                let p: ObjectImagePayload = from_payload(payload?)?;
                Some(LiveViewCommand::SetObjectImage {
                    object: p.object,
                    image: Some(p.image_data),
                })
            }

            CommandTag::SetActorActions => {
                let p: ActorActionsPayload = from_payload(payload?)?;
                Some(LiveViewCommand::SetActorActions {
                    actor: p.actor,
                    trigger: p.trigger,
                    actions: p.actions,
                })
            }

            CommandTag::AnnounceObjectPlacement => {
                let p: ObjectsPlacedPayload = from_payload(payload?)?;
                Some(LiveViewCommand::AnnounceObjectPlacement { objects: p.objects })
            }
        }
    }
}

fn to_payload<T: Serialize>(value: &T) -> Option<Vec<u8>> {
    match serde_json::to_vec(value) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            // Unreachable for the payload structs above; logged rather than
            // propagated so encode stays infallible at the call sites.
            log::error!("Failed to serialize protocol payload: {}", e);
            None
        }
    }
}

fn from_payload<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Option<T> {
    serde_json::from_slice(bytes).ok()
}
