//! Codec unit tests

#[cfg(test)]
mod tests {
    use ar_liveview::types::{
        ActorAction, Color, Extent, ObjectKind, PlaceableObjectRef, Point, SurfaceRef, Trigger,
        Vec3,
    };
    use ar_liveview::{CommandTag, Envelope, LiveViewCommand};

    fn gem_ref() -> PlaceableObjectRef {
        PlaceableObjectRef::new("gem-1", "Gem", ObjectKind::Gem)
    }

    fn shape_ref() -> PlaceableObjectRef {
        PlaceableObjectRef::new("shape-1", "Cube", ObjectKind::Shape)
    }

    fn actor_ref() -> PlaceableObjectRef {
        PlaceableObjectRef::new("actor-1", "Robot", ObjectKind::Actor)
    }

    fn plane() -> SurfaceRef {
        SurfaceRef::new("plane-1", Vec3::new(0.5, 0.0, -0.25), Extent::new(1.2, 0.8), -0.4)
    }

    fn round_trip(command: LiveViewCommand) {
        let envelope = command.encode();
        let decoded = LiveViewCommand::decode(&envelope);
        assert_eq!(decoded, Some(command));
    }

    // -----------------------------------------------------------------------
    // Round-trip per variant
    // -----------------------------------------------------------------------

    #[test]
    fn enable_camera_vision_round_trips_without_payload() {
        let envelope = LiveViewCommand::EnableCameraVision.encode();
        assert_eq!(envelope.type_tag, "enableCameraVision");
        assert!(envelope.payload.is_none());
        assert_eq!(
            LiveViewCommand::decode(&envelope),
            Some(LiveViewCommand::EnableCameraVision)
        );
    }

    #[test]
    fn place_object_on_plane_round_trips() {
        round_trip(LiveViewCommand::PlaceObjectOnPlane {
            object: gem_ref(),
            plane: plane(),
            position: Point::new(0.1, -0.2),
        });
    }

    #[test]
    fn place_on_zero_extent_plane_round_trips() {
        round_trip(LiveViewCommand::PlaceObjectOnPlane {
            object: gem_ref(),
            plane: SurfaceRef::new("p", Vec3::zero(), Extent::new(0.0, 0.0), 0.0),
            position: Point::new(0.0, 0.0),
        });
    }

    #[test]
    fn zero_length_identifiers_round_trip() {
        round_trip(LiveViewCommand::SetObjectColor {
            object: PlaceableObjectRef::new("", "", ObjectKind::Shape),
            color: Color::new(0.0, 0.5, 1.0, 1.0),
        });
    }

    #[test]
    fn set_object_color_round_trips() {
        round_trip(LiveViewCommand::SetObjectColor {
            object: shape_ref(),
            color: Color::new(0.25, 0.5, 0.75, 1.0),
        });
    }

    #[test]
    fn set_object_image_round_trips() {
        round_trip(LiveViewCommand::SetObjectImage {
            object: shape_ref(),
            image: Some(vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a]),
        });
    }

    #[test]
    fn set_actor_actions_round_trips() {
        round_trip(LiveViewCommand::SetActorActions {
            actor: actor_ref(),
            trigger: Trigger::ReactTooClose,
            actions: vec![ActorAction::named("jump"), ActorAction::named("spin")],
        });
    }

    #[test]
    fn empty_action_sequence_round_trips() {
        round_trip(LiveViewCommand::SetActorActions {
            actor: actor_ref(),
            trigger: Trigger::ReactBehind,
            actions: vec![],
        });
    }

    #[test]
    fn announce_object_placement_round_trips() {
        round_trip(LiveViewCommand::AnnounceObjectPlacement {
            objects: vec![gem_ref(), shape_ref(), actor_ref()],
        });
        round_trip(LiveViewCommand::AnnounceObjectPlacement { objects: vec![] });
    }

    // -----------------------------------------------------------------------
    // Decode robustness – always "no value", never a panic
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_tag_decodes_to_none() {
        let envelope = Envelope::new("warpToMoon", Some(b"{}".to_vec()));
        assert_eq!(LiveViewCommand::decode(&envelope), None);
    }

    #[test]
    fn required_payload_absent_decodes_to_none() {
        for tag in [
            "placeObjectOnPlane",
            "setObjectColor",
            "setObjectImage",
            "setActorActions",
            "announceObjectPlacement",
        ] {
            let envelope = Envelope::new(tag, None);
            assert_eq!(LiveViewCommand::decode(&envelope), None, "tag {}", tag);
        }
    }

    #[test]
    fn garbled_payload_decodes_to_none() {
        let envelope = Envelope::new("setObjectColor", Some(vec![0xff, 0x00, 0x13]));
        assert_eq!(LiveViewCommand::decode(&envelope), None);

        // Valid JSON, wrong shape.
        let envelope = Envelope::new("setActorActions", Some(b"{\"actor\": 42}".to_vec()));
        assert_eq!(LiveViewCommand::decode(&envelope), None);
    }

    #[test]
    fn stray_payload_on_payloadless_tag_is_ignored() {
        let envelope = Envelope::new("enableCameraVision", Some(b"junk".to_vec()));
        assert_eq!(
            LiveViewCommand::decode(&envelope),
            Some(LiveViewCommand::EnableCameraVision)
        );
    }

    // -----------------------------------------------------------------------
    // Image-payload quirk
    // -----------------------------------------------------------------------

    #[test]
    fn missing_image_encodes_to_absent_payload() {
        let envelope = LiveViewCommand::SetObjectImage {
            object: shape_ref(),
            image: None,
        }
        .encode();
        assert_eq!(envelope.type_tag, "setObjectImage");
        assert!(envelope.payload.is_none(), "expected payload-absent envelope");
        // Receivers treat the absence as "do nothing": decode yields no value.
        assert_eq!(LiveViewCommand::decode(&envelope), None);
    }

    // -----------------------------------------------------------------------
    // Tags & determinism
    // -----------------------------------------------------------------------

    #[test]
    fn tags_parse_back_to_themselves() {
        for tag in [
            CommandTag::EnableCameraVision,
            CommandTag::PlaceObjectOnPlane,
            CommandTag::SetObjectColor,
            CommandTag::SetObjectImage,
            CommandTag::SetActorActions,
            CommandTag::AnnounceObjectPlacement,
        ] {
            assert_eq!(CommandTag::parse(tag.as_str()), Some(tag));
        }
        assert_eq!(CommandTag::parse("setobjectcolor"), None);
    }

    #[test]
    fn encoding_is_deterministic() {
        let command = LiveViewCommand::PlaceObjectOnPlane {
            object: gem_ref(),
            plane: plane(),
            position: Point::new(0.3, 0.4),
        };
        assert_eq!(command.encode(), command.encode());
    }
}
