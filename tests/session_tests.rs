//! Session controller tests

#[cfg(test)]
mod tests {
    use ar_liveview::engine::PlacementEngine;
    use ar_liveview::scene::HeadlessRenderer;
    use ar_liveview::session::{
        ImageScaler, MessageCategory, OutboundSink, SessionController, StatusReporter,
        SurfaceEvent,
    };
    use ar_liveview::types::{
        Color, EngineConfig, Extent, ObjectKind, PlaceableObjectRef, SurfaceRef, TrackingState,
        Vec3,
    };
    use ar_liveview::{Envelope, LiveViewCommand};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    // -----------------------------------------------------------------------
    // Recording collaborators
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct RecordingStatus {
        messages: Mutex<Vec<String>>,
        escalations: Mutex<Vec<f32>>,
        cancellations: Mutex<Vec<MessageCategory>>,
        errors: Mutex<Vec<String>>,
        announced: Mutex<Vec<String>>,
    }

    impl StatusReporter for RecordingStatus {
        fn show_message(&self, message: &str) {
            self.messages.lock().push(message.to_string());
        }

        fn show_tracking_quality(&self, _state: &TrackingState) {}

        fn escalate_feedback(&self, _state: &TrackingState, delay_secs: f32) {
            self.escalations.lock().push(delay_secs);
        }

        fn cancel_scheduled(&self, category: MessageCategory) {
            self.cancellations.lock().push(category);
        }

        fn display_error(&self, title: &str, message: &str) {
            self.errors.lock().push(format!("{} {}", title, message));
        }

        fn announce_placement(&self, objects: &[PlaceableObjectRef]) {
            let mut announced = self.announced.lock();
            for o in objects {
                announced.push(o.name.clone());
            }
        }
    }

    struct ChannelSink {
        tx: mpsc::UnboundedSender<Envelope>,
    }

    impl OutboundSink for ChannelSink {
        fn send(&self, envelope: Envelope) {
            let _ = self.tx.send(envelope);
        }
    }

    /// Scaler that pretends every image is `reported_edge` pixels square and
    /// "scales" by reversing the bytes, so tests can spot the scaled result.
    struct FakeScaler {
        reported_edge: u32,
    }

    impl ImageScaler for FakeScaler {
        fn dimensions(&self, data: &[u8]) -> Option<(u32, u32)> {
            if data.is_empty() {
                None
            } else {
                Some((self.reported_edge, self.reported_edge))
            }
        }

        fn scale_to_fit(&self, data: &[u8], _max_edge: u32) -> Option<Vec<u8>> {
            let mut scaled = data.to_vec();
            scaled.reverse();
            Some(scaled)
        }
    }

    struct Harness {
        controller: SessionController,
        status: Arc<RecordingStatus>,
        outbound: mpsc::UnboundedReceiver<Envelope>,
    }

    fn make_harness(scaler_edge: u32) -> Harness {
        let status = Arc::new(RecordingStatus::default());
        let (tx, outbound) = mpsc::unbounded_channel();
        let engine = Arc::new(Mutex::new(PlacementEngine::new(
            EngineConfig::default(),
            Arc::new(HeadlessRenderer),
        )));
        let controller = SessionController::new(
            EngineConfig::default(),
            engine,
            status.clone(),
            Arc::new(FakeScaler {
                reported_edge: scaler_edge,
            }),
            Arc::new(ChannelSink { tx }),
        );
        Harness {
            controller,
            status,
            outbound,
        }
    }

    fn shape_ref(id: &str) -> PlaceableObjectRef {
        PlaceableObjectRef::new(id, "Cube", ObjectKind::Shape)
    }

    async fn recv_outbound(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Envelope {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for outbound envelope")
            .expect("outbound channel closed")
    }

    // -----------------------------------------------------------------------
    // Command flow
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn color_command_flows_through_to_outbound_echo() {
        let mut h = make_harness(16);
        let handle = h.controller.handle();
        let engine = h.controller.engine();
        let run = tokio::spawn(h.controller.run());

        let color = Color::new(0.2, 0.4, 0.6, 1.0);
        handle.deliver_envelope(
            LiveViewCommand::SetObjectColor {
                object: shape_ref("s1"),
                color,
            }
            .encode(),
        );

        let echo = recv_outbound(&mut h.outbound).await;
        assert_eq!(
            LiveViewCommand::decode(&echo),
            Some(LiveViewCommand::SetObjectColor {
                object: shape_ref("s1"),
                color,
            })
        );
        assert_eq!(engine.lock().stats().objects, 1);

        drop(handle);
        run.abort();
    }

    #[tokio::test]
    async fn malformed_envelopes_are_absorbed() {
        let mut h = make_harness(16);
        let handle = h.controller.handle();
        let run = tokio::spawn(h.controller.run());

        handle.deliver_envelope(Envelope::new("definitelyNotACommand", None));
        handle.deliver_envelope(Envelope::new("setObjectColor", Some(vec![0xff])));

        // The session is still alive and processing afterwards.
        handle.deliver_envelope(
            LiveViewCommand::SetObjectColor {
                object: shape_ref("s1"),
                color: Color::light_gray(),
            }
            .encode(),
        );
        let echo = recv_outbound(&mut h.outbound).await;
        assert_eq!(echo.type_tag, "setObjectColor");

        drop(handle);
        run.abort();
    }

    #[tokio::test]
    async fn invariant_violation_terminates_the_session() {
        let h = make_harness(16);
        let handle = h.controller.handle();
        let status = h.status.clone();
        let run = tokio::spawn(h.controller.run());

        // The sandbox claims an already-known shape is an actor.
        handle.deliver_envelope(
            LiveViewCommand::SetObjectColor {
                object: shape_ref("s1"),
                color: Color::light_gray(),
            }
            .encode(),
        );
        handle.deliver_envelope(
            LiveViewCommand::SetActorActions {
                actor: PlaceableObjectRef::new("s1", "Cube", ObjectKind::Actor),
                trigger: ar_liveview::Trigger::ReactBehind,
                actions: vec![],
            }
            .encode(),
        );

        let result = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("session should terminate")
            .expect("task should not panic");
        assert!(result.is_err());
        assert!(!status.errors.lock().is_empty());
    }

    // -----------------------------------------------------------------------
    // Image downscale offload
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn oversized_images_are_scaled_off_the_critical_path() {
        // Scaler reports 2048 > the 1024 bound, forcing the offload path.
        let mut h = make_harness(2048);
        let handle = h.controller.handle();
        let run = tokio::spawn(h.controller.run());

        handle.deliver_envelope(
            LiveViewCommand::SetObjectImage {
                object: shape_ref("s1"),
                image: Some(vec![1, 2, 3]),
            }
            .encode(),
        );

        // The echo carries the scaled (reversed) bytes, sent only once the
        // background result was marshaled back onto the session queue.
        let echo = recv_outbound(&mut h.outbound).await;
        assert_eq!(
            LiveViewCommand::decode(&echo),
            Some(LiveViewCommand::SetObjectImage {
                object: shape_ref("s1"),
                image: Some(vec![3, 2, 1]),
            })
        );

        drop(handle);
        run.abort();
    }

    #[tokio::test]
    async fn in_bounds_images_apply_synchronously() {
        let mut h = make_harness(512);
        let handle = h.controller.handle();
        let run = tokio::spawn(h.controller.run());

        handle.deliver_envelope(
            LiveViewCommand::SetObjectImage {
                object: shape_ref("s1"),
                image: Some(vec![9, 9]),
            }
            .encode(),
        );

        let echo = recv_outbound(&mut h.outbound).await;
        assert_eq!(
            LiveViewCommand::decode(&echo),
            Some(LiveViewCommand::SetObjectImage {
                object: shape_ref("s1"),
                image: Some(vec![9, 9]),
            })
        );

        drop(handle);
        run.abort();
    }

    // -----------------------------------------------------------------------
    // Tracking & surface lifecycle
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn degraded_tracking_escalates_and_normal_cancels() {
        let h = make_harness(16);
        let handle = h.controller.handle();
        let status = h.status.clone();
        let engine = h.controller.engine();
        let run = tokio::spawn(h.controller.run());

        handle.tracking_changed(TrackingState::Limited {
            reason: "insufficient features".into(),
        });
        handle.tracking_changed(TrackingState::Normal);

        // Surface detection clears the estimation prompt and settles state.
        handle.surface_event(SurfaceEvent::Added(SurfaceRef::new(
            "floor",
            Vec3::zero(),
            Extent::new(1.0, 1.0),
            0.0,
        )));

        // Queue is ordered: once the surface is visible, the earlier
        // tracking items have been handled.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if engine.lock().surface("floor").is_some() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("surface should be registered");

        assert_eq!(status.escalations.lock().as_slice(), [3.0]);
        assert!(status
            .cancellations
            .lock()
            .contains(&MessageCategory::TrackingStateEscalation));
        assert!(status
            .cancellations
            .lock()
            .contains(&MessageCategory::PlaneEstimation));
        assert!(status
            .messages
            .lock()
            .iter()
            .any(|m| m == "SURFACE DETECTED"));

        drop(handle);
        run.abort();
    }

    #[tokio::test]
    async fn session_fault_is_terminal_and_user_visible() {
        let h = make_harness(16);
        let handle = h.controller.handle();
        let status = h.status.clone();
        let run = tokio::spawn(h.controller.run());

        handle.session_fault("world tracking lost");

        let result = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("session should terminate")
            .expect("task should not panic");
        assert!(result.is_err());
        assert!(status.errors.lock()[0].contains("world tracking lost"));
    }

    #[tokio::test]
    async fn session_outlives_dropped_handles() {
        let h = make_harness(16);
        let handle = h.controller.handle();
        let run = tokio::spawn(h.controller.run());
        drop(handle);

        // The controller retains a sender for background-scaled results,
        // so the loop keeps running until a fault or an abort.
        let still_running = tokio::time::timeout(Duration::from_millis(100), run)
            .await
            .is_err();
        assert!(still_running);
    }

    #[tokio::test]
    async fn connection_open_resets_the_scene() {
        let h = make_harness(16);
        let handle = h.controller.handle();
        let engine = h.controller.engine();
        let run = tokio::spawn(h.controller.run());

        handle.surface_event(SurfaceEvent::Added(SurfaceRef::new(
            "floor",
            Vec3::zero(),
            Extent::new(1.0, 1.0),
            0.0,
        )));
        tokio::time::timeout(Duration::from_secs(5), async {
            while engine.lock().surface("floor").is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("surface should be registered");

        handle.connection_opened();
        tokio::time::timeout(Duration::from_secs(5), async {
            while engine.lock().surface("floor").is_some() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("reset should clear surfaces");

        drop(handle);
        run.abort();
    }
}
