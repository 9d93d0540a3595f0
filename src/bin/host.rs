//! ar-liveview-host binary
//!
//! Standalone live-view host: reads command envelopes and simulated tracking
//! events as JSON lines on stdin, drives the placement engine, and writes
//! outbound notification envelopes as JSON lines on stdout.
//!
//! ## Configuration (flags / env)
//!
//! | Key                               | Default | Description                     |
//! |-----------------------------------|---------|---------------------------------|
//! | `LIVEVIEW_MAX_IMAGE_SIZE`         | `1024`  | Max logical image edge          |
//! | `LIVEVIEW_ESCALATION_DELAY_SECS`  | `3.0`   | Degraded-tracking escalation    |
//! | `LIVEVIEW_SETTLE_MAX_DISTANCE`    | `0.05`  | Max vertical snap distance (m)  |

use anyhow::Result;
use ar_liveview::engine::PlacementEngine;
use ar_liveview::scene::HeadlessRenderer;
use ar_liveview::session::{
    LoggingStatusReporter, OutboundSink, PassthroughImageScaler, SessionController, SurfaceEvent,
};
use ar_liveview::{Envelope, EngineConfig, SurfaceRef, TrackingState};
use bytes::Bytes;
use clap::Parser;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "ar-liveview-host", about = "AR Sandbox Live-View Host", version)]
struct Args {
    /// Max logical image edge before downscaling kicks in
    #[arg(long, env = "LIVEVIEW_MAX_IMAGE_SIZE", default_value_t = 1024)]
    max_image_size: u32,

    /// Delay before degraded tracking feedback escalates (seconds)
    #[arg(long, env = "LIVEVIEW_ESCALATION_DELAY_SECS", default_value_t = 3.0)]
    escalation_delay_secs: f32,

    /// Max vertical distance for surface settling (meters)
    #[arg(long, env = "LIVEVIEW_SETTLE_MAX_DISTANCE", default_value_t = 0.05)]
    settle_max_distance: f32,
}

// ---------------------------------------------------------------------------
// Harness input
// ---------------------------------------------------------------------------

/// One stdin line: a command envelope or a simulated tracking event.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum HostInput {
    Command(Envelope),
    SurfaceAdded(SurfaceRef),
    SurfaceUpdated(SurfaceRef),
    SurfaceRemoved { id: String },
    Tracking(TrackingState),
    Fault { reason: String },
}

// ---------------------------------------------------------------------------
// Outbound sink
// ---------------------------------------------------------------------------

/// Queues outbound envelopes for the stdout writer task.
struct StdoutSink {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl OutboundSink for StdoutSink {
    fn send(&self, envelope: Envelope) {
        let _ = self.tx.send(envelope);
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ar_liveview=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    log::info!(
        "Starting ar-liveview-host (max_image_size={}, escalation_delay={}s)",
        args.max_image_size,
        args.escalation_delay_secs,
    );

    let config = EngineConfig {
        max_image_size: args.max_image_size,
        escalation_delay_secs: args.escalation_delay_secs,
        settle_max_distance: args.settle_max_distance,
        ..Default::default()
    };

    let engine = Arc::new(Mutex::new(PlacementEngine::new(
        config.clone(),
        Arc::new(HeadlessRenderer),
    )));

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Envelope>();

    let controller = SessionController::new(
        config,
        engine,
        Arc::new(LoggingStatusReporter),
        Arc::new(PassthroughImageScaler),
        Arc::new(StdoutSink { tx: out_tx }),
    );
    let handle = controller.handle();

    // Stdout writer: one JSON envelope per line.
    let writer_handle = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(envelope) = out_rx.recv().await {
            match serde_json::to_vec(&envelope) {
                Ok(mut line) => {
                    line.push(b'\n');
                    if let Err(e) = stdout.write_all(&Bytes::from(line)).await {
                        log::warn!("Failed to write outbound envelope: {}", e);
                        break;
                    }
                }
                Err(e) => log::warn!("Failed to serialise outbound envelope: {}", e),
            }
        }
    });

    // Stdin reader: feed the session work queue in delivery order.
    let reader_handle = {
        let handle = handle.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            handle.connection_opened();

            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<HostInput>(&line) {
                    Ok(HostInput::Command(envelope)) => handle.deliver_envelope(envelope),
                    Ok(HostInput::SurfaceAdded(s)) => {
                        handle.surface_event(SurfaceEvent::Added(s))
                    }
                    Ok(HostInput::SurfaceUpdated(s)) => {
                        handle.surface_event(SurfaceEvent::Updated(s))
                    }
                    Ok(HostInput::SurfaceRemoved { id }) => {
                        handle.surface_event(SurfaceEvent::Removed(id))
                    }
                    Ok(HostInput::Tracking(state)) => handle.tracking_changed(state),
                    Ok(HostInput::Fault { reason }) => handle.session_fault(reason),
                    Err(e) => log::warn!("Skipping malformed input line: {}", e),
                }
            }

            handle.connection_closed();
        })
    };

    // Run until the session faults or we get SIGINT.
    let result = tokio::select! {
        res = controller.run() => res,
        _ = tokio::signal::ctrl_c() => {
            log::info!("ar-liveview-host shutting down (SIGINT)");
            Ok(())
        }
    };

    reader_handle.abort();
    writer_handle.abort();
    result
}
