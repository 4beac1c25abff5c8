//! gestured: hand-gesture event daemon.
//!
//! Reads newline-delimited JSON frames (hand landmarks plus an optional
//! depth map) on stdin and sends confirmed event tokens to a UDP
//! endpoint.  Frame production and consumption both live in other
//! processes; this daemon is only the noisy-stream-to-clean-events
//! middle.

mod config;
mod depth;
mod gesture;
mod hand;
mod notify;
mod pipeline;
mod rotation;
mod swipe;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::PipelineConfig;
use crate::notify::{Notifier, UdpNotifier};
use crate::pipeline::{FrameRecord, GesturePipeline};

#[derive(Debug, Parser)]
#[command(name = "gestured", version, about = "Hand-gesture event daemon")]
struct Cli {
    /// UDP endpoint that receives event tokens.
    #[arg(long, default_value = "127.0.0.1:7000")]
    endpoint: String,

    /// JSON config file; built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every emitted event token at info level.
    #[arg(long)]
    trace_events: bool,

    /// Log a pipeline status snapshot every N frames (0 disables).
    #[arg(long, default_value_t = 0)]
    status_every: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    let mut notifier = UdpNotifier::new(&cli.endpoint)?;
    let mut pipeline = GesturePipeline::new(&config);
    info!(endpoint = %cli.endpoint, "gestured started");

    // Frames normally carry their own capture timestamps; fall back to
    // wall clock for producers that omit them.
    let epoch = Instant::now();
    let mut frames = 0u64;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: FrameRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(err) => {
                warn!(%err, "skipping malformed frame");
                continue;
            }
        };

        if record.reset {
            pipeline.reset();
        }

        let now_s = record.t.unwrap_or_else(|| epoch.elapsed().as_secs_f64());
        let frame = record.hand.and_then(|h| h.into_frame());
        let depth = record.depth.and_then(|d| d.into_map());

        for event in pipeline.process(frame.as_ref(), depth.as_ref(), now_s) {
            let token = event.token();
            if cli.trace_events {
                info!(%token, "event");
            }
            notifier.notify(&token);
        }

        frames += 1;
        if cli.status_every > 0 && frames % cli.status_every == 0 {
            // Explicitly requested via --status-every, so it must show
            // under the default info filter.
            let status = pipeline.status(now_s);
            info!(
                hand = status.hand_state.as_str(),
                calibrated = status.calibrated,
                angle_deg = ?status.angle_deg,
                zone = status.zone,
                swipe = status.swipe_phase.as_str(),
                swipes_confirmed = status.swipe_stats.confirmed,
                swipes_filtered = status.swipe_stats.filtered,
                swipes_aborted = status.swipe_stats.aborted,
                frames = status.frames,
                depth_rejected = status.depth_rejections,
                "pipeline status",
            );
        }
    }

    info!("input closed, exiting");
    Ok(())
}
