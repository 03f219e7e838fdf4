//! Stand-in for an external marker viewer: acks probes and logs traffic.
//!
//! Usage:
//!   marker_echo                       # listen on 127.0.0.1:9870
//!   marker_echo --bind 0.0.0.0:9870

use anyhow::{Context, Result};
use armature::echo::MarkerEcho;
use armature_core::{NodeContext, NodeOptions};
use armature_sim::visualization::DEFAULT_MARKER_ADDR;
use clap::Parser;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "marker_echo")]
#[command(about = "Reference listener for the armature marker transport")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value_t = DEFAULT_MARKER_ADDR)]
    bind: SocketAddr,

    /// Frame the received transforms are rooted at
    #[arg(long, default_value = "world")]
    world_frame: String,

    /// Seconds between statistics lines
    #[arg(long, default_value_t = 5.0)]
    report_every: f64,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    armature_core::logging::init_logging(&args.log_level)?;

    let node = NodeContext::init(NodeOptions::new("marker_echo")).context("Failed to initialize node")?;
    let mut echo = MarkerEcho::bind(args.bind, &args.world_frame)
        .with_context(|| format!("Failed to bind {}", args.bind))?;

    let report_every = Duration::from_secs_f64(args.report_every.max(0.1));
    let mut last_report = Instant::now();
    while node.ok() {
        if let Err(e) = echo.poll(Duration::from_millis(100)) {
            tracing::warn!("receive failed: {}", e);
        }
        if last_report.elapsed() >= report_every {
            let stats = echo.stats();
            tracing::info!(
                "{} probes, {} markers, {} transform packets, {} frames",
                stats.probes,
                stats.markers,
                stats.transform_packets,
                echo.tf_tree().frame_count()
            );
            last_report = Instant::now();
        }
    }

    node.shutdown()?;
    Ok(())
}
