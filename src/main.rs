//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `camea_gateway` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - Configuration loading
//! - The diagnostic subcommands
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use camea_gateway::initialization::{init_logger_with, init_vidar_client};
use camea_gateway::protocol::{parse_image_time, response::truncate_for_log};
use camea_gateway::vidar::{CaptureStore, VidarClient};
use camea_gateway::{run_gateway, Command, GatewayConfig, Opt};

#[tokio::main]
async fn main() {
    let opt = Opt::parse();

    if let Err(e) = run(opt).await {
        eprintln!("camea_gateway error: {:#}", e);
        process::exit(1);
    }
}

async fn run(opt: Opt) -> Result<()> {
    init_logger_with(
        opt.log_level.clone().into(),
        opt.log_format.clone(),
        opt.log_file.as_deref(),
    )
    .context("Failed to initialize logger")?;

    let config = GatewayConfig::load(&opt.config).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            opt.config.display()
        )
    })?;

    match opt.command.unwrap_or(Command::Run) {
        Command::Run => {
            let report = run_gateway(config).await?;
            println!(
                "Answered {} request{} ({} found, {} not found, {} uplink reconnect{}) in {:.1}s",
                report.requests,
                if report.requests == 1 { "" } else { "s" },
                report.found,
                report.not_found,
                report.uplink_reconnects,
                if report.uplink_reconnects == 1 { "" } else { "s" },
                report.elapsed_seconds
            );
        }
        Command::ProbeVidar { time, tolerance } => probe_vidar(&config, &time, tolerance).await?,
        Command::Trigger => {
            vidar_client(&config)?
                .send_software_trigger()
                .await
                .context("Software trigger failed")?;
            println!("Software trigger sent to {}", config.vidar.ip);
        }
    }
    Ok(())
}

fn vidar_client(config: &GatewayConfig) -> Result<VidarClient> {
    let http = init_vidar_client().context("Failed to initialize HTTP client")?;
    Ok(VidarClient::new(http, &config.vidar.ip, config.zone_filter()))
}

/// Prints every capture Vidar holds around `time`.
async fn probe_vidar(config: &GatewayConfig, time: &str, tolerance_ms: i64) -> Result<()> {
    let center = parse_image_time(time).context("Invalid --time")?;
    let client = vidar_client(config)?;

    let candidates = client
        .query_candidates(center.timestamp_millis(), tolerance_ms)
        .await
        .context("Vidar query failed")?;
    println!(
        "{} capture(s) within {} ms of {}",
        candidates.len(),
        tolerance_ms,
        center
    );

    let details = futures::future::join_all(
        candidates
            .iter()
            .map(|c| client.fetch_image(&c.record_id)),
    )
    .await;

    for (candidate, detail) in candidates.iter().zip(details) {
        println!();
        println!("ID: {}", candidate.record_id);
        println!(
            "offset: {} ms",
            candidate.capture_time_ms - center.timestamp_millis()
        );
        match detail {
            Ok(image) => {
                println!("timestamp: {}", image.capture_time_ms);
                println!("LP: {}", image.plate_text);
                println!("ILPC: {}", image.country_code);
                println!("LpJpeg: {}", truncate_for_log(&image.plate_image_b64));
                println!("FullImage64: {}", truncate_for_log(&image.full_image_b64));
            }
            Err(e) => println!("detail unavailable: {}", e),
        }
    }
    Ok(())
}
