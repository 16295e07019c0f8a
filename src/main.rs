use std::net::Ipv4Addr;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::CommandFactory;
use tracing::info;
use tracing_subscriber::EnvFilter;

use osdetect::cli::Cli;
use osdetect::report::DetectionReport;
use osdetect::Detector;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let Some(target) = cli.target.clone() else {
        let _ = Cli::command().print_help();
        std::process::exit(1);
    };

    init_tracing(cli.verbose);

    let target: Ipv4Addr = target
        .parse()
        .with_context(|| format!("target {target:?} is not an IPv4 address"))?;

    info!("starting OS detection against {target}");
    let mut detector = Detector::new();

    let (alive, icmp_ok) = detector.survival_detect(target).await;
    if !alive {
        info!("target {target} appears to be down, nothing to detect");
        return Ok(());
    }

    let os = detector.detect_os(target, icmp_ok).await;

    if cli.json {
        let report = DetectionReport {
            target: target.to_string(),
            os,
            alive,
            icmp_reachable: icmp_ok,
            last_open_port: detector.last_checked_port(),
            weights: detector.weights().clone(),
            detected_at: Utc::now(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Detected operating system: {os}");
    }

    Ok(())
}
