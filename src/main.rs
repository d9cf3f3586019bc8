//! AODV Shield CLI
//!
//! Runs one of the built-in attack scenarios, or replays a captured trace,
//! through the defense engine and prints the threat report.

use anyhow::Context;
use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use aodv_shield::config::DefenseConfig;
use aodv_shield::engine::DefenseEngine;
use aodv_shield::metrics::{MetricsFormat, MetricsSnapshot, TrafficTracer};
use aodv_shield::report::RunSummary;
use aodv_shield::scenario::{self, ScenarioConfig, ScenarioKind};
use aodv_shield::service;
use aodv_shield::trace;
use aodv_shield::types::TrafficClass;

/// AODV Shield - RREQ flooding and Sybil defense evaluator
#[derive(Parser, Debug)]
#[command(name = "aodv-shield")]
#[command(version)]
#[command(about = "Per-source defense engine for ad-hoc routing control traffic", long_about = None)]
struct Args {
    /// Path to defense configuration file (TOML)
    #[arg(short, long, default_value = "aodv-shield.toml")]
    config: PathBuf,

    /// Attack scenario to run
    #[arg(short, long, value_enum, default_value = "flooding")]
    scenario: ScenarioKind,

    /// Replay a JSON-lines trace instead of running a scenario
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Run without the defense (baseline)
    #[arg(long)]
    no_defense: bool,

    /// Scenario duration override (seconds)
    #[arg(long)]
    duration: Option<f64>,

    /// Scenario random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Window length override (seconds)
    #[arg(long)]
    window: Option<f64>,

    /// Rate limit override (messages per window)
    #[arg(long)]
    rate_limit: Option<u32>,

    /// Block threshold override (violations)
    #[arg(long)]
    block_threshold: Option<u32>,

    /// Enable or disable the burst check
    #[arg(long)]
    burst_detection: Option<bool>,

    /// Burst size override (events); enables the burst check
    #[arg(long)]
    burst_size: Option<u32>,

    /// Burst span override (seconds); enables the burst check
    #[arg(long)]
    burst_span: Option<f64>,

    /// Keep burst-flagged events in the window
    #[arg(long)]
    burst_retains_event: Option<bool>,

    /// Enable or disable permanent blocking
    #[arg(long)]
    permanent_block: Option<bool>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Also print engine counters in this format after the run
    #[arg(long, value_enum)]
    metrics: Option<MetricsFormat>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write the default configuration to --config and exit
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("🛡️  AODV Shield v{}", env!("CARGO_PKG_VERSION"));

    if args.generate_config {
        let config = args.scenario.defense_preset();
        config.save(&args.config)?;
        info!("📝 Default {:?} configuration written to {:?}", args.scenario, args.config);
        return Ok(());
    }

    // Load configuration
    let config = if args.config.exists() {
        DefenseConfig::load(&args.config)
            .with_context(|| format!("loading {}", args.config.display()))?
    } else {
        warn!("Config file not found, using {:?} preset", args.scenario);
        args.scenario.defense_preset()
    };

    let config = apply_overrides(&args, config);
    config.validate().context("invalid defense configuration")?;

    info!("⚙️  Configuration:");
    info!("   Window: {:.2}s, rate limit: {}", config.window_secs, config.rate_limit);
    info!(
        "   Block threshold: {} (permanent block {})",
        config.block_threshold,
        if config.permanent_block { "on" } else { "off" }
    );
    if config.burst_detection {
        info!(
            "   Burst check: {} events within {:.2}s (retain flagged: {})",
            config.burst_size, config.burst_span_secs, config.burst_retains_event
        );
    }

    match &args.trace {
        Some(path) => run_trace(&args, config, path).await,
        None => run_scenario(&args, config),
    }
}

/// Apply command-line policy overrides on top of the loaded configuration
fn apply_overrides(args: &Args, mut config: DefenseConfig) -> DefenseConfig {
    if let Some(window) = args.window {
        config = config.with_window_secs(window);
    }
    if let Some(limit) = args.rate_limit {
        config = config.with_rate_limit(limit);
    }
    if let Some(threshold) = args.block_threshold {
        config = config.with_block_threshold(threshold);
    }
    if let Some(enabled) = args.permanent_block {
        config = config.with_permanent_block(enabled);
    }
    if args.burst_size.is_some() || args.burst_span.is_some() {
        let size = args.burst_size.unwrap_or(config.burst_size);
        let span = args.burst_span.unwrap_or(config.burst_span_secs);
        config = config.with_burst(size, span);
    }
    // An explicit switch wins over the implicit enable above
    if let Some(enabled) = args.burst_detection {
        config = config.with_burst_detection(enabled);
    }
    if let Some(retain) = args.burst_retains_event {
        config = config.with_burst_retains_event(retain);
    }
    config
}

fn print_metrics(args: &Args, totals: &MetricsSnapshot) {
    if let Some(format) = args.metrics {
        println!();
        println!("{}", totals.export(format));
    }
}

fn run_scenario(args: &Args, config: DefenseConfig) -> anyhow::Result<()> {
    let mut scenario = ScenarioConfig::for_kind(args.scenario).with_defense(!args.no_defense);
    if let Some(duration) = args.duration {
        scenario = scenario.with_duration(duration);
    }
    if let Some(seed) = args.seed {
        scenario = scenario.with_seed(seed);
    }

    let outcome = scenario::run_scenario(&scenario, config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_header();
        println!("{}", outcome.summary);
        if outcome.summary.defense_enabled {
            println!();
            println!("{}", outcome.report);
        }
    }
    print_metrics(args, &outcome.report.totals);

    Ok(())
}

async fn run_trace(args: &Args, config: DefenseConfig, path: &Path) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("opening trace {}", path.display()))?;
    let records = trace::parse_trace(BufReader::new(file))?;
    let duration = trace::trace_duration(&records);
    let tracer = TrafficTracer::new();

    if args.no_defense {
        // Baseline: everything is delivered
        for record in &records {
            match record.class {
                TrafficClass::Attack => tracer.inc_attack_sent(),
                TrafficClass::Legitimate => {
                    tracer.inc_legit_sent();
                    tracer.inc_legit_received();
                }
            }
        }
        let summary = RunSummary::compute(Default::default(), tracer.snapshot(), duration, false);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_header();
            println!("{}", summary);
        }
        print_metrics(args, &summary.totals);
        return Ok(());
    }

    let engine = DefenseEngine::new(config)?;
    let metrics = engine.metrics().clone();
    let (handle, task) = service::spawn(engine, service::DEFAULT_QUEUE_DEPTH);

    trace::replay(&handle, &records, &tracer).await?;

    let report = handle.report().await?;
    drop(handle);
    task.await?;

    let summary = RunSummary::compute(metrics.snapshot(), tracer.snapshot(), duration, true);

    if args.json {
        let output = serde_json::json!({
            "report": report,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_header();
        println!("{}", summary);
        println!();
        println!("{}", report);
    }
    print_metrics(args, &summary.totals);

    Ok(())
}

fn print_header() {
    println!(
        "AODV Shield report generated {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();
}
