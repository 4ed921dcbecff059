// Rinkpilot Command Line Interface
// Run the hockey kart agent on single frames or recorded sessions

mod session;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rinkpilot_agent::{Agent, AgentConfig};
use rinkpilot_core::{Action, AimPoint, VehicleTelemetry};
use rinkpilot_drive::RecoverySnapshot;
use rinkpilot_eye::Planner;
use serde::Serialize;
use session::FrameSource;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rinkpilot")]
#[command(about = "Hockey kart agent: camera frame and telemetry in, controls out", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Agent configuration file (JSON or TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Planner weights, overriding the configured model path
    #[arg(long, short, global = true)]
    weights: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one frame and print the action as JSON
    Act {
        /// Camera frame (any format the image crate decodes)
        #[arg(long)]
        image: PathBuf,

        /// Telemetry JSON: {"front": [x,y,z], "location": [x,y,z], "velocity": [x,y,z]}
        #[arg(long)]
        telemetry: PathBuf,
    },

    /// Replay a recorded session and print one JSON result per frame
    Replay {
        /// JSON lines file of {"image"?, "aim_point"?, "telemetry"} records
        #[arg(long)]
        session: PathBuf,
    },

    /// Write randomly initialised planner weights
    InitWeights {
        /// Output path
        #[arg(long)]
        out: PathBuf,

        /// RNG seed (random if omitted)
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Serialize)]
struct ReplayLine {
    line: usize,
    aim_point: AimPoint,
    action: Action,
    recovery: RecoverySnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<f64>,
}

#[derive(Serialize)]
struct ReplayError {
    line: usize,
    error: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.weights)?;

    match cli.command {
        Commands::Act { image, telemetry } => act(&config, &image, &telemetry)?,
        Commands::Replay { session } => replay(&config, &session)?,
        Commands::InitWeights { out, seed } => init_weights(&config, &out, seed)?,
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine readable
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>, weights: Option<PathBuf>) -> Result<AgentConfig> {
    let mut config = match path {
        Some(path) => AgentConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AgentConfig::default(),
    };
    config.apply_env();

    if let Some(weights) = weights {
        config.perception.model_path = weights;
    }

    Ok(config)
}

fn act(config: &AgentConfig, image: &Path, telemetry: &Path) -> Result<()> {
    let telemetry = read_telemetry(telemetry)?;
    let frame = image::open(image)
        .with_context(|| format!("Failed to decode image {}", image.display()))?;

    let mut agent = Agent::new(config).context("Failed to build agent")?;
    let action = agent.act(&frame, &telemetry)?;

    println!("{}", serde_json::to_string(&action)?);
    Ok(())
}

fn replay(config: &AgentConfig, path: &Path) -> Result<()> {
    let frames = session::read_session(path)?;
    let mut agent = Agent::new(config).context("Failed to build agent")?;
    info!("Replaying {} frames from {}", frames.len(), path.display());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut failed = 0usize;

    for frame in &frames {
        match run_frame(&mut agent, frame) {
            Ok((aim_point, action, elapsed_ms)) => {
                let line = ReplayLine {
                    line: frame.line,
                    aim_point,
                    action,
                    recovery: agent.policy().recovery(),
                    elapsed_ms,
                };
                writeln!(out, "{}", serde_json::to_string(&line)?)?;
            }
            Err(e) => {
                failed += 1;
                error!("line {}: {:#}", frame.line, e);
                let line = ReplayError {
                    line: frame.line,
                    error: format!("{:#}", e),
                };
                writeln!(out, "{}", serde_json::to_string(&line)?)?;
            }
        }
    }

    info!(
        "Replay finished: {} frames, {} failed, {} over budget",
        frames.len(),
        failed,
        agent.frames_over_budget()
    );
    Ok(())
}

fn run_frame(agent: &mut Agent, frame: &session::SessionFrame) -> Result<(AimPoint, Action, Option<f64>)> {
    match &frame.source {
        FrameSource::Image(path) => {
            let image = image::open(path)
                .with_context(|| format!("Failed to decode image {}", path.display()))?;
            let report = agent.step(&image, &frame.telemetry)?;
            Ok((report.aim_point, report.action, Some(report.elapsed_ms)))
        }
        FrameSource::AimPoint(aim) => {
            let action = agent.control(*aim, &frame.telemetry)?;
            Ok((*aim, action, None))
        }
    }
}

fn init_weights(config: &AgentConfig, out: &Path, seed: Option<u64>) -> Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let planner = Planner::random(&config.perception, &mut rng)
        .context("Failed to build planner")?;
    planner
        .save(out)
        .with_context(|| format!("Failed to write weights to {}", out.display()))?;

    println!("Wrote planner weights to {}", out.display());
    Ok(())
}

fn read_telemetry(path: &Path) -> Result<VehicleTelemetry> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read telemetry {}", path.display()))?;
    let telemetry: VehicleTelemetry = serde_json::from_str(&content)
        .with_context(|| format!("Invalid telemetry in {}", path.display()))?;
    Ok(telemetry)
}
