//! Cadence CLI
//!
//! Play tween scenarios headlessly and print the values they produce.

use anyhow::Result;
use cadence_animation::{Easing, TimeMode};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod runner;

use config::{Scenario, SAMPLE_SCENARIO, SCENARIO_FILE};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cadence tween playback CLI", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a scenario and print sampled property values
    Run {
        /// Scenario file or directory containing scenario.toml
        #[arg(default_value = ".")]
        scenario: String,

        /// Override the scenario frame rate
        #[arg(short, long)]
        fps: Option<u32>,

        /// Print lifecycle events between samples
        #[arg(short, long)]
        events: bool,
    },

    /// Write a sample scenario
    Init {
        /// Target directory
        #[arg(default_value = ".")]
        path: String,
    },

    /// List easing names and time modes
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            fps,
            events,
        } => cmd_run(&scenario, fps, events),

        Commands::Init { path } => cmd_init(&path),

        Commands::Info => cmd_info(),
    }
}

fn cmd_run(source: &str, fps: Option<u32>, show_events: bool) -> Result<()> {
    let path = PathBuf::from(source);
    let mut scenario = Scenario::load_from_path(&path)?;
    if let Some(fps) = fps {
        if fps == 0 {
            anyhow::bail!("--fps must be at least 1");
        }
        scenario.fps = fps;
    }

    info!("Playing {} at {} fps", scenario.name, scenario.fps);
    let report = runner::run(&scenario)?;

    let mut events = report.events.iter().peekable();
    for sample in &report.samples {
        if show_events {
            while let Some(event) = events.next_if(|e| e.frame <= sample.frame) {
                println!("# {:>5} {}:{}", event.frame, event.label, event.kind.name());
            }
        }
        let values: Vec<String> = sample
            .values
            .iter()
            .map(|(name, value)| format!("{name}={value:.4}"))
            .collect();
        println!("{:>7} {:>8.4} {}", sample.frame, sample.time, values.join(" "));
    }
    if show_events {
        for event in events {
            println!("# {:>5} {}:{}", event.frame, event.label, event.kind.name());
        }
    }

    let finals: Vec<String> = report
        .properties
        .iter()
        .map(|(name, value)| format!("{name}={value:.4}"))
        .collect();
    println!("  final          {}", finals.join(" "));

    if report.finished {
        info!("{} finished after {} frames", report.name, report.frames);
    } else {
        warn!(
            "{} still playing after {} frames (max_frames reached)",
            report.name, report.frames
        );
    }

    Ok(())
}

fn cmd_init(path: &str) -> Result<()> {
    let dir = PathBuf::from(path);
    let target = dir.join(SCENARIO_FILE);

    // Never overwrite an existing scenario
    if target.exists() {
        anyhow::bail!("{} already exists", target.display());
    }

    fs::create_dir_all(&dir)?;
    fs::write(&target, SAMPLE_SCENARIO)?;

    info!("Created {}", target.display());
    info!("Run `cadence run {}` to play it", dir.display());

    Ok(())
}

fn cmd_info() -> Result<()> {
    println!("Cadence");
    println!("=======");
    println!();
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Easings:");
    for name in Easing::NAMES {
        println!("  - {name}");
    }
    println!();
    println!("Time modes:");
    for mode in TimeMode::ALL {
        println!("  - {}", mode.name());
    }

    Ok(())
}
