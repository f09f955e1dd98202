// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! simviz CLI
//!
//! Drives a synthetic simulation through the visualizer to exercise each
//! delivery mode and report frame statistics.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use simviz::VisualizerMode;

mod commands;

#[derive(Parser)]
#[command(name = "simviz")]
#[command(author, version, about = "Simulation frame-delivery scheduler CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synthetic simulation and report delivery statistics
    Run {
        /// Delivery mode
        #[arg(long, value_enum, default_value = "real-time")]
        mode: ModeArg,

        /// Desired frame rate in frames per real second (0 = mode default)
        #[arg(long, default_value = "0")]
        rate: f64,

        /// Simulated time units per real second
        #[arg(long, default_value = "1")]
        scale: f64,

        /// RealTime buffer length in seconds (negative = default 150 ms)
        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        buffer: f64,

        /// Number of simulation steps to report
        #[arg(long, default_value = "300")]
        frames: u32,

        /// Simulated time advanced per step
        #[arg(long, default_value = "0.01")]
        step: f64,

        /// Real time spent computing each step, in milliseconds
        #[arg(long, default_value = "0")]
        work_ms: u64,

        /// Real time the renderer spends on each frame, in milliseconds
        #[arg(long, default_value = "0")]
        render_ms: u64,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective frame rate and buffer size for a configuration
    Resolve {
        /// Delivery mode
        #[arg(long, value_enum, default_value = "real-time")]
        mode: ModeArg,

        /// Desired frame rate (0 = mode default)
        #[arg(long, default_value = "0")]
        rate: f64,

        /// Desired buffer length in seconds (negative = default)
        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        buffer: f64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    PassThrough,
    Sampling,
    RealTime,
}

impl From<ModeArg> for VisualizerMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::PassThrough => VisualizerMode::PassThrough,
            ModeArg::Sampling => VisualizerMode::Sampling,
            ModeArg::RealTime => VisualizerMode::RealTime,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            mode,
            rate,
            scale,
            buffer,
            frames,
            step,
            work_ms,
            render_ms,
            json,
        } => commands::run::run(commands::run::RunOptions {
            mode: mode.into(),
            rate,
            scale,
            buffer,
            frames,
            step,
            work_ms,
            render_ms,
            json,
        }),
        Commands::Resolve { mode, rate, buffer } => {
            commands::resolve::resolve(mode.into(), rate, buffer)
        }
    }
}
