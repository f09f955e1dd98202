// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use simviz::{Decorations, Frame, FrameRenderer, Visualizer, VisualizerConfig, VisualizerMode};

const GRAVITY: f64 = -9.81;
const RESTITUTION: f64 = 0.8;

pub struct RunOptions {
    pub mode: VisualizerMode,
    pub rate: f64,
    pub scale: f64,
    pub buffer: f64,
    pub frames: u32,
    pub step: f64,
    pub work_ms: u64,
    pub render_ms: u64,
    pub json: bool,
}

/// Bouncing ball state reported as the frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ball {
    pub height: f64,
    pub velocity: f64,
}

impl Ball {
    fn new() -> Self {
        Self {
            height: 10.0,
            velocity: 0.0,
        }
    }

    fn advance(&mut self, dt: f64) {
        self.velocity += GRAVITY * dt;
        self.height += self.velocity * dt;
        if self.height < 0.0 {
            self.height = -self.height * RESTITUTION;
            self.velocity = -self.velocity * RESTITUTION;
        }
    }
}

/// Step size varies between 0.5x and 1.5x the nominal step, like an
/// adaptive integrator would.
fn step_size(nominal: f64, index: u32) -> f64 {
    nominal * (0.5 + (index % 3) as f64 * 0.5)
}

/// Logs each frame and spends a fixed amount of time "drawing" it.
struct TraceRenderer {
    cost: Duration,
}

impl FrameRenderer<Ball, String> for TraceRenderer {
    fn render(&mut self, frame: &Frame<Ball>, decorations: Vec<String>) -> simviz::Result<()> {
        tracing::debug!(
            "Frame {} t={:.3} height={:.2} [{}]",
            frame.sequence(),
            frame.sim_time(),
            frame.payload().height,
            decorations.join(", ")
        );
        if !self.cost.is_zero() {
            std::thread::sleep(self.cost);
        }
        Ok(())
    }
}

pub fn run(options: RunOptions) -> Result<()> {
    let config = VisualizerConfig {
        mode: options.mode,
        desired_frame_rate: options.rate,
        real_time_scale: options.scale,
        desired_buffer_length_sec: options.buffer,
    };
    let renderer = TraceRenderer {
        cost: Duration::from_millis(options.render_ms),
    };
    let mut viz = Visualizer::with_config(renderer, config);
    viz.add_frame_controller(|frame: &Frame<Ball>, decorations: &mut Decorations<String>| {
        decorations.push(format!("hud t={:.2}", frame.sim_time()));
    });

    let work = Duration::from_millis(options.work_ms);
    let mut ball = Ball::new();
    let mut sim_time = 0.0;
    let start = Instant::now();

    tracing::info!(
        "Running {} steps in {} mode (nominal step {})",
        options.frames,
        viz.mode(),
        options.step
    );

    for index in 0..options.frames {
        let dt = step_size(options.step, index);
        ball.advance(dt);
        sim_time += dt;
        if !work.is_zero() {
            std::thread::sleep(work);
        }
        viz.report(sim_time, ball)
            .with_context(|| format!("Failed to report frame at t={}", sim_time))?;
    }
    viz.flush_frames().context("Failed to flush buffered frames")?;

    let elapsed = start.elapsed();
    tracing::info!(
        "Simulated {:.3} time units in {:.3} s",
        sim_time,
        elapsed.as_secs_f64()
    );

    let mut stdout = std::io::stdout().lock();
    if options.json {
        let report = serde_json::json!({
            "config": viz.config(),
            "effective_frame_rate": viz.effective_frame_rate(),
            "buffer_frames": viz.actual_buffer_length_frames(),
            "buffer_sec": viz.actual_buffer_length_sec(),
            "sim_time": sim_time,
            "final_state": ball,
            "elapsed_sec": elapsed.as_secs_f64(),
            "stats": viz.stats(),
        });
        serde_json::to_writer_pretty(&mut stdout, &report)?;
        writeln!(stdout)?;
    } else {
        viz.dump_stats(&mut stdout)?;
    }

    Ok(())
}
