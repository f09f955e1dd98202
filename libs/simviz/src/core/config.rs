// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Visualizer configuration and timing resolution
//!
//! Users express *desired* settings (frame rate, buffer length in seconds,
//! real-time scale). The resolver turns those into the *effective* values a
//! mode actually runs with.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Frame rate used by Sampling and RealTime when none is requested.
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Buffer length used when none is requested (human perception threshold).
pub const DEFAULT_BUFFER_LENGTH_SEC: f64 = 0.15;

/// Lowest effective frame rate: one frame per hour. Slower requests are
/// raised to it.
pub const MIN_FRAME_RATE: f64 = 1.0 / 3600.0;

/// Largest buffer capacity, in frames.
pub const MAX_BUFFER_FRAMES: usize = 1 << 16;

/// Operating mode governing frame admission and pacing.
///
/// ## Modes
///
/// - **PassThrough**: Every reported frame is drawn. With a frame rate set,
///   the producer is slowed down so draws are at least one frame interval
///   apart. Simulated time is not synchronized to real time.
/// - **Sampling**: Frames are drawn at most once per frame interval; frames
///   arriving in between are dropped. The producer never blocks.
/// - **RealTime**: Frame display times follow simulated time (scaled by the
///   real-time scale). Frames are buffered to smooth out variable step sizes
///   and the producer is blocked when it runs ahead of real time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VisualizerMode {
    #[default]
    PassThrough,
    Sampling,
    RealTime,
}

impl VisualizerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualizerMode::PassThrough => "PassThrough",
            VisualizerMode::Sampling => "Sampling",
            VisualizerMode::RealTime => "RealTime",
        }
    }

    /// Frame rate used when the desired rate is 0. `None` means unbounded.
    pub fn default_frame_rate(&self) -> Option<f64> {
        match self {
            VisualizerMode::PassThrough => None,
            VisualizerMode::Sampling | VisualizerMode::RealTime => Some(DEFAULT_FRAME_RATE),
        }
    }
}

impl std::fmt::Display for VisualizerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing visualizer settings.
///
/// All values are stored already normalized; see the setters on
/// [`Visualizer`](super::Visualizer) for how invalid input is treated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizerConfig {
    pub mode: VisualizerMode,

    /// Desired frames per second of real time. 0 selects the mode default.
    pub desired_frame_rate: f64,

    /// Simulated time units per real second. Always > 0.
    pub real_time_scale: f64,

    /// Requested RealTime buffer length. Negative selects the default
    /// (150 ms), 0 disables buffering.
    pub desired_buffer_length_sec: f64,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            mode: VisualizerMode::PassThrough,
            desired_frame_rate: 0.0,
            real_time_scale: 1.0,
            desired_buffer_length_sec: -1.0,
        }
    }
}

impl VisualizerConfig {
    /// Preset for interactive real-time display with default pacing.
    pub fn real_time() -> Self {
        Self {
            mode: VisualizerMode::RealTime,
            ..Self::default()
        }
    }

    /// Preset for monitoring a simulation running at full speed.
    pub fn sampling(frames_per_sec: f64) -> Self {
        Self {
            mode: VisualizerMode::Sampling,
            desired_frame_rate: normalize_frame_rate(frames_per_sec),
            ..Self::default()
        }
    }

    /// Return a copy with every field normalized.
    pub fn normalized(mut self) -> Self {
        self.desired_frame_rate = normalize_frame_rate(self.desired_frame_rate);
        self.real_time_scale = normalize_real_time_scale(self.real_time_scale);
        self.desired_buffer_length_sec = normalize_buffer_length(self.desired_buffer_length_sec);
        self
    }

    pub fn resolve(&self) -> ResolvedTiming {
        resolve_timing(
            self.mode,
            self.desired_frame_rate,
            self.desired_buffer_length_sec,
        )
    }
}

pub(crate) fn normalize_frame_rate(frames_per_sec: f64) -> f64 {
    if frames_per_sec.is_finite() && frames_per_sec >= 0.0 {
        frames_per_sec
    } else {
        tracing::warn!(
            "Invalid desired frame rate {}, using the mode default",
            frames_per_sec
        );
        0.0
    }
}

pub(crate) fn normalize_real_time_scale(sim_time_per_real_sec: f64) -> f64 {
    if sim_time_per_real_sec.is_finite() && sim_time_per_real_sec > 0.0 {
        sim_time_per_real_sec
    } else {
        tracing::warn!(
            "Invalid real-time scale {}, using 1.0",
            sim_time_per_real_sec
        );
        1.0
    }
}

pub(crate) fn normalize_buffer_length(buffer_length_sec: f64) -> f64 {
    if buffer_length_sec.is_nan() {
        -1.0
    } else {
        buffer_length_sec
    }
}

/// Effective timing derived from a [`VisualizerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedTiming {
    /// Effective frame rate. `None` means unbounded (no pacing).
    pub frame_rate: Option<f64>,

    /// Buffer capacity in whole frames.
    pub buffer_frames: usize,

    /// Buffer capacity expressed in seconds (`buffer_frames / rate`).
    pub buffer_sec: f64,
}

impl ResolvedTiming {
    /// Minimum interval between successive draws, if the rate is bounded.
    pub fn frame_interval(&self) -> Option<Duration> {
        self.frame_rate.map(|fps| saturating_secs(1.0 / fps))
    }

    pub fn buffer_length(&self) -> Duration {
        saturating_secs(self.buffer_sec)
    }
}

fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

/// Map desired settings to effective frame rate and buffer size.
///
/// - Rate 0 selects the mode default (PassThrough unbounded, otherwise 30 fps).
///   Positive rates below [`MIN_FRAME_RATE`] are raised to it.
/// - Buffers are sized with the effective rate, or 30 fps when unbounded.
/// - Negative buffer length: 150 ms rounded to the nearest whole frame count
///   (at least one frame in RealTime). Zero: no buffer. Positive: nearest
///   whole frame count, at least one.
/// - Buffers never exceed [`MAX_BUFFER_FRAMES`].
pub fn resolve_timing(
    mode: VisualizerMode,
    desired_frame_rate: f64,
    desired_buffer_length_sec: f64,
) -> ResolvedTiming {
    let frame_rate = if desired_frame_rate > 0.0 && desired_frame_rate.is_finite() {
        Some(desired_frame_rate.max(MIN_FRAME_RATE))
    } else {
        mode.default_frame_rate()
    };

    let sizing_rate = frame_rate.unwrap_or(DEFAULT_FRAME_RATE);

    let buffer_frames = if desired_buffer_length_sec < 0.0 {
        let frames = (DEFAULT_BUFFER_LENGTH_SEC * sizing_rate).round() as usize;
        if mode == VisualizerMode::RealTime {
            frames.max(1)
        } else {
            frames
        }
    } else if desired_buffer_length_sec == 0.0 {
        0
    } else {
        ((desired_buffer_length_sec * sizing_rate).round() as usize).max(1)
    };
    let buffer_frames = buffer_frames.min(MAX_BUFFER_FRAMES);

    ResolvedTiming {
        frame_rate,
        buffer_frames,
        buffer_sec: buffer_frames as f64 / sizing_rate,
    }
}
