// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod buffer;
pub mod config;
pub mod controller;
mod delivery;
pub mod error;
pub mod frame;
pub mod pacer;
pub mod policy;
pub mod prelude;
pub mod renderer;
pub mod stats;
pub mod visualizer;

pub use buffer::{EnqueueOutcome, Enqueued, FrameBuffer};
pub use config::{
    resolve_timing, ResolvedTiming, VisualizerConfig, VisualizerMode, DEFAULT_BUFFER_LENGTH_SEC,
    DEFAULT_FRAME_RATE,
};
pub use controller::{ControllerRegistry, Decorations, FrameController};
pub use error::*;
pub use frame::{Frame, FrameSlot};
pub use pacer::Pacer;
pub use policy::{Decision, ModePolicy, PolicyTiming, FRAME_SPACING_TOLERANCE};
pub use renderer::FrameRenderer;
pub use stats::{Stats, StatsSnapshot};
pub use visualizer::{ShutdownHandle, Visualizer};
