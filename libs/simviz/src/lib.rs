// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! simviz
//!
//! Frame-delivery scheduling between a simulation time-stepper (the producer)
//! and a renderer (the consumer). The producer reports time-stamped frames at
//! whatever rate its integrator runs; the [`Visualizer`] decides per
//! [`VisualizerMode`] whether each frame is drawn now, buffered for paced
//! delivery, delayed, or dropped.

pub mod core;

pub use core::{
    resolve_timing, Decorations, Frame, FrameController, FrameRenderer, FrameSlot,
    ResolvedTiming, Result, ShutdownHandle, StatsSnapshot, Visualizer, VisualizerConfig,
    VisualizerMode, VizError, DEFAULT_BUFFER_LENGTH_SEC, DEFAULT_FRAME_RATE,
};

pub use core::prelude;
