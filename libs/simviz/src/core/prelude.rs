// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Commonly used types for `use simviz::prelude::*`.

pub use crate::core::{
    // Errors
    error::{Result, VizError},

    // Frames and hooks
    controller::{Decorations, FrameController},
    frame::Frame,
    renderer::FrameRenderer,

    // Visualizer
    config::{VisualizerConfig, VisualizerMode},
    stats::StatsSnapshot,
    visualizer::{ShutdownHandle, Visualizer},
};
