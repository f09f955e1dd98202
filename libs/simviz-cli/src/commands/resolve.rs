// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use anyhow::Result;
use simviz::{resolve_timing, VisualizerMode};

/// Print the effective timing for a mode and desired settings.
pub fn resolve(mode: VisualizerMode, rate: f64, buffer: f64) -> Result<()> {
    let timing = resolve_timing(mode, rate, buffer);

    println!("Mode:         {}", mode);
    match timing.frame_rate {
        Some(fps) => println!("Frame rate:   {} fps", fps),
        None => println!("Frame rate:   unbounded"),
    }
    println!(
        "Buffer:       {} frames ({:.3} s)",
        timing.buffer_frames, timing.buffer_sec
    );

    Ok(())
}
