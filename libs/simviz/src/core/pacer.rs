// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Simulated-time to real-time mapping for RealTime mode.

use std::time::{Duration, Instant};

/// Maps simulated time onto the real-time clock.
///
/// Once anchored at `(anchor_real, anchor_sim)`:
///
/// ```text
/// expected_real_time(sim) = anchor_real + (sim - anchor_sim) / scale
/// ```
///
/// The pacer starts unanchored; the first RealTime frame anchors it at
/// "now", and frames arriving too late re-anchor it.
#[derive(Debug, Clone)]
pub struct Pacer {
    scale: f64,
    anchor: Option<(Instant, f64)>,
}

impl Pacer {
    pub fn new(scale: f64) -> Self {
        Self {
            scale,
            anchor: None,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Change the scale. The mapping is dropped; the next frame re-anchors.
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
        self.anchor = None;
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn anchor_point(&self) -> Option<(Instant, f64)> {
        self.anchor
    }

    pub fn anchor(&mut self, real: Instant, sim_time: f64) {
        self.anchor = Some((real, sim_time));
    }

    pub fn reset(&mut self) {
        self.anchor = None;
    }

    /// Signed seconds by which `sim_time` is expected ahead of `now`.
    ///
    /// Negative means the frame is already late. Returns `None` when the
    /// pacer is not anchored.
    pub fn lead_secs(&self, sim_time: f64, now: Instant) -> Option<f64> {
        let (anchor_real, anchor_sim) = self.anchor?;
        let anchor_offset = if anchor_real >= now {
            (anchor_real - now).as_secs_f64()
        } else {
            -(now - anchor_real).as_secs_f64()
        };
        Some(anchor_offset + (sim_time - anchor_sim) / self.scale)
    }

    /// Expected real display time of `sim_time`, if representable.
    pub fn expected_real_time(&self, sim_time: f64) -> Option<Instant> {
        let (anchor_real, anchor_sim) = self.anchor?;
        offset_instant(anchor_real, (sim_time - anchor_sim) / self.scale)
    }
}

/// `base` shifted by a signed number of seconds, `None` on overflow.
pub(crate) fn offset_instant(base: Instant, secs: f64) -> Option<Instant> {
    let magnitude = Duration::try_from_secs_f64(secs.abs()).ok()?;
    if secs >= 0.0 {
        base.checked_add(magnitude)
    } else {
        base.checked_sub(magnitude)
    }
}
