// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-mode frame admission policy
//!
//! [`ModePolicy`] is a tagged variant: each mode carries only the state its
//! rule needs. [`ModePolicy::decide`] is pure with respect to the clock
//! (`now` is passed in); the caller performs the blocking and drawing the
//! [`Decision`] asks for.

use std::time::{Duration, Instant};

use super::config::{ResolvedTiming, VisualizerMode, DEFAULT_FRAME_RATE};
use super::pacer::{offset_instant, Pacer};

/// Buffered frames closer than this fraction of a frame interval coalesce.
pub const FRAME_SPACING_TOLERANCE: f64 = 0.9;

/// What to do with a newly reported frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Draw synchronously on the caller thread, waiting until `not_before`
    /// first if it is set.
    DrawNow { not_before: Option<Instant> },

    /// Hand to the frame buffer with the given target display time.
    Enqueue {
        target: Instant,
        /// The producer is too far ahead: wait until this instant first.
        hold_until: Option<Instant>,
        /// The pacer was re-anchored; pending slots move later by this much.
        reanchor_shift: Option<Duration>,
    },

    /// Discard the frame.
    Drop,
}

/// Timing inputs for a decision, derived from [`ResolvedTiming`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyTiming {
    pub frame_interval: Option<Duration>,
    pub buffer_frames: usize,
    pub buffer_length: Duration,
}

impl From<&ResolvedTiming> for PolicyTiming {
    fn from(timing: &ResolvedTiming) -> Self {
        Self {
            frame_interval: timing.frame_interval(),
            buffer_frames: timing.buffer_frames,
            buffer_length: timing.buffer_length(),
        }
    }
}

impl PolicyTiming {
    /// How far a RealTime frame may lag behind, or run ahead of, real time
    /// before the pacer re-anchors or the producer is held back: one buffer
    /// length, or one frame interval without a buffer.
    pub fn real_time_tolerance(&self) -> Duration {
        if self.buffer_frames > 0 {
            self.buffer_length
        } else {
            self.frame_interval
                .unwrap_or_else(|| Duration::from_secs_f64(1.0 / DEFAULT_FRAME_RATE))
        }
    }

    /// Minimum spacing between delivered frames.
    pub fn min_spacing(&self) -> Option<Duration> {
        self.frame_interval
            .map(|interval| interval.mul_f64(FRAME_SPACING_TOLERANCE))
    }
}

#[derive(Debug, Clone)]
pub enum ModePolicy {
    PassThrough {
        last_draw: Option<Instant>,
    },
    Sampling {
        next_sample_due: Option<Instant>,
    },
    RealTime {
        pacer: Pacer,
        /// Target of the last frame drawn directly (zero-capacity buffer).
        last_direct_target: Option<Instant>,
    },
}

impl ModePolicy {
    pub fn for_mode(mode: VisualizerMode, real_time_scale: f64) -> Self {
        match mode {
            VisualizerMode::PassThrough => ModePolicy::PassThrough { last_draw: None },
            VisualizerMode::Sampling => ModePolicy::Sampling {
                next_sample_due: None,
            },
            VisualizerMode::RealTime => ModePolicy::RealTime {
                pacer: Pacer::new(real_time_scale),
                last_direct_target: None,
            },
        }
    }

    pub fn mode(&self) -> VisualizerMode {
        match self {
            ModePolicy::PassThrough { .. } => VisualizerMode::PassThrough,
            ModePolicy::Sampling { .. } => VisualizerMode::Sampling,
            ModePolicy::RealTime { .. } => VisualizerMode::RealTime,
        }
    }

    pub fn pacer(&self) -> Option<&Pacer> {
        match self {
            ModePolicy::RealTime { pacer, .. } => Some(pacer),
            _ => None,
        }
    }

    pub fn set_real_time_scale(&mut self, scale: f64) {
        if let ModePolicy::RealTime { pacer, .. } = self {
            pacer.set_scale(scale);
        }
    }

    /// Forget timing history; the next frame starts a fresh timeline.
    pub fn reset(&mut self) {
        match self {
            ModePolicy::PassThrough { last_draw } => *last_draw = None,
            ModePolicy::Sampling { next_sample_due } => *next_sample_due = None,
            ModePolicy::RealTime {
                pacer,
                last_direct_target,
            } => {
                pacer.reset();
                *last_direct_target = None;
            }
        }
    }

    pub fn decide(&mut self, sim_time: f64, now: Instant, timing: &PolicyTiming) -> Decision {
        match self {
            ModePolicy::PassThrough { last_draw } => {
                let due = match (timing.frame_interval, *last_draw) {
                    (Some(interval), Some(last)) => last
                        .checked_add(interval)
                        .map_or(now, |next| now.max(next)),
                    _ => now,
                };
                *last_draw = Some(due);
                Decision::DrawNow {
                    not_before: (due > now).then_some(due),
                }
            }

            ModePolicy::Sampling { next_sample_due } => match *next_sample_due {
                Some(due) if now < due => Decision::Drop,
                _ => {
                    let interval = timing
                        .frame_interval
                        .unwrap_or_else(|| Duration::from_secs_f64(1.0 / DEFAULT_FRAME_RATE));
                    *next_sample_due = now.checked_add(interval);
                    Decision::DrawNow { not_before: None }
                }
            },

            ModePolicy::RealTime {
                pacer,
                last_direct_target,
            } => decide_real_time(pacer, last_direct_target, sim_time, now, timing),
        }
    }
}

fn decide_real_time(
    pacer: &mut Pacer,
    last_direct_target: &mut Option<Instant>,
    sim_time: f64,
    now: Instant,
    timing: &PolicyTiming,
) -> Decision {
    if !sim_time.is_finite() {
        tracing::warn!("Dropping RealTime frame with non-finite sim time {}", sim_time);
        return Decision::Drop;
    }

    if !pacer.is_anchored() {
        tracing::debug!("Anchoring real-time pacer at sim time {}", sim_time);
        pacer.anchor(now, sim_time);
    }

    let tolerance = timing.real_time_tolerance();
    let lead = pacer.lead_secs(sim_time, now).unwrap_or(0.0);
    let target = offset_instant(now, lead);

    let (target, reanchor_shift) = match target {
        Some(target) if lead >= -tolerance.as_secs_f64() => (target, None),
        _ => {
            tracing::debug!(
                "Frame at sim time {} is {:.3} s off schedule, re-anchoring pacer",
                sim_time,
                -lead
            );
            pacer.anchor(now, sim_time);
            let shift = Duration::try_from_secs_f64(-lead).ok();
            (now, shift.filter(|_| lead < 0.0))
        }
    };

    if timing.buffer_frames == 0 {
        if let (Some(last), Some(spacing)) = (*last_direct_target, timing.min_spacing()) {
            let too_close = last
                .checked_add(spacing)
                .is_some_and(|earliest| target < earliest);
            if reanchor_shift.is_none() && too_close {
                return Decision::Drop;
            }
        }
        *last_direct_target = Some(target);
        return Decision::DrawNow {
            not_before: (target > now).then_some(target),
        };
    }

    let hold_until = target
        .checked_sub(tolerance)
        .filter(|release| *release > now);

    Decision::Enqueue {
        target,
        hold_until,
        reanchor_shift,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(fps: Option<f64>, buffer_frames: usize) -> PolicyTiming {
        let frame_interval = fps.map(|fps| Duration::from_secs_f64(1.0 / fps));
        let buffer_length = frame_interval
            .map(|interval| interval * buffer_frames as u32)
            .unwrap_or_default();
        PolicyTiming {
            frame_interval,
            buffer_frames,
            buffer_length,
        }
    }

    #[test]
    fn test_pass_through_unpaced_draws_immediately() {
        let mut policy = ModePolicy::for_mode(VisualizerMode::PassThrough, 1.0);
        let now = Instant::now();
        let timing = timing(None, 0);

        for _ in 0..3 {
            assert_eq!(
                policy.decide(0.0, now, &timing),
                Decision::DrawNow { not_before: None }
            );
        }
    }

    #[test]
    fn test_pass_through_paces_by_frame_interval() {
        let mut policy = ModePolicy::for_mode(VisualizerMode::PassThrough, 1.0);
        let now = Instant::now();
        let timing = timing(Some(50.0), 0);
        let interval = Duration::from_millis(20);

        assert_eq!(
            policy.decide(0.0, now, &timing),
            Decision::DrawNow { not_before: None }
        );
        assert_eq!(
            policy.decide(0.1, now + Duration::from_millis(5), &timing),
            Decision::DrawNow {
                not_before: Some(now + interval)
            }
        );
        // Second draw is scheduled at now+20ms; the third follows 20ms later.
        assert_eq!(
            policy.decide(0.2, now + Duration::from_millis(6), &timing),
            Decision::DrawNow {
                not_before: Some(now + interval * 2)
            }
        );
        // A late caller is never scheduled in the past.
        let late = now + Duration::from_secs(1);
        assert_eq!(
            policy.decide(0.3, late, &timing),
            Decision::DrawNow { not_before: None }
        );
    }

    #[test]
    fn test_sampling_drops_between_samples_without_catch_up() {
        let mut policy = ModePolicy::for_mode(VisualizerMode::Sampling, 1.0);
        let now = Instant::now();
        let timing = timing(Some(10.0), 0);

        assert_eq!(
            policy.decide(0.0, now, &timing),
            Decision::DrawNow { not_before: None }
        );
        assert_eq!(
            policy.decide(0.0, now + Duration::from_millis(50), &timing),
            Decision::Drop
        );

        // Renderer stalled for a long time: exactly one frame is drawn, and
        // the next sample is one interval after *now*, not a burst.
        let stalled = now + Duration::from_secs(2);
        assert_eq!(
            policy.decide(0.0, stalled, &timing),
            Decision::DrawNow { not_before: None }
        );
        assert_eq!(
            policy.decide(0.0, stalled + Duration::from_millis(1), &timing),
            Decision::Drop
        );
        assert_eq!(
            policy.decide(0.0, stalled + Duration::from_millis(100), &timing),
            Decision::DrawNow { not_before: None }
        );
    }

    #[test]
    fn test_real_time_first_frame_is_due_now() {
        let mut policy = ModePolicy::for_mode(VisualizerMode::RealTime, 1.0);
        let now = Instant::now();

        match policy.decide(5.0, now, &timing(Some(30.0), 5)) {
            Decision::Enqueue {
                target,
                hold_until,
                reanchor_shift,
            } => {
                assert_eq!(target, now);
                assert_eq!(hold_until, None);
                assert_eq!(reanchor_shift, None);
            }
            other => panic!("expected Enqueue, got {:?}", other),
        }
    }

    #[test]
    fn test_real_time_target_follows_scaled_sim_time() {
        let mut policy = ModePolicy::for_mode(VisualizerMode::RealTime, 2.0);
        let now = Instant::now();
        let timing = timing(Some(30.0), 5);
        policy.decide(0.0, now, &timing);

        match policy.decide(0.2, now, &timing) {
            Decision::Enqueue { target, .. } => {
                let lead = (target - now).as_secs_f64();
                assert!((lead - 0.1).abs() < 1e-6, "lead was {}", lead);
            }
            other => panic!("expected Enqueue, got {:?}", other),
        }
    }

    #[test]
    fn test_real_time_holds_producer_that_runs_too_far_ahead() {
        let mut policy = ModePolicy::for_mode(VisualizerMode::RealTime, 1.0);
        let now = Instant::now();
        let timing = timing(Some(10.0), 2); // 200 ms buffer
        policy.decide(0.0, now, &timing);

        match policy.decide(1.0, now, &timing) {
            Decision::Enqueue {
                target, hold_until, ..
            } => {
                assert_eq!(target, now + Duration::from_secs(1));
                let hold = hold_until.expect("producer should be held");
                let wait = (hold - now).as_secs_f64();
                assert!((wait - 0.8).abs() < 1e-6, "wait was {}", wait);
            }
            other => panic!("expected Enqueue, got {:?}", other),
        }
    }

    #[test]
    fn test_real_time_reanchors_late_frame() {
        let mut policy = ModePolicy::for_mode(VisualizerMode::RealTime, 1.0);
        let start = Instant::now();
        let timing = timing(Some(30.0), 5);
        policy.decide(0.0, start, &timing);

        // Two real seconds later the simulation has only advanced 0.1 s.
        let now = start + Duration::from_secs(2);
        match policy.decide(0.1, now, &timing) {
            Decision::Enqueue {
                target,
                reanchor_shift,
                ..
            } => {
                assert_eq!(target, now);
                let shift = reanchor_shift.expect("late frame should re-anchor").as_secs_f64();
                assert!((shift - 1.9).abs() < 1e-6, "shift was {}", shift);
            }
            other => panic!("expected Enqueue, got {:?}", other),
        }

        let anchor = policy.pacer().and_then(|pacer| pacer.anchor_point());
        assert_eq!(anchor, Some((now, 0.1)));

        // The following frame is scheduled from the new anchor.
        match policy.decide(0.2, now, &timing) {
            Decision::Enqueue { target, reanchor_shift, .. } => {
                assert_eq!(reanchor_shift, None);
                let lead = (target - now).as_secs_f64();
                assert!((lead - 0.1).abs() < 1e-6);
            }
            other => panic!("expected Enqueue, got {:?}", other),
        }
    }

    #[test]
    fn test_real_time_slightly_late_frame_keeps_anchor() {
        let mut policy = ModePolicy::for_mode(VisualizerMode::RealTime, 1.0);
        let start = Instant::now();
        let timing = timing(Some(30.0), 5);
        policy.decide(0.0, start, &timing);

        let now = start + Duration::from_millis(100);
        match policy.decide(0.05, now, &timing) {
            Decision::Enqueue {
                target,
                reanchor_shift,
                ..
            } => {
                assert_eq!(reanchor_shift, None);
                assert!(target < now);
            }
            other => panic!("expected Enqueue, got {:?}", other),
        }
        assert_eq!(
            policy.pacer().and_then(|pacer| pacer.anchor_point()),
            Some((start, 0.0))
        );
    }

    #[test]
    fn test_real_time_without_buffer_draws_at_target() {
        let mut policy = ModePolicy::for_mode(VisualizerMode::RealTime, 1.0);
        let now = Instant::now();
        let timing = timing(Some(20.0), 0);

        assert_eq!(
            policy.decide(0.0, now, &timing),
            Decision::DrawNow { not_before: None }
        );
        assert_eq!(
            policy.decide(0.05, now, &timing),
            Decision::DrawNow {
                not_before: Some(now + Duration::from_millis(50))
            }
        );
        // Closer than one frame interval to the previous draw.
        assert_eq!(policy.decide(0.06, now, &timing), Decision::Drop);
    }

    #[test]
    fn test_real_time_drops_non_finite_sim_time() {
        let mut policy = ModePolicy::for_mode(VisualizerMode::RealTime, 1.0);
        assert_eq!(
            policy.decide(f64::NAN, Instant::now(), &timing(Some(30.0), 5)),
            Decision::Drop
        );
        assert!(!policy.pacer().unwrap().is_anchored());
    }

    #[test]
    fn test_reset_forgets_history() {
        let mut policy = ModePolicy::for_mode(VisualizerMode::Sampling, 1.0);
        let now = Instant::now();
        let timing = timing(Some(1.0), 0);
        policy.decide(0.0, now, &timing);
        assert_eq!(policy.decide(0.0, now, &timing), Decision::Drop);

        policy.reset();
        assert_eq!(
            policy.decide(0.0, now, &timing),
            Decision::DrawNow { not_before: None }
        );
    }

    #[test]
    fn test_unrepresentable_interval_does_not_overflow() {
        let timing = PolicyTiming {
            frame_interval: Some(Duration::MAX),
            buffer_frames: 0,
            buffer_length: Duration::ZERO,
        };
        let now = Instant::now();

        let mut pass_through = ModePolicy::for_mode(VisualizerMode::PassThrough, 1.0);
        for _ in 0..2 {
            assert_eq!(
                pass_through.decide(0.0, now, &timing),
                Decision::DrawNow { not_before: None }
            );
        }

        let mut sampling = ModePolicy::for_mode(VisualizerMode::Sampling, 1.0);
        assert_eq!(
            sampling.decide(0.0, now, &timing),
            Decision::DrawNow { not_before: None }
        );

        let mut real_time = ModePolicy::for_mode(VisualizerMode::RealTime, 1.0);
        assert_eq!(
            real_time.decide(0.0, now, &timing),
            Decision::DrawNow { not_before: None }
        );
        assert!(matches!(
            real_time.decide(0.5, now, &timing),
            Decision::DrawNow { .. }
        ));
    }
}
