// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Producer-facing visualizer API.

use std::io::Write;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use super::buffer::EnqueueOutcome;
use super::config::{
    normalize_buffer_length, normalize_frame_rate, normalize_real_time_scale, ResolvedTiming,
    VisualizerConfig, VisualizerMode, DEFAULT_BUFFER_LENGTH_SEC,
};
use super::controller::FrameController;
use super::delivery::{spawn_delivery_thread, DeliveryShared};
use super::error::Result;
use super::frame::{Frame, FrameSlot};
use super::policy::{Decision, ModePolicy, PolicyTiming};
use super::renderer::FrameRenderer;
use super::stats::StatsSnapshot;

/// Reports simulation frames to a renderer according to a [`VisualizerMode`].
///
/// The visualizer is driven by a single producer through `&mut self`; in
/// RealTime mode it owns one background delivery thread that hands buffered
/// frames to the renderer when they are due.
///
/// ```rust,ignore
/// let mut viz = Visualizer::with_config(renderer, VisualizerConfig::real_time());
/// while sim.time() < end {
///     sim.step();
///     viz.report(sim.time(), sim.snapshot())?; // may block when ahead of real time
/// }
/// viz.flush_frames()?;
/// viz.dump_stats(&mut std::io::stdout())?;
/// ```
///
/// Dropping the visualizer discards frames still buffered and joins the
/// delivery thread; call [`flush_frames`](Self::flush_frames) first to have
/// them rendered.
pub struct Visualizer<P, D = ()>
where
    P: Send + 'static,
    D: 'static,
{
    config: VisualizerConfig,
    timing: ResolvedTiming,
    policy: ModePolicy,
    shared: Arc<DeliveryShared<P, D>>,
    delivery: Option<JoinHandle<()>>,
    next_sequence: u64,
}

impl<P, D> Visualizer<P, D>
where
    P: Send + 'static,
    D: 'static,
{
    /// Create a visualizer in PassThrough mode with default settings.
    pub fn new(renderer: impl FrameRenderer<P, D> + 'static) -> Self {
        Self::with_config(renderer, VisualizerConfig::default())
    }

    pub fn with_config(renderer: impl FrameRenderer<P, D> + 'static, config: VisualizerConfig) -> Self {
        let config = config.normalized();
        let timing = config.resolve();
        let policy = ModePolicy::for_mode(config.mode, config.real_time_scale);

        tracing::info!(
            "Visualizer created: mode={}, frame rate={:?}, buffer={} frames ({:.3} s), scale={}",
            config.mode,
            timing.frame_rate,
            timing.buffer_frames,
            timing.buffer_sec,
            config.real_time_scale
        );

        Self {
            shared: Arc::new(DeliveryShared::new(Box::new(renderer), timing.buffer_frames)),
            config,
            timing,
            policy,
            delivery: None,
            next_sequence: 0,
        }
    }

    // =========================================================================
    // Frame reporting
    // =========================================================================

    /// Report a new simulation frame.
    ///
    /// - **PassThrough**: the frame is drawn; the caller may block until one
    ///   frame interval has passed since the previous draw.
    /// - **Sampling**: drawn now if the next sample time has been reached,
    ///   otherwise dropped. Never blocks.
    /// - **RealTime**: queued for display at the real time corresponding to
    ///   `sim_time`. Blocks while the buffer is full or the simulation is too
    ///   far ahead of real time. Frames arriving too late re-anchor the
    ///   timeline and are shown as soon as possible.
    ///
    /// After [`ShutdownHandle::shutdown`] every frame is dropped and `Ok` is
    /// returned. A renderer error is returned as-is for synchronous draws;
    /// a failure on the delivery thread surfaces as
    /// [`VizError::DeliveryFailed`](super::VizError::DeliveryFailed).
    pub fn report(&mut self, sim_time: f64, payload: P) -> Result<()> {
        self.check_delivery()?;

        let frame = self.next_frame(sim_time, payload);
        self.shared.stats.record_received();

        if self.shared.buffer.is_closed() {
            tracing::trace!("Visualizer shut down, dropping frame {}", frame.sequence());
            self.shared.stats.record_dropped(1);
            return Ok(());
        }

        let timing = PolicyTiming::from(&self.timing);
        match self.policy.decide(sim_time, Instant::now(), &timing) {
            Decision::Drop => {
                tracing::trace!("Dropping frame {} (sim time {})", frame.sequence(), sim_time);
                self.shared.stats.record_dropped(1);
                Ok(())
            }
            Decision::DrawNow { not_before } => {
                if let Some(due) = not_before {
                    if !self.hold_producer(due) {
                        self.shared.stats.record_dropped(1);
                        return Ok(());
                    }
                }
                self.render_now(&frame)
            }
            Decision::Enqueue {
                target,
                hold_until,
                reanchor_shift,
            } => {
                if let Some(shift) = reanchor_shift {
                    self.shared.stats.record_reanchor();
                    self.shared.buffer.shift_pending(shift);
                    self.shared.buffer.reset_timeline();
                }
                if let Some(release) = hold_until {
                    if !self.hold_producer(release) {
                        self.shared.stats.record_dropped(1);
                        return self.check_delivery();
                    }
                }
                self.enqueue(FrameSlot::new(frame, target), &timing)
            }
        }
    }

    /// Draw a frame immediately, bypassing mode policy, pacing and buffering.
    ///
    /// Blocks only as long as the renderer itself does.
    pub fn draw_frame_now(&mut self, sim_time: f64, payload: P) -> Result<()> {
        let frame = self.next_frame(sim_time, payload);
        self.shared.stats.record_received();
        self.render_now(&frame)
    }

    /// Block until every buffered frame has been rendered.
    ///
    /// Pending frames are delivered back to back, ignoring their target
    /// times. Returns immediately outside RealTime mode or when nothing is
    /// pending.
    pub fn flush_frames(&mut self) -> Result<()> {
        if self.config.mode != VisualizerMode::RealTime {
            return Ok(());
        }

        let outstanding = self.shared.buffer.outstanding();
        if outstanding > 0 {
            tracing::debug!("Flushing {} buffered frames", outstanding);
            self.shared.buffer.drain_all();
        }
        self.check_delivery()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    /// Switch operating mode. Frames buffered under RealTime are delivered
    /// before the new mode takes effect.
    pub fn set_mode(&mut self, mode: VisualizerMode) -> Result<()> {
        if mode == self.config.mode {
            return Ok(());
        }
        self.flush_frames()?;

        tracing::info!("Visualizer mode {} -> {}", self.config.mode, mode);
        self.config.mode = mode;
        self.policy = ModePolicy::for_mode(mode, self.config.real_time_scale);
        self.shared.buffer.reset_timeline();
        self.apply_timing();
        Ok(())
    }

    pub fn mode(&self) -> VisualizerMode {
        self.config.mode
    }

    /// Set the desired frame rate in frames per real second; 0 restores the
    /// mode default (30 fps, or unbounded in PassThrough). Negative or
    /// non-finite values are treated as 0.
    pub fn set_desired_frame_rate(&mut self, frames_per_sec: f64) -> Result<()> {
        let frames_per_sec = normalize_frame_rate(frames_per_sec);
        self.flush_frames()?;
        self.config.desired_frame_rate = frames_per_sec;
        self.apply_timing();
        Ok(())
    }

    /// The requested frame rate; 0 means the mode default is in use.
    pub fn desired_frame_rate(&self) -> f64 {
        self.config.desired_frame_rate
    }

    /// Effective frame rate, `None` when unbounded.
    pub fn effective_frame_rate(&self) -> Option<f64> {
        self.timing.frame_rate
    }

    /// Set how many simulated time units are shown per real second.
    /// Non-positive values restore the 1:1 default. Re-anchors the RealTime
    /// timeline on the next frame.
    pub fn set_real_time_scale(&mut self, sim_time_per_real_sec: f64) -> Result<()> {
        let scale = normalize_real_time_scale(sim_time_per_real_sec);
        self.flush_frames()?;
        self.config.real_time_scale = scale;
        self.policy.set_real_time_scale(scale);
        self.shared.buffer.reset_timeline();
        Ok(())
    }

    pub fn real_time_scale(&self) -> f64 {
        self.config.real_time_scale
    }

    /// Set the RealTime buffer length in seconds. It is rounded to the
    /// nearest whole number of frames (at least one for a positive request);
    /// 0 disables buffering, negative restores the 150 ms default.
    pub fn set_desired_buffer_length_sec(&mut self, buffer_length_sec: f64) -> Result<()> {
        let buffer_length_sec = normalize_buffer_length(buffer_length_sec);
        self.flush_frames()?;
        self.config.desired_buffer_length_sec = buffer_length_sec;
        self.apply_timing();
        Ok(())
    }

    /// The requested buffer length, or the default if none was requested.
    pub fn desired_buffer_length_sec(&self) -> f64 {
        if self.config.desired_buffer_length_sec < 0.0 {
            DEFAULT_BUFFER_LENGTH_SEC
        } else {
            self.config.desired_buffer_length_sec
        }
    }

    pub fn actual_buffer_length_sec(&self) -> f64 {
        self.timing.buffer_sec
    }

    pub fn actual_buffer_length_frames(&self) -> usize {
        self.timing.buffer_frames
    }

    /// Frames currently waiting in the RealTime buffer.
    pub fn pending_frames(&self) -> usize {
        self.shared.buffer.len()
    }

    // =========================================================================
    // Frame controllers
    // =========================================================================

    /// Register a controller run just before every frame is rendered, after
    /// those registered earlier. The visualizer owns it until dropped.
    pub fn add_frame_controller(&mut self, controller: impl FrameController<P, D> + 'static) {
        self.shared.controllers.lock().add(Box::new(controller));
    }

    pub fn frame_controller_count(&self) -> usize {
        self.shared.controllers.lock().len()
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Write a human-readable statistics report.
    pub fn dump_stats(&self, out: &mut impl Write) -> Result<()> {
        let rate = match self.timing.frame_rate {
            Some(fps) => format!("{} fps", fps),
            None => "unbounded".to_string(),
        };
        writeln!(
            out,
            "Visualizer stats (mode {}, {}, buffer {} frames / {:.3} s):",
            self.config.mode, rate, self.timing.buffer_frames, self.timing.buffer_sec
        )?;
        self.stats().write_report(out)?;
        Ok(())
    }

    /// Reset all statistics to zero.
    pub fn clear_stats(&self) {
        self.shared.stats.clear(self.shared.buffer.outstanding());
    }

    /// Handle that shuts the visualizer down from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            target: self.shared.clone(),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn next_frame(&mut self, sim_time: f64, payload: P) -> Frame<P> {
        let frame = Frame::new(self.next_sequence, sim_time, payload);
        self.next_sequence += 1;
        frame
    }

    fn check_delivery(&self) -> Result<()> {
        match self.shared.failure() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn apply_timing(&mut self) {
        self.timing = self.config.resolve();
        self.shared.buffer.set_capacity(self.timing.buffer_frames);
        tracing::debug!(
            "Resolved timing: mode={}, frame rate={:?}, buffer={} frames ({:.3} s)",
            self.config.mode,
            self.timing.frame_rate,
            self.timing.buffer_frames,
            self.timing.buffer_sec
        );
    }

    /// Block the producer until `until`. Returns `false` if shut down meanwhile.
    fn hold_producer(&self, until: Instant) -> bool {
        let start = Instant::now();
        let released = self.shared.buffer.wait_until(until);
        self.shared.stats.record_blocked(start.elapsed());
        released
    }

    fn render_now(&self, frame: &Frame<P>) -> Result<()> {
        self.shared.render(frame).inspect_err(|e| {
            tracing::error!("Renderer failed on frame {}: {}", frame.sequence(), e);
            self.shared.stats.record_dropped(1);
        })
    }

    fn enqueue(&mut self, slot: FrameSlot<P>, timing: &PolicyTiming) -> Result<()> {
        if self.delivery.is_none() {
            self.delivery = Some(spawn_delivery_thread(Arc::clone(&self.shared))?);
        }

        let enqueued = self.shared.buffer.enqueue_blocking(slot, timing.min_spacing());
        if let Some(blocked_for) = enqueued.blocked_for {
            self.shared.stats.record_blocked(blocked_for);
        }

        match enqueued.outcome {
            EnqueueOutcome::Queued { depth } => {
                self.shared.stats.observe_buffer_depth(depth);
                Ok(())
            }
            EnqueueOutcome::Coalesced(replaced) => {
                tracing::trace!("Coalesced pending frame {}", replaced.sequence());
                self.shared.stats.record_coalesced();
                Ok(())
            }
            EnqueueOutcome::Rejected(frame) => {
                tracing::trace!(
                    "Frame {} behind or too close to the last delivered frame, dropping",
                    frame.sequence()
                );
                self.shared.stats.record_dropped(1);
                Ok(())
            }
            EnqueueOutcome::Closed(_) => {
                self.shared.stats.record_dropped(1);
                self.check_delivery()
            }
        }
    }
}

impl<P, D> Drop for Visualizer<P, D>
where
    P: Send + 'static,
    D: 'static,
{
    fn drop(&mut self) {
        let discarded = self.shared.discard_pending();
        if discarded > 0 {
            tracing::debug!("Discarded {} buffered frames on shutdown", discarded);
        }

        if let Some(handle) = self.delivery.take() {
            if handle.join().is_err() {
                tracing::error!("Delivery thread panicked");
            }
        }
    }
}

trait Shutdown: Send + Sync {
    fn shutdown(&self) -> usize;
    fn is_shut_down(&self) -> bool;
}

impl<P: Send, D> Shutdown for DeliveryShared<P, D> {
    fn shutdown(&self) -> usize {
        self.discard_pending()
    }

    fn is_shut_down(&self) -> bool {
        self.buffer.is_closed()
    }
}

/// Cloneable handle that stops a [`Visualizer`] from any thread.
///
/// Shutting down wakes a producer blocked in
/// [`report`](Visualizer::report) or [`flush_frames`](Visualizer::flush_frames)
/// (both return `Ok`), discards buffered frames and makes every later
/// `report` drop its frame.
#[derive(Clone)]
pub struct ShutdownHandle {
    target: Arc<dyn Shutdown>,
}

impl ShutdownHandle {
    /// Returns the number of buffered frames discarded.
    pub fn shutdown(&self) -> usize {
        let discarded = self.target.shutdown();
        tracing::info!("Visualizer shut down ({} buffered frames discarded)", discarded);
        discarded
    }

    pub fn is_shut_down(&self) -> bool {
        self.target.is_shut_down()
    }
}

impl std::fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::controller::Decorations;
    use crate::core::error::VizError;
    use parking_lot::Mutex;

    type Seen = Arc<Mutex<Vec<(u64, Instant)>>>;

    fn recorder() -> (impl FrameRenderer<u64> + 'static, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let renderer = move |frame: &Frame<u64>, _: Vec<()>| -> Result<()> {
            sink.lock().push((*frame.payload(), Instant::now()));
            Ok(())
        };
        (renderer, seen)
    }

    #[test]
    fn test_defaults() {
        let (renderer, _) = recorder();
        let viz = Visualizer::new(renderer);
        assert_eq!(viz.mode(), VisualizerMode::PassThrough);
        assert_eq!(viz.desired_frame_rate(), 0.0);
        assert_eq!(viz.effective_frame_rate(), None);
        assert_eq!(viz.real_time_scale(), 1.0);
        assert_eq!(viz.desired_buffer_length_sec(), DEFAULT_BUFFER_LENGTH_SEC);
        assert_eq!(viz.actual_buffer_length_frames(), 5);
    }

    #[test]
    fn test_setters_normalize_invalid_values() {
        let (renderer, _) = recorder();
        let mut viz = Visualizer::new(renderer);

        viz.set_real_time_scale(-3.0).unwrap();
        assert_eq!(viz.real_time_scale(), 1.0);
        viz.set_real_time_scale(2.0).unwrap();
        assert_eq!(viz.real_time_scale(), 2.0);

        viz.set_desired_frame_rate(-5.0).unwrap();
        assert_eq!(viz.desired_frame_rate(), 0.0);

        viz.set_desired_buffer_length_sec(-1.0).unwrap();
        assert_eq!(viz.desired_buffer_length_sec(), DEFAULT_BUFFER_LENGTH_SEC);
        viz.set_desired_buffer_length_sec(0.25).unwrap();
        assert_eq!(viz.desired_buffer_length_sec(), 0.25);
    }

    #[test]
    fn test_pass_through_draws_every_frame_synchronously() {
        let (renderer, seen) = recorder();
        let mut viz = Visualizer::new(renderer);
        for i in 0..10 {
            viz.report(i as f64, i).unwrap();
        }
        let payloads: Vec<u64> = seen.lock().iter().map(|(p, _)| *p).collect();
        assert_eq!(payloads, (0..10).collect::<Vec<_>>());

        let stats = viz.stats();
        assert_eq!(stats.frames_received, 10);
        assert_eq!(stats.frames_rendered, 10);
        assert_eq!(stats.frames_dropped, 0);
    }

    #[test]
    fn test_draw_frame_now_bypasses_sampling() {
        let (renderer, seen) = recorder();
        let mut viz = Visualizer::with_config(renderer, VisualizerConfig::sampling(1.0));
        viz.report(0.0, 0).unwrap();
        viz.report(0.1, 1).unwrap();
        viz.draw_frame_now(0.2, 2).unwrap();

        let payloads: Vec<u64> = seen.lock().iter().map(|(p, _)| *p).collect();
        assert_eq!(payloads, vec![0, 2]);
        let stats = viz.stats();
        assert_eq!(stats.frames_received, 3);
        assert_eq!(stats.frames_rendered, 2);
        assert_eq!(stats.frames_dropped, 1);
    }

    #[test]
    fn test_synchronous_render_error_propagates() {
        let renderer = |_: &Frame<u64>, _: Vec<()>| -> Result<()> { Err(VizError::render("no window")) };
        let mut viz = Visualizer::new(renderer);
        let err = viz.report(0.0, 0).unwrap_err();
        assert!(matches!(err, VizError::Render(_)));

        let stats = viz.stats();
        assert_eq!(stats.frames_received, 1);
        assert_eq!(stats.frames_dropped, 1);
    }

    #[test]
    fn test_report_after_shutdown_drops_frames() {
        let (renderer, seen) = recorder();
        let mut viz = Visualizer::new(renderer);
        let handle = viz.shutdown_handle();
        assert!(!handle.is_shut_down());
        handle.shutdown();
        assert!(handle.is_shut_down());

        viz.report(0.0, 0).unwrap();
        assert!(seen.lock().is_empty());
        assert_eq!(viz.stats().frames_dropped, 1);
    }

    #[test]
    fn test_frame_controllers_are_owned_and_counted() {
        let (renderer, _) = recorder();
        let mut viz = Visualizer::new(renderer);
        viz.add_frame_controller(|_: &Frame<u64>, _: &mut Decorations<()>| {});
        viz.add_frame_controller(|_: &Frame<u64>, _: &mut Decorations<()>| {});
        assert_eq!(viz.frame_controller_count(), 2);
    }

    #[test]
    fn test_dump_stats_includes_mode_and_counters() {
        let (renderer, _) = recorder();
        let mut viz = Visualizer::with_config(renderer, VisualizerConfig::sampling(10.0));
        viz.report(0.0, 0).unwrap();

        let mut out = Vec::new();
        viz.dump_stats(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("mode Sampling"));
        assert!(text.contains("10 fps"));
        assert!(text.contains("frames received:        1"));
    }

    #[test]
    fn test_real_time_delivers_through_background_thread() {
        let (renderer, seen) = recorder();
        let mut viz = Visualizer::with_config(renderer, VisualizerConfig::real_time());
        for i in 0..5u64 {
            viz.report(i as f64 / 30.0, i).unwrap();
        }
        viz.flush_frames().unwrap();

        assert_eq!(viz.pending_frames(), 0);
        assert_eq!(seen.lock().len(), 5);
        let stats = viz.stats();
        assert_eq!(stats.frames_rendered, 5);
        assert!(stats.buffer_high_water_mark >= 1);
    }
}
