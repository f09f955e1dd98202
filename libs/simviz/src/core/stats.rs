// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Frame delivery statistics.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Counters shared between the producer and the delivery thread.
///
/// Counters only grow until [`clear`](Stats::clear). Every dropped or
/// rendered frame was counted as received first, so
/// `frames_received >= frames_rendered + frames_dropped` holds at all times.
#[derive(Debug, Default)]
pub struct Stats {
    frames_received: AtomicU64,
    frames_rendered: AtomicU64,
    frames_dropped: AtomicU64,
    frames_coalesced: AtomicU64,
    reanchor_count: AtomicU64,
    producer_blocked_count: AtomicU64,
    producer_blocked_nanos: AtomicU64,
    buffer_high_water_mark: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_rendered(&self) {
        self.frames_rendered.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_dropped(&self, count: u64) {
        self.frames_dropped.fetch_add(count, Ordering::SeqCst);
    }

    /// A pending frame was replaced by a newer one; counts as a drop.
    pub fn record_coalesced(&self) {
        self.frames_coalesced.fetch_add(1, Ordering::Relaxed);
        self.record_dropped(1);
    }

    pub fn record_reanchor(&self) {
        self.reanchor_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blocked(&self, blocked_for: Duration) {
        self.producer_blocked_count.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(blocked_for.as_nanos()).unwrap_or(u64::MAX);
        self.producer_blocked_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn observe_buffer_depth(&self, depth: usize) {
        self.buffer_high_water_mark
            .fetch_max(depth as u64, Ordering::Relaxed);
    }

    /// Reset every counter.
    ///
    /// `outstanding` frames (still buffered or in flight) are re-counted as
    /// received so their later render or drop keeps the counters consistent.
    pub fn clear(&self, outstanding: usize) {
        self.frames_received
            .store(outstanding as u64, Ordering::SeqCst);
        self.frames_rendered.store(0, Ordering::SeqCst);
        self.frames_dropped.store(0, Ordering::SeqCst);
        self.frames_coalesced.store(0, Ordering::Relaxed);
        self.reanchor_count.store(0, Ordering::Relaxed);
        self.producer_blocked_count.store(0, Ordering::Relaxed);
        self.producer_blocked_nanos.store(0, Ordering::Relaxed);
        self.buffer_high_water_mark
            .store(outstanding as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        // Rendered and dropped are loaded before received so a concurrent
        // render cannot make the snapshot violate the received invariant.
        let frames_rendered = self.frames_rendered.load(Ordering::SeqCst);
        let frames_dropped = self.frames_dropped.load(Ordering::SeqCst);
        let frames_received = self.frames_received.load(Ordering::SeqCst);

        StatsSnapshot {
            frames_received,
            frames_rendered,
            frames_dropped,
            frames_coalesced: self.frames_coalesced.load(Ordering::Relaxed),
            reanchor_count: self.reanchor_count.load(Ordering::Relaxed),
            producer_blocked_count: self.producer_blocked_count.load(Ordering::Relaxed),
            producer_blocked_time: Duration::from_nanos(
                self.producer_blocked_nanos.load(Ordering::Relaxed),
            ),
            buffer_high_water_mark: self.buffer_high_water_mark.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`Stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub frames_received: u64,
    pub frames_rendered: u64,
    /// Includes coalesced frames.
    pub frames_dropped: u64,
    pub frames_coalesced: u64,
    pub reanchor_count: u64,
    pub producer_blocked_count: u64,
    pub producer_blocked_time: Duration,
    pub buffer_high_water_mark: u64,
}

impl StatsSnapshot {
    /// Frames received but neither rendered nor dropped yet.
    pub fn frames_pending(&self) -> u64 {
        self.frames_received
            .saturating_sub(self.frames_rendered + self.frames_dropped)
    }

    /// Write a human-readable report, one counter per line.
    pub fn write_report(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "  frames received:        {}", self.frames_received)?;
        writeln!(out, "  frames rendered:        {}", self.frames_rendered)?;
        writeln!(
            out,
            "  frames dropped:         {} ({} coalesced)",
            self.frames_dropped, self.frames_coalesced
        )?;
        writeln!(out, "  frames pending:         {}", self.frames_pending())?;
        writeln!(out, "  re-anchors:             {}", self.reanchor_count)?;
        writeln!(
            out,
            "  producer blocked:       {} times, {:.3} s total",
            self.producer_blocked_count,
            self.producer_blocked_time.as_secs_f64()
        )?;
        writeln!(out, "  buffer high-water mark: {}", self.buffer_high_water_mark)?;
        Ok(())
    }
}
