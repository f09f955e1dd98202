// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Bounded frame buffer for RealTime delivery
//!
//! Pending frames are kept ordered by target display time. One producer
//! pushes, one delivery thread pops when the earliest slot is due.
//!
//! Key properties:
//! - Fixed capacity in frames (resolved from the buffer length in seconds)
//! - Backpressure: the producer blocks while the buffer is full
//! - Slots leave in non-decreasing (target, sequence) order
//! - Frames closer together than the minimum spacing are coalesced
//! - `drain_all` switches delivery to "as fast as possible" until empty
//!
//! Synchronization is one mutex plus two condition variables: `not_full`
//! (producer waits) and `changed` (delivery waits for next-due or not-empty,
//! flush waits for empty, producer pacing waits for shutdown).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::frame::{Frame, FrameSlot};

/// Result of offering a slot to the buffer.
#[derive(Debug)]
pub enum EnqueueOutcome<P> {
    /// Slot inserted; `depth` is the number of pending slots afterwards.
    Queued { depth: usize },
    /// The latest pending slot had a target within the minimum spacing; its
    /// frame was replaced by the new one and is returned here.
    Coalesced(Frame<P>),
    /// The target is earlier than the most recently delivered frame, or
    /// nothing is pending and it is within the minimum spacing of that
    /// frame; the new frame is returned unqueued.
    Rejected(Frame<P>),
    /// The buffer was closed; the new frame is returned unqueued.
    Closed(Frame<P>),
}

/// An [`EnqueueOutcome`] plus how long the producer was held back.
#[derive(Debug)]
pub struct Enqueued<P> {
    pub outcome: EnqueueOutcome<P>,
    pub blocked_for: Option<Duration>,
}

struct BufferState<P> {
    slots: VecDeque<FrameSlot<P>>,
    capacity: usize,
    in_flight: usize,
    draining: bool,
    closed: bool,
    last_delivered_target: Option<Instant>,
}

impl<P> BufferState<P> {
    fn is_settled(&self) -> bool {
        self.slots.is_empty() && self.in_flight == 0
    }

    /// Insert, coalesce or reject `slot`. `Err` hands the slot back when full.
    fn offer(
        &mut self,
        slot: FrameSlot<P>,
        min_spacing: Option<Duration>,
    ) -> Result<EnqueueOutcome<P>, FrameSlot<P>> {
        if self.closed {
            return Ok(EnqueueOutcome::Closed(slot.frame));
        }

        // Nothing may be delivered before a frame that already reached the sink.
        if let Some(delivered) = self.last_delivered_target {
            if slot.target < delivered {
                return Ok(EnqueueOutcome::Rejected(slot.frame));
            }
        }

        if let Some(spacing) = min_spacing {
            if let Some(latest) = self.slots.back_mut() {
                if abs_diff(latest.target, slot.target) < spacing {
                    let replaced = std::mem::replace(&mut latest.frame, slot.frame);
                    return Ok(EnqueueOutcome::Coalesced(replaced));
                }
            } else if let Some(earliest) = self
                .last_delivered_target
                .and_then(|delivered| delivered.checked_add(spacing))
            {
                if slot.target < earliest {
                    return Ok(EnqueueOutcome::Rejected(slot.frame));
                }
            }
        }

        if self.slots.len() >= self.capacity {
            return Err(slot);
        }

        let key = slot.sort_key();
        let index = self.slots.partition_point(|pending| pending.sort_key() <= key);
        self.slots.insert(index, slot);
        Ok(EnqueueOutcome::Queued {
            depth: self.slots.len(),
        })
    }
}

fn abs_diff(a: Instant, b: Instant) -> Duration {
    if a >= b { a - b } else { b - a }
}

/// Thread-safe, bounded, target-time ordered frame queue.
pub struct FrameBuffer<P> {
    state: Mutex<BufferState<P>>,
    not_full: Condvar,
    changed: Condvar,
}

impl<P> FrameBuffer<P> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(BufferState {
                slots: VecDeque::new(),
                capacity,
                in_flight: 0,
                draining: false,
                closed: false,
                last_delivered_target: None,
            }),
            not_full: Condvar::new(),
            changed: Condvar::new(),
        }
    }

    /// Offer a slot without blocking. A full buffer hands the slot back.
    ///
    /// A buffer with zero capacity never accepts a slot.
    pub fn try_enqueue(
        &self,
        slot: FrameSlot<P>,
        min_spacing: Option<Duration>,
    ) -> Result<EnqueueOutcome<P>, FrameSlot<P>> {
        let mut state = self.state.lock();
        let result = state.offer(slot, min_spacing);
        if result.is_ok() {
            self.changed.notify_all();
        }
        result
    }

    /// Offer a slot, blocking while the buffer is full.
    ///
    /// Returns early with [`EnqueueOutcome::Closed`] if the buffer is closed
    /// while waiting. Must not be called on a zero-capacity buffer.
    pub fn enqueue_blocking(&self, slot: FrameSlot<P>, min_spacing: Option<Duration>) -> Enqueued<P> {
        let mut state = self.state.lock();
        let mut slot = slot;
        let mut blocked_since: Option<Instant> = None;

        loop {
            match state.offer(slot, min_spacing) {
                Ok(outcome) => {
                    self.changed.notify_all();
                    return Enqueued {
                        outcome,
                        blocked_for: blocked_since.map(|since| since.elapsed()),
                    };
                }
                Err(returned) => {
                    slot = returned;
                    blocked_since.get_or_insert_with(Instant::now);
                    tracing::trace!(
                        "Frame buffer full ({} slots), producer waiting",
                        state.capacity
                    );
                    self.not_full.wait(&mut state);
                }
            }
        }
    }

    /// Block until the earliest slot is due, then remove and return it.
    ///
    /// While a drain is in progress slots are returned regardless of their
    /// target time. Returns `None` once the buffer is closed. Every returned
    /// slot must be acknowledged with [`mark_delivered`](Self::mark_delivered).
    pub fn dequeue_when_due(&self) -> Option<FrameSlot<P>> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return None;
            }

            let Some(target) = state.slots.front().map(|slot| slot.target) else {
                self.changed.wait(&mut state);
                continue;
            };

            if state.draining || Instant::now() >= target {
                if let Some(slot) = state.slots.pop_front() {
                    state.in_flight += 1;
                    state.last_delivered_target = Some(slot.target);
                    self.not_full.notify_all();
                    return Some(slot);
                }
                continue;
            }

            self.changed.wait_until(&mut state, target);
        }
    }

    /// Acknowledge that a dequeued slot has reached the renderer sink.
    pub fn mark_delivered(&self) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.is_settled() {
            self.changed.notify_all();
        }
    }

    /// Deliver everything pending as fast as possible and block until the
    /// buffer is empty and no dequeued frame is still in flight.
    ///
    /// Returns immediately if nothing is pending, and early if the buffer is
    /// closed while waiting.
    pub fn drain_all(&self) {
        let mut state = self.state.lock();
        if state.is_settled() {
            return;
        }

        state.draining = true;
        self.changed.notify_all();

        while !state.closed && !state.is_settled() {
            self.changed.wait(&mut state);
        }
        state.draining = false;
    }

    /// Sleep until `deadline`, waking early if the buffer is closed.
    ///
    /// Returns `false` if the buffer was closed.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return false;
            }
            if Instant::now() >= deadline {
                return true;
            }
            self.changed.wait_until(&mut state, deadline);
        }
    }

    /// Push every pending target later by `delta`, keeping relative spacing.
    pub fn shift_pending(&self, delta: Duration) {
        let mut state = self.state.lock();
        if state.slots.is_empty() {
            return;
        }
        for slot in state.slots.iter_mut() {
            if let Some(shifted) = slot.target.checked_add(delta) {
                slot.target = shifted;
            }
        }
        self.changed.notify_all();
    }

    /// Stop the buffer: wakes every waiter; further offers are refused.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.not_full.notify_all();
        self.changed.notify_all();
    }

    /// Remove and return every pending slot in delivery order.
    pub fn take_all(&self) -> Vec<FrameSlot<P>> {
        let mut state = self.state.lock();
        let slots: Vec<_> = state.slots.drain(..).collect();
        self.not_full.notify_all();
        self.changed.notify_all();
        slots
    }

    /// Forget the last delivered target so the next frame is not rejected
    /// against a stale timeline.
    pub fn reset_timeline(&self) {
        self.state.lock().last_delivered_target = None;
    }

    pub fn set_capacity(&self, capacity: usize) {
        let mut state = self.state.lock();
        state.capacity = capacity;
        self.not_full.notify_all();
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        let state = self.state.lock();
        state.slots.len() >= state.capacity
    }

    /// Slots dequeued but not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// Frames pending plus frames in flight.
    pub fn outstanding(&self) -> usize {
        let state = self.state.lock();
        state.slots.len() + state.in_flight
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Target times of the pending slots, in delivery order.
    pub fn pending_targets(&self) -> Vec<Instant> {
        self.state.lock().slots.iter().map(|slot| slot.target).collect()
    }
}
