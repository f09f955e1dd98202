// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Frames and buffered frame slots.

use std::cmp::Ordering;
use std::time::Instant;

/// One time-stamped simulation snapshot offered for display.
///
/// The payload is opaque to the scheduler. Sequence numbers are assigned by
/// the [`Visualizer`](super::Visualizer) when the frame is reported and are
/// strictly increasing for the lifetime of that visualizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<P> {
    sequence: u64,
    sim_time: f64,
    payload: P,
}

impl<P> Frame<P> {
    pub fn new(sequence: u64, sim_time: f64, payload: P) -> Self {
        Self {
            sequence,
            sim_time,
            payload,
        }
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Simulated time of the snapshot, in simulation time units.
    #[inline]
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    #[inline]
    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }
}

/// A buffered frame together with the real time at which it is due.
///
/// Slots order by target time, ties broken by sequence number.
#[derive(Debug)]
pub struct FrameSlot<P> {
    pub frame: Frame<P>,
    pub target: Instant,
}

impl<P> FrameSlot<P> {
    pub fn new(frame: Frame<P>, target: Instant) -> Self {
        Self { frame, target }
    }

    #[inline]
    pub(crate) fn sort_key(&self) -> (Instant, u64) {
        (self.target, self.frame.sequence)
    }

    /// Compare two slots by delivery order.
    pub fn delivery_order(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_frame_accessors() {
        let frame = Frame::new(7, 1.25, "state");
        assert_eq!(frame.sequence(), 7);
        assert_eq!(frame.sim_time(), 1.25);
        assert_eq!(*frame.payload(), "state");
        assert_eq!(frame.into_payload(), "state");
    }

    #[test]
    fn test_slot_ordering_ties_broken_by_sequence() {
        let now = Instant::now();
        let a = FrameSlot::new(Frame::new(2, 0.0, ()), now);
        let b = FrameSlot::new(Frame::new(1, 0.0, ()), now);
        let c = FrameSlot::new(Frame::new(0, 0.0, ()), now + Duration::from_millis(1));

        assert_eq!(a.delivery_order(&b), Ordering::Greater);
        assert_eq!(b.delivery_order(&c), Ordering::Less);
        assert_eq!(c.delivery_order(&a), Ordering::Greater);
    }
}
