// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use super::error::Result;
use super::frame::Frame;

/// Renderer sink: accepts one finalized frame at a time.
///
/// Called on the producer thread for synchronous draws and on the delivery
/// thread for buffered RealTime frames, never on both at once. Implementations
/// may block (for example on a saturated display pipeline); that stall
/// propagates back to the producer as buffer backpressure.
///
/// `decorations` holds whatever the registered
/// [`FrameController`](super::FrameController)s appended for this frame.
pub trait FrameRenderer<P, D = ()>: Send {
    fn render(&mut self, frame: &Frame<P>, decorations: Vec<D>) -> Result<()>;
}

impl<P, D, F> FrameRenderer<P, D> for F
where
    F: FnMut(&Frame<P>, Vec<D>) -> Result<()> + Send,
{
    fn render(&mut self, frame: &Frame<P>, decorations: Vec<D>) -> Result<()> {
        self(frame, decorations)
    }
}
