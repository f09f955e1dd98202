// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! RealTime delivery thread and the state it shares with the producer.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::Mutex;

use super::buffer::FrameBuffer;
use super::controller::ControllerRegistry;
use super::error::{Result, VizError};
use super::frame::Frame;
use super::renderer::FrameRenderer;
use super::stats::Stats;

pub(crate) const DELIVERY_THREAD_NAME: &str = "simviz-delivery";

/// State shared by the producer and the delivery thread.
///
/// Lock order is controllers, then renderer.
pub(crate) struct DeliveryShared<P, D> {
    pub buffer: FrameBuffer<P>,
    pub renderer: Mutex<Box<dyn FrameRenderer<P, D>>>,
    pub controllers: Mutex<ControllerRegistry<P, D>>,
    pub stats: Stats,
    /// Set when the renderer failed on the delivery thread.
    pub failure: Mutex<Option<String>>,
}

impl<P, D> DeliveryShared<P, D> {
    pub fn new(renderer: Box<dyn FrameRenderer<P, D>>, capacity: usize) -> Self {
        Self {
            buffer: FrameBuffer::new(capacity),
            renderer: Mutex::new(renderer),
            controllers: Mutex::new(ControllerRegistry::new()),
            stats: Stats::new(),
            failure: Mutex::new(None),
        }
    }

    /// Run the frame controllers, then hand the frame to the renderer.
    pub fn render(&self, frame: &Frame<P>) -> Result<()> {
        let mut controllers = self.controllers.lock();
        let decorations = controllers.collect_decorations(frame);
        self.renderer.lock().render(frame, decorations)?;
        drop(controllers);

        self.stats.record_rendered();
        Ok(())
    }

    pub fn failure(&self) -> Option<VizError> {
        self.failure
            .lock()
            .as_ref()
            .map(|msg| VizError::DeliveryFailed(msg.clone()))
    }

    /// Close the buffer and count everything still pending as dropped.
    pub fn discard_pending(&self) -> usize {
        self.buffer.close();
        let discarded = self.buffer.take_all().len();
        if discarded > 0 {
            self.stats.record_dropped(discarded as u64);
        }
        discarded
    }
}

/// Closes the buffer when the delivery loop exits, including by panic, so a
/// producer blocked on a full buffer is never stranded.
struct CloseOnExit<'a, P>(&'a FrameBuffer<P>);

impl<P> Drop for CloseOnExit<'_, P> {
    fn drop(&mut self) {
        self.0.close();
    }
}

pub(crate) fn spawn_delivery_thread<P, D>(
    shared: Arc<DeliveryShared<P, D>>,
) -> Result<JoinHandle<()>>
where
    P: Send + 'static,
    D: 'static,
{
    std::thread::Builder::new()
        .name(DELIVERY_THREAD_NAME.to_string())
        .spawn(move || run_delivery_loop(&shared))
        .map_err(|e| VizError::Spawn(e.to_string()))
}

fn run_delivery_loop<P, D>(shared: &DeliveryShared<P, D>) {
    tracing::info!("[{}] Thread started", DELIVERY_THREAD_NAME);
    let _close = CloseOnExit(&shared.buffer);

    while let Some(slot) = shared.buffer.dequeue_when_due() {
        let sequence = slot.frame.sequence();
        tracing::trace!(
            "[{}] Delivering frame {} (sim time {}, {:?} past target)",
            DELIVERY_THREAD_NAME,
            sequence,
            slot.frame.sim_time(),
            Instant::now().saturating_duration_since(slot.target)
        );

        if let Err(e) = shared.render(&slot.frame) {
            tracing::error!(
                "[{}] Renderer failed on frame {}: {}",
                DELIVERY_THREAD_NAME,
                sequence,
                e
            );
            *shared.failure.lock() = Some(e.to_string());
            shared.stats.record_dropped(1);
            let discarded = shared.discard_pending();
            shared.buffer.mark_delivered();
            tracing::warn!(
                "[{}] Discarded {} pending frames after renderer failure",
                DELIVERY_THREAD_NAME,
                discarded
            );
            break;
        }

        shared.buffer.mark_delivered();
    }

    tracing::info!("[{}] Thread stopped", DELIVERY_THREAD_NAME);
}
