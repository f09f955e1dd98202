// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-frame hooks run just before a frame is handed to the renderer.

use super::frame::Frame;

/// Append-only list of decorations collected for one frame.
///
/// Controllers can add items and inspect what earlier controllers added, but
/// cannot remove or reorder them.
#[derive(Debug)]
pub struct Decorations<D> {
    items: Vec<D>,
}

impl<D> Default for Decorations<D> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<D> Decorations<D> {
    pub fn push(&mut self, decoration: D) {
        self.items.push(decoration);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, D> {
        self.items.iter()
    }

    pub(crate) fn into_vec(self) -> Vec<D> {
        self.items
    }
}

/// Invoked immediately before each frame is rendered.
///
/// Typical uses are simulation-driven camera placement and per-frame
/// overlays. A controller sees the frame read-only; the only thing it may
/// change is the decoration list, and only by appending to it.
pub trait FrameController<P, D = ()>: Send {
    fn generate_controls(&mut self, frame: &Frame<P>, decorations: &mut Decorations<D>);
}

impl<P, D, F> FrameController<P, D> for F
where
    F: FnMut(&Frame<P>, &mut Decorations<D>) + Send,
{
    fn generate_controls(&mut self, frame: &Frame<P>, decorations: &mut Decorations<D>) {
        self(frame, decorations)
    }
}

/// Controllers owned by a visualizer, run in registration order.
pub struct ControllerRegistry<P, D> {
    controllers: Vec<Box<dyn FrameController<P, D>>>,
}

impl<P, D> Default for ControllerRegistry<P, D> {
    fn default() -> Self {
        Self {
            controllers: Vec::new(),
        }
    }
}

impl<P, D> ControllerRegistry<P, D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, controller: Box<dyn FrameController<P, D>>) {
        self.controllers.push(controller);
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Run every controller for `frame` and return the decorations they added.
    pub fn collect_decorations(&mut self, frame: &Frame<P>) -> Vec<D> {
        let mut decorations = Decorations::default();
        for controller in self.controllers.iter_mut() {
            controller.generate_controls(frame, &mut decorations);
        }
        decorations.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controllers_run_in_registration_order() {
        let mut registry: ControllerRegistry<(), String> = ControllerRegistry::new();
        registry.add(Box::new(|_: &Frame<()>, d: &mut Decorations<String>| {
            d.push("camera".into())
        }));
        registry.add(Box::new(|frame: &Frame<()>, d: &mut Decorations<String>| {
            d.push(format!("label@{}", frame.sim_time()))
        }));

        let decorations = registry.collect_decorations(&Frame::new(0, 2.5, ()));
        assert_eq!(decorations, vec!["camera".to_string(), "label@2.5".to_string()]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_empty_registry_adds_nothing() {
        let mut registry: ControllerRegistry<u32, u32> = ControllerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.collect_decorations(&Frame::new(0, 0.0, 1)).is_empty());
    }

    #[test]
    fn test_later_controllers_see_earlier_decorations() {
        let mut registry: ControllerRegistry<(), u32> = ControllerRegistry::new();
        registry.add(Box::new(|_: &Frame<()>, d: &mut Decorations<u32>| d.push(1)));
        registry.add(Box::new(|_: &Frame<()>, d: &mut Decorations<u32>| {
            let total: u32 = d.iter().sum();
            d.push(total + d.len() as u32)
        }));

        assert_eq!(registry.collect_decorations(&Frame::new(0, 0.0, ())), vec![1, 2]);
    }
}
