//! Rendering backend interface
//!
//! The compositor core does not draw anything itself. A [`Renderer`] installed with
//! [`Compositor::set_renderer`](crate::compositor::Compositor::set_renderer) is handed the scene
//! whenever a frame was requested, and composites it onto the outputs it drives.

use std::fmt;

use crate::{compositor::Surfaces, desktop::Scene, utils::Rectangle};

/// A display driven by a renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Name of the output, like `HDMI-A-1`
    pub name: String,
    /// Area of the global space shown on this output
    pub geometry: Rectangle<i32>,
}

/// A renderer compositing the scene onto its outputs
pub trait Renderer: fmt::Debug {
    /// Outputs currently driven by this renderer
    fn outputs(&self) -> &[Output];

    /// Draw a frame
    ///
    /// Views are to be drawn in the order of [`Scene::views_back_to_front`].
    fn render(&mut self, scene: &Scene, surfaces: &Surfaces);
}
