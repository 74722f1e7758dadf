//! Renderer protocol.
//!
//! Backends implement `XflRenderer` and receive the frame tree as a stream of
//! scope events. Every method defaults to a no-op so a backend only handles
//! the events it cares about.

use crate::color::ColorTransform;
use crate::frame::{Frame, ShapePayload};
use crate::matrix::Matrix;

#[allow(unused_variables)]
pub trait XflRenderer {
    /// Enter a transform scope. `matrix` and `color` apply to everything
    /// rendered until the matching `pop_transform`.
    fn push_transform(
        &mut self,
        frame: &Frame,
        matrix: Option<&Matrix>,
        color: Option<&ColorTransform>,
    ) {
    }

    fn pop_transform(&mut self, frame: &Frame) {}

    /// A leaf shape in the current scope.
    fn render_shape(&mut self, frame: &Frame, payload: &ShapePayload, document_dims: (f64, f64)) {}

    /// Enter the mask definition of a clip scope. Shapes until `pop_mask`
    /// define the clip region rather than painted content.
    fn push_mask(&mut self, frame: &Frame) {}

    fn pop_mask(&mut self, frame: &Frame) {}

    /// Enter the clipped content of a clip scope.
    fn push_masked_render(&mut self, frame: &Frame) {}

    fn pop_masked_render(&mut self, frame: &Frame) {}

    /// Called after a frame and its whole subtree have been emitted, in
    /// strict post-order.
    fn on_frame_rendered(&mut self, frame: &Frame) {}

    /// Viewport requested by the caller, in document pixels.
    fn set_camera(&mut self, x: f64, y: f64, width: f64, height: f64) {}
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records the event stream as strings for order assertions.
    #[derive(Default)]
    pub struct RecordingRenderer {
        pub events: Vec<String>,
    }

    impl XflRenderer for RecordingRenderer {
        fn push_transform(
            &mut self,
            frame: &Frame,
            _matrix: Option<&Matrix>,
            _color: Option<&ColorTransform>,
        ) {
            self.events.push(format!("push_transform {}", frame.id.0));
        }

        fn pop_transform(&mut self, frame: &Frame) {
            self.events.push(format!("pop_transform {}", frame.id.0));
        }

        fn render_shape(
            &mut self,
            frame: &Frame,
            _payload: &ShapePayload,
            _document_dims: (f64, f64),
        ) {
            self.events.push(format!("shape {}", frame.id.0));
        }

        fn push_mask(&mut self, frame: &Frame) {
            self.events.push(format!("push_mask {}", frame.id.0));
        }

        fn pop_mask(&mut self, frame: &Frame) {
            self.events.push(format!("pop_mask {}", frame.id.0));
        }

        fn push_masked_render(&mut self, frame: &Frame) {
            self.events.push(format!("push_masked {}", frame.id.0));
        }

        fn pop_masked_render(&mut self, frame: &Frame) {
            self.events.push(format!("pop_masked {}", frame.id.0));
        }

        fn on_frame_rendered(&mut self, frame: &Frame) {
            self.events.push(format!("rendered {}", frame.id.0));
        }
    }
}
