//! Timeline resolution for XFL (Adobe Animate) documents.
//!
//! The engine walks a document's layer, frame and symbol graph and resolves
//! any (timeline, frame index) pair into an immutable tree of [`Frame`]
//! nodes: transforms, shape payloads and mask scopes in paint order.
//! Renderers consume that tree through the [`XflRenderer`] visitor without
//! knowing anything about XFL itself.
//!
//! ```no_run
//! use xfl_core::{BoundingBoxRenderer, XflDocument};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let doc = XflDocument::open("export/my-animation")?;
//! let scene = doc.default_timeline()?;
//! for index in 0..scene.frame_count {
//!     let frame = scene.frame_at(&doc.ids, index);
//!     let mut bounds = BoundingBoxRenderer::new();
//!     frame.render(&mut bounds);
//!     println!("{index}: {:?}", bounds.finish()?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bounds;
pub mod color;
pub mod document;
pub mod easing;
pub mod error;
pub mod frame;
pub mod matrix;
pub mod renderer;
pub mod timeline;
pub mod tweens;

pub use bounds::{shape_bounds, shape_center, BoundingBoxRenderer, Bounds};
pub use color::ColorTransform;
pub use document::XflDocument;
pub use easing::{Ease, Eases};
pub use error::ResolveError;
pub use frame::{ElementType, Frame, FrameBody, FrameId, IdAllocator, Label, ShapePayload};
pub use matrix::Matrix;
pub use renderer::XflRenderer;
pub use timeline::{Asset, DomFrame, Layer, LayerKind, LoopType};
