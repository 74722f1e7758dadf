//! The resolved frame tree.
//!
//! Resolution turns one timeline frame into a tree of `Frame` nodes. Each
//! node pairs an envelope (identity, provenance labels) with a body that is
//! either a transform scope over children, a leaf shape, or a mask scope.
//! Trees are immutable once built and shared via `Rc`, so pointer equality
//! doubles as cache-hit detection.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::color::ColorTransform;
use crate::matrix::Matrix;
use crate::renderer::XflRenderer;

/// Monotonic identifier unique within one resolution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

/// Hands out `FrameId`s. Owned by the session so ids stay unique across every
/// asset resolved against the same document.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: Cell<u64>,
}

impl IdAllocator {
    pub fn new() -> IdAllocator {
        IdAllocator::default()
    }

    pub fn allocate(&self) -> FrameId {
        let id = self.next.get();
        self.next.set(id + 1);
        FrameId(id)
    }
}

/// What kind of document object a frame stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Layer,
    Asset,
    Scene,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Layer => "layer",
            ElementType::Asset => "asset",
            ElementType::Scene => "scene",
        }
    }
}

/// Structured provenance attached to a frame for tracing and export.
pub type Label = Map<String, Value>;

/// Leaf shape data. Either the raw XFL `<DOMShape>` markup or an
/// already-structured form produced by tweening snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapePayload {
    DomShape(String),
    Dict(Value),
}

#[derive(Debug)]
pub enum FrameBody {
    /// A transform scope: matrix and color apply to every child.
    Transform {
        matrix: Option<Matrix>,
        color: Option<ColorTransform>,
        children: Vec<Rc<Frame>>,
    },
    /// A leaf shape, with the document dimensions it was authored against.
    Shape {
        payload: ShapePayload,
        document_dims: (f64, f64),
    },
    /// A clip scope: `mask` defines the clip region for `children`.
    Masked {
        mask: Rc<Frame>,
        children: Vec<Rc<Frame>>,
    },
}

#[derive(Debug)]
pub struct Frame {
    pub id: FrameId,
    /// Document object this frame renders, when it corresponds to one.
    pub element: Option<(ElementType, Option<String>)>,
    pub labels: Vec<Label>,
    pub body: FrameBody,
}

impl Frame {
    pub fn transform(
        ids: &IdAllocator,
        matrix: Option<Matrix>,
        color: Option<ColorTransform>,
        children: Vec<Rc<Frame>>,
    ) -> Frame {
        Frame {
            id: ids.allocate(),
            element: None,
            labels: Vec::new(),
            body: FrameBody::Transform {
                matrix,
                color,
                children,
            },
        }
    }

    pub fn group(ids: &IdAllocator, children: Vec<Rc<Frame>>) -> Frame {
        Frame::transform(ids, None, None, children)
    }

    pub fn shape(ids: &IdAllocator, payload: ShapePayload, document_dims: (f64, f64)) -> Frame {
        Frame {
            id: ids.allocate(),
            element: None,
            labels: Vec::new(),
            body: FrameBody::Shape {
                payload,
                document_dims,
            },
        }
    }

    pub fn masked(ids: &IdAllocator, mask: Rc<Frame>, children: Vec<Rc<Frame>>) -> Frame {
        Frame {
            id: ids.allocate(),
            element: None,
            labels: Vec::new(),
            body: FrameBody::Masked { mask, children },
        }
    }

    /// Tag this frame as rendering a document object and record it in the
    /// label trail.
    pub fn set_element(&mut self, element_type: ElementType, id: Option<String>) {
        let mut label = Map::new();
        label.insert("type".to_string(), Value::String("element".to_string()));
        label.insert("frame.id".to_string(), Value::from(self.id.0));
        label.insert(
            "element_type".to_string(),
            Value::String(element_type.as_str().to_string()),
        );
        if let Some(id) = &id {
            label.insert("element_id".to_string(), Value::String(id.clone()));
        }
        self.labels.push(label);
        self.element = Some((element_type, id));
    }

    pub fn push_label(&mut self, label: Label) {
        self.labels.push(label);
    }

    pub fn children(&self) -> &[Rc<Frame>] {
        match &self.body {
            FrameBody::Transform { children, .. } => children,
            FrameBody::Masked { children, .. } => children,
            FrameBody::Shape { .. } => &[],
        }
    }

    /// Walk the tree through a renderer. Scope pushes happen pre-order,
    /// `on_frame_rendered` strictly post-order.
    pub fn render(&self, renderer: &mut dyn XflRenderer) {
        match &self.body {
            FrameBody::Transform {
                matrix,
                color,
                children,
            } => {
                renderer.push_transform(self, matrix.as_ref(), color.as_ref());
                for child in children {
                    child.render(renderer);
                }
                renderer.pop_transform(self);
                renderer.on_frame_rendered(self);
            }
            FrameBody::Shape {
                payload,
                document_dims,
            } => {
                renderer.render_shape(self, payload, *document_dims);
                renderer.on_frame_rendered(self);
            }
            FrameBody::Masked { mask, children } => {
                renderer.push_mask(self);
                mask.render(renderer);
                renderer.pop_mask(self);
                renderer.push_masked_render(self);
                for child in children {
                    child.render(renderer);
                }
                renderer.pop_masked_render(self);
                renderer.on_frame_rendered(self);
            }
        }
    }
}
