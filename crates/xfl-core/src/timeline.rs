//! Timeline resolution: assets, layers, frame spans and placed elements.
//!
//! An asset's timeline is a stack of layers; each layer is a run of frame
//! spans; each span places elements (shapes, symbol instances, groups) that
//! hold for its whole duration. Resolving (asset, frame index) walks this
//! structure into an immutable frame tree, memoized at every level so
//! repeated indices return the identical `Rc`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::warn;

use xfl_data::XmlNode;

use crate::bounds::shape_bounds;
use crate::color::ColorTransform;
use crate::document::XflDocument;
use crate::easing::parse_eases;
use crate::error::ResolveError;
use crate::frame::{ElementType, Frame, IdAllocator};
use crate::matrix::{Matrix, IDENTITY};
use crate::tweens::{color_interpolation, matrix_interpolation, shape_interpolation};

/// How a symbol instance advances its target's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopType {
    SingleFrame,
    PlayOnce,
    Loop,
}

impl LoopType {
    fn parse(value: Option<&str>) -> Result<LoopType, ResolveError> {
        match value {
            None | Some("single frame") => Ok(LoopType::SingleFrame),
            Some("play once") => Ok(LoopType::PlayOnce),
            Some("loop") => Ok(LoopType::Loop),
            Some(other) => Err(ResolveError::UnknownLoopType(other.to_string())),
        }
    }
}

/// Mutable per-element render parameters. Tween guards substitute these for
/// the span of one resolution and restore them on drop, so the fields live
/// in cells shared between the element and its tween tracks.
#[derive(Debug, Default)]
pub struct ElementState {
    matrix: Cell<Option<Matrix>>,
    color: Cell<Option<ColorTransform>>,
    shape: RefCell<Option<Rc<Frame>>>,
}

impl ElementState {
    pub fn matrix(&self) -> Option<Matrix> {
        self.matrix.get()
    }

    pub fn color(&self) -> Option<ColorTransform> {
        self.color.get()
    }
}

pub struct ShapeElement {
    pub state: Rc<ElementState>,
    /// The authored `<DOMShape>` node, kept for tween generation.
    pub node: XmlNode,
}

pub struct SymbolElement {
    pub state: Rc<ElementState>,
    pub loop_type: LoopType,
    pub first_frame: usize,
    /// Parsed but not consulted; playback ignores it like Animate does.
    pub last_frame: usize,
    pub target: Option<Rc<Asset>>,
}

pub struct GroupElement {
    pub color: Option<ColorTransform>,
    pub members: Vec<Element>,
}

/// A placed element. Anything unrecognized resolves to an empty frame.
pub enum Element {
    Shape(ShapeElement),
    SymbolInstance(SymbolElement),
    Group(GroupElement),
    Generic,
}

impl Element {
    fn parse(
        doc: &XflDocument,
        asset_id: &str,
        layer_index: usize,
        start_frame_index: usize,
        path: &[usize],
        node: &XmlNode,
    ) -> Result<Element, ResolveError> {
        match node.name() {
            "DOMShape" => {
                let state = Rc::new(ElementState {
                    matrix: Cell::new(Matrix::from_node(node)?.filter(|m| !m.is_identity())),
                    color: Cell::new(ColorTransform::from_element_node(node)?),
                    shape: RefCell::new(Some(doc.get_shape(
                        &node.to_string(),
                        asset_id,
                        layer_index,
                        start_frame_index,
                        path,
                    ))),
                });
                Ok(Element::Shape(ShapeElement {
                    state,
                    node: node.clone(),
                }))
            }
            "DOMSymbolInstance" => {
                let state = Rc::new(ElementState {
                    matrix: Cell::new(Matrix::from_node(node)?.filter(|m| !m.is_identity())),
                    color: Cell::new(ColorTransform::from_element_node(node)?),
                    shape: RefCell::new(None),
                });
                let target = match node.attr("libraryItemName") {
                    Some(name) => {
                        let asset = doc.get_safe_asset(name);
                        if asset.is_none() {
                            warn!(symbol = name, "missing asset");
                        }
                        asset
                    }
                    None => None,
                };
                let loop_type = LoopType::parse(node.attr("loop"))?;
                let frame_count = target.as_ref().map(|a| a.frame_count).unwrap_or(1);
                Ok(Element::SymbolInstance(SymbolElement {
                    state,
                    loop_type,
                    first_frame: node.usize_attr("firstFrame", 0)?,
                    last_frame: node.usize_attr("lastFrame", frame_count.saturating_sub(1))?,
                    target,
                }))
            }
            "DOMGroup" => {
                let mut members = Vec::new();
                if let Some(container) = node.child("members") {
                    for (i, member) in container.children().iter().enumerate() {
                        let mut member_path = path.to_vec();
                        member_path.push(i);
                        members.push(Element::parse(
                            doc,
                            asset_id,
                            layer_index,
                            start_frame_index,
                            &member_path,
                            member,
                        )?);
                    }
                }
                Ok(Element::Group(GroupElement {
                    color: ColorTransform::from_element_node(node)?,
                    members,
                }))
            }
            _ => Ok(Element::Generic),
        }
    }

    fn resolve(&self, ids: &IdAllocator, iteration: usize) -> Rc<Frame> {
        match self {
            Element::Shape(shape) => {
                let inner = shape.state.shape.borrow().clone();
                let children = inner.into_iter().collect();
                Rc::new(Frame::transform(
                    ids,
                    shape.state.matrix.get(),
                    shape.state.color.get(),
                    children,
                ))
            }
            Element::SymbolInstance(symbol) => symbol.resolve(ids, iteration),
            Element::Group(group) => {
                let children = group
                    .members
                    .iter()
                    .map(|member| member.resolve(ids, iteration))
                    .collect();
                // Group matrices are baked into member coordinates by the
                // authoring tool; only the color effect applies here.
                Rc::new(Frame::transform(ids, None, group.color, children))
            }
            Element::Generic => Rc::new(Frame::group(ids, Vec::new())),
        }
    }
}

impl SymbolElement {
    fn resolve(&self, ids: &IdAllocator, iteration: usize) -> Rc<Frame> {
        let Some(target) = &self.target else {
            return Rc::new(Frame::group(ids, Vec::new()));
        };

        let frame_index = match self.loop_type {
            LoopType::SingleFrame => {
                if self.first_frame >= target.frame_count {
                    return Rc::new(Frame::group(ids, Vec::new()));
                }
                self.first_frame
            }
            LoopType::PlayOnce => {
                (self.first_frame + iteration).min(target.frame_count.saturating_sub(1))
            }
            LoopType::Loop => {
                if target.frame_count == 0 {
                    warn!(asset = %target.id, "looping over an empty timeline");
                    return Rc::new(Frame::group(ids, Vec::new()));
                }
                (self.first_frame + iteration) % target.frame_count
            }
        };

        let inner = target.frame_at(ids, frame_index);
        Rc::new(Frame::transform(
            ids,
            self.state.matrix.get(),
            self.state.color.get(),
            vec![inner],
        ))
    }
}

enum TweenTrack {
    Motion {
        state: Rc<ElementState>,
        matrices: Vec<Matrix>,
        colors: Vec<Option<ColorTransform>>,
    },
    Shape {
        state: Rc<ElementState>,
        shapes: Vec<Rc<Frame>>,
    },
}

pub struct Tween {
    tracks: Vec<TweenTrack>,
}

enum SavedState {
    Motion {
        state: Rc<ElementState>,
        matrix: Option<Matrix>,
        color: Option<ColorTransform>,
    },
    Shape {
        state: Rc<ElementState>,
        shape: Option<Rc<Frame>>,
        matrix: Option<Matrix>,
        restore_matrix: bool,
    },
}

/// Applies a tween sample to its elements and restores the originals when
/// dropped, including on early returns.
pub struct TweenGuard {
    saved: Vec<SavedState>,
}

impl Tween {
    fn apply(&self, n: usize) -> TweenGuard {
        let mut saved = Vec::with_capacity(self.tracks.len());
        for track in &self.tracks {
            match track {
                TweenTrack::Motion {
                    state,
                    matrices,
                    colors,
                } => {
                    saved.push(SavedState::Motion {
                        state: state.clone(),
                        matrix: state.matrix.get(),
                        color: state.color.get(),
                    });
                    if let Some(matrix) = matrices.get(n) {
                        state.matrix.set(Some(*matrix));
                    }
                    if let Some(color) = colors.get(n) {
                        state.color.set(*color);
                    }
                }
                TweenTrack::Shape { state, shapes } => {
                    let previous_shape = state.shape.borrow().clone();
                    let previous_matrix = state.matrix.get();
                    if let Some(shape) = shapes.get(n) {
                        *state.shape.borrow_mut() = Some(shape.clone());
                    }
                    // An interpolated snapshot is emitted in final
                    // coordinates; the authored matrix only applies to the
                    // literal first sample.
                    let restore_matrix = n != 0;
                    if restore_matrix {
                        state.matrix.set(None);
                    }
                    saved.push(SavedState::Shape {
                        state: state.clone(),
                        shape: previous_shape,
                        matrix: previous_matrix,
                        restore_matrix,
                    });
                }
            }
        }
        TweenGuard { saved }
    }
}

impl Drop for TweenGuard {
    fn drop(&mut self) {
        for entry in self.saved.drain(..) {
            match entry {
                SavedState::Motion {
                    state,
                    matrix,
                    color,
                } => {
                    state.matrix.set(matrix);
                    state.color.set(color);
                }
                SavedState::Shape {
                    state,
                    shape,
                    matrix,
                    restore_matrix,
                } => {
                    *state.shape.borrow_mut() = shape;
                    if restore_matrix {
                        state.matrix.set(matrix);
                    }
                }
            }
        }
    }
}

fn unroll_shapes<'a>(elements: impl Iterator<Item = &'a Element>, out: &mut Vec<&'a ShapeElement>) {
    for element in elements {
        match element {
            Element::Shape(shape) => out.push(shape),
            Element::Group(group) => unroll_shapes(group.members.iter(), out),
            _ => {}
        }
    }
}

/// Merged centroid of a set of shapes' transformed bounding boxes.
/// Zero-area boxes contribute nothing.
fn center_point(shapes: &[&ShapeElement]) -> Result<Option<glam::DVec2>, ResolveError> {
    let mut merged = None;
    for shape in shapes {
        let matrix = shape.state.matrix.get().unwrap_or(IDENTITY);
        if let Some(bounds) = shape_bounds(&shape.node, &matrix)? {
            if bounds.width() != 0.0 && bounds.height() != 0.0 {
                merged = crate::bounds::Bounds::merge(merged, Some(bounds));
            }
        }
    }
    Ok(merged.map(|b| b.center()))
}

/// One keyframe span on a layer.
pub struct DomFrame {
    pub start_frame_index: usize,
    pub duration: usize,
    doc_id: String,
    asset_id: String,
    layer_id: String,
    layer_index: usize,
    tween_type: Option<String>,
    elements: Vec<Element>,
    node: XmlNode,
    tween: RefCell<Option<Tween>>,
    cache: RefCell<HashMap<usize, Rc<Frame>>>,
}

impl DomFrame {
    fn parse(
        doc: &XflDocument,
        asset_id: &str,
        layer_id: &str,
        layer_index: usize,
        node: &XmlNode,
    ) -> Result<DomFrame, ResolveError> {
        let start_frame_index = node.usize_attr("index", 0)?;
        let duration = node.usize_attr("duration", 1)?;

        let mut elements = Vec::new();
        if let Some(container) = node.child("elements") {
            for (i, element_node) in container.children().iter().enumerate() {
                elements.push(Element::parse(
                    doc,
                    asset_id,
                    layer_index,
                    start_frame_index,
                    &[i],
                    element_node,
                )?);
            }
        }

        Ok(DomFrame {
            start_frame_index,
            duration,
            doc_id: doc.id.clone(),
            asset_id: asset_id.to_string(),
            layer_id: layer_id.to_string(),
            layer_index,
            tween_type: node.attr("tweenType").map(str::to_string),
            elements,
            node: node.clone(),
            tween: RefCell::new(None),
            cache: RefCell::new(HashMap::new()),
        })
    }

    pub fn end_frame_index(&self) -> usize {
        self.start_frame_index + self.duration
    }

    pub fn has_index(&self, frame_index: usize) -> bool {
        frame_index >= self.start_frame_index && frame_index < self.end_frame_index()
    }

    fn symbols(&self) -> impl Iterator<Item = &SymbolElement> {
        self.elements.iter().filter_map(|e| match e {
            Element::SymbolInstance(s) => Some(s),
            _ => None,
        })
    }

    fn direct_shapes(&self) -> impl Iterator<Item = &ShapeElement> {
        self.elements.iter().filter_map(|e| match e {
            Element::Shape(s) => Some(s),
            _ => None,
        })
    }

    fn init_tween(&self, doc: &XflDocument, next: &DomFrame) -> Result<(), ResolveError> {
        if self.elements.is_empty() || next.elements.is_empty() || self.duration == 1 {
            return Ok(());
        }

        let eases = parse_eases(&self.node)?;
        let samples = self.duration + 1;
        let mut tracks = Vec::new();

        match self.tween_type.as_deref() {
            Some("motion") => {
                let mut rotation = self.node.f64_attr("motionTweenRotateTimes", 0.0)?;
                if self.node.attr("motionTweenRotate") == Some("clockwise") {
                    rotation = -rotation;
                }

                for (start, end) in self.symbols().zip(next.symbols()) {
                    let matrices = matrix_interpolation(
                        start.state.matrix.get(),
                        end.state.matrix.get(),
                        samples,
                        rotation,
                        &eases,
                    );
                    let colors = color_interpolation(
                        start.state.color.get().as_ref(),
                        end.state.color.get().as_ref(),
                        samples,
                        &eases,
                    )
                    .into_iter()
                    .map(|c| (!c.is_identity()).then_some(c))
                    .collect();
                    tracks.push(TweenTrack::Motion {
                        state: start.state.clone(),
                        matrices,
                        colors,
                    });
                }

                let mut start_shapes = Vec::new();
                let mut end_shapes = Vec::new();
                unroll_shapes(
                    self.elements
                        .iter()
                        .filter(|e| !matches!(e, Element::SymbolInstance(_))),
                    &mut start_shapes,
                );
                unroll_shapes(
                    next.elements
                        .iter()
                        .filter(|e| !matches!(e, Element::SymbolInstance(_))),
                    &mut end_shapes,
                );
                if !start_shapes.is_empty() && !end_shapes.is_empty() {
                    let start_center = center_point(&start_shapes)?;
                    let end_center = center_point(&end_shapes)?;
                    if let (Some(start_center), Some(end_center)) = (start_center, end_center) {
                        let delta = end_center - start_center;
                        for shape in &start_shapes {
                            let start_matrix = shape.state.matrix.get();
                            let mut end_matrix = start_matrix.unwrap_or(IDENTITY);
                            end_matrix.tx += delta.x;
                            end_matrix.ty += delta.y;
                            let matrices = matrix_interpolation(
                                start_matrix,
                                Some(end_matrix),
                                samples,
                                rotation,
                                &eases,
                            );
                            let colors = vec![shape.state.color.get(); samples];
                            tracks.push(TweenTrack::Motion {
                                state: shape.state.clone(),
                                matrices,
                                colors,
                            });
                        }
                    }
                }
            }
            Some("shape") => {
                let segments = self.node.descendants_named("MorphSegment");
                if !segments.is_empty() {
                    for (start, end) in self.direct_shapes().zip(next.direct_shapes()) {
                        let payloads = shape_interpolation(
                            &segments,
                            &start.node,
                            &end.node,
                            samples,
                            &eases,
                        )?;
                        let shapes = payloads
                            .iter()
                            .enumerate()
                            .map(|(i, payload)| {
                                doc.get_shape(
                                    payload,
                                    &self.asset_id,
                                    self.layer_index,
                                    self.start_frame_index + i,
                                    &[0],
                                )
                            })
                            .collect();
                        tracks.push(TweenTrack::Shape {
                            state: start.state.clone(),
                            shapes,
                        });
                    }
                }
            }
            Some(other) => {
                return Err(ResolveError::UnknownTweenType(other.to_string()));
            }
            None => {}
        }

        *self.tween.borrow_mut() = Some(Tween { tracks });
        Ok(())
    }

    pub fn resolve(&self, ids: &IdAllocator, frame_index: usize) -> Rc<Frame> {
        if let Some(hit) = self.cache.borrow().get(&frame_index) {
            return hit.clone();
        }

        // Out-of-span indices resolve empty and are not worth caching.
        if !self.has_index(frame_index) {
            return Rc::new(Frame::group(ids, Vec::new()));
        }
        let iteration = frame_index - self.start_frame_index;

        let children = {
            let tween = self.tween.borrow();
            let _guard = tween.as_ref().map(|t| t.apply(iteration));
            self.elements
                .iter()
                .map(|element| element.resolve(ids, iteration))
                .collect()
        };

        let mut frame = Frame::group(ids, children);
        let mut label = Map::new();
        label.insert("type".to_string(), Value::String("placement".to_string()));
        label.insert("frame.id".to_string(), Value::from(frame.id.0));
        label.insert("file".to_string(), Value::String(self.doc_id.clone()));
        label.insert(
            "timeline".to_string(),
            Value::String(self.asset_id.clone()),
        );
        label.insert("layer".to_string(), Value::String(self.layer_id.clone()));
        label.insert("index".to_string(), Value::from(frame_index as u64));
        frame.push_label(label);

        let frame = Rc::new(frame);
        self.cache.borrow_mut().insert(frame_index, frame.clone());
        frame
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Normal,
    Mask,
    Other,
}

pub struct Layer {
    pub id: String,
    pub index: usize,
    pub name: Option<String>,
    pub visible: bool,
    pub kind: LayerKind,
    /// Index of the owning mask layer, when this layer is clipped by one.
    pub mask_layer: Option<usize>,
    pub domframes: Vec<DomFrame>,
    pub end_frame_index: usize,
    cache: RefCell<HashMap<usize, Rc<Frame>>>,
}

impl Layer {
    fn parse(
        doc: &XflDocument,
        asset_id: &str,
        index: usize,
        node: &XmlNode,
        prior: &[Layer],
    ) -> Result<Layer, ResolveError> {
        let id = format!("{asset_id}_L{index}");
        let kind = match node.attr("layerType").unwrap_or("normal") {
            "normal" => LayerKind::Normal,
            "mask" => LayerKind::Mask,
            _ => LayerKind::Other,
        };

        let mask_layer = match node.attr("parentLayerIndex") {
            Some(value) => {
                let parent_index = node.usize_attr("parentLayerIndex", 0)?;
                match prior.get(parent_index) {
                    Some(parent) if parent.kind == LayerKind::Mask => Some(parent_index),
                    Some(_) => None,
                    None => {
                        warn!(layer = %id, parent = value, "parent layer not yet declared");
                        None
                    }
                }
            }
            None => None,
        };

        let mut domframes = Vec::new();
        let mut end_frame_index = 0;
        if let Some(container) = node.child("frames") {
            for frame_node in container.children() {
                let domframe = DomFrame::parse(doc, asset_id, &id, index, frame_node)?;
                end_frame_index = end_frame_index.max(domframe.end_frame_index());
                domframes.push(domframe);
            }
        }

        for i in 1..domframes.len() {
            let (head, tail) = domframes.split_at(i);
            let prev = &head[i - 1];
            if prev.tween_type.is_some() {
                prev.init_tween(doc, &tail[0])?;
            }
        }

        Ok(Layer {
            id,
            index,
            name: node.attr("name").map(str::to_string),
            visible: node.attr("visible") != Some("false"),
            kind,
            mask_layer,
            domframes,
            end_frame_index,
            cache: RefCell::new(HashMap::new()),
        })
    }

    pub fn frame_at(&self, ids: &IdAllocator, frame_index: usize) -> Rc<Frame> {
        if let Some(hit) = self.cache.borrow().get(&frame_index) {
            return hit.clone();
        }

        let children = self
            .domframes
            .iter()
            .filter(|domframe| domframe.has_index(frame_index))
            .map(|domframe| domframe.resolve(ids, frame_index))
            .collect();
        let mut frame = Frame::group(ids, children);
        frame.set_element(ElementType::Layer, self.name.clone());

        let frame = Rc::new(frame);
        self.cache.borrow_mut().insert(frame_index, frame.clone());
        frame
    }
}

fn is_mask_empty(mask: &Frame) -> bool {
    mask.children()
        .iter()
        .all(|child| child.children().is_empty())
}

/// One timeline: a symbol's, or a document scene's.
pub struct Asset {
    pub id: String,
    pub kind: ElementType,
    pub layers: Vec<Layer>,
    pub frame_count: usize,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub background: Option<String>,
    cache: RefCell<HashMap<usize, Rc<Frame>>>,
}

impl Asset {
    pub(crate) fn parse(
        doc: &XflDocument,
        id: String,
        kind: ElementType,
        layers_node: &XmlNode,
        dims: Option<(f64, f64, String)>,
    ) -> Result<Rc<Asset>, ResolveError> {
        let mut layers: Vec<Layer> = Vec::new();
        let mut frame_count = 0;
        for (index, layer_node) in layers_node.children().iter().enumerate() {
            let layer = Layer::parse(doc, &id, index, layer_node, &layers)?;
            frame_count = frame_count.max(layer.end_frame_index);
            layers.push(layer);
        }

        let (width, height, background) = match dims {
            Some((w, h, bg)) => (Some(w), Some(h), Some(bg)),
            None => (None, None, None),
        };

        Ok(Rc::new(Asset {
            id,
            kind,
            layers,
            frame_count,
            width,
            height,
            background,
            cache: RefCell::new(HashMap::new()),
        }))
    }

    /// Resolve one frame of this timeline. Layers paint in reverse
    /// declaration order; mask layers wrap their dependent layers unless the
    /// mask resolves empty at this index, in which case dependents paint
    /// unclipped.
    pub fn frame_at(&self, ids: &IdAllocator, frame_index: usize) -> Rc<Frame> {
        if let Some(hit) = self.cache.borrow().get(&frame_index) {
            return hit.clone();
        }

        enum Entry {
            Plain(Rc<Frame>),
            Masked {
                layer_index: usize,
                mask: Rc<Frame>,
                children: Vec<Rc<Frame>>,
            },
        }

        let mut entries: Vec<Entry> = Vec::new();
        for layer in &self.layers {
            match layer.kind {
                LayerKind::Mask => {
                    let mask = layer.frame_at(ids, frame_index);
                    if !is_mask_empty(&mask) {
                        entries.push(Entry::Masked {
                            layer_index: layer.index,
                            mask,
                            children: Vec::new(),
                        });
                    }
                }
                LayerKind::Normal => {
                    let frame = layer.frame_at(ids, frame_index);
                    let masked = layer.mask_layer.and_then(|mask_index| {
                        entries.iter_mut().find_map(|entry| match entry {
                            Entry::Masked {
                                layer_index,
                                children,
                                ..
                            } if *layer_index == mask_index => Some(children),
                            _ => None,
                        })
                    });
                    match masked {
                        Some(children) => children.push(frame),
                        None => entries.push(Entry::Plain(frame)),
                    }
                }
                LayerKind::Other => {}
            }
        }

        // Later layers paint underneath, so declaration order reverses both
        // at the top level and inside each mask scope.
        let mut children = Vec::with_capacity(entries.len());
        for entry in entries.into_iter().rev() {
            match entry {
                Entry::Plain(frame) => children.push(frame),
                Entry::Masked {
                    mask,
                    children: mut masked_children,
                    ..
                } => {
                    masked_children.reverse();
                    children.push(Rc::new(Frame::masked(ids, mask, masked_children)));
                }
            }
        }

        let mut frame = Frame::group(ids, children);
        frame.set_element(self.kind, Some(self.id.clone()));

        let frame = Rc::new(frame);
        self.cache.borrow_mut().insert(frame_index, frame.clone());
        frame
    }
}
