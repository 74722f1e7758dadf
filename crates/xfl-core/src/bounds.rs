//! Bounding box accumulation over rendered frames.

use std::collections::HashMap;

use glam::DVec2;
use tracing::warn;

use xfl_data::shape::{parse_edges, stroke_weight, EdgePath, EdgeSegment};
use xfl_data::{ParseError, XmlNode};

use crate::color::ColorTransform;
use crate::frame::{Frame, FrameId, ShapePayload};
use crate::matrix::Matrix;
use crate::renderer::XflRenderer;

/// Axis-aligned box in document pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn point(p: DVec2) -> Bounds {
        Bounds {
            min_x: p.x,
            min_y: p.y,
            max_x: p.x,
            max_y: p.y,
        }
    }

    pub fn expand(&mut self, p: DVec2) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn merge(a: Option<Bounds>, b: Option<Bounds>) -> Option<Bounds> {
        match (a, b) {
            (Some(mut a), Some(b)) => {
                a.min_x = a.min_x.min(b.min_x);
                a.min_y = a.min_y.min(b.min_y);
                a.max_x = a.max_x.max(b.max_x);
                a.max_y = a.max_y.max(b.max_y);
                Some(a)
            }
            (a, None) => a,
            (None, b) => b,
        }
    }

    /// Grow by half a stroke width on every side.
    pub fn inflate(&self, width: f64) -> Bounds {
        Bounds {
            min_x: self.min_x - width / 2.0,
            min_y: self.min_y - width / 2.0,
            max_x: self.max_x + width / 2.0,
            max_y: self.max_y + width / 2.0,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn corners(&self) -> [DVec2; 4] {
        [
            DVec2::new(self.min_x, self.min_y),
            DVec2::new(self.min_x, self.max_y),
            DVec2::new(self.max_x, self.min_y),
            DVec2::new(self.max_x, self.max_y),
        ]
    }
}

fn quadratic_point(p1: DVec2, p2: DVec2, p3: DVec2, t: f64) -> DVec2 {
    (1.0 - t) * ((1.0 - t) * p1 + t * p2) + t * ((1.0 - t) * p2 + t * p3)
}

/// Parameter of the axis extremum of a quadratic bezier component, infinite
/// when the component is linear.
fn critical_parameter(p1: f64, p2: f64, p3: f64) -> f64 {
    let denom = p1 - 2.0 * p2 + p3;
    if denom == 0.0 {
        f64::INFINITY
    } else {
        (p1 - p2) / denom
    }
}

fn quadratic_bounds(p1: DVec2, control: DVec2, p2: DVec2) -> Bounds {
    let mut bounds = Bounds::point(p1);
    bounds.expand(p2);
    for t in [
        critical_parameter(p1.x, control.x, p2.x),
        critical_parameter(p1.y, control.y, p2.y),
    ] {
        if t > 0.0 && t < 1.0 {
            bounds.expand(quadratic_point(p1, control, p2, t));
        }
    }
    bounds
}

fn path_bounds(path: &EdgePath, matrix: &Matrix) -> Bounds {
    let mut last = matrix.apply(path.start);
    let mut bounds = Bounds::point(last);
    for segment in &path.segments {
        match segment {
            EdgeSegment::Line(to) => {
                last = matrix.apply(*to);
                bounds.expand(last);
            }
            EdgeSegment::Quad { control, to } => {
                let control = matrix.apply(*control);
                let to = matrix.apply(*to);
                bounds = Bounds::merge(
                    Some(bounds),
                    Some(quadratic_bounds(last, control, to)),
                )
                .unwrap_or(bounds);
                last = to;
            }
        }
    }
    bounds
}

/// Bounding box of a `<DOMShape>` node under `matrix`, inflated per edge by
/// the referenced stroke weight. `None` when the shape has no edge data.
pub fn shape_bounds(shape: &XmlNode, matrix: &Matrix) -> Result<Option<Bounds>, ParseError> {
    let mut stroke_weights: HashMap<usize, f64> = HashMap::new();
    if let Some(strokes) = shape.child("strokes") {
        for style in strokes.children_named("StrokeStyle") {
            stroke_weights.insert(style.usize_attr("index", 0)?, stroke_weight(style)?);
        }
    }

    let mut result = None;
    for edge in shape
        .child("edges")
        .map(|e| e.children_named("Edge"))
        .into_iter()
        .flatten()
    {
        let Some(edge_data) = edge.attr("edges") else {
            continue;
        };
        let width = match edge.attr("strokeStyle") {
            Some(_) => {
                let index = edge.usize_attr("strokeStyle", 0)?;
                stroke_weights.get(&index).copied().unwrap_or(0.0)
            }
            None => 0.0,
        };
        for path in parse_edges(edge_data)? {
            let bounds = path_bounds(&path, matrix).inflate(width);
            result = Bounds::merge(result, Some(bounds));
        }
    }
    Ok(result)
}

/// Center of a shape's untransformed bounding box.
pub fn shape_center(shape: &XmlNode) -> Result<Option<DVec2>, ParseError> {
    Ok(shape_bounds(shape, &crate::matrix::IDENTITY)?.map(|b| b.center()))
}

/// Renderer that accumulates the bounding box of everything painted.
///
/// Points gather per transform scope and get mapped through the scope matrix
/// on pop, so deeply nested instances cost four points per scope rather than
/// a re-walk. Mask definition shapes clip rather than paint and are skipped.
#[derive(Default)]
pub struct BoundingBoxRenderer {
    scopes: Vec<Vec<DVec2>>,
    mask_depth: usize,
    shape_cache: HashMap<FrameId, Option<Bounds>>,
    bounds: Option<Bounds>,
    camera: Option<(f64, f64, f64, f64)>,
    error: Option<ParseError>,
}

impl BoundingBoxRenderer {
    pub fn new() -> BoundingBoxRenderer {
        BoundingBoxRenderer {
            scopes: vec![Vec::new()],
            ..BoundingBoxRenderer::default()
        }
    }

    /// Final box. The camera, when set, overrides the accumulated bounds.
    pub fn finish(self) -> Result<Option<Bounds>, ParseError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if let Some((x, y, width, height)) = self.camera {
            return Ok(Some(Bounds {
                min_x: x,
                min_y: y,
                max_x: x + width,
                max_y: y + height,
            }));
        }
        Ok(self.bounds)
    }

    fn current_scope(&mut self) -> &mut Vec<DVec2> {
        if self.scopes.is_empty() {
            self.scopes.push(Vec::new());
        }
        self.scopes.last_mut().unwrap()
    }
}

impl XflRenderer for BoundingBoxRenderer {
    fn push_transform(
        &mut self,
        _frame: &Frame,
        _matrix: Option<&Matrix>,
        _color: Option<&ColorTransform>,
    ) {
        self.scopes.push(Vec::new());
    }

    fn pop_transform(
        &mut self,
        frame: &Frame,
    ) {
        let points = self.scopes.pop().unwrap_or_default();
        let matrix = match &frame.body {
            crate::frame::FrameBody::Transform { matrix, .. } => *matrix,
            _ => None,
        };
        let scope = self.current_scope();
        match matrix {
            Some(m) if !m.is_identity() => {
                scope.extend(points.into_iter().map(|p| m.apply(p)));
            }
            _ => scope.extend(points),
        }
    }

    fn render_shape(&mut self, frame: &Frame, payload: &ShapePayload, _dims: (f64, f64)) {
        if self.mask_depth > 0 || self.error.is_some() {
            return;
        }
        let entry = self.shape_cache.entry(frame.id);
        let bounds = match entry {
            std::collections::hash_map::Entry::Occupied(hit) => *hit.get(),
            std::collections::hash_map::Entry::Vacant(slot) => {
                let computed = match payload {
                    ShapePayload::DomShape(xml) => XmlNode::parse(xml)
                        .and_then(|node| shape_bounds(&node, &crate::matrix::IDENTITY)),
                    // Structured payloads carry no edge data to measure.
                    ShapePayload::Dict(_) => Ok(None),
                };
                match computed {
                    Ok(bounds) => *slot.insert(bounds),
                    Err(error) => {
                        self.error = Some(error);
                        return;
                    }
                }
            }
        };
        if let Some(bounds) = bounds {
            self.current_scope().extend(bounds.corners());
        }
    }

    fn push_mask(&mut self, _frame: &Frame) {
        self.mask_depth += 1;
    }

    fn pop_mask(&mut self, _frame: &Frame) {
        self.mask_depth -= 1;
    }

    fn on_frame_rendered(&mut self, _frame: &Frame) {
        if self.scopes.len() != 1 {
            return;
        }
        for point in self.scopes[0].drain(..) {
            match &mut self.bounds {
                Some(bounds) => bounds.expand(point),
                slot => *slot = Some(Bounds::point(point)),
            }
        }
    }

    fn set_camera(&mut self, x: f64, y: f64, width: f64, height: f64) {
        if width <= 0.0 || height <= 0.0 {
            warn!(width, height, "ignoring degenerate camera");
            return;
        }
        self.camera = Some((x, y, width, height));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r##"<DOMShape>
        <fills><FillStyle index="1"><SolidColor color="#FF0000"/></FillStyle></fills>
        <edges><Edge fillStyle0="1" edges="!0 0|200 0|200 200|0 200|0 0"/></edges>
      </DOMShape>"##;

    const STROKED_SQUARE: &str = r##"<DOMShape>
        <strokes>
          <StrokeStyle index="1">
            <SolidStroke weight="2"><fill><SolidColor color="#000000"/></fill></SolidStroke>
          </StrokeStyle>
        </strokes>
        <edges><Edge strokeStyle="1" edges="!0 0|200 0|200 200|0 200|0 0"/></edges>
      </DOMShape>"##;

    fn bounds_of(xml: &str, matrix: &Matrix) -> Option<Bounds> {
        let node = XmlNode::parse(xml).unwrap();
        shape_bounds(&node, matrix).unwrap()
    }

    #[test]
    fn test_square_bounds() {
        let b = bounds_of(SQUARE, &crate::matrix::IDENTITY).unwrap();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_stroke_inflation() {
        let b = bounds_of(STROKED_SQUARE, &crate::matrix::IDENTITY).unwrap();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (-1.0, -1.0, 11.0, 11.0));
    }

    #[test]
    fn test_translation() {
        let m = Matrix { tx: 5.0, ty: 5.0, ..crate::matrix::IDENTITY };
        let b = bounds_of(STROKED_SQUARE, &m).unwrap();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (4.0, 4.0, 16.0, 16.0));
    }

    #[test]
    fn test_quadratic_true_extrema() {
        // An upward-bulging arc from (0,0) to (10,0) with control (5,-10)
        // peaks at y = -5, not at the control point.
        let xml = r#"<DOMShape>
            <edges><Edge edges="!0 0[100 -200 200 0"/></edges>
          </DOMShape>"#;
        let b = bounds_of(xml, &crate::matrix::IDENTITY).unwrap();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (0.0, -5.0, 10.0, 0.0));
    }

    #[test]
    fn test_shape_center() {
        let node = XmlNode::parse(SQUARE).unwrap();
        assert_eq!(shape_center(&node).unwrap(), Some(DVec2::new(5.0, 5.0)));
    }

    #[test]
    fn test_renderer_accumulates_through_transforms() {
        use crate::frame::{Frame, IdAllocator, ShapePayload};
        use std::rc::Rc;

        let ids = IdAllocator::new();
        let shape = Rc::new(Frame::shape(
            &ids,
            ShapePayload::DomShape(SQUARE.to_string()),
            (550.0, 400.0),
        ));
        let m = Matrix { tx: 100.0, ty: 50.0, ..crate::matrix::IDENTITY };
        let root = Rc::new(Frame::transform(&ids, Some(m), None, vec![shape]));

        let mut renderer = BoundingBoxRenderer::new();
        root.render(&mut renderer);
        let b = renderer.finish().unwrap().unwrap();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (100.0, 50.0, 110.0, 60.0));
    }

    #[test]
    fn test_renderer_skips_mask_definition() {
        use crate::frame::{Frame, IdAllocator, ShapePayload};
        use std::rc::Rc;

        let ids = IdAllocator::new();
        let mask_shape = Rc::new(Frame::shape(
            &ids,
            ShapePayload::DomShape(
                r#"<DOMShape><edges><Edge edges="!0 0|8000 8000"/></edges></DOMShape>"#.to_string(),
            ),
            (550.0, 400.0),
        ));
        let mask = Rc::new(Frame::group(&ids, vec![mask_shape]));
        let content = Rc::new(Frame::shape(
            &ids,
            ShapePayload::DomShape(SQUARE.to_string()),
            (550.0, 400.0),
        ));
        let root = Rc::new(Frame::masked(&ids, mask, vec![content]));

        let mut renderer = BoundingBoxRenderer::new();
        root.render(&mut renderer);
        let b = renderer.finish().unwrap().unwrap();
        // Only the painted square counts, not the 400px mask geometry.
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_camera_overrides_bounds() {
        let mut renderer = BoundingBoxRenderer::new();
        renderer.set_camera(0.0, 0.0, 550.0, 400.0);
        let b = renderer.finish().unwrap().unwrap();
        assert_eq!((b.max_x, b.max_y), (550.0, 400.0));
    }
}
