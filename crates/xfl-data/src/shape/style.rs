//! Fill and stroke style definitions for XFL shapes.
//!
//! Only the forms shape tweening has to interpolate are richly typed: solid
//! colors and linear/radial gradients. Everything else in a style node rides
//! along untouched when a snapshot is re-serialized.

use glam::DVec2;

use crate::xml::XmlNode;
use crate::ParseError;

/// Half-width of the XFL gradient square, in pixels (16384 twips).
pub const GRADIENT_HALF_WIDTH: f64 = 16384.0 / 20.0;

#[derive(Debug, Clone, PartialEq)]
pub enum FillDef {
    Solid(SolidColor),
    Linear(LinearGradient),
    Radial(RadialGradient),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolidColor {
    pub color: String,
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradientStop {
    pub ratio: f64,
    pub color: String,
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradient {
    pub start: DVec2,
    pub end: DVec2,
    pub stops: Vec<GradientStop>,
    pub spread_method: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadialGradient {
    pub matrix: [f64; 6],
    pub radius: f64,
    pub focal_point: f64,
    pub stops: Vec<GradientStop>,
    pub spread_method: String,
}

/// Split a `#RRGGBB` color string into channels.
pub fn split_color(color: &str) -> Result<(u8, u8, u8), ParseError> {
    let hex = color
        .strip_prefix('#')
        .filter(|h| h.len() == 6)
        .ok_or_else(|| ParseError::InvalidColor(color.to_string()))?;
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .map_err(|_| ParseError::InvalidColor(color.to_string()))
    };
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn parse_gradient_matrix(node: &XmlNode) -> Result<[f64; 6], ParseError> {
    let matrix = node
        .child("matrix")
        .and_then(|outer| outer.child("Matrix"));
    match matrix {
        None => Ok([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]),
        Some(m) => Ok([
            m.f64_attr("a", 1.0)?,
            m.f64_attr("b", 0.0)?,
            m.f64_attr("c", 0.0)?,
            m.f64_attr("d", 1.0)?,
            m.f64_attr("tx", 0.0)?,
            m.f64_attr("ty", 0.0)?,
        ]),
    }
}

fn apply_matrix(m: &[f64; 6], p: DVec2) -> DVec2 {
    DVec2::new(
        m[0] * p.x + m[2] * p.y + m[4],
        m[1] * p.x + m[3] * p.y + m[5],
    )
}

fn parse_stops(node: &XmlNode) -> Result<Vec<GradientStop>, ParseError> {
    node.children_named("GradientEntry")
        .map(|entry| {
            Ok(GradientStop {
                ratio: entry.f64_attr("ratio", 0.0)?,
                color: entry.attr("color").unwrap_or("#000000").to_string(),
                alpha: entry.f64_attr("alpha", 1.0)?,
            })
        })
        .collect()
}

impl SolidColor {
    pub fn from_xfl(node: &XmlNode) -> Result<SolidColor, ParseError> {
        Ok(SolidColor {
            color: node.attr("color").unwrap_or("#000000").to_string(),
            alpha: node.f64_attr("alpha", 1.0)?,
        })
    }

    pub fn to_xfl(&self) -> XmlNode {
        let mut node = XmlNode::new("SolidColor");
        node.set_attr("color", self.color.clone());
        node.set_attr("alpha", format!("{}", self.alpha));
        node
    }
}

impl LinearGradient {
    pub fn from_xfl(node: &XmlNode) -> Result<LinearGradient, ParseError> {
        let matrix = parse_gradient_matrix(node)?;
        Ok(LinearGradient {
            start: apply_matrix(&matrix, DVec2::new(-GRADIENT_HALF_WIDTH, 0.0)),
            end: apply_matrix(&matrix, DVec2::new(GRADIENT_HALF_WIDTH, 0.0)),
            stops: parse_stops(node)?,
            spread_method: node.attr("spreadMethod").unwrap_or("pad").to_string(),
        })
    }

    pub fn to_xfl(&self) -> XmlNode {
        // Reconstruct the gradient matrix from the endpoint span.
        let span = self.end - self.start;
        let mid = (self.start + self.end) / 2.0;
        let angle = span.y.atan2(span.x);
        let scale = span.length() / (2.0 * GRADIENT_HALF_WIDTH);
        let (sin, cos) = angle.sin_cos();
        let matrix = [
            cos * scale,
            sin * scale,
            -sin * scale,
            cos * scale,
            mid.x,
            mid.y,
        ];

        let mut node = XmlNode::new("LinearGradient");
        node.set_attr("spreadMethod", self.spread_method.clone());
        node.push_child(matrix_node(&matrix));
        for stop in &self.stops {
            node.push_child(stop_node(stop));
        }
        node
    }
}

impl RadialGradient {
    pub fn from_xfl(node: &XmlNode) -> Result<RadialGradient, ParseError> {
        let matrix = parse_gradient_matrix(node)?;
        let scale = (matrix[0] * matrix[0] + matrix[1] * matrix[1]).sqrt();
        let radius = GRADIENT_HALF_WIDTH * scale;
        let focal_ratio = node.f64_attr("focalPointRatio", 0.0)?;
        Ok(RadialGradient {
            matrix,
            radius,
            focal_point: focal_ratio * radius,
            stops: parse_stops(node)?,
            spread_method: node.attr("spreadMethod").unwrap_or("pad").to_string(),
        })
    }

    pub fn to_xfl(&self) -> XmlNode {
        let mut node = XmlNode::new("RadialGradient");
        node.set_attr("spreadMethod", self.spread_method.clone());
        if self.radius != 0.0 {
            node.set_attr(
                "focalPointRatio",
                format!("{}", self.focal_point / self.radius),
            );
        }
        node.push_child(matrix_node(&self.matrix));
        for stop in &self.stops {
            node.push_child(stop_node(stop));
        }
        node
    }
}

fn matrix_node(m: &[f64; 6]) -> XmlNode {
    let mut outer = XmlNode::new("matrix");
    let mut inner = XmlNode::new("Matrix");
    for (name, value) in ["a", "b", "c", "d", "tx", "ty"].iter().zip(m.iter()) {
        inner.set_attr(name, format!("{}", value));
    }
    outer.push_child(inner);
    outer
}

fn stop_node(stop: &GradientStop) -> XmlNode {
    let mut node = XmlNode::new("GradientEntry");
    node.set_attr("color", stop.color.clone());
    node.set_attr("alpha", format!("{}", stop.alpha));
    node.set_attr("ratio", format!("{}", stop.ratio));
    node
}

impl FillDef {
    /// Extract the tweenable fill definition from a FillStyle/StrokeStyle
    /// node, if it carries one.
    pub fn from_style(style: &XmlNode) -> Result<Option<FillDef>, ParseError> {
        let Some(def) = style.first_of(&["SolidColor", "LinearGradient", "RadialGradient"])
        else {
            return Ok(None);
        };
        let parsed = match def.name() {
            "SolidColor" => FillDef::Solid(SolidColor::from_xfl(def)?),
            "LinearGradient" => FillDef::Linear(LinearGradient::from_xfl(def)?),
            _ => FillDef::Radial(RadialGradient::from_xfl(def)?),
        };
        Ok(Some(parsed))
    }

    pub fn to_xfl(&self) -> XmlNode {
        match self {
            FillDef::Solid(s) => s.to_xfl(),
            FillDef::Linear(g) => g.to_xfl(),
            FillDef::Radial(g) => g.to_xfl(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FillDef::Solid(_) => "SolidColor",
            FillDef::Linear(_) => "LinearGradient",
            FillDef::Radial(_) => "RadialGradient",
        }
    }

    /// Replace the fill definition inside a style node with this one, in
    /// place. The node to replace is located by its element name.
    pub fn replace_in(&self, style: &mut XmlNode, previous: &FillDef) {
        replace_named(style, previous.kind(), &self.to_xfl());
    }
}

fn replace_named(node: &mut XmlNode, name: &str, replacement: &XmlNode) -> bool {
    for child in node.children_mut() {
        if child.name() == name {
            *child = replacement.clone();
            return true;
        }
        if replace_named(child, name, replacement) {
            return true;
        }
    }
    false
}

/// Stroke weight of a StrokeStyle node, in pixels. Defaults to 1.
pub fn stroke_weight(style: &XmlNode) -> Result<f64, ParseError> {
    match style.first_of(&["SolidStroke", "DashedStroke", "DottedStroke", "RaggedStroke", "StippleStroke", "HatchedStroke"]) {
        Some(stroke) => stroke.f64_attr("weight", 1.0),
        None => Ok(1.0),
    }
}
