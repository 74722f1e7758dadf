//! Tween easing curves.
//!
//! A frame can attach eases per channel (position, rotation, scale, color,
//! filters). Three curve forms exist: the classic intensity slider, the named
//! preset curves, and free-form piecewise cubic bezier paths.

use glam::DVec2;
use tracing::warn;

use xfl_data::XmlNode;

use crate::error::ResolveError;

#[derive(Debug, Clone, PartialEq)]
pub enum Ease {
    /// Classic ease slider, intensity in -100..=100. Zero is linear.
    Classic { intensity: f64 },
    Named { family: Family, direction: Direction },
    /// Piecewise cubic bezier over unit time, 3n+1 control points.
    Bezier(Vec<DVec2>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Quad,
    Cubic,
    Quart,
    Quint,
    Sine,
    Back,
    Bounce,
    Elastic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    InOut,
}

pub const LINEAR: Ease = Ease::Classic { intensity: 0.0 };

impl Default for Ease {
    fn default() -> Ease {
        LINEAR
    }
}

impl Ease {
    pub fn from_method(method: &str) -> Result<Ease, ResolveError> {
        let unknown = || ResolveError::UnknownEaseMethod(method.to_string());
        let (family, rest) = [
            ("quad", Family::Quad),
            ("cubic", Family::Cubic),
            ("quart", Family::Quart),
            ("quint", Family::Quint),
            ("sine", Family::Sine),
            ("back", Family::Back),
            ("bounce", Family::Bounce),
            ("elastic", Family::Elastic),
        ]
        .into_iter()
        .find_map(|(prefix, family)| method.strip_prefix(prefix).map(|rest| (family, rest)))
        .ok_or_else(unknown)?;
        let direction = match rest {
            "In" => Direction::In,
            "Out" => Direction::Out,
            "InOut" => Direction::InOut,
            _ => return Err(unknown()),
        };
        Ok(Ease::Named { family, direction })
    }

    /// Eased progress for linear progress `t` in 0..=1.
    pub fn apply(&self, t: f64) -> f64 {
        match self {
            Ease::Classic { intensity } => {
                let a = (intensity / 100.0).clamp(-1.0, 1.0);
                let curved = if a < 0.0 { t * t } else { t * (2.0 - t) };
                (1.0 - a.abs()) * t + a.abs() * curved
            }
            Ease::Named { family, direction } => apply_named(*family, *direction, t),
            Ease::Bezier(points) => sample_bezier_path(points, t),
        }
    }
}

fn apply_named(family: Family, direction: Direction, t: f64) -> f64 {
    match direction {
        Direction::In => ease_in(family, t),
        Direction::Out => 1.0 - ease_in(family, 1.0 - t),
        Direction::InOut => {
            if t < 0.5 {
                ease_in(family, 2.0 * t) / 2.0
            } else {
                1.0 - ease_in(family, 2.0 - 2.0 * t) / 2.0
            }
        }
    }
}

fn ease_in(family: Family, t: f64) -> f64 {
    use std::f64::consts::{FRAC_PI_2, PI};
    match family {
        Family::Quad => t * t,
        Family::Cubic => t * t * t,
        Family::Quart => t * t * t * t,
        Family::Quint => t * t * t * t * t,
        Family::Sine => 1.0 - (t * FRAC_PI_2).cos(),
        Family::Back => {
            let c1 = 1.70158;
            (c1 + 1.0) * t * t * t - c1 * t * t
        }
        Family::Bounce => 1.0 - bounce_out(1.0 - t),
        Family::Elastic => {
            if t == 0.0 || t == 1.0 {
                t
            } else {
                let c4 = 2.0 * PI / 3.0;
                -(2f64.powf(10.0 * t - 10.0)) * ((10.0 * t - 10.75) * c4).sin()
            }
        }
    }
}

fn bounce_out(t: f64) -> f64 {
    let n1 = 7.5625;
    let d1 = 2.75;
    if t < 1.0 / d1 {
        n1 * t * t
    } else if t < 2.0 / d1 {
        let t = t - 1.5 / d1;
        n1 * t * t + 0.75
    } else if t < 2.5 / d1 {
        let t = t - 2.25 / d1;
        n1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / d1;
        n1 * t * t + 0.984375
    }
}

/// Evaluate a piecewise cubic bezier path at time `x` by locating the cubic
/// segment covering `x` and Newton-solving its horizontal component.
fn sample_bezier_path(points: &[DVec2], x: f64) -> f64 {
    if points.len() < 4 {
        return x;
    }
    let last = points[points.len() - 1];
    if x <= points[0].x {
        return points[0].y;
    }
    if x >= last.x {
        return last.y;
    }
    // After the first anchor the path is (c1, c2, anchor) triples.
    let mut p0 = points[0];
    for chunk in points[1..].chunks_exact(3) {
        let (c1, c2, p3) = (chunk[0], chunk[1], chunk[2]);
        if x <= p3.x {
            let t = solve_cubic_parameter(p0.x, c1.x, c2.x, p3.x, x);
            return cubic_component(p0.y, c1.y, c2.y, p3.y, t);
        }
        p0 = p3;
    }
    last.y
}

fn cubic_component(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

fn solve_cubic_parameter(x0: f64, x1: f64, x2: f64, x3: f64, target: f64) -> f64 {
    let span = x3 - x0;
    let mut t = if span.abs() > 1e-12 {
        ((target - x0) / span).clamp(0.0, 1.0)
    } else {
        0.5
    };
    for _ in 0..8 {
        let value = cubic_component(x0, x1, x2, x3, t) - target;
        let u = 1.0 - t;
        let derivative =
            3.0 * u * u * (x1 - x0) + 6.0 * u * t * (x2 - x1) + 3.0 * t * t * (x3 - x2);
        if derivative.abs() < 1e-9 {
            break;
        }
        t = (t - value / derivative).clamp(0.0, 1.0);
    }
    t
}

/// Per-channel eases attached to a tweened frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Eases {
    pub position: Ease,
    pub rotation: Ease,
    pub scale: Ease,
    pub color: Ease,
    pub filters: Ease,
}

impl Eases {
    fn set_channel(&mut self, target: &str, ease: &Ease, overwrite: bool) {
        let slot = match target {
            "position" => &mut self.position,
            "rotation" => &mut self.rotation,
            "scale" => &mut self.scale,
            "color" => &mut self.color,
            "filters" => {
                warn!("filter eases are not supported");
                &mut self.filters
            }
            _ => return,
        };
        if overwrite || *slot == LINEAR {
            *slot = ease.clone();
        }
    }

    fn set_all(&mut self, ease: &Ease) {
        for target in ["position", "rotation", "scale", "color", "filters"] {
            self.set_channel(target, ease, false);
        }
    }
}

/// Parse the eases declared on a frame node. The frame's `acceleration`
/// attribute is the fallback classic ease; `<tweens>` children refine it per
/// channel. Custom bezier eases on a specific channel override named ones.
pub fn parse_eases(frame: &XmlNode) -> Result<Eases, ResolveError> {
    let acceleration = frame.f64_attr("acceleration", 0.0)?;
    let fallback = Ease::Classic {
        intensity: acceleration,
    };
    let mut eases = Eases {
        position: fallback.clone(),
        rotation: fallback.clone(),
        scale: fallback.clone(),
        color: fallback.clone(),
        filters: fallback.clone(),
    };
    let Some(tweens) = frame.child("tweens") else {
        return Ok(eases);
    };

    // Reset to linear so setdefault-style filling can distinguish "already
    // refined" from "still at the frame-level fallback".
    eases = Eases::default();

    for node in tweens.children_named("CustomEase") {
        let points = node
            .descendants_named("Point")
            .into_iter()
            .map(|p| {
                Ok(DVec2::new(
                    p.f64_attr("x", 0.0)?,
                    p.f64_attr("y", 0.0)?,
                ))
            })
            .collect::<Result<Vec<_>, ResolveError>>()?;
        let curve = Ease::Bezier(points);
        match node.attr("target") {
            Some("all") | None => eases.set_all(&curve),
            Some(target) => eases.set_channel(target, &curve, true),
        }
    }

    for node in tweens.children_named("Ease") {
        let method = node.attr("method").filter(|m| !m.is_empty());
        let intensity = node.attr("intensity");
        let curve = match (method, intensity) {
            (Some(_), Some(_)) => return Err(ResolveError::AmbiguousEase),
            (Some(method), None) => Ease::from_method(method)?,
            (None, Some(_)) => Ease::Classic {
                intensity: node.f64_attr("intensity", 0.0)?,
            },
            (None, None) => LINEAR,
        };
        match node.attr("target") {
            Some("all") | None => eases.set_all(&curve),
            Some(target) => eases.set_channel(target, &curve, false),
        }
    }

    // Channels no ease touched fall back to the frame acceleration.
    for slot in [
        &mut eases.position,
        &mut eases.rotation,
        &mut eases.scale,
        &mut eases.color,
        &mut eases.filters,
    ] {
        if *slot == LINEAR {
            *slot = fallback.clone();
        }
    }
    Ok(eases)
}
