//! Tween interpolation: motion tween matrices and colors, and morph (shape)
//! tween snapshot generation.

use std::collections::HashMap;
use std::f64::consts::{PI, TAU};

use glam::DVec2;
use tracing::warn;

use xfl_data::shape::{
    first_move, format_point, parse_coord, parse_edges, split_color, FillDef, GradientStop,
    LinearGradient, RadialGradient, SolidColor,
};
use xfl_data::{ParseError, XmlNode};

use crate::color::ColorTransform;
use crate::easing::Eases;
use crate::error::ResolveError;
use crate::matrix::{Matrix, IDENTITY};

/// Unwind rotation and shear so interpolation takes the authored direction,
/// including whole extra turns requested by the tween.
fn adjust_rotation_params(
    rotation: f64,
    mut srot: f64,
    mut erot: f64,
    mut sshear: f64,
    eshear: f64,
) -> (f64, f64, f64) {
    if rotation > 0.0 {
        if erot < srot {
            erot += TAU;
        }
        erot += rotation * TAU;
    } else if rotation < 0.0 {
        if erot > srot {
            erot -= TAU;
        }
        erot += rotation * TAU;
    } else if (erot - srot).abs() > PI {
        srot += (erot - srot).signum() * TAU;
    }
    if (eshear - sshear).abs() > PI {
        sshear += (eshear - sshear).signum() * TAU;
    }
    (srot, erot, sshear)
}

fn lerp(x: f64, y: f64, t: f64) -> f64 {
    (1.0 - t) * x + t * y
}

/// Motion tween matrix track over `n_frames` samples.
///
/// The first and last samples are the authored matrices verbatim; only
/// interior samples go through decompose/recompose, so endpoints never pick
/// up rounding drift.
pub fn matrix_interpolation(
    start: Option<Matrix>,
    end: Option<Matrix>,
    n_frames: usize,
    rotation: f64,
    eases: &Eases,
) -> Vec<Matrix> {
    let start = start.unwrap_or(IDENTITY);
    let end = end.unwrap_or(IDENTITY);
    if n_frames <= 1 {
        return vec![start; n_frames];
    }

    let sd = start.decompose();
    let ed = end.decompose();
    let (srot, erot, sshear) =
        adjust_rotation_params(rotation, sd.rotation, ed.rotation, sd.shear, ed.shear);

    (0..n_frames)
        .map(|i| {
            if i == 0 {
                return start;
            }
            if i == n_frames - 1 {
                return end;
            }
            let t = i as f64 / (n_frames - 1) as f64;
            let frot = eases.rotation.apply(t);
            let fscale = eases.scale.apply(t);
            let fpos = eases.position.apply(t);
            crate::matrix::Decomposition {
                rotation: lerp(srot, erot, frot),
                shear: lerp(sshear, ed.shear, frot),
                scale_x: lerp(sd.scale_x, ed.scale_x, fscale),
                scale_y: lerp(sd.scale_y, ed.scale_y, fscale),
                tx: lerp(start.tx, end.tx, fpos),
                ty: lerp(start.ty, end.ty, fpos),
            }
            .recompose()
        })
        .collect()
}

/// Single eased-free matrix blend, used for gradient transform tracks.
pub fn simple_matrix_interpolation(start: &[f64; 6], end: &[f64; 6], t: f64) -> [f64; 6] {
    let start = Matrix {
        a: start[0],
        b: start[1],
        c: start[2],
        d: start[3],
        tx: start[4],
        ty: start[5],
    };
    let end = Matrix {
        a: end[0],
        b: end[1],
        c: end[2],
        d: end[3],
        tx: end[4],
        ty: end[5],
    };
    let sd = start.decompose();
    let ed = end.decompose();
    let (srot, erot, sshear) =
        adjust_rotation_params(0.0, sd.rotation, ed.rotation, sd.shear, ed.shear);
    let m = crate::matrix::Decomposition {
        rotation: lerp(srot, erot, t),
        shear: lerp(sshear, ed.shear, t),
        scale_x: lerp(sd.scale_x, ed.scale_x, t),
        scale_y: lerp(sd.scale_y, ed.scale_y, t),
        tx: lerp(start.tx, end.tx, t),
        ty: lerp(start.ty, end.ty, t),
    }
    .recompose();
    [m.a, m.b, m.c, m.d, m.tx, m.ty]
}

/// Color effect track over `n_frames` samples. Missing effects on either end
/// stand for identity.
pub fn color_interpolation(
    start: Option<&ColorTransform>,
    end: Option<&ColorTransform>,
    n_frames: usize,
    eases: &Eases,
) -> Vec<ColorTransform> {
    if n_frames <= 1 {
        return vec![start.copied().unwrap_or_default(); n_frames];
    }
    (0..n_frames)
        .map(|i| {
            let t = eases.color.apply(i as f64 / (n_frames - 1) as f64);
            ColorTransform::lerp(start, end, t)
        })
        .collect()
}

/// Position-eased blend of a morph coordinate.
pub fn interpolate_points(start: DVec2, end: DVec2, i: usize, duration: usize, eases: &Eases) -> DVec2 {
    let frac = eases.position.apply(i as f64 / (duration - 1) as f64);
    start + (end - start) * frac
}

fn split_color_or_black(color: &str) -> Result<(u8, u8, u8), ParseError> {
    if color.is_empty() {
        return Ok((0, 0, 0));
    }
    split_color(color)
}

/// Alpha-weighted color blend. Channels mix premultiplied so a transparent
/// endpoint does not drag the visible color toward it; a fully transparent
/// result normalizes to white.
pub fn interpolate_color(
    color_x: &str,
    alpha_x: f64,
    color_y: &str,
    alpha_y: f64,
    t: f64,
) -> Result<(String, f64), ParseError> {
    let (rx, gx, bx) = split_color_or_black(color_x)?;
    let (ry, gy, by) = split_color_or_black(color_y)?;
    let ai = lerp(alpha_x, alpha_y, t);
    if ai == 0.0 {
        return Ok(("#FFFFFF".to_string(), 0.0));
    }
    let channel = |x: u8, y: u8| {
        let value = lerp(x as f64 * alpha_x, y as f64 * alpha_y, t) / ai;
        value.round().clamp(0.0, 255.0) as u8
    };
    Ok((
        format!(
            "#{:02X}{:02X}{:02X}",
            channel(rx, ry),
            channel(gx, gy),
            channel(bx, by)
        ),
        ai,
    ))
}

/// Pair up gradient stops for interpolation: every start stop maps to its
/// nearest end stop by ratio, then uncovered end stops map back to their
/// nearest start stop, stealing a slot from a redundantly covered target when
/// possible. Pairs come out ordered by start ratio.
pub fn stop_pairs<'a>(
    init: &'a [GradientStop],
    fin: &'a [GradientStop],
) -> Vec<(&'a GradientStop, &'a GradientStop)> {
    if init.is_empty() || fin.is_empty() {
        return Vec::new();
    }

    let nearest = |stops: &[GradientStop], ratio: f64| {
        let mut best = 0;
        for (i, stop) in stops.iter().enumerate() {
            if (stop.ratio - ratio).abs() < (stops[best].ratio - ratio).abs() {
                best = i;
            }
        }
        best
    };

    let mut forward: Vec<Vec<usize>> = vec![Vec::new(); init.len()];
    let mut cover_count = vec![0usize; fin.len()];

    for (i, stop) in init.iter().enumerate() {
        let m = nearest(fin, stop.ratio);
        forward[i].push(m);
        cover_count[m] += 1;
    }

    for (j, stop) in fin.iter().enumerate() {
        if cover_count[j] > 0 {
            continue;
        }
        let m = nearest(init, stop.ratio);
        if let Some(&redundant) = forward[m].first() {
            if cover_count[redundant] > 1 {
                forward[m].remove(0);
                cover_count[redundant] -= 1;
            }
        }
        forward[m].push(j);
        cover_count[j] += 1;
    }

    let mut order: Vec<usize> = (0..init.len()).collect();
    order.sort_by(|&a, &b| init[a].ratio.partial_cmp(&init[b].ratio).unwrap_or(std::cmp::Ordering::Equal));

    let mut pairs = Vec::new();
    for i in order {
        for &j in &forward[i] {
            pairs.push((&init[i], &fin[j]));
        }
    }
    pairs
}

fn interpolate_stops(start: &GradientStop, end: &GradientStop, t: f64) -> Result<GradientStop, ParseError> {
    let (color, alpha) = interpolate_color(&start.color, start.alpha, &end.color, end.alpha, t)?;
    Ok(GradientStop {
        ratio: lerp(start.ratio, end.ratio, t),
        color,
        alpha,
    })
}

fn interpolate_solid_colors(x: &SolidColor, y: &SolidColor, t: f64) -> Result<SolidColor, ParseError> {
    let (color, alpha) = interpolate_color(&x.color, x.alpha, &y.color, y.alpha, t)?;
    Ok(SolidColor { color, alpha })
}

/// Blend between a gradient and a solid, keeping the gradient's geometry.
/// `toward_solid` is how far each stop has moved to the solid color.
fn interpolate_solid_with_gradient(
    solid: &SolidColor,
    gradient: &FillDef,
    toward_solid: f64,
) -> Result<FillDef, ParseError> {
    let blend = |stops: &[GradientStop]| {
        stops
            .iter()
            .map(|stop| {
                let (color, alpha) = interpolate_color(
                    &stop.color,
                    stop.alpha,
                    &solid.color,
                    solid.alpha,
                    toward_solid,
                )?;
                Ok(GradientStop {
                    ratio: stop.ratio,
                    color,
                    alpha,
                })
            })
            .collect::<Result<Vec<_>, ParseError>>()
    };
    Ok(match gradient {
        FillDef::Linear(g) => FillDef::Linear(LinearGradient {
            stops: blend(&g.stops)?,
            ..g.clone()
        }),
        FillDef::Radial(g) => FillDef::Radial(RadialGradient {
            stops: blend(&g.stops)?,
            ..g.clone()
        }),
        FillDef::Solid(s) => {
            FillDef::Solid(interpolate_solid_colors(s, solid, toward_solid)?)
        }
    })
}

fn interpolate_linear_gradients(
    x: &LinearGradient,
    y: &LinearGradient,
    t: f64,
) -> Result<LinearGradient, ParseError> {
    let xvec = x.end - x.start;
    let yvec = y.end - y.start;
    let rot = lerp(xvec.y.atan2(xvec.x), yvec.y.atan2(yvec.x), t);
    let dist = lerp(xvec.length(), yvec.length(), t);
    let mid = DVec2::new(
        lerp(x.start.x + xvec.x / 2.0, y.start.x + yvec.x / 2.0, t),
        lerp(x.start.y + xvec.y / 2.0, y.start.y + yvec.y / 2.0, t),
    );
    let half = DVec2::new(rot.cos(), rot.sin()) * dist / 2.0;
    let stops = stop_pairs(&x.stops, &y.stops)
        .into_iter()
        .map(|(a, b)| interpolate_stops(a, b, t))
        .collect::<Result<Vec<_>, ParseError>>()?;
    Ok(LinearGradient {
        start: mid - half,
        end: mid + half,
        stops,
        spread_method: x.spread_method.clone(),
    })
}

fn interpolate_radial_gradients(
    x: &RadialGradient,
    y: &RadialGradient,
    t: f64,
) -> Result<RadialGradient, ParseError> {
    let stops = stop_pairs(&x.stops, &y.stops)
        .into_iter()
        .map(|(a, b)| interpolate_stops(a, b, t))
        .collect::<Result<Vec<_>, ParseError>>()?;
    Ok(RadialGradient {
        matrix: simple_matrix_interpolation(&x.matrix, &y.matrix, t),
        radius: lerp(x.radius, y.radius, t),
        focal_point: lerp(x.focal_point, y.focal_point, t),
        stops,
        spread_method: x.spread_method.clone(),
    })
}

/// Blend two fill definitions. A missing end fill freezes the start fill.
/// Linear and radial gradients do not blend with each other.
pub fn interpolate_fill_styles(
    start: &FillDef,
    end: Option<&FillDef>,
    t: f64,
) -> Result<FillDef, ResolveError> {
    let Some(end) = end else {
        return Ok(start.clone());
    };
    let incompatible = || ResolveError::IncompatibleGradients {
        start: start.kind(),
        end: end.kind(),
    };
    Ok(match (start, end) {
        (FillDef::Solid(x), FillDef::Solid(y)) => {
            FillDef::Solid(interpolate_solid_colors(x, y, t)?)
        }
        (FillDef::Solid(x), _) => interpolate_solid_with_gradient(x, end, 1.0 - t)?,
        (_, FillDef::Solid(y)) => interpolate_solid_with_gradient(y, start, t)?,
        (FillDef::Linear(x), FillDef::Linear(y)) => {
            FillDef::Linear(interpolate_linear_gradients(x, y, t)?)
        }
        (FillDef::Radial(x), FillDef::Radial(y)) => {
            FillDef::Radial(interpolate_radial_gradients(x, y, t)?)
        }
        _ => return Err(incompatible()),
    })
}

/// Interpolated `<fills>`/`<strokes>` markup for an interior morph sample.
pub struct TweenedStyles {
    pub fills: String,
    pub strokes: String,
}

fn collect_end_defs(
    container: &XmlNode,
    style_name: &str,
) -> Result<HashMap<usize, FillDef>, ResolveError> {
    let mut defs = HashMap::new();
    for style in container.children_named(style_name) {
        if let Some(def) = FillDef::from_style(style)? {
            defs.insert(style.usize_attr("index", 0)?, def);
        }
    }
    Ok(defs)
}

fn interpolate_styles_in(
    node: &mut XmlNode,
    style_name: &str,
    end_defs: &HashMap<usize, FillDef>,
    t: f64,
) -> Result<(), ResolveError> {
    for i in 0..node.children().len() {
        let child = &mut node.children_mut()[i];
        if child.name() == style_name {
            let index = child.usize_attr("index", 0)?;
            if let Some(start_def) = FillDef::from_style(child)? {
                let interpolated = interpolate_fill_styles(&start_def, end_defs.get(&index), t)?;
                interpolated.replace_in(child, &start_def);
            }
        } else {
            interpolate_styles_in(child, style_name, end_defs, t)?;
        }
    }
    Ok(())
}

/// Blend the style tables of two shapes at morph sample `i`. Strokes only
/// need a start table; fills need both or come out empty.
pub fn interpolate_color_maps(
    start: &XmlNode,
    end: &XmlNode,
    i: usize,
    n_frames: usize,
    eases: &Eases,
) -> Result<TweenedStyles, ResolveError> {
    let t = eases.color.apply(i as f64 / (n_frames - 1) as f64);

    let strokes = match start.child("strokes") {
        Some(start_strokes) => {
            let mut clone = start_strokes.clone();
            if let Some(end_strokes) = end.child("strokes") {
                let end_defs = collect_end_defs(end_strokes, "StrokeStyle")?;
                interpolate_styles_in(&mut clone, "StrokeStyle", &end_defs, t)?;
            }
            clone.to_string()
        }
        None => String::new(),
    };

    let fills = match (start.child("fills"), end.child("fills")) {
        (Some(start_fills), Some(end_fills)) => {
            let mut clone = start_fills.clone();
            let end_defs = collect_end_defs(end_fills, "FillStyle")?;
            interpolate_styles_in(&mut clone, "FillStyle", &end_defs, t)?;
            clone.to_string()
        }
        _ => String::new(),
    };

    Ok(TweenedStyles { fills, strokes })
}

/// Start-shape edges indexed by their anchor points in twips, so morph
/// segments can find the authored edge whose styles they inherit.
struct EdgeIndex {
    entries: Vec<(DVec2, XmlNode)>,
}

impl EdgeIndex {
    fn build(shape: &XmlNode) -> Result<EdgeIndex, ParseError> {
        let mut entries = Vec::new();
        if let Some(edges) = shape.child("edges") {
            for edge in edges.children_named("Edge") {
                let Some(data) = edge.attr("edges") else {
                    continue;
                };
                for path in parse_edges(data)? {
                    for anchor in path.anchors() {
                        entries.push((anchor * 20.0, edge.clone()));
                    }
                }
            }
        }
        Ok(EdgeIndex { entries })
    }

    fn nearest(&self, point: DVec2) -> Option<&XmlNode> {
        self.entries
            .iter()
            .min_by(|(a, _), (b, _)| {
                a.distance_squared(point)
                    .partial_cmp(&b.distance_squared(point))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(_, node)| node)
    }
}

fn first_edge_start(shape: &XmlNode) -> Result<DVec2, ParseError> {
    if let Some(edges) = shape.child("edges") {
        for edge in edges.children_named("Edge") {
            if let Some(data) = edge.attr("edges") {
                return first_move(data);
            }
        }
    }
    Err(ParseError::InvalidEdge("shape has no edge data".to_string()))
}

fn coord_or(value: Option<&str>, fallback: DVec2) -> Result<DVec2, ParseError> {
    match value {
        Some(v) if !v.is_empty() => parse_coord(v),
        _ => Ok(fallback),
    }
}

/// Generate every sample of a morph tween as `<DOMShape>` markup. The first
/// and last samples are the authored shapes reserialized verbatim.
pub fn shape_interpolation(
    segments: &[&XmlNode],
    start: &XmlNode,
    end: &XmlNode,
    n_frames: usize,
    eases: &Eases,
) -> Result<Vec<String>, ResolveError> {
    let mut result = Vec::with_capacity(n_frames);
    result.push(start.to_string());
    if n_frames < 2 {
        return Ok(result);
    }

    let index = EdgeIndex::build(start)?;
    let start_fallback = first_edge_start(start)?;
    let end_fallback = first_edge_start(end)?;

    for i in 1..n_frames - 1 {
        let styles = interpolate_color_maps(start, end, i, n_frames, eases)?;
        let mut edges = String::new();

        for segment in segments {
            let start_a = coord_or(segment.attr("startPointA"), start_fallback)?;
            let start_b = coord_or(segment.attr("startPointB"), end_fallback)?;

            let mut points = String::new();
            let first = interpolate_points(start_a, start_b, i, n_frames, eases);
            points.push('!');
            points.push_str(&format_point(first));

            for curve in segment.children_named("MorphCurves") {
                let anchor_a = coord_or(curve.attr("anchorPointA"), DVec2::ZERO)?;
                let anchor_b = coord_or(curve.attr("anchorPointB"), DVec2::ZERO)?;
                if curve.attr("isLine").is_some() {
                    let line_to = interpolate_points(anchor_a, anchor_b, i, n_frames, eases);
                    points.push('|');
                    points.push_str(&format_point(line_to));
                } else {
                    let control_a = coord_or(curve.attr("controlPointA"), DVec2::ZERO)?;
                    let control_b = coord_or(curve.attr("controlPointB"), DVec2::ZERO)?;
                    let control = interpolate_points(control_a, control_b, i, n_frames, eases);
                    let quad_to = interpolate_points(anchor_a, anchor_b, i, n_frames, eases);
                    points.push('[');
                    points.push_str(&format_point(control));
                    points.push(' ');
                    points.push_str(&format_point(quad_to));
                }
            }

            let Some(template) = index.nearest(start_a) else {
                warn!("morph segment start point matches no authored edge");
                continue;
            };
            let mut clone = template.clone();
            clone.set_attr("edges", points);
            edges.push_str(&clone.to_string());
        }

        result.push(format!(
            "<DOMShape>{}{}<edges>{}</edges></DOMShape>",
            styles.fills, styles.strokes, edges
        ));
    }

    result.push(end.to_string());
    Ok(result)
}
