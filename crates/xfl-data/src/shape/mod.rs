//! Shape geometry and style parsing.
//!
//! XFL stores shape outlines as compact edge command strings and styles as
//! nested XML. `edge` decodes the command strings into point sequences,
//! `style` models the fill and stroke definitions that tweening touches.

pub mod edge;
pub mod style;

pub use edge::{
    first_move, format_point, format_twips, parse_coord, parse_edge_number, parse_edges,
    EdgePath, EdgeSegment, TWIPS_PER_PX,
};
pub use style::{
    split_color, stroke_weight, FillDef, GradientStop, LinearGradient, RadialGradient,
    SolidColor, GRADIENT_HALF_WIDTH,
};
