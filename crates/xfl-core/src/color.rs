//! Per-channel color effects applied to symbol instances.

use serde::{Deserialize, Serialize};

use xfl_data::shape::split_color;
use xfl_data::XmlNode;

use crate::error::ResolveError;

/// Multiply/offset pairs for the four channels. Offsets are normalized to
/// the 0..1 color domain. The identity transform multiplies by one and adds
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorTransform {
    pub mr: f64,
    pub mg: f64,
    pub mb: f64,
    pub ma: f64,
    pub dr: f64,
    pub dg: f64,
    pub db: f64,
    pub da: f64,
}

pub const IDENTITY: ColorTransform = ColorTransform {
    mr: 1.0,
    mg: 1.0,
    mb: 1.0,
    ma: 1.0,
    dr: 0.0,
    dg: 0.0,
    db: 0.0,
    da: 0.0,
};

impl Default for ColorTransform {
    fn default() -> ColorTransform {
        IDENTITY
    }
}

impl ColorTransform {
    pub fn is_identity(&self) -> bool {
        *self == IDENTITY
    }

    /// Outer-applied-after-inner composition. Applying the result is the same
    /// as applying `inner` and then `self`.
    pub fn compose(&self, inner: &ColorTransform) -> ColorTransform {
        ColorTransform {
            mr: self.mr * inner.mr,
            mg: self.mg * inner.mg,
            mb: self.mb * inner.mb,
            ma: self.ma * inner.ma,
            dr: self.mr * inner.dr + self.dr,
            dg: self.mg * inner.dg + self.dg,
            db: self.mb * inner.db + self.db,
            da: self.ma * inner.da + self.da,
        }
    }

    /// Channel-wise linear blend. `None` on either side stands for identity.
    pub fn lerp(
        start: Option<&ColorTransform>,
        end: Option<&ColorTransform>,
        t: f64,
    ) -> ColorTransform {
        let a = start.copied().unwrap_or(IDENTITY);
        let b = end.copied().unwrap_or(IDENTITY);
        let mix = |x: f64, y: f64| x * (1.0 - t) + y * t;
        ColorTransform {
            mr: mix(a.mr, b.mr),
            mg: mix(a.mg, b.mg),
            mb: mix(a.mb, b.mb),
            ma: mix(a.ma, b.ma),
            dr: mix(a.dr, b.dr),
            dg: mix(a.dg, b.dg),
            db: mix(a.db, b.db),
            da: mix(a.da, b.da),
        }
    }

    fn brightness(value: f64) -> ColorTransform {
        if value < 0.0 {
            ColorTransform {
                mr: 1.0 + value,
                mg: 1.0 + value,
                mb: 1.0 + value,
                ..IDENTITY
            }
        } else {
            ColorTransform {
                mr: 1.0 - value,
                mg: 1.0 - value,
                mb: 1.0 - value,
                dr: value,
                dg: value,
                db: value,
                ..IDENTITY
            }
        }
    }

    fn tint(multiplier: f64, color: (u8, u8, u8)) -> ColorTransform {
        ColorTransform {
            mr: 1.0 - multiplier,
            mg: 1.0 - multiplier,
            mb: 1.0 - multiplier,
            dr: multiplier * color.0 as f64 / 255.0,
            dg: multiplier * color.1 as f64 / 255.0,
            db: multiplier * color.2 as f64 / 255.0,
            ..IDENTITY
        }
    }

    /// Parse the `<color><Color .../></color>` effect attached to an element.
    /// A Color node may carry exactly one of the three effect forms; mixing
    /// them is an authoring-tool invariant violation.
    pub fn from_element_node(element: &XmlNode) -> Result<Option<ColorTransform>, ResolveError> {
        if element.child("frameFilters").is_some() {
            tracing::warn!("frame filters are not supported");
        }
        let Some(node) = element
            .child("color")
            .or_else(|| element.child("frameColor"))
            .and_then(|c| c.child("Color"))
        else {
            return Ok(None);
        };

        let mut result: Option<ColorTransform> = None;
        let mut count = 0;

        if node.attr("brightness").is_some() {
            count += 1;
            result = Some(ColorTransform::brightness(
                node.f64_attr("brightness", 0.0)?,
            ));
        }
        if node.attr("tintMultiplier").is_some() || node.attr("tintColor").is_some() {
            count += 1;
            let color = split_color(node.attr("tintColor").unwrap_or("#000000"))?;
            result = Some(ColorTransform::tint(
                node.f64_attr("tintMultiplier", 0.0)?,
                color,
            ));
        }

        let explicit_attrs = [
            "redMultiplier",
            "greenMultiplier",
            "blueMultiplier",
            "alphaMultiplier",
            "redOffset",
            "greenOffset",
            "blueOffset",
            "alphaOffset",
        ];
        if explicit_attrs.iter().any(|a| node.attr(a).is_some()) {
            count += 1;
            result = Some(ColorTransform {
                mr: node.f64_attr("redMultiplier", 1.0)?,
                mg: node.f64_attr("greenMultiplier", 1.0)?,
                mb: node.f64_attr("blueMultiplier", 1.0)?,
                ma: node.f64_attr("alphaMultiplier", 1.0)?,
                dr: node.f64_attr("redOffset", 0.0)? / 255.0,
                dg: node.f64_attr("greenOffset", 0.0)? / 255.0,
                db: node.f64_attr("blueOffset", 0.0)? / 255.0,
                da: node.f64_attr("alphaOffset", 0.0)? / 255.0,
            });
        }

        if count > 1 {
            return Err(ResolveError::ConflictingColorEffects);
        }
        Ok(result)
    }
}
