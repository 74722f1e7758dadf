//! 2D affine transforms in the column-vector convention XFL uses:
//! `x' = a*x + c*y + tx`, `y' = b*x + d*y + ty`.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use xfl_data::{ParseError, XmlNode};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

pub const IDENTITY: Matrix = Matrix {
    a: 1.0,
    b: 0.0,
    c: 0.0,
    d: 1.0,
    tx: 0.0,
    ty: 0.0,
};

impl Default for Matrix {
    fn default() -> Matrix {
        IDENTITY
    }
}

/// The rotation/shear/scale parameters Animate animates independently when it
/// interpolates a motion tween.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposition {
    pub rotation: f64,
    pub shear: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Matrix {
    pub fn apply(&self, p: DVec2) -> DVec2 {
        DVec2::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    pub fn is_identity(&self) -> bool {
        *self == IDENTITY
    }

    /// Parse a `<matrix><Matrix .../></matrix>` wrapper. Missing wrapper or
    /// missing inner node means identity; individual attributes default to
    /// their identity values.
    pub fn from_node(parent: &XmlNode) -> Result<Option<Matrix>, ParseError> {
        let Some(inner) = parent.child("matrix").and_then(|m| m.child("Matrix")) else {
            return Ok(None);
        };
        Ok(Some(Matrix {
            a: inner.f64_attr("a", 1.0)?,
            b: inner.f64_attr("b", 0.0)?,
            c: inner.f64_attr("c", 0.0)?,
            d: inner.f64_attr("d", 1.0)?,
            tx: inner.f64_attr("tx", 0.0)?,
            ty: inner.f64_attr("ty", 0.0)?,
        }))
    }

    /// Decompose into Animate's rotation/shear/scale parameters.
    pub fn decompose(&self) -> Decomposition {
        Decomposition {
            rotation: self.c.atan2(self.a),
            shear: std::f64::consts::FRAC_PI_2 + self.c.atan2(self.a) - self.d.atan2(self.b),
            scale_x: (self.a * self.a + self.c * self.c).sqrt(),
            scale_y: (self.b * self.b + self.d * self.d).sqrt(),
            tx: self.tx,
            ty: self.ty,
        }
    }
}

impl Decomposition {
    /// Rebuild the matrix as rotation * shear * scale.
    pub fn recompose(&self) -> Matrix {
        let (sin_r, cos_r) = self.rotation.sin_cos();
        let tan_sh = self.shear.tan();
        let sx = self.scale_x;
        let sy = self.scale_y * self.shear.cos();
        Matrix {
            a: cos_r * sx,
            b: (cos_r * tan_sh - sin_r) * sy,
            c: sin_r * sx,
            d: (sin_r * tan_sh + cos_r) * sy,
            tx: self.tx,
            ty: self.ty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &Matrix, b: &Matrix) -> bool {
        (a.a - b.a).abs() < 1e-9
            && (a.b - b.b).abs() < 1e-9
            && (a.c - b.c).abs() < 1e-9
            && (a.d - b.d).abs() < 1e-9
            && (a.tx - b.tx).abs() < 1e-9
            && (a.ty - b.ty).abs() < 1e-9
    }

    #[test]
    fn test_apply_convention() {
        let m = Matrix {
            a: 2.0,
            b: 0.5,
            c: -1.0,
            d: 3.0,
            tx: 10.0,
            ty: 20.0,
        };
        let p = m.apply(DVec2::new(1.0, 1.0));
        assert_eq!(p, DVec2::new(2.0 - 1.0 + 10.0, 0.5 + 3.0 + 20.0));
    }

    #[test]
    fn test_decompose_recompose_round_trip() {
        let cases = [
            IDENTITY,
            Matrix {
                a: 2.0,
                b: 0.0,
                c: 0.0,
                d: 3.0,
                tx: 5.0,
                ty: -7.0,
            },
            // 30 degree rotation with nonuniform scale.
            Matrix {
                a: 1.732,
                b: -0.5,
                c: 1.0,
                d: 0.866,
                tx: 0.0,
                ty: 0.0,
            },
            // Sheared.
            Matrix {
                a: 1.0,
                b: 0.0,
                c: 0.7,
                d: 1.0,
                tx: 3.0,
                ty: 4.0,
            },
        ];
        for m in &cases {
            let back = m.decompose().recompose();
            assert!(close(m, &back), "round trip failed for {m:?} -> {back:?}");
        }
    }

    #[test]
    fn test_from_node_missing_is_none() {
        let node = XmlNode::parse("<DOMSymbolInstance/>").unwrap();
        assert!(Matrix::from_node(&node).unwrap().is_none());
    }

    #[test]
    fn test_from_node_partial_attrs() {
        let node =
            XmlNode::parse(r#"<e><matrix><Matrix tx="4" ty="8"/></matrix></e>"#).unwrap();
        let m = Matrix::from_node(&node).unwrap().unwrap();
        assert_eq!(m, Matrix { tx: 4.0, ty: 8.0, ..IDENTITY });
    }
}
