use anyhow::{anyhow, Result};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use super::{Point, Quad};

const EPS: f64 = 1e-12;

/// Projective transform `p' ~ H p` between two planes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// Solve the unique homography taking each `src` corner onto the matching
    /// `dst` corner (h33 fixed to 1).
    ///
    /// Fails when either quad has three collinear corners, in which case no
    /// unique projective map exists.
    pub fn from_quads(src: &Quad, dst: &Quad) -> Result<Self> {
        if src.has_collinear_corners() {
            return Err(anyhow!(
                "degenerate source quadrilateral {:?}: three corners are collinear",
                src.points
            ));
        }
        if dst.has_collinear_corners() {
            return Err(anyhow!(
                "degenerate destination quadrilateral {:?}: three corners are collinear",
                dst.points
            ));
        }

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for (i, (s, d)) in src.points.iter().zip(dst.points.iter()).enumerate() {
            let r = i * 2;
            a[(r, 0)] = s.x;
            a[(r, 1)] = s.y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -d.x * s.x;
            a[(r, 7)] = -d.x * s.y;
            b[r] = d.x;

            a[(r + 1, 3)] = s.x;
            a[(r + 1, 4)] = s.y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -d.y * s.x;
            a[(r + 1, 7)] = -d.y * s.y;
            b[r + 1] = d.y;
        }

        let h = a
            .lu()
            .solve(&b)
            .ok_or_else(|| anyhow!("homography system is singular"))?;
        if h.iter().any(|v| !v.is_finite()) {
            return Err(anyhow!("homography solve produced non-finite coefficients"));
        }

        Ok(Self {
            matrix: Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0),
        })
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn inverse(&self) -> Result<Self> {
        self.matrix
            .try_inverse()
            .map(|matrix| Self { matrix })
            .ok_or_else(|| anyhow!("homography is not invertible"))
    }

    /// Map a point; `None` when it lands on the line at infinity.
    pub fn apply(&self, p: Point) -> Option<Point> {
        let v = self.matrix * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        if !w.is_finite() || w.abs() <= EPS {
            return None;
        }
        Some(Point::new(v[0] / w, v[1] / w))
    }
}
