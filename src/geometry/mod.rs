//! Planar geometry shared by the rectifier, the corrector and the compositor.
//!
//! - `Point` / `Quad`: calibration quadrilaterals (camera-local pixels or
//!   ground-plane world units), corners in A, B, C, D order.
//! - `Homography`: projective 3x3 transform solved from four correspondences.
//! - `sample_bilinear`: zero-border bilinear lookup into a `DensityMap`.

mod homography;
mod sample;

pub use homography::Homography;
pub use sample::sample_bilinear;

/// Triangles with less than this doubled area count as collinear.
const COLLINEAR_EPS: f64 = 1e-6;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl From<[f64; 2]> for Point {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

/// Axis-aligned bounds `[min_x, max_x] x [min_y, max_y]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            min_x: self.min_x * factor,
            min_y: self.min_y * factor,
            max_x: self.max_x * factor,
            max_y: self.max_y * factor,
        }
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }
}

/// Four corners A, B, C, D.
///
/// The rectifier treats A as top-left, B as bottom-left, C as bottom-right and
/// D as top-right: width is measured along A-D / B-C, height along A-B / C-D.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quad {
    pub points: [Point; 4],
}

impl Quad {
    pub fn new(a: Point, b: Point, c: Point, d: Point) -> Self {
        Self {
            points: [a, b, c, d],
        }
    }

    /// Quad covering `[x0, x1] x [y0, y1]` in A, B, C, D order.
    pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new(
            Point::new(x0, y0),
            Point::new(x0, y1),
            Point::new(x1, y1),
            Point::new(x1, y0),
        )
    }

    pub fn a(&self) -> Point {
        self.points[0]
    }

    pub fn b(&self) -> Point {
        self.points[1]
    }

    pub fn c(&self) -> Point {
        self.points[2]
    }

    pub fn d(&self) -> Point {
        self.points[3]
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for p in &self.points {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        bbox
    }

    /// Size `(width, height)` of the axis-aligned rectangle this quad rectifies to.
    ///
    /// Each edge length is truncated to an integer before taking the maximum of
    /// the two opposite edges.
    pub fn rectified_size(&self) -> (usize, usize) {
        let width_ad = self.a().distance(&self.d()) as usize;
        let width_bc = self.b().distance(&self.c()) as usize;
        let height_ab = self.a().distance(&self.b()) as usize;
        let height_cd = self.c().distance(&self.d()) as usize;
        (width_ad.max(width_bc), height_ab.max(height_cd))
    }

    /// True when any three of the four corners lie on one line.
    pub fn has_collinear_corners(&self) -> bool {
        const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
        TRIPLES.iter().any(|&[i, j, k]| {
            let (p, q, r) = (self.points[i], self.points[j], self.points[k]);
            let cross = (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x);
            cross.abs() <= COLLINEAR_EPS
        })
    }
}

impl From<[[f64; 2]; 4]> for Quad {
    fn from(value: [[f64; 2]; 4]) -> Self {
        Self::new(
            value[0].into(),
            value[1].into(),
            value[2].into(),
            value[3].into(),
        )
    }
}
