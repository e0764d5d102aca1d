//! Quadric error metric.
//!
//! A quadric accumulates squared distances to a set of weighted planes:
//!
//! ```text
//! Q(p) = pᵀ A p + 2 bᵀ p + c
//! ```
//!
//! where `A` is a symmetric 3x3 matrix stored as its upper triangle. Adding
//! two quadrics adds their planes, which is how the quadric of a merged vertex
//! is obtained.
//!
//! [`Quadric::value`] may come out slightly negative (around `1e-2` relative
//! to the plane weights) through floating-point cancellation. Callers using it
//! as a cost clamp it at zero.
//!
//! # References
//!
//! - Garland, M. & Heckbert, P. (1997). "Surface Simplification Using Quadric
//!   Error Metrics." SIGGRAPH '97.

use std::ops::{Add, AddAssign};
use std::str::FromStr;

use nalgebra::{Point3, Vector3};

use crate::error::MeshError;

/// Number of sub-segments sampled when the restricted problem is singular.
const SEGMENT_SAMPLES: usize = 6;

/// A quadric error (symmetric 3x3 matrix, vector and constant).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quadric {
    /// Upper triangle of `A`: `[xx, xy, xz, yy, yz, zz]`.
    a: [f64; 6],
    b: [f64; 3],
    c: f64,
}

impl Quadric {
    /// Create a zero quadric.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Quadric of the plane `n·p + d = 0` scaled by `weight`.
    pub fn from_plane(normal: &Vector3<f64>, d: f64, weight: f64) -> Self {
        let mut q = Self::zero();
        q.add_plane(normal, d, weight);
        q
    }

    /// Add the plane `n·p + d = 0` scaled by `weight`.
    ///
    /// `normal` is not required to be unit; its norm scales the error.
    pub fn add_plane(&mut self, normal: &Vector3<f64>, d: f64, weight: f64) {
        let n = normal;
        self.a[0] += weight * n.x * n.x;
        self.a[1] += weight * n.x * n.y;
        self.a[2] += weight * n.x * n.z;
        self.a[3] += weight * n.y * n.y;
        self.a[4] += weight * n.y * n.z;
        self.a[5] += weight * n.z * n.z;
        self.b[0] += weight * d * n.x;
        self.b[1] += weight * d * n.y;
        self.b[2] += weight * d * n.z;
        self.c += weight * d * d;
    }

    fn a_times(&self, v: &Vector3<f64>) -> Vector3<f64> {
        let a = &self.a;
        Vector3::new(
            a[0] * v.x + a[1] * v.y + a[2] * v.z,
            a[1] * v.x + a[3] * v.y + a[4] * v.z,
            a[2] * v.x + a[4] * v.y + a[5] * v.z,
        )
    }

    #[inline]
    fn b(&self) -> Vector3<f64> {
        Vector3::new(self.b[0], self.b[1], self.b[2])
    }

    /// Evaluate the error at `p`.
    pub fn value(&self, p: &Point3<f64>) -> f64 {
        let v = p.coords;
        self.c + 2.0 * self.b().dot(&v) + v.dot(&self.a_times(&v))
    }

    /// Determinant of `A`.
    pub fn det(&self) -> f64 {
        let a = &self.a;
        a[0] * (a[3] * a[5] - a[4] * a[4]) + a[1] * (a[4] * a[2] - a[1] * a[5])
            + a[2] * (a[1] * a[4] - a[3] * a[2])
    }

    /// Largest row norm of `A`.
    pub fn norm(&self) -> f64 {
        let a = &self.a;
        let row0 = a[0] * a[0] + a[1] * a[1] + a[2] * a[2];
        let row1 = a[1] * a[1] + a[3] * a[3] + a[4] * a[4];
        let row2 = a[2] * a[2] + a[4] * a[4] + a[5] * a[5];
        row0.max(row1).max(row2).sqrt()
    }

    /// Whether `A` is too badly conditioned to be inverted.
    pub fn is_singular(&self) -> bool {
        let norm = self.norm();
        self.det() <= 1e-10 * norm * norm * norm
    }

    /// Unconstrained minimiser, `None` when `A` is ill-conditioned.
    pub fn optimal_point(&self) -> Option<Point3<f64>> {
        if self.is_singular() {
            return None;
        }
        let det = self.det();
        let a = &self.a;
        let b = &self.b;
        let cfxx = a[3] * a[5] - a[4] * a[4];
        let cfxy = a[2] * a[4] - a[1] * a[5];
        let cfxz = a[1] * a[4] - a[2] * a[3];
        let cfyy = a[0] * a[5] - a[2] * a[2];
        let cfyz = a[2] * a[1] - a[0] * a[4];
        let cfzz = a[0] * a[3] - a[1] * a[1];
        Some(Point3::new(
            -(cfxx * b[0] + cfxy * b[1] + cfxz * b[2]) / det,
            -(cfxy * b[0] + cfyy * b[1] + cfyz * b[2]) / det,
            -(cfxz * b[0] + cfyz * b[1] + cfzz * b[2]) / det,
        ))
    }

    /// Minimiser restricted to the segment `[p1, p2]`.
    ///
    /// The 1-D quadratic is solved exactly and clamped; parameters within
    /// `1e-4` of an end snap to it. A singular `A` or a degenerate 1-D
    /// problem falls back to sampling the segment.
    pub fn segment_minimum(&self, p1: &Point3<f64>, p2: &Point3<f64>) -> Point3<f64> {
        if self.is_singular() {
            return self.segment_search(p1, p2);
        }
        let d = p2 - p1;
        let den = d.dot(&self.a_times(&d));
        let num = self.b().dot(&d) + d.dot(&self.a_times(&p1.coords));
        if den > 0.0 && den > 1e-4 * num.abs() {
            let mut s = -num / den;
            if s < 1e-4 {
                s = 0.0;
            } else if s > 1.0 - 1e-4 {
                s = 1.0;
            }
            p1 + d * s
        } else {
            self.segment_search(p1, p2)
        }
    }

    /// Best of `SEGMENT_SAMPLES + 1` evenly spaced points on `[p1, p2]`.
    pub fn segment_search(&self, p1: &Point3<f64>, p2: &Point3<f64>) -> Point3<f64> {
        let step = (p2 - p1) / SEGMENT_SAMPLES as f64;
        let mut best = *p1;
        let mut best_value = self.value(p1);
        for i in 1..=SEGMENT_SAMPLES {
            let p = p1 + step * i as f64;
            let value = self.value(&p);
            if value < best_value {
                best_value = value;
                best = p;
            }
        }
        best
    }
}

impl AddAssign for Quadric {
    fn add_assign(&mut self, other: Quadric) {
        for i in 0..6 {
            self.a[i] += other.a[i];
        }
        for i in 0..3 {
            self.b[i] += other.b[i];
        }
        self.c += other.c;
    }
}

impl Add for Quadric {
    type Output = Quadric;

    fn add(self, other: Quadric) -> Quadric {
        let mut result = self;
        result += other;
        result
    }
}

/// Where the merged vertex of a collapse is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// The endpoint with the lower error.
    Vertex,
    /// The midpoint of the edge.
    Middle,
    /// The minimiser restricted to the edge.
    Edge,
    /// The unconstrained minimiser, or [`Placement::Edge`] when singular.
    #[default]
    Optimal,
}

impl FromStr for Placement {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const VARIANTS: [(&str, Placement); 4] = [
            ("vertex", Placement::Vertex),
            ("middle", Placement::Middle),
            ("edge", Placement::Edge),
            ("optimal", Placement::Optimal),
        ];
        VARIANTS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s.trim()))
            .map(|&(_, p)| p)
            .ok_or_else(|| {
                MeshError::invalid_option("placement", s, "expected VERTEX, MIDDLE, EDGE or OPTIMAL")
            })
    }
}

/// One end of a collapsed edge, or the vertex replacing it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Position.
    pub position: Point3<f64>,
    /// Boundary or feature reference, 0 for interior.
    pub reference: i32,
}

impl Candidate {
    /// Create a candidate.
    pub fn new(position: Point3<f64>, reference: i32) -> Self {
        Self {
            position,
            reference,
        }
    }
}

/// Endpoint with the lower error, `second` on ties.
fn best_candidate(q: &Quadric, first: Candidate, second: Candidate) -> Candidate {
    if q.value(&first.position) < q.value(&second.position) {
        first
    } else {
        second
    }
}

/// Like [`best_candidate`], preferring the only endpoint carrying a reference.
fn best_candidate_ref(q: &Quadric, first: Candidate, second: Candidate) -> Candidate {
    match (first.reference, second.reference) {
        (0, 0) => best_candidate(q, first, second),
        (0, _) => second,
        (_, 0) => first,
        _ => best_candidate(q, first, second),
    }
}

impl Placement {
    /// Place the vertex replacing `first` and `second` given their merged
    /// quadric `q`.
    ///
    /// The reference of the result comes from the preferred endpoint.
    pub fn place(self, q: &Quadric, first: Candidate, second: Candidate) -> Candidate {
        let p1 = first.position;
        let p2 = second.position;
        match self {
            Placement::Vertex => best_candidate(q, first, second),
            Placement::Middle => Candidate {
                position: Point3::from((p1.coords + p2.coords) * 0.5),
                ..best_candidate_ref(q, first, second)
            },
            Placement::Edge => Candidate {
                position: q.segment_minimum(&p1, &p2),
                ..best_candidate_ref(q, first, second)
            },
            Placement::Optimal => Candidate {
                position: q
                    .optimal_point()
                    .unwrap_or_else(|| q.segment_minimum(&p1, &p2)),
                ..best_candidate_ref(q, first, second)
            },
        }
    }
}
