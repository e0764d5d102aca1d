//! Mesh decimation by edge collapse.
//!
//! Both strategies of this module run on the [`EdgeEngine`]: they collapse
//! the cheapest edge, merge its endpoints into a single vertex and let the
//! engine swap the surrounding edges to restore triangle quality.
//!
//! # Quadric Error Metrics (QEM)
//!
//! [`QemDecimation`] keeps for each vertex a quadric measuring the squared
//! distance to the planes of its original triangles (Garland & Heckbert,
//! 1997). Collapsing an edge merges the two quadrics, so the cost of a
//! collapse is the deviation of the merged vertex from every plane it has
//! absorbed so far. Free and feature edges get virtual planes perpendicular
//! to the surface, which keeps boundaries from shrinking.
//!
//! # Length
//!
//! [`LengthDecimation`] collapses the shortest edges first, measured in an
//! optional sizing field.
//!
//! # Example
//!
//! ```
//! use whittle::prelude::*;
//! use whittle::algo::decimate::{decimate_qem, QemOptions};
//! use nalgebra::Point3;
//!
//! let mut vertices = Vec::new();
//! let mut faces = Vec::new();
//! for j in 0..=4 {
//!     for i in 0..=4 {
//!         vertices.push(Point3::new(i as f64, j as f64, 0.0));
//!     }
//! }
//! for j in 0..4 {
//!     for i in 0..4 {
//!         let v = j * 5 + i;
//!         faces.push([v, v + 1, v + 6]);
//!         faces.push([v, v + 6, v + 5]);
//!     }
//! }
//! let mut mesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! let options = QemOptions::default().with_max_triangles(16);
//! let stats = decimate_qem(&mut mesh, &options).unwrap();
//! assert!(stats.processed > 0);
//! assert!(mesh.is_valid());
//! ```
//!
//! # References
//!
//! - Garland, M. & Heckbert, P. (1997). "Surface Simplification Using Quadric
//!   Error Metrics." SIGGRAPH '97.
//! - Frey, P. (2000). "About Surface Remeshing." 9th International Meshing
//!   Roundtable.

mod length;
mod qem;

pub use length::{LengthDecimation, SizingFn};
pub use qem::QemDecimation;

use super::engine::{EdgeEngine, EngineStats};
use super::liaison::MeshLiaison;
use super::options::{self, FromOptions};
use super::quadric::{Candidate, Placement};
use crate::error::{MeshError, Result};
use crate::mesh::{HalfEdgeId, Mesh, VertexId};

/// Default minimum cosine between adjacent normals for swaps.
pub const DEFAULT_COPLANARITY: f64 = 0.95;

/// Options for [`QemDecimation`].
#[derive(Debug, Clone, PartialEq)]
pub struct QemOptions {
    /// Target edge length; the tolerance is its square.
    pub size: Option<f64>,

    /// Target triangle count. Takes precedence over `size` for termination.
    pub max_triangles: Option<usize>,

    /// Where the merged vertex is placed.
    pub placement: Placement,

    /// Minimum cosine between adjacent normals for the swap pass.
    pub coplanarity: f64,
}

impl Default for QemOptions {
    fn default() -> Self {
        Self {
            size: None,
            max_triangles: None,
            placement: Placement::Optimal,
            coplanarity: DEFAULT_COPLANARITY,
        }
    }
}

impl QemOptions {
    /// Set the target edge length.
    pub fn with_size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the target triangle count.
    pub fn with_max_triangles(mut self, count: usize) -> Self {
        self.max_triangles = Some(count);
        self
    }

    /// Set the placement policy.
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    /// Set the minimum cosine of the swap pass.
    pub fn with_coplanarity(mut self, coplanarity: f64) -> Self {
        self.coplanarity = coplanarity;
        self
    }

    /// Quadric tolerance, 0 when only a target count is given.
    pub fn tolerance(&self) -> f64 {
        self.size.map_or(0.0, |s| s * s)
    }
}

impl FromOptions for QemOptions {
    fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "size" => self.size = Some(options::parse_positive(key, value)?),
            "maxtriangles" => self.max_triangles = Some(options::parse_usize(key, value)?),
            "placement" => self.placement = value.parse()?,
            "coplanarity" => self.coplanarity = options::parse_cosine(key, value)?,
            _ => return Err(options::unknown(key)),
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        validate_termination(self.size, self.max_triangles)?;
        validate_coplanarity(self.coplanarity)
    }
}

/// Options for [`LengthDecimation`].
#[derive(Debug, Clone, PartialEq)]
pub struct LengthOptions {
    /// Largest edge length to collapse, in sizing-field units when a sizing
    /// function is installed.
    pub size: Option<f64>,

    /// Target triangle count. Takes precedence over `size` for termination.
    pub max_triangles: Option<usize>,

    /// Only collapse boundary and non-manifold edges.
    pub free_edges_only: bool,

    /// Refuse collapses creating edges longer than this.
    pub max_length: Option<f64>,

    /// Minimum cosine between adjacent normals for the swap pass.
    pub coplanarity: f64,
}

impl Default for LengthOptions {
    fn default() -> Self {
        Self {
            size: None,
            max_triangles: None,
            free_edges_only: false,
            max_length: None,
            coplanarity: DEFAULT_COPLANARITY,
        }
    }
}

impl LengthOptions {
    /// Set the largest edge length to collapse.
    pub fn with_size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the target triangle count.
    pub fn with_max_triangles(mut self, count: usize) -> Self {
        self.max_triangles = Some(count);
        self
    }

    /// Only collapse free edges.
    pub fn with_free_edges_only(mut self, free_edges_only: bool) -> Self {
        self.free_edges_only = free_edges_only;
        self
    }

    /// Cap the length of edges created by a collapse.
    pub fn with_max_length(mut self, max_length: f64) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Set the minimum cosine of the swap pass.
    pub fn with_coplanarity(mut self, coplanarity: f64) -> Self {
        self.coplanarity = coplanarity;
        self
    }
}

impl FromOptions for LengthOptions {
    fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "size" => self.size = Some(options::parse_positive(key, value)?),
            "maxtriangles" => self.max_triangles = Some(options::parse_usize(key, value)?),
            "freeEdgesOnly" => self.free_edges_only = options::parse_bool(key, value)?,
            "maxlength" => self.max_length = Some(options::parse_positive(key, value)?),
            "coplanarity" => self.coplanarity = options::parse_cosine(key, value)?,
            _ => return Err(options::unknown(key)),
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        validate_termination(self.size, self.max_triangles)?;
        if let Some(max_length) = self.max_length {
            if max_length.is_nan() || max_length <= 0.0 {
                return Err(MeshError::invalid_param(
                    "max_length",
                    max_length,
                    "must be positive",
                ));
            }
        }
        validate_coplanarity(self.coplanarity)
    }
}

pub(crate) fn validate_termination(size: Option<f64>, max_triangles: Option<usize>) -> Result<()> {
    match (size, max_triangles) {
        (None, None) | (None, Some(0)) => Err(MeshError::invalid_param(
            "size",
            "none",
            "either size or maxtriangles must be set",
        )),
        (Some(s), _) if !(s.is_finite() && s > 0.0) => {
            Err(MeshError::invalid_param("size", s, "must be positive"))
        }
        _ => Ok(()),
    }
}

pub(crate) fn validate_coplanarity(coplanarity: f64) -> Result<()> {
    if (-1.0..=1.0).contains(&coplanarity) {
        Ok(())
    } else {
        Err(MeshError::invalid_param(
            "coplanarity",
            coplanarity,
            "must be in [-1, 1]",
        ))
    }
}

/// Vertex an edge collapses into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Target {
    /// One of the endpoints survives.
    Keep(VertexId),
    /// A vertex is created.
    Create(Candidate),
}

impl Target {
    pub(crate) fn position<'a>(&'a self, mesh: &'a Mesh) -> &'a nalgebra::Point3<f64> {
        match self {
            Target::Keep(v) => mesh.position(*v),
            Target::Create(c) => &c.position,
        }
    }
}

/// Choose the target of collapsing `e`.
///
/// An endpoint which is not mutable pins the result, otherwise `place`
/// decides. Returns `None` when neither endpoint may move.
pub(crate) fn pin_or(
    mesh: &Mesh,
    e: HalfEdgeId,
    place: impl FnOnce() -> Target,
) -> Option<Target> {
    let o = mesh.origin(e);
    let d = mesh.destination(e);
    match (mesh.vertex(o).is_mutable(), mesh.vertex(d).is_mutable()) {
        (false, false) => None,
        (false, true) => Some(Target::Keep(o)),
        (true, false) => Some(Target::Keep(d)),
        (true, true) => Some(place()),
    }
}

/// Project a created target through the liaison. Returns `false` when the
/// liaison has no projection.
pub(crate) fn project(
    liaison: &mut Option<Box<dyn MeshLiaison>>,
    near: VertexId,
    target: &mut Target,
) -> bool {
    match (liaison.as_mut(), target) {
        (Some(liaison), Target::Create(c)) => liaison.move_vertex(near, &mut c.position),
        _ => true,
    }
}

/// Collapse `e` into `target` and report vertex changes to the liaison.
///
/// Returns the surviving vertex and the half-edge returned by the collapse.
pub(crate) fn contract(
    mesh: &mut Mesh,
    e: HalfEdgeId,
    target: Target,
    liaison: &mut Option<Box<dyn MeshLiaison>>,
) -> (VertexId, HalfEdgeId) {
    let o = mesh.origin(e);
    let d = mesh.destination(e);
    let v = match target {
        Target::Keep(v) => v,
        Target::Create(c) => {
            let v = mesh.create_vertex(c.position);
            mesh.vertex_mut(v).reference = c.reference;
            v
        }
    };
    let result = mesh.edge_collapse(e, v);
    if let Some(liaison) = liaison.as_mut() {
        if v != o && v != d {
            liaison.add_vertex(v, o);
        }
        for x in [o, d] {
            if x != v {
                liaison.remove_vertex(x);
            }
        }
    }
    (v, result)
}

/// Decimate `mesh` with quadric error metrics.
///
/// Stops when the cheapest remaining collapse costs more than `size²`, or
/// when `max_triangles` is reached if it is set.
pub fn decimate_qem(mesh: &mut Mesh, options: &QemOptions) -> Result<EngineStats> {
    let strategy = QemDecimation::new(options.clone())?;
    EdgeEngine::new(mesh, strategy).compute()
}

/// Decimate `mesh` by collapsing its shortest edges.
pub fn decimate_length(mesh: &mut Mesh, options: &LengthOptions) -> Result<EngineStats> {
    let strategy = LengthDecimation::new(options.clone())?;
    EdgeEngine::new(mesh, strategy).compute()
}
