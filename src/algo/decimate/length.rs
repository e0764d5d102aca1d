//! Length-based decimation.

use nalgebra::Point3;
use tracing::{debug, info};

use super::{contract, pin_or, project, LengthOptions, Target};
use crate::algo::engine::{EngineConfig, EngineStats, HalfEdgeStrategy};
use crate::algo::liaison::MeshLiaison;
use crate::algo::options::FromOptions;
use crate::algo::quadric::Candidate;
use crate::error::Result;
use crate::mesh::{EdgeFlags, HalfEdgeId, Mesh};

/// Target edge length at a point.
pub type SizingFn = Box<dyn Fn(&Point3<f64>) -> f64>;

/// Edge collapse strategy removing the shortest edges first.
///
/// Without a sizing function, the cost of an edge is its length. With one,
/// it is the length measured in the metric, `|e| * 2 / (h(o) + h(d))`, and
/// the merged vertex goes to the point splitting the edge in two halves of
/// equal metric length.
///
/// An endpoint carrying a reference is kept in place, so feature curves are
/// not smoothed out.
pub struct LengthDecimation {
    options: LengthOptions,
    sizing: Option<SizingFn>,
    pending: Option<(HalfEdgeId, Target)>,
    liaison: Option<Box<dyn MeshLiaison>>,
}

impl LengthDecimation {
    /// Create the strategy, validating `options`.
    pub fn new(options: LengthOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            sizing: None,
            pending: None,
            liaison: None,
        })
    }

    /// Measure lengths with an analytic sizing field.
    pub fn with_sizing(mut self, sizing: SizingFn) -> Self {
        self.sizing = Some(sizing);
        self
    }

    /// Keep the mesh on a background surface.
    pub fn with_liaison(mut self, liaison: Box<dyn MeshLiaison>) -> Self {
        self.liaison = Some(liaison);
        self
    }

    /// The options.
    pub fn options(&self) -> &LengthOptions {
        &self.options
    }

    fn tolerance(&self) -> f64 {
        self.options.size.unwrap_or(0.0)
    }

    fn size_at(&self, p: &Point3<f64>) -> f64 {
        match &self.sizing {
            Some(h) => h(p),
            None => 1.0,
        }
    }

    fn is_free(mesh: &Mesh, e: HalfEdgeId) -> bool {
        mesh.has_flags(e, EdgeFlags::TOPOLOGY)
    }

    /// Length of `e` in the metric.
    pub fn metric_length(&self, mesh: &Mesh, e: HalfEdgeId) -> f64 {
        let p = mesh.position(mesh.origin(e));
        let q = mesh.position(mesh.destination(e));
        let h = self.size_at(p) + self.size_at(q);
        if h > 0.0 {
            (q - p).norm() * 2.0 / h
        } else {
            (q - p).norm()
        }
    }

    fn placement(&self, mesh: &Mesh, e: HalfEdgeId) -> Target {
        let o = mesh.origin(e);
        let d = mesh.destination(e);
        let ref_o = mesh.vertex(o).reference;
        let ref_d = mesh.vertex(d).reference;
        if ref_o > 0 {
            return Target::Keep(o);
        }
        if ref_d != 0 {
            return Target::Keep(d);
        }
        let p = mesh.position(o);
        let q = mesh.position(d);
        let (h_o, h_d) = (self.size_at(p), self.size_at(q));
        let t = if h_o + h_d > 0.0 { h_o / (h_o + h_d) } else { 0.5 };
        Target::Create(Candidate::new(p + (q - p) * t, ref_o))
    }

    /// Whether every edge created by collapsing into `position` respects
    /// the length cap.
    fn respects_max_length(&self, mesh: &Mesh, e: HalfEdgeId, position: &Point3<f64>) -> bool {
        let Some(max_length) = self.options.max_length else {
            return true;
        };
        let o = mesh.origin(e);
        let d = mesh.destination(e);
        let max2 = max_length * max_length;
        [o, d].iter().all(|&v| {
            mesh.vertex_neighbors(v)
                .into_iter()
                .filter(|&n| n != o && n != d)
                .all(|n| (mesh.position(n) - position).norm_squared() <= max2)
        })
    }
}

impl std::fmt::Debug for LengthDecimation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LengthDecimation")
            .field("options", &self.options)
            .field("sizing", &self.sizing.is_some())
            .field("liaison", &self.liaison.is_some())
            .finish()
    }
}

impl HalfEdgeStrategy for LengthDecimation {
    fn name(&self) -> &'static str {
        "length"
    }

    fn config(&self) -> EngineConfig {
        EngineConfig {
            tolerance: self.tolerance(),
            nr_final: self.options.max_triangles.unwrap_or(0),
            more_triangles: false,
            swap: true,
            min_cos: self.options.coplanarity,
        }
    }

    fn pre_process(&mut self, _mesh: &mut Mesh) {
        self.pending = None;
    }

    fn cost(&self, mesh: &Mesh, e: HalfEdgeId) -> f64 {
        if self.options.free_edges_only && !Self::is_free(mesh, e) {
            return 2.0 * self.tolerance();
        }
        self.metric_length(mesh, e)
    }

    fn can_process(&mut self, mesh: &Mesh, e: HalfEdgeId) -> bool {
        self.pending = None;
        if self.options.free_edges_only && !Self::is_free(mesh, e) {
            return false;
        }
        let o = mesh.origin(e);
        let d = mesh.destination(e);
        if !mesh.vertex(o).is_writable() || !mesh.vertex(d).is_writable() {
            return false;
        }
        let Some(mut target) = pin_or(mesh, e, || self.placement(mesh, e)) else {
            return false;
        };
        if !project(&mut self.liaison, o, &mut target) {
            return false;
        }
        let position = *target.position(mesh);
        if !self.respects_max_length(mesh, e, &position) {
            return false;
        }
        if !mesh.can_collapse_edge(e, &position) {
            return false;
        }
        self.pending = Some((e, target));
        true
    }

    fn process(&mut self, mesh: &mut Mesh, e: HalfEdgeId) -> Option<HalfEdgeId> {
        let target = match self.pending.take() {
            Some((p, target)) if p == e => Some(target),
            _ => {
                if self.can_process(mesh, e) {
                    self.pending.take().map(|(_, target)| target)
                } else {
                    None
                }
            }
        }?;
        debug!(?e, ?target, "Contract edge");
        let (_, result) = contract(mesh, e, target, &mut self.liaison);
        Some(result)
    }

    fn post_process(&mut self, mesh: &Mesh, stats: &EngineStats) {
        info!(
            contracted = stats.processed,
            not_contracted = stats.not_processed,
            swapped = stats.swapped,
            triangles = mesh.num_triangles(),
            "Length decimation done"
        );
    }
}
