//! Quadric Error Metrics (QEM) decimation.

use std::collections::HashMap;

use tracing::{debug, info};

use super::{contract, pin_or, project, QemOptions, Target};
use crate::algo::engine::{EngineConfig, EngineStats, HalfEdgeStrategy};
use crate::algo::liaison::MeshLiaison;
use crate::algo::options::FromOptions;
use crate::algo::quadric::{Candidate, Quadric};
use crate::error::Result;
use crate::mesh::{EdgeFlags, HalfEdgeId, Mesh, VertexId};

/// Scale of the virtual planes added along free and feature edges.
const VIRTUAL_PLANE_SCALE: f64 = 100.0;

/// Edge collapse strategy driven by quadric error metrics.
///
/// Quadrics are built in `pre_process` from the planes of the writable
/// triangles, weighted by their area relative to the tolerance. Every
/// half-edge carrying [`EdgeFlags::FEATURE`] adds a virtual plane containing
/// the edge and perpendicular to its triangle.
pub struct QemDecimation {
    options: QemOptions,
    quadrics: HashMap<VertexId, Quadric>,
    pending: Option<(HalfEdgeId, Target, Quadric)>,
    liaison: Option<Box<dyn MeshLiaison>>,
}

impl QemDecimation {
    /// Create the strategy, validating `options`.
    pub fn new(options: QemOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            quadrics: HashMap::new(),
            pending: None,
            liaison: None,
        })
    }

    /// Keep the mesh on a background surface.
    pub fn with_liaison(mut self, liaison: Box<dyn MeshLiaison>) -> Self {
        self.liaison = Some(liaison);
        self
    }

    /// The options.
    pub fn options(&self) -> &QemOptions {
        &self.options
    }

    /// Current quadric of a vertex.
    pub fn quadric(&self, v: VertexId) -> Option<&Quadric> {
        self.quadrics.get(&v)
    }

    fn merged(&self, mesh: &Mesh, e: HalfEdgeId) -> Quadric {
        let get = |v: VertexId| self.quadrics.get(&v).copied().unwrap_or_default();
        get(mesh.origin(e)) + get(mesh.destination(e))
    }

    fn target(&self, mesh: &Mesh, e: HalfEdgeId, q: &Quadric) -> Option<Target> {
        pin_or(mesh, e, || {
            let o = mesh.vertex(mesh.origin(e));
            let d = mesh.vertex(mesh.destination(e));
            Target::Create(self.options.placement.place(
                q,
                Candidate::new(o.position, o.reference),
                Candidate::new(d.position, d.reference),
            ))
        })
    }

    fn accumulate(&mut self, mesh: &Mesh) {
        let tolerance = self.options.tolerance();
        let mut virtual_planes = 0usize;
        self.quadrics = mesh.vertex_ids().map(|v| (v, Quadric::zero())).collect();

        for t in mesh.triangle_ids() {
            let triangle = mesh.triangle(t);
            if triangle.is_outer() || !triangle.is_writable() {
                continue;
            }
            let normal = mesh.triangle_normal(t);
            // The norm of the cross product is twice the area.
            let mut weight = normal.norm();
            if tolerance > 0.0 {
                weight /= tolerance;
            }
            let Some(unit) = normal.try_normalize(1e-20) else {
                continue;
            };
            let vertices = triangle.vertices;
            let d = -unit.dot(&mesh.position(vertices[0]).coords);
            for v in vertices {
                if let Some(q) = self.quadrics.get_mut(&v) {
                    q.add_plane(&unit, d, weight);
                }
            }

            for slot in 0..3 {
                let h = HalfEdgeId::from_parts(t, slot);
                if !mesh.has_flags(h, EdgeFlags::FEATURE) {
                    continue;
                }
                let o = mesh.origin(h);
                let n = mesh.edge_vector(h).cross(&unit) * VIRTUAL_PLANE_SCALE;
                let d = -n.dot(&mesh.position(o).coords);
                for v in [o, mesh.destination(h)] {
                    if let Some(q) = self.quadrics.get_mut(&v) {
                        q.add_plane(&n, d, 1.0);
                    }
                }
                virtual_planes += 1;
            }
        }
        debug!(
            vertices = self.quadrics.len(),
            virtual_planes, "Quadrics computed"
        );
    }
}

impl std::fmt::Debug for QemDecimation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QemDecimation")
            .field("options", &self.options)
            .field("quadrics", &self.quadrics.len())
            .field("liaison", &self.liaison.is_some())
            .finish()
    }
}

impl HalfEdgeStrategy for QemDecimation {
    fn name(&self) -> &'static str {
        "qem"
    }

    fn config(&self) -> EngineConfig {
        EngineConfig {
            tolerance: self.options.tolerance(),
            nr_final: self.options.max_triangles.unwrap_or(0),
            more_triangles: false,
            swap: true,
            min_cos: self.options.coplanarity,
        }
    }

    fn pre_process(&mut self, mesh: &mut Mesh) {
        self.pending = None;
        self.accumulate(mesh);
    }

    fn cost(&self, mesh: &Mesh, e: HalfEdgeId) -> f64 {
        let q = self.merged(mesh, e);
        let target = self
            .target(mesh, e, &q)
            .unwrap_or(Target::Keep(mesh.origin(e)));
        q.value(target.position(mesh)).max(0.0)
    }

    fn can_process(&mut self, mesh: &Mesh, e: HalfEdgeId) -> bool {
        self.pending = None;
        let o = mesh.origin(e);
        let d = mesh.destination(e);
        if !mesh.vertex(o).is_writable()
            || !mesh.vertex(d).is_writable()
            || mesh.has_flags(e, EdgeFlags::IMMUTABLE)
        {
            return false;
        }
        let q = self.merged(mesh, e);
        let Some(mut target) = self.target(mesh, e, &q) else {
            return false;
        };
        if !project(&mut self.liaison, o, &mut target) {
            return false;
        }
        if !mesh.can_collapse_edge(e, target.position(mesh)) {
            return false;
        }
        self.pending = Some((e, target, q));
        true
    }

    fn process(&mut self, mesh: &mut Mesh, e: HalfEdgeId) -> Option<HalfEdgeId> {
        let pending = match self.pending.take() {
            Some(p) if p.0 == e => Some(p),
            _ => {
                if self.can_process(mesh, e) {
                    self.pending.take()
                } else {
                    None
                }
            }
        };
        let (_, target, q) = pending?;
        let o = mesh.origin(e);
        let d = mesh.destination(e);
        debug!(?e, ?target, "Contract edge");

        let (v, result) = contract(mesh, e, target, &mut self.liaison);
        self.quadrics.remove(&o);
        self.quadrics.remove(&d);
        self.quadrics.insert(v, q);
        Some(result)
    }

    fn post_process(&mut self, mesh: &Mesh, stats: &EngineStats) {
        info!(
            contracted = stats.processed,
            not_contracted = stats.not_processed,
            swapped = stats.swapped,
            triangles = mesh.num_triangles(),
            "QEM decimation done"
        );
    }
}
