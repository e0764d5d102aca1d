//! Removal of needle-shaped triangles.
//!
//! A triangle is considered degenerate when one of its edges is much shorter
//! than the others. The short edge is collapsed into its midpoint, which
//! repairs the triangle without otherwise changing the surface: only edges
//! whose length ratio exceeds `rho` are ever touched, and no swap is done
//! afterwards.

use tracing::{debug, info};

use super::decimate::{contract, Target};
use super::engine::{EdgeEngine, EngineConfig, EngineStats, HalfEdgeStrategy};
use super::liaison::MeshLiaison;
use super::options::{self, FromOptions};
use super::quadric::Candidate;
use crate::error::{MeshError, Result};
use crate::mesh::{EdgeFlags, HalfEdgeId, Mesh};

/// Options for [`DegenerateRemoval`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegenerateOptions {
    /// Smallest ratio between the longest and the shortest edge of a
    /// triangle for the triangle to be repaired. Must be greater than 2.
    pub rho: f64,
}

impl Default for DegenerateOptions {
    fn default() -> Self {
        Self { rho: 100.0 }
    }
}

impl DegenerateOptions {
    /// Set the edge ratio.
    pub fn with_rho(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    /// Largest inverse squared edge ratio an edge may have to be collapsed.
    pub fn tolerance(&self) -> f64 {
        1.0 / (self.rho * self.rho)
    }
}

impl FromOptions for DegenerateOptions {
    fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "rho" => self.rho = options::parse_positive(key, value)?,
            _ => return Err(options::unknown(key)),
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !self.rho.is_finite() || self.tolerance() >= 0.25 {
            return Err(MeshError::invalid_param(
                "rho",
                self.rho,
                "edge ratio must be strictly greater than 2",
            ));
        }
        Ok(())
    }
}

/// Edge collapse strategy repairing ill-shaped triangles.
///
/// The cost of an edge is the smallest `|e|² / |f|²` over the other edges
/// `f` of every triangle sharing it. Edges flagged `IMMUTABLE` and edges
/// with a non-writable endpoint are left alone.
pub struct DegenerateRemoval {
    options: DegenerateOptions,
    pending: Option<(HalfEdgeId, Candidate)>,
    liaison: Option<Box<dyn MeshLiaison>>,
}

impl DegenerateRemoval {
    /// Create the strategy, validating `options`.
    pub fn new(options: DegenerateOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            pending: None,
            liaison: None,
        })
    }

    /// Report created and removed vertices to a background surface.
    pub fn with_liaison(mut self, liaison: Box<dyn MeshLiaison>) -> Self {
        self.liaison = Some(liaison);
        self
    }

    /// The options.
    pub fn options(&self) -> &DegenerateOptions {
        &self.options
    }
}

impl std::fmt::Debug for DegenerateRemoval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DegenerateRemoval")
            .field("options", &self.options)
            .field("liaison", &self.liaison.is_some())
            .finish()
    }
}

impl HalfEdgeStrategy for DegenerateRemoval {
    fn name(&self) -> &'static str {
        "degenerate"
    }

    fn config(&self) -> EngineConfig {
        EngineConfig {
            tolerance: self.options.tolerance(),
            nr_final: 0,
            more_triangles: false,
            swap: false,
            min_cos: -2.0,
        }
    }

    fn pre_process(&mut self, _mesh: &mut Mesh) {
        self.pending = None;
    }

    fn cost(&self, mesh: &Mesh, e: HalfEdgeId) -> f64 {
        let ae = mesh.edge_length_squared(e);
        mesh.fan(e)
            .into_iter()
            .flat_map(|h| [h.next(), h.prev()])
            .map(|f| ae / mesh.edge_length_squared(f))
            .fold(self.options.tolerance() + 1.0, f64::min)
    }

    fn can_process(&mut self, mesh: &Mesh, e: HalfEdgeId) -> bool {
        self.pending = None;
        if mesh.has_flags(e, EdgeFlags::IMMUTABLE) {
            return false;
        }
        let o = mesh.origin(e);
        let d = mesh.destination(e);
        if !mesh.vertex(o).is_writable() || !mesh.vertex(d).is_writable() {
            return false;
        }
        let midpoint = Candidate::new(mesh.edge_midpoint(e), mesh.vertex(o).reference);
        if !mesh.can_collapse_edge(e, &midpoint.position) {
            return false;
        }
        self.pending = Some((e, midpoint));
        true
    }

    fn process(&mut self, mesh: &mut Mesh, e: HalfEdgeId) -> Option<HalfEdgeId> {
        let midpoint = match self.pending.take() {
            Some((p, midpoint)) if p == e => midpoint,
            _ => {
                if !self.can_process(mesh, e) {
                    return None;
                }
                self.pending.take()?.1
            }
        };
        if mesh.is_nonmanifold_edge(e) {
            debug!(?e, fan = mesh.fan(e).len(), "Collapse non-manifold edge");
        } else {
            debug!(?e, position = ?midpoint.position, "Collapse edge");
        }
        let (_, result) = contract(mesh, e, Target::Create(midpoint), &mut self.liaison);
        Some(result)
    }

    fn post_process(&mut self, mesh: &Mesh, stats: &EngineStats) {
        info!(
            collapsed = stats.processed,
            not_collapsed = stats.not_processed,
            triangles = mesh.num_triangles(),
            "Degenerate removal done"
        );
    }
}

/// Collapse the short edges of every triangle whose edge ratio exceeds
/// `rho`.
pub fn remove_degenerated(mesh: &mut Mesh, options: &DegenerateOptions) -> Result<EngineStats> {
    let strategy = DegenerateRemoval::new(*options)?;
    let mut engine = EdgeEngine::new(mesh, strategy);
    engine.set_progress_bar_status(10);
    engine.compute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::liaison::recording::RecordingLiaison;
    use crate::mesh::{build_from_triangles, VertexId};
    use nalgebra::Point3;

    /// A strip of two squares whose middle row is squeezed to `gap`.
    fn create_squeezed_strip(gap: f64) -> Mesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0 + gap, 1.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let faces = vec![
            [0, 1, 6],
            [0, 6, 3],
            [1, 4, 6],
            [1, 2, 4],
            [2, 5, 4],
        ];
        build_from_triangles(&vertices, &faces).unwrap()
    }

    #[test]
    fn test_options() {
        let options = DegenerateOptions::from_pairs(&[("rho", "10")]).unwrap();
        assert!((options.tolerance() - 0.01).abs() < 1e-15);
        assert!(DegenerateOptions::from_pairs(&[("rho", "2")]).is_err());
        assert!(DegenerateOptions::from_pairs(&[("rho", "1.5")]).is_err());
        assert!(matches!(
            DegenerateOptions::from_pairs(&[("size", "1")]),
            Err(MeshError::UnknownOption { .. })
        ));
    }

    #[test]
    fn test_cost_is_inverse_squared_ratio() {
        let mesh = create_squeezed_strip(0.01);
        let strategy = DegenerateRemoval::new(DegenerateOptions::default()).unwrap();
        let e = mesh
            .find_halfedge(VertexId::new(6), VertexId::new(4))
            .or_else(|| mesh.find_halfedge(VertexId::new(4), VertexId::new(6)))
            .unwrap();
        let cost = strategy.cost(&mesh, e);
        assert!(cost <= strategy.options().tolerance());
        assert!(cost > 0.0);

        let regular = mesh.find_edge(VertexId::new(0), VertexId::new(1)).unwrap();
        assert!(strategy.cost(&mesh, regular) > strategy.options().tolerance());
    }

    #[test]
    fn test_short_edge_is_collapsed() {
        let mut mesh = create_squeezed_strip(0.001);
        let area = mesh.surface_area();
        let stats = remove_degenerated(&mut mesh, &DegenerateOptions::default()).unwrap();

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.swapped, 0);
        assert_eq!(mesh.num_triangles(), 4);
        assert!(mesh.is_valid());
        assert!((mesh.surface_area() - area).abs() < 1e-2);
    }

    #[test]
    fn test_regular_mesh_is_untouched() {
        let mut mesh = create_squeezed_strip(0.5);
        let stats = remove_degenerated(&mut mesh, &DegenerateOptions::default()).unwrap();
        assert_eq!(stats.processed, 0);
        assert_eq!(mesh.num_triangles(), 5);
    }

    #[test]
    fn test_immutable_edge_is_kept() {
        let mut mesh = create_squeezed_strip(0.001);
        let e = mesh.find_edge(VertexId::new(6), VertexId::new(4)).unwrap();
        mesh.set_edge_flags(e, EdgeFlags::IMMUTABLE);
        let stats = remove_degenerated(&mut mesh, &DegenerateOptions::default()).unwrap();
        assert_eq!(stats.processed, 0);
        assert!(stats.not_processed > 0);
        assert_eq!(mesh.num_triangles(), 5);
    }

    #[test]
    fn test_liaison_follows_collapse() {
        let mut mesh = create_squeezed_strip(0.001);
        let liaison = RecordingLiaison::default();
        let counts = liaison.clone();
        let strategy = DegenerateRemoval::new(DegenerateOptions::default())
            .unwrap()
            .with_liaison(Box::new(liaison));
        let stats = EdgeEngine::new(&mut mesh, strategy).compute().unwrap();

        assert_eq!(stats.processed, 1);
        // The midpoint replaces both endpoints.
        assert_eq!((counts.added.get(), counts.removed.get()), (1, 2));
        assert_eq!(mesh.num_vertices(), 6);
    }
}
