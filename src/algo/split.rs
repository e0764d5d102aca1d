//! Refinement by edge splitting.
//!
//! The growth counterpart of decimation: the longest edge is split at its
//! midpoint until every edge is shorter than `size`, or until the mesh
//! holds `max_triangles` triangles.

use nalgebra::Point3;
use tracing::{debug, info};

use super::decimate::validate_termination;
use super::engine::{EdgeEngine, EngineConfig, EngineStats, HalfEdgeStrategy};
use super::liaison::MeshLiaison;
use super::options::{self, FromOptions};
use crate::error::Result;
use crate::mesh::{EdgeFlags, HalfEdgeId, Mesh};

/// Options for [`EdgeSplit`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SplitOptions {
    /// Edges at least this long are split.
    pub size: Option<f64>,

    /// Target triangle count, reached from below. Takes precedence over
    /// `size` for termination.
    pub max_triangles: Option<usize>,
}

impl SplitOptions {
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
}

impl FromOptions for SplitOptions {
    fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "size" => self.size = Some(options::parse_positive(key, value)?),
            "maxtriangles" => self.max_triangles = Some(options::parse_usize(key, value)?),
            _ => return Err(options::unknown(key)),
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        validate_termination(self.size, self.max_triangles)
    }
}

/// Edge strategy inserting the midpoint of the longest edges.
///
/// The cost of an edge is its negated squared length. New angles must keep
/// a sine of at least `sin(5°)`. A vertex inserted on a free edge inherits
/// the reference of the edge's endpoints.
pub struct EdgeSplit {
    options: SplitOptions,
    min_sine: f64,
    pending: Option<(HalfEdgeId, Point3<f64>)>,
    liaison: Option<Box<dyn MeshLiaison>>,
}

impl EdgeSplit {
    /// Create the strategy, validating `options`.
    pub fn new(options: SplitOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            min_sine: 5.0_f64.to_radians().sin(),
            pending: None,
            liaison: None,
        })
    }

    /// Project inserted vertices onto a background surface.
    pub fn with_liaison(mut self, liaison: Box<dyn MeshLiaison>) -> Self {
        self.liaison = Some(liaison);
        self
    }

    /// The options.
    pub fn options(&self) -> &SplitOptions {
        &self.options
    }

    fn inherited_reference(mesh: &Mesh, e: HalfEdgeId) -> i32 {
        if !mesh.has_flags(e, EdgeFlags::BOUNDARY) {
            return 0;
        }
        let o = mesh.vertex(mesh.origin(e)).reference;
        if o != 0 {
            o
        } else {
            mesh.vertex(mesh.destination(e)).reference
        }
    }
}

impl std::fmt::Debug for EdgeSplit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeSplit")
            .field("options", &self.options)
            .field("liaison", &self.liaison.is_some())
            .finish()
    }
}

impl HalfEdgeStrategy for EdgeSplit {
    fn name(&self) -> &'static str {
        "split"
    }

    fn config(&self) -> EngineConfig {
        let tolerance = self.options.size.map_or(0.0, |s| -s * s);
        EngineConfig {
            tolerance,
            nr_final: self.options.max_triangles.unwrap_or(0),
            more_triangles: true,
            swap: false,
            ..EngineConfig::default()
        }
    }

    fn pre_process(&mut self, _mesh: &mut Mesh) {
        self.pending = None;
    }

    fn cost(&self, mesh: &Mesh, e: HalfEdgeId) -> f64 {
        -mesh.edge_length_squared(e)
    }

    fn can_process(&mut self, mesh: &Mesh, e: HalfEdgeId) -> bool {
        self.pending = None;
        let o = mesh.origin(e);
        let d = mesh.destination(e);
        let mut position = mesh.edge_midpoint(e);
        if !mesh.has_flags(e, EdgeFlags::BOUNDARY) {
            if let Some(liaison) = self.liaison.as_mut() {
                let near = if mesh.vertex(o).is_mutable() { o } else { d };
                if !liaison.move_vertex(near, &mut position) {
                    return false;
                }
            }
        }
        if !mesh.can_split_edge(e, &position, self.min_sine) {
            return false;
        }
        self.pending = Some((e, position));
        true
    }

    fn process(&mut self, mesh: &mut Mesh, e: HalfEdgeId) -> Option<HalfEdgeId> {
        let position = match self.pending.take() {
            Some((p, position)) if p == e => position,
            _ => {
                if !self.can_process(mesh, e) {
                    return None;
                }
                self.pending.take()?.1
            }
        };
        let reference = Self::inherited_reference(mesh, e);
        let o = mesh.origin(e);
        let v = mesh.create_vertex(position);
        mesh.vertex_mut(v).reference = reference;
        if let Some(liaison) = self.liaison.as_mut() {
            liaison.add_vertex(v, o);
        }
        debug!(?e, ?v, "Split edge");
        let r = mesh.vertex_split(e, v);
        Some(r.next())
    }

    fn post_process(&mut self, mesh: &Mesh, stats: &EngineStats) {
        info!(
            split = stats.processed,
            not_split = stats.not_processed,
            triangles = mesh.num_triangles(),
            "Edge split done"
        );
    }
}

/// Split the longest edges of `mesh`.
pub fn split_edges(mesh: &mut Mesh, options: &SplitOptions) -> Result<EngineStats> {
    let strategy = EdgeSplit::new(*options)?;
    EdgeEngine::new(mesh, strategy).compute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::liaison::recording::RecordingLiaison;
    use crate::error::MeshError;
    use crate::mesh::{build_from_triangles, VertexId};

    fn create_grid_mesh(n: usize) -> Mesh {
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                vertices.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        for j in 0..n {
            for i in 0..n {
                let v = j * (n + 1) + i;
                faces.push([v, v + 1, v + n + 2]);
                faces.push([v, v + n + 2, v + n + 1]);
            }
        }
        build_from_triangles(&vertices, &faces).unwrap()
    }

    #[test]
    fn test_options() {
        let options =
            SplitOptions::from_pairs(&[("size", "0.5"), ("maxtriangles", "100")]).unwrap();
        assert_eq!(options.size, Some(0.5));
        assert_eq!(options.max_triangles, Some(100));
        assert!(matches!(
            SplitOptions::from_pairs(&[]),
            Err(MeshError::InvalidParameter { .. })
        ));
        assert!(SplitOptions::from_pairs(&[("rho", "3")]).is_err());
    }

    #[test]
    fn test_cost_prefers_longest() {
        let mesh = create_grid_mesh(1);
        let split = EdgeSplit::new(SplitOptions::default().with_size(1.0)).unwrap();
        let side = mesh.find_edge(VertexId::new(0), VertexId::new(1)).unwrap();
        let diagonal = mesh.find_edge(VertexId::new(0), VertexId::new(3)).unwrap();
        assert!(split.cost(&mesh, diagonal) < split.cost(&mesh, side));
        assert!((split.cost(&mesh, diagonal) + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_long_edges_are_split() {
        let mut mesh = create_grid_mesh(2);
        let area = mesh.surface_area();
        let stats = split_edges(&mut mesh, &SplitOptions::default().with_size(1.2)).unwrap();

        assert_eq!(stats.processed, 4);
        assert_eq!(mesh.num_triangles(), 16);
        assert!(mesh.is_valid());
        assert!((mesh.surface_area() - area).abs() < 1e-12);
    }

    #[test]
    fn test_target_count_from_below() {
        let mut mesh = create_grid_mesh(1);
        let options = SplitOptions::default().with_max_triangles(6);
        let stats = split_edges(&mut mesh, &options).unwrap();
        assert_eq!(stats.processed, 3);
        assert_eq!(mesh.num_triangles(), 6);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_boundary_split_inherits_reference() {
        let mut mesh = create_grid_mesh(1);
        for i in 0..4 {
            mesh.vertex_mut(VertexId::new(i)).reference = 2;
        }
        let options = SplitOptions::default().with_max_triangles(5);
        split_edges(&mut mesh, &options).unwrap();

        // The diagonal goes first, then one side.
        assert_eq!(mesh.vertex(VertexId::new(4)).reference, 0);
        assert_eq!(mesh.vertex(VertexId::new(5)).reference, 2);
        assert!(mesh.is_boundary_vertex(VertexId::new(5)));
    }

    #[test]
    fn test_liaison_sees_inserted_vertices() {
        let mut mesh = create_grid_mesh(1);
        let liaison = RecordingLiaison::default();
        let counts = liaison.clone();
        let split = EdgeSplit::new(SplitOptions::default().with_max_triangles(6))
            .unwrap()
            .with_liaison(Box::new(liaison));
        let stats = EdgeEngine::new(&mut mesh, split).compute().unwrap();

        assert_eq!(stats.processed, 3);
        assert_eq!(counts.added.get(), 3);
        assert_eq!(counts.removed.get(), 0);
        // Only the diagonal is projected, free edges keep their midpoint.
        assert!(counts.moved.get() >= 1);
    }

    #[test]
    fn test_refused_projection_keeps_interior_edges() {
        let mut mesh = create_grid_mesh(1);
        let liaison = RecordingLiaison::refusing();
        let counts = liaison.clone();
        let split = EdgeSplit::new(SplitOptions::default().with_max_triangles(4))
            .unwrap()
            .with_liaison(Box::new(liaison));
        let stats = EdgeEngine::new(&mut mesh, split).compute().unwrap();

        assert_eq!(stats.processed, 2);
        assert_eq!(counts.added.get(), 2);
        assert!(counts.moved.get() >= 1);
        assert_eq!(mesh.num_triangles(), 4);
        assert!(mesh.find_edge(VertexId::new(0), VertexId::new(3)).is_some());
        assert!(mesh.is_valid());
    }
}
