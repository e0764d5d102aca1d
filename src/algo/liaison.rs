//! Background surface hooks.
//!
//! When a decimated mesh has to stay attached to a reference surface (a CAD
//! patch, or the original mesh), strategies talk to a [`MeshLiaison`]. The
//! liaison projects candidate positions, tracks vertices as they appear and
//! vanish, and provides the background normal at a vertex.

use nalgebra::{Point3, Vector3};

use crate::mesh::VertexId;

/// Collaborator keeping the mesh projected onto a background surface.
pub trait MeshLiaison {
    /// Project `target` onto the background surface, near the location of
    /// vertex `v`.
    ///
    /// Returns `false` when no projection exists; the edit is then refused.
    fn move_vertex(&mut self, v: VertexId, target: &mut Point3<f64>) -> bool;

    /// A vertex was created close to `near`.
    fn add_vertex(&mut self, v: VertexId, near: VertexId);

    /// A vertex left the mesh.
    fn remove_vertex(&mut self, v: VertexId);

    /// Normal of the background surface at `v`, if known.
    fn background_normal(&self, v: VertexId) -> Option<Vector3<f64>>;
}

/// Liaison projecting onto a fixed plane.
///
/// Mostly useful for planar meshes and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneLiaison {
    origin: Point3<f64>,
    normal: Vector3<f64>,
    added: usize,
    removed: usize,
}

impl PlaneLiaison {
    /// Plane through `origin` with normal `normal`.
    ///
    /// A zero normal is replaced by `+Z`.
    pub fn new(origin: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            origin,
            normal: normal.try_normalize(1e-20).unwrap_or_else(Vector3::z),
            added: 0,
            removed: 0,
        }
    }

    /// Number of vertices reported as created.
    pub fn added(&self) -> usize {
        self.added
    }

    /// Number of vertices reported as removed.
    pub fn removed(&self) -> usize {
        self.removed
    }
}

impl MeshLiaison for PlaneLiaison {
    fn move_vertex(&mut self, _v: VertexId, target: &mut Point3<f64>) -> bool {
        let offset = (*target - self.origin).dot(&self.normal);
        *target -= self.normal * offset;
        true
    }

    fn add_vertex(&mut self, _v: VertexId, _near: VertexId) {
        self.added += 1;
    }

    fn remove_vertex(&mut self, _v: VertexId) {
        self.removed += 1;
    }

    fn background_normal(&self, _v: VertexId) -> Option<Vector3<f64>> {
        Some(self.normal)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_plane_projection() {
        let mut liaison = PlaneLiaison::new(Point3::new(0.0, 0.0, 1.0), Vector3::new(0.0, 0.0, 2.0));
        let mut p = Point3::new(3.0, -1.0, 5.0);
        assert!(liaison.move_vertex(VertexId::new(0), &mut p));
        assert_relative_eq!(p, Point3::new(3.0, -1.0, 1.0));
        assert_relative_eq!(
            liaison.background_normal(VertexId::new(0)).unwrap(),
            Vector3::z()
        );
    }

    #[test]
    fn test_counts() {
        let mut liaison = PlaneLiaison::new(Point3::origin(), Vector3::zeros());
        liaison.add_vertex(VertexId::new(3), VertexId::new(1));
        liaison.remove_vertex(VertexId::new(1));
        liaison.remove_vertex(VertexId::new(2));
        assert_eq!((liaison.added(), liaison.removed()), (1, 2));
    }
}
