//! Mesh construction utilities.
//!
//! This module builds arena meshes from face-vertex lists as commonly found
//! in mesh file formats. Adjacency, boundary and non-manifold flags are
//! derived while triangles are inserted.

use nalgebra::Point3;
use tracing::debug;

use super::halfedge::Mesh;
use super::index::VertexId;
use crate::error::{MeshError, Result};

/// Incremental builder for a [`Mesh`].
///
/// Vertices are addressed by their insertion order, so indices from a file
/// can be used directly.
///
/// # Example
/// ```
/// use whittle::mesh::MeshBuilder;
/// use nalgebra::Point3;
///
/// let mut builder = MeshBuilder::new();
/// let a = builder.add_vertex(Point3::new(0.0, 0.0, 0.0));
/// let b = builder.add_vertex(Point3::new(1.0, 0.0, 0.0));
/// let c = builder.add_vertex(Point3::new(0.5, 1.0, 0.0));
/// builder.set_reference(a, 1);
/// builder.add_triangle_in_group([a, b, c], 7);
///
/// let mesh = builder.build().unwrap();
/// assert_eq!(mesh.num_triangles(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MeshBuilder {
    positions: Vec<Point3<f64>>,
    references: Vec<i32>,
    faces: Vec<([usize; 3], i32)>,
}

impl MeshBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex and return its index.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> usize {
        self.positions.push(position);
        self.references.push(0);
        self.positions.len() - 1
    }

    /// Set the boundary or feature reference of a vertex.
    ///
    /// Out of range indices are reported by [`build`](Self::build).
    pub fn set_reference(&mut self, vertex: usize, reference: i32) {
        if let Some(r) = self.references.get_mut(vertex) {
            *r = reference;
        }
    }

    /// Add a triangle in group 0.
    pub fn add_triangle(&mut self, face: [usize; 3]) {
        self.faces.push((face, 0));
    }

    /// Add a triangle in the given group.
    pub fn add_triangle_in_group(&mut self, face: [usize; 3], group: i32) {
        self.faces.push((face, group));
    }

    /// Validate the input and build the mesh.
    pub fn build(self) -> Result<Mesh> {
        if self.faces.is_empty() {
            return Err(MeshError::EmptyMesh);
        }

        for (fi, (face, _)) in self.faces.iter().enumerate() {
            for &vi in face {
                if vi >= self.positions.len() {
                    return Err(MeshError::InvalidVertexIndex {
                        face: fi,
                        vertex: vi,
                    });
                }
            }
            if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                return Err(MeshError::DegenerateFace { face: fi });
            }
        }

        let mut mesh = Mesh::with_capacity(self.positions.len(), self.faces.len());
        let vertex_ids: Vec<VertexId> = self
            .positions
            .iter()
            .zip(&self.references)
            .map(|(&pos, &reference)| {
                let v = mesh.create_vertex(pos);
                mesh.vertex_mut(v).reference = reference;
                v
            })
            .collect();

        for &(face, group) in &self.faces {
            mesh.add_triangle(
                [vertex_ids[face[0]], vertex_ids[face[1]], vertex_ids[face[2]]],
                group,
            );
        }

        debug!(
            vertices = mesh.num_vertices(),
            triangles = mesh.num_triangles(),
            "Built mesh"
        );
        Ok(mesh)
    }
}

/// Build a mesh from vertices and triangle faces.
///
/// # Arguments
/// * `vertices` - List of vertex positions
/// * `faces` - List of triangle faces, each as [v0, v1, v2] indices
///
/// # Returns
/// A mesh, or an error if the input is invalid.
///
/// # Example
/// ```
/// use whittle::mesh::build_from_triangles;
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let mesh = build_from_triangles(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_triangles(), 1);
/// ```
pub fn build_from_triangles(vertices: &[Point3<f64>], faces: &[[usize; 3]]) -> Result<Mesh> {
    let mut builder = MeshBuilder::new();
    for &p in vertices {
        builder.add_vertex(p);
    }
    for &face in faces {
        builder.add_triangle(face);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{EdgeFlags, HalfEdgeId, TriangleId};

    fn two_triangles() -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        // Two triangles sharing an edge
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
        ];
        let faces = vec![[0, 1, 2], [1, 0, 3]];
        (vertices, faces)
    }

    #[test]
    fn test_single_triangle() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
        ];
        let mesh = build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap();

        assert_eq!(mesh.num_vertices(), 3);
        assert_eq!(mesh.num_triangles(), 1);
        assert!(mesh.is_valid());
        for e in mesh.halfedge_ids() {
            assert!(mesh.is_boundary_edge(e));
        }
    }

    #[test]
    fn test_two_triangles() {
        let (vertices, faces) = two_triangles();
        let mesh = build_from_triangles(&vertices, &faces).unwrap();

        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_triangles(), 2);
        assert!(mesh.is_valid());

        let shared = HalfEdgeId::from_parts(TriangleId::new(0), 0);
        assert_eq!(
            mesh.sym(shared),
            Some(HalfEdgeId::from_parts(TriangleId::new(1), 0))
        );
    }

    #[test]
    fn test_nonmanifold_fan() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
            Point3::new(0.5, 0.0, 1.0),
        ];
        let faces = vec![[0, 1, 2], [1, 0, 3], [0, 1, 4]];
        let mesh = build_from_triangles(&vertices, &faces).unwrap();
        assert!(mesh.is_valid());

        let e = HalfEdgeId::from_parts(TriangleId::new(0), 0);
        assert!(mesh.is_nonmanifold_edge(e));
        assert_eq!(mesh.fan(e).len(), 3);
        assert_eq!(mesh.sym(e), None);
        assert!(!mesh.is_manifold_vertex(mesh.origin(e)));
        assert!(mesh.is_manifold_vertex(mesh.apex(e)));
    }

    #[test]
    fn test_inconsistent_orientation_is_nonmanifold() {
        let (vertices, _) = two_triangles();
        let mesh = build_from_triangles(&vertices, &[[0, 1, 2], [0, 1, 3]]).unwrap();
        let e = HalfEdgeId::from_parts(TriangleId::new(0), 0);
        assert!(mesh.has_flags(e, EdgeFlags::NONMANIFOLD));
    }

    #[test]
    fn test_groups_and_references() {
        let (vertices, faces) = two_triangles();
        let mut builder = MeshBuilder::new();
        for &p in &vertices {
            builder.add_vertex(p);
        }
        builder.set_reference(2, 4);
        builder.add_triangle_in_group(faces[0], 1);
        builder.add_triangle_in_group(faces[1], 2);
        let mut mesh = builder.build().unwrap();

        assert_eq!(mesh.vertex(VertexId::new(2)).reference, 4);
        assert_eq!(mesh.triangle(TriangleId::new(1)).group, 2);
        assert!(mesh.triangle(TriangleId::new(0)).is_writable());
        assert_eq!(mesh.tag_group_boundaries(EdgeFlags::SHARP), 1);
    }

    #[test]
    fn test_roundtrip() {
        let (vertices, faces) = two_triangles();
        let mesh = build_from_triangles(&vertices, &faces).unwrap();

        let (out_verts, out_faces) = mesh.to_triangles();

        assert_eq!(vertices.len(), out_verts.len());
        assert_eq!(faces, out_faces);
        for (v_in, v_out) in vertices.iter().zip(out_verts.iter()) {
            assert!((v_in - v_out).norm() < 1e-10);
        }
    }

    #[test]
    fn test_invalid_vertex_index() {
        let vertices = vec![Point3::new(0.0, 0.0, 0.0)];
        let faces = vec![[0, 1, 2]]; // Indices 1 and 2 are invalid

        let result = build_from_triangles(&vertices, &faces);
        assert!(matches!(
            result,
            Err(MeshError::InvalidVertexIndex { face: 0, vertex: 1 })
        ));
    }

    #[test]
    fn test_degenerate_face() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
        ];
        let faces = vec![[0, 0, 2]]; // Degenerate: v0 == v1

        let result = build_from_triangles(&vertices, &faces);
        assert!(matches!(result, Err(MeshError::DegenerateFace { face: 0 })));
    }

    #[test]
    fn test_empty() {
        assert!(matches!(
            MeshBuilder::new().build(),
            Err(MeshError::EmptyMesh)
        ));
    }
}
