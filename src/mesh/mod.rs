//! Core mesh data structures.
//!
//! This module provides the arena half-edge mesh and the local edits the
//! decimation algorithms are built from.
//!
//! # Overview
//!
//! The primary type is [`Mesh`]. Triangles and vertices live in arenas; a
//! half-edge is identified by its triangle and its slot in that triangle.
//! Edges may be shared by one triangle (free boundary), two triangles with
//! opposite orientations (manifold) or more (non-manifold), and every edit
//! keeps the three cases consistent.
//!
//! # Index Types
//!
//! Mesh elements are identified by type-safe index wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`TriangleId`] - Identifies a triangle
//! - [`HalfEdgeId`] - Identifies a directed edge inside a triangle
//!
//! # Edits
//!
//! [`Mesh::edge_collapse`], [`Mesh::edge_swap`] and [`Mesh::vertex_split`]
//! modify the mesh locally. Each has a companion predicate
//! ([`Mesh::can_collapse_edge`], [`Mesh::check_swap_3d`]) that callers run
//! first; edits assume their preconditions hold.
//!
//! # Construction
//!
//! ```
//! use whittle::mesh::build_from_triangles;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2]];
//!
//! let mesh = build_from_triangles(&vertices, &faces).unwrap();
//! assert!(mesh.is_valid());
//! ```

mod attributes;
mod builder;
mod edit;
mod halfedge;
mod index;

pub use attributes::{Adjacency, EdgeFlags, TriangleFlags, VertexFlags};
pub use builder::{build_from_triangles, MeshBuilder};
pub use edit::CollapseReject;
pub use halfedge::{Mesh, Triangle, Vertex};
pub use index::{HalfEdgeId, TriangleId, VertexId};
