//! # Whittle
//!
//! Priority-driven simplification of triangle meshes.
//!
//! Whittle reduces or refines a triangle mesh by repeatedly applying the
//! cheapest local edit: an edge collapse, an edge split or a vertex
//! re-triangulation. Candidates are kept in a priority queue, costs are
//! refreshed only around each edit, and candidates the algorithm rejects
//! are penalized instead of retried forever.
//!
//! ## Features
//!
//! - **Arena half-edge mesh**: free boundaries, non-manifold fans, edge and
//!   vertex attributes, with validity checks for every edit
//! - **Quadric error metrics**: decimation driven by the squared distance to
//!   the original planes, boundaries kept in place by virtual planes
//! - **Length decimation**: collapse the shortest edges, optionally in a
//!   sizing field or on free edges only
//! - **Repair and refinement**: needle triangle removal, edge splitting and
//!   valence balancing run on the same engines
//!
//! ## Quick Start
//!
//! ```
//! use whittle::prelude::*;
//! use nalgebra::Point3;
//!
//! // A flat 3x3 grid.
//! let mut vertices = Vec::new();
//! for j in 0..4 {
//!     for i in 0..4 {
//!         vertices.push(Point3::new(i as f64, j as f64, 0.0));
//!     }
//! }
//! let mut faces = Vec::new();
//! for j in 0..3 {
//!     for i in 0..3 {
//!         let v = j * 4 + i;
//!         faces.push([v, v + 1, v + 5]);
//!         faces.push([v, v + 5, v + 4]);
//!     }
//! }
//! let mut mesh = build_from_triangles(&vertices, &faces).unwrap();
//! assert_eq!(mesh.num_triangles(), 18);
//!
//! // Collapse edges while the surface moves by less than 0.1.
//! let strategy = QemDecimation::new(QemOptions::default().with_size(0.1)).unwrap();
//! let stats = EdgeEngine::new(&mut mesh, strategy).compute().unwrap();
//!
//! assert!(stats.processed > 0);
//! assert!(mesh.num_triangles() < 18);
//! assert!(mesh.is_valid());
//! ```
//!
//! ## Options
//!
//! Every strategy accepts its settings as `key = value` pairs as well:
//!
//! ```
//! use whittle::prelude::*;
//!
//! let options = LengthOptions::from_pairs(&[("size", "0.5"), ("freeEdgesOnly", "true")]).unwrap();
//! assert!(options.free_edges_only);
//!
//! let err = QemOptions::from_pairs(&[("sise", "0.5")]).unwrap_err();
//! assert!(matches!(err, MeshError::UnknownOption { .. }));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod algo;
pub mod error;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use whittle::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::decimate::{
        decimate_length, decimate_qem, LengthDecimation, LengthOptions, QemDecimation,
        QemOptions,
    };
    pub use crate::algo::degenerate::{remove_degenerated, DegenerateOptions, DegenerateRemoval};
    pub use crate::algo::engine::{EdgeEngine, EngineConfig, EngineStats, HalfEdgeStrategy};
    pub use crate::algo::liaison::{MeshLiaison, PlaneLiaison};
    pub use crate::algo::options::FromOptions;
    pub use crate::algo::progress::Progress;
    pub use crate::algo::quadric::{Placement, Quadric};
    pub use crate::algo::split::{split_edges, EdgeSplit, SplitOptions};
    pub use crate::algo::valence::{improve_valence, ValenceBalancing, ValenceOptions};
    pub use crate::algo::vertex_engine::{VertexEngine, VertexStats, VertexStrategy};
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{
        build_from_triangles, EdgeFlags, HalfEdgeId, Mesh, MeshBuilder, TriangleFlags,
        TriangleId, VertexFlags, VertexId,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;
