//! Mesh simplification algorithms.
//!
//! Two generic engines drive every algorithm of this module:
//!
//! - [`EdgeEngine`](engine::EdgeEngine) processes half-edges by ascending
//!   cost: [decimation](decimate) by quadric error or edge length,
//!   [degenerate triangle removal](degenerate) and [edge splitting](split)
//! - [`VertexEngine`](vertex_engine::VertexEngine) processes vertices:
//!   [valence balancing](valence)
//!
//! Each algorithm is a strategy plugged into its engine. The engine owns the
//! priority queue, penalties for rejected candidates, termination and the
//! swap pass; the strategy decides what an edit costs, whether it is
//! allowed and how it is done.

pub mod checkpoint;
pub mod decimate;
pub mod degenerate;
pub mod engine;
pub mod liaison;
pub mod options;
pub mod progress;
pub mod quadric;
pub mod split;
pub mod tree;
pub mod valence;
pub mod vertex_engine;
