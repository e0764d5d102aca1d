//! Priority-driven vertex engine.
//!
//! The vertex counterpart of [`EdgeEngine`](super::engine::EdgeEngine): the
//! tree holds vertices, and an edit reports which vertices it touched so
//! that only those are re-evaluated. Used by valence optimization.
//!
//! An edit may create vertices that are queued in turn, so a strategy can
//! undo its own work forever. The main loop is therefore bounded: by
//! [`VertexEngine::with_max_iterations`] when set, otherwise by
//! `4 * (queued + vertices) + 16` iterations measured once the tree is built.
//! [`VertexStats::interrupted`] tells whether the bound stopped the run.

use tracing::{debug, info, trace};

use super::checkpoint::Checkpoint;
use super::progress::Progress;
use super::tree::PriorityTree;
use crate::error::Result;
use crate::mesh::{Mesh, VertexId};

/// Fraction of the remaining headroom added to the cost of a rejected vertex.
const PENALTY_FACTOR: f64 = 0.7;

/// Cost, feasibility and edit of a vertex-based algorithm.
pub trait VertexStrategy {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Largest cost a vertex may have to be processed.
    fn tolerance(&self) -> f64;

    /// Prepare per-run state.
    fn pre_process(&mut self, _mesh: &mut Mesh) {}

    /// Cost of a vertex. Lower costs are processed first.
    fn cost(&self, mesh: &Mesh, v: VertexId) -> f64;

    /// Whether the vertex may be edited right now.
    fn can_process(&mut self, mesh: &Mesh, v: VertexId) -> bool;

    /// Edit the mesh around `v`, queued with `cost`.
    ///
    /// Returns the vertices whose cost may have changed, dead ones included,
    /// or `None` when nothing was changed.
    fn process(&mut self, mesh: &mut Mesh, v: VertexId, cost: f64) -> Option<Vec<VertexId>>;

    /// Report on the run.
    fn post_process(&mut self, _mesh: &Mesh, _stats: &VertexStats) {}
}

/// Counters of a vertex engine run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VertexStats {
    /// Edits performed.
    pub processed: usize,
    /// Vertices the strategy declined to edit.
    pub not_processed: usize,
    /// The iteration bound was reached with vertices still queued.
    pub interrupted: bool,
}

/// Generic driver for [`VertexStrategy`] implementations.
pub struct VertexEngine<'m, S> {
    mesh: &'m mut Mesh,
    strategy: S,
    tree: PriorityTree<VertexId>,
    stats: VertexStats,
    progress: Progress,
    progress_every: usize,
    checkpoint: Option<Checkpoint<VertexId>>,
    max_iterations: Option<usize>,
}

impl<'m, S: VertexStrategy> VertexEngine<'m, S> {
    /// Create an engine editing `mesh` with `strategy`.
    pub fn new(mesh: &'m mut Mesh, strategy: S) -> Self {
        Self {
            mesh,
            strategy,
            tree: PriorityTree::new(),
            stats: VertexStats::default(),
            progress: Progress::none(),
            progress_every: 10_000,
            checkpoint: None,
            max_iterations: None,
        }
    }

    /// Log progress every `every` processed edits, 0 to disable.
    pub fn set_progress_bar_status(&mut self, every: usize) {
        self.progress_every = every;
    }

    /// Report progress to `progress` as well as to the log.
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Call `checkpoint` before main-loop iterations.
    pub fn with_checkpoint(mut self, checkpoint: Checkpoint<VertexId>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Stop after `max` iterations of the main loop instead of the
    /// automatic bound.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// The strategy.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Consume the engine and return its strategy.
    pub fn into_strategy(self) -> S {
        self.strategy
    }

    /// Run until no queued vertex is below tolerance or the iteration
    /// bound is reached. Only a failing checkpoint hook is an error.
    pub fn compute(&mut self) -> Result<VertexStats> {
        let name = self.strategy.name();
        let tolerance = self.strategy.tolerance();
        info!(
            strategy = name,
            vertices = self.mesh.num_vertices(),
            tolerance,
            "Starting"
        );

        self.stats = VertexStats::default();
        self.strategy.pre_process(self.mesh);
        self.tree.clear();
        let vertices: Vec<VertexId> = self.mesh.vertex_ids().collect();
        for v in vertices {
            self.evaluate(v, tolerance);
        }
        debug!(queued = self.tree.len(), "Initial tree built");

        let mut budget = self
            .max_iterations
            .unwrap_or(4 * (self.tree.len() + self.mesh.num_vertices()) + 16);
        while !self.tree.is_empty() {
            if budget == 0 {
                info!(queued = self.tree.len(), "Iteration bound reached");
                self.stats.interrupted = true;
                break;
            }
            budget -= 1;

            if let Some(checkpoint) = self.checkpoint.as_mut() {
                let tree = &self.tree;
                checkpoint.tick(self.mesh, || tree.iter().collect())?;
            }

            let Some((v, cost)) = self.select(tolerance) else {
                break;
            };
            self.tree.remove(v);
            match self.strategy.process(self.mesh, v, cost) {
                Some(touched) => {
                    self.stats.processed += 1;
                    for w in touched {
                        if self.mesh.is_vertex_alive(w) {
                            self.evaluate(w, tolerance);
                        } else {
                            self.tree.remove(w);
                        }
                    }
                    if self.progress_every > 0 && self.stats.processed % self.progress_every == 0 {
                        info!(
                            processed = self.stats.processed,
                            queued = self.tree.len(),
                            "Progress"
                        );
                        self.progress
                            .report(self.stats.processed, self.tree.len(), name);
                    }
                }
                None => {
                    trace!(?v, cost, "Vertex not processed");
                    self.stats.not_processed += 1;
                }
            }
        }

        let stats = self.stats;
        self.strategy.post_process(self.mesh, &stats);
        info!(
            strategy = name,
            processed = stats.processed,
            not_processed = stats.not_processed,
            interrupted = stats.interrupted,
            "Finished"
        );
        Ok(stats)
    }

    /// First vertex below tolerance accepted by the strategy. The ones
    /// scanned before it are penalized.
    fn select(&mut self, tolerance: f64) -> Option<(VertexId, f64)> {
        let mut rejected: Vec<(VertexId, f64)> = Vec::new();
        let mut chosen = None;
        for (v, cost) in self.tree.iter() {
            if cost > tolerance {
                break;
            }
            if self.strategy.can_process(self.mesh, v) {
                chosen = Some((v, cost));
                break;
            }
            self.stats.not_processed += 1;
            let penalized = if tolerance == 0.0 && cost == 0.0 {
                1.0
            } else {
                cost + PENALTY_FACTOR * (tolerance - cost)
            };
            rejected.push((v, penalized));
        }
        for (v, cost) in rejected {
            self.tree.update(v, cost);
        }
        chosen
    }

    fn evaluate(&mut self, v: VertexId, tolerance: f64) {
        let cost = self.strategy.cost(self.mesh, v);
        if cost <= tolerance {
            self.tree.update(v, cost);
        } else {
            self.tree.remove(v);
        }
    }
}
