//! Priority-driven edge engine.
//!
//! [`EdgeEngine`] owns a [`PriorityTree`] of canonical half-edges and repeats
//! the same cycle until its termination criterion is met:
//!
//! 1. scan candidates by ascending cost and pick the first one the strategy
//!    accepts, giving the rejected ones a penalty so they are retried later
//! 2. drop the edges around the edit region from the tree
//! 3. let the strategy edit the mesh
//! 4. queue the edges around the result again with fresh costs
//! 5. swap the link edges of the resulting vertex while it improves quality
//!
//! What an edit is, what it costs and when it is allowed is decided by a
//! [`HalfEdgeStrategy`]: QEM and length decimation, degenerate triangle
//! removal and edge splitting all run on this engine.
//!
//! # Termination
//!
//! With `nr_final == 0` the engine runs until no queued edge has a cost
//! below `tolerance`. Otherwise it runs until the live triangle count
//! reaches `nr_final`, from above, or from below when `more_triangles` is
//! set. In both modes it stops as soon as a full scan accepts nothing.

use smallvec::{smallvec, SmallVec};
use tracing::{debug, info, trace};

use super::checkpoint::Checkpoint;
use super::progress::Progress;
use super::tree::PriorityTree;
use crate::error::Result;
use crate::mesh::{HalfEdgeId, Mesh, TriangleId, VertexId};

/// Fraction of the remaining headroom added to the cost of a rejected edge.
const PENALTY_FACTOR: f64 = 0.7;

/// Engine settings provided by a strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Largest cost an edge may have to be processed, in tolerance mode.
    pub tolerance: f64,
    /// Target triangle count, 0 for tolerance mode.
    pub nr_final: usize,
    /// Edits add triangles instead of removing them.
    pub more_triangles: bool,
    /// Run the swap pass after each edit.
    pub swap: bool,
    /// Minimum cosine between adjacent normals for a swap.
    pub min_cos: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.0,
            nr_final: 0,
            more_triangles: false,
            swap: true,
            min_cos: 0.95,
        }
    }
}

/// Counters of an engine run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Edits performed.
    pub processed: usize,
    /// Candidates rejected by the strategy.
    pub not_processed: usize,
    /// Swaps performed by the swap pass.
    pub swapped: usize,
    /// Edges dropped around an edit region that were not queued.
    pub not_in_tree: usize,
}

/// Cost, feasibility and edit of an edge-based algorithm.
pub trait HalfEdgeStrategy {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Engine settings. Read once when the run starts.
    fn config(&self) -> EngineConfig;

    /// Prepare per-run state, such as quadrics.
    fn pre_process(&mut self, _mesh: &mut Mesh) {}

    /// Cost of the edge of `e`. Lower costs are processed first.
    fn cost(&self, mesh: &Mesh, e: HalfEdgeId) -> f64;

    /// Whether the edit of `e` is possible right now.
    ///
    /// Called right before [`process`](Self::process) with the same edge, so
    /// a strategy may cache what it computed here.
    fn can_process(&mut self, mesh: &Mesh, e: HalfEdgeId) -> bool;

    /// Vertices whose incident edges are invalidated by the edit of `e`.
    fn edit_region(&self, mesh: &Mesh, e: HalfEdgeId) -> SmallVec<[VertexId; 4]> {
        smallvec![mesh.origin(e), mesh.destination(e)]
    }

    /// Edit the mesh around `e`.
    ///
    /// Returns a half-edge whose origin is the vertex the edit converged to,
    /// or `None` if nothing was changed.
    fn process(&mut self, mesh: &mut Mesh, e: HalfEdgeId) -> Option<HalfEdgeId>;

    /// Report on the run.
    fn post_process(&mut self, _mesh: &Mesh, _stats: &EngineStats) {}
}

/// Generic driver for [`HalfEdgeStrategy`] implementations.
pub struct EdgeEngine<'m, S> {
    mesh: &'m mut Mesh,
    strategy: S,
    tree: PriorityTree<HalfEdgeId>,
    stats: EngineStats,
    progress: Progress,
    progress_every: usize,
    checkpoint: Option<Checkpoint<HalfEdgeId>>,
}

impl<'m, S: HalfEdgeStrategy> EdgeEngine<'m, S> {
    /// Create an engine editing `mesh` with `strategy`.
    pub fn new(mesh: &'m mut Mesh, strategy: S) -> Self {
        Self {
            mesh,
            strategy,
            tree: PriorityTree::new(),
            stats: EngineStats::default(),
            progress: Progress::none(),
            progress_every: 10_000,
            checkpoint: None,
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

    /// Install a checkpoint hook.
    pub fn with_checkpoint(mut self, checkpoint: Checkpoint<HalfEdgeId>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Counters of the last run.
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// The strategy.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Consume the engine and return its strategy.
    pub fn into_strategy(self) -> S {
        self.strategy
    }

    /// Run to completion.
    ///
    /// Stalling before the target is reached is a normal outcome; only a
    /// failing checkpoint hook is an error.
    pub fn compute(&mut self) -> Result<EngineStats> {
        let config = self.strategy.config();
        let name = self.strategy.name();
        info!(
            strategy = name,
            triangles = self.mesh.num_triangles(),
            tolerance = config.tolerance,
            target = config.nr_final,
            "Starting"
        );

        self.stats = EngineStats::default();
        self.strategy.pre_process(self.mesh);
        self.build_tree(&config);
        debug!(queued = self.tree.len(), "Initial tree built");

        while !self.tree.is_empty() && self.needs_more(&config) {
            if let Some(checkpoint) = self.checkpoint.as_mut() {
                let tree = &self.tree;
                checkpoint.tick(self.mesh, || tree.iter().collect())?;
            }

            let Some(edge) = self.select(&config) else {
                debug!(queued = self.tree.len(), "No acceptable edge left");
                break;
            };

            let region = self.strategy.edit_region(self.mesh, edge);
            let mut touched: Vec<TriangleId> = Vec::new();
            for &v in &region {
                touched.extend_from_slice(self.mesh.vertex_triangles(v));
            }
            touched.sort_unstable();
            touched.dedup();
            for &t in &touched {
                self.remove_triangle_edges(t);
            }

            let result = self.strategy.process(self.mesh, edge);
            touched.retain(|&t| self.mesh.is_triangle_alive(t));
            let Some(r) = result else {
                self.stats.not_processed += 1;
                self.add_triangles_edges(&touched, &config);
                self.tree.remove(edge);
                continue;
            };

            self.stats.processed += 1;
            let pivot = self
                .mesh
                .is_halfedge_alive(r)
                .then(|| self.mesh.origin(r));
            if let Some(pivot) = pivot {
                touched.extend_from_slice(self.mesh.vertex_triangles(pivot));
            }
            self.add_triangles_edges(&touched, &config);
            if let (true, Some(pivot)) = (config.swap, pivot) {
                self.swap_pass(pivot, &config);
            }

            if self.progress_every > 0 && self.stats.processed % self.progress_every == 0 {
                info!(
                    processed = self.stats.processed,
                    queued = self.tree.len(),
                    triangles = self.mesh.num_triangles(),
                    "Progress"
                );
                self.progress
                    .report(self.stats.processed, self.tree.len(), name);
            }
        }

        let stats = self.stats;
        self.strategy.post_process(self.mesh, &stats);
        info!(
            strategy = name,
            processed = stats.processed,
            swapped = stats.swapped,
            not_processed = stats.not_processed,
            triangles = self.mesh.num_triangles(),
            "Finished"
        );
        Ok(stats)
    }

    fn needs_more(&self, config: &EngineConfig) -> bool {
        let nr = self.mesh.num_triangles();
        if config.more_triangles {
            config.nr_final == 0 || nr < config.nr_final
        } else {
            nr > config.nr_final
        }
    }

    /// Whether an edge with `cost` belongs in the tree.
    #[inline]
    fn qualifies(config: &EngineConfig, cost: f64) -> bool {
        config.nr_final != 0 || cost <= config.tolerance
    }

    fn penalized(config: &EngineConfig, cost: f64, root: f64) -> f64 {
        if config.nr_final == 0 {
            if config.tolerance == 0.0 && cost == 0.0 {
                1.0
            } else {
                cost + PENALTY_FACTOR * (config.tolerance - cost)
            }
        } else if root == 0.0 {
            cost + 1.0
        } else {
            cost + PENALTY_FACTOR * root.abs()
        }
    }

    fn build_tree(&mut self, config: &EngineConfig) {
        self.tree.clear();
        let mut edges: Vec<HalfEdgeId> = Vec::new();
        for t in self.mesh.triangle_ids() {
            if self.mesh.triangle(t).is_outer() {
                continue;
            }
            for slot in 0..3 {
                edges.push(
                    self.mesh
                        .unique_orientation(HalfEdgeId::from_parts(t, slot)),
                );
            }
        }
        edges.sort_unstable();
        edges.dedup();
        for e in edges {
            let cost = self.strategy.cost(self.mesh, e);
            if Self::qualifies(config, cost) {
                self.tree.insert(e, cost);
            }
        }
    }

    /// Scan for the first acceptable edge and penalize the ones before it.
    fn select(&mut self, config: &EngineConfig) -> Option<HalfEdgeId> {
        let root = self.tree.root_value().unwrap_or(0.0);
        let mut rejected: Vec<(HalfEdgeId, f64)> = Vec::new();
        let mut chosen = None;
        for (e, cost) in self.tree.iter() {
            if config.nr_final == 0 && cost > config.tolerance {
                break;
            }
            if self.strategy.can_process(self.mesh, e) {
                chosen = Some(e);
                break;
            }
            trace!(?e, cost, "Edge not processed");
            self.stats.not_processed += 1;
            rejected.push((e, Self::penalized(config, cost, root)));
        }
        for (e, cost) in rejected {
            self.tree.update(e, cost);
        }
        chosen
    }

    fn remove_triangle_edges(&mut self, t: TriangleId) {
        for slot in 0..3 {
            let e = self
                .mesh
                .unique_orientation(HalfEdgeId::from_parts(t, slot));
            if !self.tree.remove(e) {
                self.stats.not_in_tree += 1;
            }
        }
    }

    fn add_triangles_edges(&mut self, triangles: &[TriangleId], config: &EngineConfig) {
        let mut edges: Vec<HalfEdgeId> = triangles
            .iter()
            .filter(|&&t| self.mesh.is_triangle_alive(t) && !self.mesh.triangle(t).is_outer())
            .flat_map(|&t| (0..3).map(move |slot| HalfEdgeId::from_parts(t, slot)))
            .map(|h| self.mesh.unique_orientation(h))
            .collect();
        edges.sort_unstable();
        edges.dedup();
        for e in edges {
            self.add_edge(e, config);
        }
    }

    fn add_edge(&mut self, e: HalfEdgeId, config: &EngineConfig) {
        let cost = self.strategy.cost(self.mesh, e);
        if Self::qualifies(config, cost) {
            self.tree.update(e, cost);
        } else {
            self.tree.remove(e);
        }
    }

    /// Swap link edges around `pivot` while the swap improves quality.
    fn swap_pass(&mut self, pivot: VertexId, config: &EngineConfig) {
        if !self.mesh.is_vertex_alive(pivot) {
            return;
        }
        let mut budget = 2 * self.mesh.valence(pivot) + 4;
        while budget > 0 {
            let link = self
                .mesh
                .vertex_triangles(pivot)
                .iter()
                .filter_map(|&t| {
                    let slot = self.mesh.triangle(t).slot_of(pivot)?;
                    Some(HalfEdgeId::from_parts(t, (slot + 1) % 3))
                })
                .find(|&h| self.mesh.check_swap_3d(h, config.min_cos) >= 0.0);
            let Some(h) = link else {
                break;
            };
            let Some(sym) = self.mesh.sym(h) else {
                break;
            };
            let pair = [h.triangle(), sym.triangle()];
            for &t in &pair {
                self.remove_triangle_edges(t);
            }
            self.mesh.edge_swap(h);
            self.stats.swapped += 1;
            trace!(?h, ?pivot, "Swapped");
            self.add_triangles_edges(&pair, config);
            budget -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_triangles;
    use nalgebra::Point3;

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
                let v00 = j * (n + 1) + i;
                let v10 = j * (n + 1) + i + 1;
                let v01 = (j + 1) * (n + 1) + i;
                let v11 = (j + 1) * (n + 1) + i + 1;

                faces.push([v00, v10, v11]);
                faces.push([v00, v11, v01]);
            }
        }

        build_from_triangles(&vertices, &faces).unwrap()
    }

    /// Endpoint kept by a collapse: the one on the boundary, if any.
    fn target_of(mesh: &Mesh, e: HalfEdgeId) -> VertexId {
        let o = mesh.origin(e);
        if mesh.is_boundary_vertex(o) {
            o
        } else {
            mesh.destination(e)
        }
    }

    /// Collapses interior edges, shortest first.
    struct ShortestInterior {
        config: EngineConfig,
        seen: Vec<f64>,
    }

    impl HalfEdgeStrategy for ShortestInterior {
        fn name(&self) -> &'static str {
            "shortest-interior"
        }

        fn config(&self) -> EngineConfig {
            self.config
        }

        fn cost(&self, mesh: &Mesh, e: HalfEdgeId) -> f64 {
            if mesh.is_boundary_edge(e) {
                100.0
            } else {
                mesh.edge_length(e)
            }
        }

        fn can_process(&mut self, mesh: &Mesh, e: HalfEdgeId) -> bool {
            let target = target_of(mesh, e);
            mesh.can_collapse_edge(e, mesh.position(target))
        }

        fn process(&mut self, mesh: &mut Mesh, e: HalfEdgeId) -> Option<HalfEdgeId> {
            self.seen.push(mesh.edge_length(e));
            let target = target_of(mesh, e);
            Some(mesh.edge_collapse(e, target))
        }
    }

    /// Never accepts anything.
    struct Stubborn;

    impl HalfEdgeStrategy for Stubborn {
        fn name(&self) -> &'static str {
            "stubborn"
        }

        fn config(&self) -> EngineConfig {
            EngineConfig {
                tolerance: 10.0,
                ..EngineConfig::default()
            }
        }

        fn cost(&self, _mesh: &Mesh, _e: HalfEdgeId) -> f64 {
            1.0
        }

        fn can_process(&mut self, _mesh: &Mesh, _e: HalfEdgeId) -> bool {
            false
        }

        fn process(&mut self, _mesh: &mut Mesh, _e: HalfEdgeId) -> Option<HalfEdgeId> {
            None
        }
    }

    #[test]
    fn test_tolerance_mode() {
        let mut mesh = create_grid_mesh(3);
        let area = mesh.surface_area();
        let strategy = ShortestInterior {
            config: EngineConfig {
                tolerance: 50.0,
                ..EngineConfig::default()
            },
            seen: Vec::new(),
        };
        let mut engine = EdgeEngine::new(&mut mesh, strategy);
        let stats = engine.compute().unwrap();
        assert!(stats.processed >= 1);
        assert!(engine.strategy().seen.iter().all(|&l| l <= 50.0));
        drop(engine);

        assert_eq!(mesh.num_triangles(), 18 - 2 * stats.processed);
        assert!(mesh.is_valid());
        assert!((mesh.surface_area() - area).abs() < 1e-9);
    }

    #[test]
    fn test_target_count_stops() {
        let mut mesh = create_grid_mesh(3);
        let strategy = ShortestInterior {
            config: EngineConfig {
                nr_final: 14,
                swap: false,
                ..EngineConfig::default()
            },
            seen: Vec::new(),
        };
        let stats = EdgeEngine::new(&mut mesh, strategy).compute().unwrap();
        assert_eq!(stats.processed, 2);
        assert_eq!(mesh.num_triangles(), 14);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_stall_is_not_an_error() {
        let mut mesh = create_grid_mesh(2);
        let mut engine = EdgeEngine::new(&mut mesh, Stubborn);
        let stats = engine.compute().unwrap();
        assert_eq!(stats.processed, 0);
        assert_eq!(stats.not_processed, 16);
        drop(engine);
        assert_eq!(mesh.num_triangles(), 8);
    }

    #[test]
    fn test_penalties() {
        let tolerance = EngineConfig {
            tolerance: 1.0,
            ..EngineConfig::default()
        };
        let p = EdgeEngine::<Stubborn>::penalized(&tolerance, 0.0, 0.0);
        assert!((p - 0.7).abs() < 1e-12);

        let zero = EngineConfig::default();
        assert_eq!(EdgeEngine::<Stubborn>::penalized(&zero, 0.0, 0.0), 1.0);

        let target = EngineConfig {
            nr_final: 10,
            ..EngineConfig::default()
        };
        assert_eq!(EdgeEngine::<Stubborn>::penalized(&target, 2.0, 0.0), 3.0);
        let p = EdgeEngine::<Stubborn>::penalized(&target, -4.0, -2.0);
        assert!((p + 2.6).abs() < 1e-12);
    }

    #[test]
    fn test_progress_reports() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut mesh = create_grid_mesh(3);
        let strategy = ShortestInterior {
            config: EngineConfig {
                tolerance: 50.0,
                ..EngineConfig::default()
            },
            seen: Vec::new(),
        };
        let mut engine = EdgeEngine::new(&mut mesh, strategy).with_progress(Progress::new(
            move |_, _, _| {
                counter.fetch_add(1, Ordering::Relaxed);
            },
        ));
        engine.set_progress_bar_status(1);
        let stats = engine.compute().unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), stats.processed);
    }
}
