//! Vertex valence balancing.
//!
//! On a regular triangulation every interior vertex has six neighbours.
//! This strategy runs on the [`VertexEngine`] and pushes valences towards
//! six with three local edits:
//!
//! - a vertex of valence 3 or 4 is collapsed onto its nearest neighbour
//! - a vertex of valence 8 or more gets a new vertex inserted on the edge
//!   to its farthest neighbour, then one of its edges is swapped away
//! - a vertex of valence 6 whose neighbours alternate between valence 7
//!   and 5 loses its three edges to the 7s and is merged into a 5
//!
//! Vertices on free, non-manifold, sharp or immutable edges never move.

use smallvec::SmallVec;
use tracing::{debug, info};

use super::decimate::{validate_coplanarity, DEFAULT_COPLANARITY};
use super::liaison::MeshLiaison;
use super::options::{self, FromOptions};
use super::vertex_engine::{VertexEngine, VertexStats, VertexStrategy};
use crate::error::{MeshError, Result};
use crate::mesh::{EdgeFlags, HalfEdgeId, Mesh, VertexId};

/// Cost of a vertex which is never edited.
const FROZEN: f64 = 100.0;
/// Cost of the alternating 7/5 pattern.
const PATTERN_75: f64 = 7.5;
/// Vertices of valence 5 to 7 cost more than this and are left alone.
const TOLERANCE: f64 = 40.0;

/// Options for [`ValenceBalancing`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValenceOptions {
    /// Minimum cosine between normals. Also the ridge threshold when no
    /// liaison is given.
    pub coplanarity: f64,
    /// Refuse to edit vertices whose triangles deviate from the reference
    /// normal.
    pub check_normals: bool,
    /// Vertices with a smaller valence are left alone.
    pub min_valence: usize,
    /// Vertices with a larger valence are left alone.
    pub max_valence: usize,
    /// Detect and remove the alternating 7/5 pattern.
    pub pattern75: bool,
}

impl Default for ValenceOptions {
    fn default() -> Self {
        Self {
            coplanarity: DEFAULT_COPLANARITY,
            check_normals: true,
            min_valence: 1,
            max_valence: usize::MAX,
            pattern75: true,
        }
    }
}

impl ValenceOptions {
    /// Set the coplanarity threshold.
    pub fn with_coplanarity(mut self, coplanarity: f64) -> Self {
        self.coplanarity = coplanarity;
        self
    }

    /// Enable or disable the normal check.
    pub fn with_check_normals(mut self, check_normals: bool) -> Self {
        self.check_normals = check_normals;
        self
    }

    /// Restrict edits to vertices whose valence lies in `min..=max`.
    pub fn with_valence_range(mut self, min: usize, max: usize) -> Self {
        self.min_valence = min;
        self.max_valence = max;
        self
    }

    /// Enable or disable the 7/5 pattern.
    pub fn with_pattern75(mut self, pattern75: bool) -> Self {
        self.pattern75 = pattern75;
        self
    }
}

impl FromOptions for ValenceOptions {
    fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "coplanarity" => self.coplanarity = options::parse_cosine(key, value)?,
            "checkNormals" => self.check_normals = options::parse_bool(key, value)?,
            "minValence" => self.min_valence = options::parse_usize(key, value)?,
            "maxValence" => self.max_valence = options::parse_usize(key, value)?,
            "pattern75" => self.pattern75 = options::parse_bool(key, value)?,
            _ => return Err(options::unknown(key)),
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        validate_coplanarity(self.coplanarity)?;
        if self.min_valence > self.max_valence {
            return Err(MeshError::invalid_param(
                "min_valence",
                self.min_valence,
                "must not exceed max_valence",
            ));
        }
        Ok(())
    }
}

/// Vertex strategy balancing valences.
pub struct ValenceBalancing {
    options: ValenceOptions,
    min_sine: f64,
    liaison: Option<Box<dyn MeshLiaison>>,
    removed3: usize,
    removed4: usize,
    inserted: usize,
    patterns: usize,
}

/// Whether six valences read around a vertex alternate between 5 and 7.
fn alternates_5_7(valences: &[usize]) -> bool {
    valences.len() == 6
        && valences.iter().all(|&c| c == 5 || c == 7)
        && (0..6).all(|i| valences[i] != valences[(i + 1) % 6])
}

impl ValenceBalancing {
    /// Create the strategy, validating `options`.
    pub fn new(options: ValenceOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            min_sine: 5.0_f64.to_radians().sin(),
            liaison: None,
            removed3: 0,
            removed4: 0,
            inserted: 0,
            patterns: 0,
        })
    }

    /// Use a background surface for normals and projections. Ridges are
    /// then expected to be tagged already.
    pub fn with_liaison(mut self, liaison: Box<dyn MeshLiaison>) -> Self {
        self.liaison = Some(liaison);
        self
    }

    /// The options.
    pub fn options(&self) -> &ValenceOptions {
        &self.options
    }

    /// Vertices removed so far, by their valence (3 and 4).
    pub fn removed(&self) -> (usize, usize) {
        (self.removed3, self.removed4)
    }

    /// Vertices inserted so far.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    fn is_frozen(mesh: &Mesh, v: VertexId) -> bool {
        !mesh.vertex(v).is_mutable() || mesh.vertex_has_edge_flags(v, EdgeFlags::FEATURE)
    }

    /// Whether the triangle counts of the neighbours, read in ring order,
    /// alternate between 5 and 7.
    fn is_pattern75(mesh: &Mesh, ring: &[HalfEdgeId]) -> bool {
        let mut valences: SmallVec<[usize; 6]> = SmallVec::new();
        for &h in ring {
            let n = mesh.destination(h);
            if !mesh.is_manifold_vertex(n) {
                return false;
            }
            valences.push(mesh.vertex_triangles(n).len());
        }
        alternates_5_7(&valences)
    }

    fn reference_normal(&self, mesh: &Mesh, v: VertexId) -> nalgebra::Vector3<f64> {
        self.liaison
            .as_ref()
            .and_then(|l| l.background_normal(v))
            .unwrap_or_else(|| mesh.vertex_normal(v))
    }

    fn normals_agree(&self, mesh: &Mesh, v: VertexId) -> bool {
        let normal = self.reference_normal(mesh, v);
        if normal.norm_squared() == 0.0 {
            return false;
        }
        mesh.vertex_triangles(v).iter().all(|&t| {
            mesh.triangle_unit_normal(t)
                .is_some_and(|n| n.dot(&normal) >= self.options.coplanarity)
        })
    }

    fn remove_from_liaison(&mut self, v: VertexId) {
        if let Some(liaison) = self.liaison.as_mut() {
            liaison.remove_vertex(v);
        }
    }

    /// Collapse `v` onto its nearest neighbour.
    fn remove_low_valence(
        &mut self,
        mesh: &mut Mesh,
        v: VertexId,
        ring: &[HalfEdgeId],
    ) -> Option<Vec<VertexId>> {
        let p = *mesh.position(v);
        let h = ring.iter().copied().min_by(|&a, &b| {
            let da = (mesh.position(mesh.destination(a)) - p).norm_squared();
            let db = (mesh.position(mesh.destination(b)) - p).norm_squared();
            da.total_cmp(&db)
        })?;
        let target = mesh.destination(h);
        if !mesh.can_collapse_edge(h, mesh.position(target)) {
            return None;
        }
        let mut touched: Vec<VertexId> = ring.iter().map(|&e| mesh.destination(e)).collect();
        debug!(?v, valence = ring.len(), ?target, "Remove vertex");
        mesh.edge_collapse(h, target);
        self.remove_from_liaison(v);
        if ring.len() == 3 {
            self.removed3 += 1;
        } else {
            self.removed4 += 1;
        }
        touched.push(v);
        Some(touched)
    }

    /// Insert a vertex towards the farthest neighbour of `v`, then swap an
    /// edge away from `v`. The insertion is undone when no swap is allowed.
    fn split_high_valence(
        &mut self,
        mesh: &mut Mesh,
        v: VertexId,
        ring: &[HalfEdgeId],
    ) -> Option<Vec<VertexId>> {
        let p = *mesh.position(v);
        let h = ring.iter().copied().max_by(|&a, &b| {
            let da = (mesh.position(mesh.destination(a)) - p).norm_squared();
            let db = (mesh.position(mesh.destination(b)) - p).norm_squared();
            da.total_cmp(&db)
        })?;
        let sym = mesh.sym(h)?;
        let d = mesh.destination(h);
        let a = mesh.apex(h);
        let n = mesh.apex(sym);

        let mut position = mesh.edge_midpoint(h);
        if let Some(liaison) = self.liaison.as_mut() {
            if !liaison.move_vertex(v, &mut position) {
                return None;
            }
        }
        if !mesh.can_split_edge(h, &position, self.min_sine) {
            return None;
        }
        let normal = self.reference_normal(mesh, v);

        let w = mesh.create_vertex(position);
        if let Some(liaison) = self.liaison.as_mut() {
            liaison.add_vertex(w, v);
        }
        let r = mesh.vertex_split(h, w);

        let swap = [a, n]
            .into_iter()
            .filter_map(|x| mesh.find_edge(v, x))
            .find(|&e| mesh.check_swap_normal(e, self.options.coplanarity, &normal) >= 0.0);
        let Some(e) = swap else {
            debug!(?v, "No swap after insertion, reverting");
            mesh.edge_collapse(r, v);
            self.remove_from_liaison(w);
            return None;
        };
        let x = mesh.apex(e);
        let y = mesh.sym(e).map(|s| mesh.apex(s));
        mesh.edge_swap(e);
        self.inserted += 1;
        debug!(?v, ?w, valence = ring.len(), "Inserted vertex");

        let mut touched = vec![v, w, d, a, n, x];
        touched.extend(y);
        touched.sort_unstable();
        touched.dedup();
        Some(touched)
    }

    /// Swap the edges from `v` to its valence-7 neighbours, then merge `v`
    /// into a valence-5 neighbour.
    fn remove_pattern75(
        &mut self,
        mesh: &mut Mesh,
        v: VertexId,
        ring: &[HalfEdgeId],
    ) -> Option<Vec<VertexId>> {
        let neighbors: Vec<VertexId> = ring.iter().map(|&h| mesh.destination(h)).collect();
        let mut sevens: SmallVec<[HalfEdgeId; 3]> = SmallVec::new();
        let mut five = None;
        for &h in ring {
            match mesh.vertex_triangles(mesh.destination(h)).len() {
                5 => five = five.or(Some(mesh.destination(h))),
                7 => sevens.push(h),
                _ => return None,
            }
        }
        let five = five?;
        let normal = self.reference_normal(mesh, v);
        if !sevens
            .iter()
            .all(|&h| mesh.check_swap_normal(h, self.options.coplanarity, &normal) >= 0.0)
        {
            return None;
        }

        // Each swap replaces v - n7 by the edge joining its two apexes.
        let mut diagonals: SmallVec<[(VertexId, VertexId); 3]> = SmallVec::new();
        for h in sevens {
            let a = mesh.apex(h);
            let b = mesh.sym(h).map(|s| mesh.apex(s))?;
            mesh.edge_swap(h);
            diagonals.push((a, b));
        }

        let collapse = mesh
            .find_halfedge(v, five)
            .filter(|&e| mesh.can_collapse_edge(e, mesh.position(five)));
        let Some(e) = collapse else {
            debug!(?v, "Pattern 7/5 collapse refused, reverting");
            for (a, b) in diagonals.into_iter().rev() {
                if let Some(d) = mesh.find_edge(a, b) {
                    mesh.edge_swap(d);
                }
            }
            return None;
        };
        mesh.edge_collapse(e, five);
        self.remove_from_liaison(v);
        self.patterns += 1;
        debug!(?v, ?five, "Removed 7/5 pattern");

        let mut touched = neighbors;
        touched.push(v);
        Some(touched)
    }
}

impl std::fmt::Debug for ValenceBalancing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValenceBalancing")
            .field("options", &self.options)
            .field("liaison", &self.liaison.is_some())
            .field("removed3", &self.removed3)
            .field("removed4", &self.removed4)
            .field("inserted", &self.inserted)
            .finish()
    }
}

impl VertexStrategy for ValenceBalancing {
    fn name(&self) -> &'static str {
        "valence"
    }

    fn tolerance(&self) -> f64 {
        TOLERANCE
    }

    fn pre_process(&mut self, mesh: &mut Mesh) {
        if self.liaison.is_none() {
            mesh.build_ridges(self.options.coplanarity);
        }
        self.removed3 = 0;
        self.removed4 = 0;
        self.inserted = 0;
        self.patterns = 0;
    }

    fn cost(&self, mesh: &Mesh, v: VertexId) -> f64 {
        let Some(ring) = mesh.vertex_ring(v) else {
            return FROZEN;
        };
        if Self::is_frozen(mesh, v) {
            return FROZEN;
        }
        let q = ring.len();
        if q == 6 && self.options.pattern75 && Self::is_pattern75(mesh, &ring) {
            return PATTERN_75;
        }
        if q < self.options.min_valence || q > self.options.max_valence {
            return FROZEN;
        }
        if q > 10 {
            return -(q as f64);
        }
        match q {
            0..=2 => FROZEN,
            3 => 4.1,
            4 => 3.1,
            5..=7 => 50.0,
            8 => 2.9,
            9 => 1.9,
            _ => 0.5,
        }
    }

    fn can_process(&mut self, mesh: &Mesh, v: VertexId) -> bool {
        if mesh.vertex_ring(v).is_none() || Self::is_frozen(mesh, v) {
            return false;
        }
        !self.options.check_normals || self.normals_agree(mesh, v)
    }

    fn process(&mut self, mesh: &mut Mesh, v: VertexId, cost: f64) -> Option<Vec<VertexId>> {
        // A penalized cost no longer tells the valence; wait for a fresh one.
        if cost != self.cost(mesh, v) {
            return None;
        }
        let ring = mesh.vertex_ring(v)?;
        if cost == PATTERN_75 {
            self.remove_pattern75(mesh, v, &ring)
        } else if cost > 3.0 && cost < 5.0 {
            self.remove_low_valence(mesh, v, &ring)
        } else if cost < 3.0 {
            self.split_high_valence(mesh, v, &ring)
        } else {
            None
        }
    }

    fn post_process(&mut self, _mesh: &Mesh, stats: &VertexStats) {
        info!(
            removed_valence3 = self.removed3,
            removed_valence4 = self.removed4,
            inserted = self.inserted,
            patterns75 = self.patterns,
            not_processed = stats.not_processed,
            "Valence balancing done"
        );
    }
}

/// Balance the valences of `mesh`.
pub fn improve_valence(mesh: &mut Mesh, options: &ValenceOptions) -> Result<VertexStats> {
    let strategy = ValenceBalancing::new(*options)?;
    VertexEngine::new(mesh, strategy).compute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_from_triangles;
    use nalgebra::Point3;

    /// Center vertex 0 surrounded by `n` rim vertices; vertex 1 sits at
    /// `far` instead of 1.
    fn create_fan(n: usize, far: f64) -> Mesh {
        let mut vertices = vec![Point3::origin()];
        let mut faces = Vec::new();
        for i in 0..n {
            let angle = std::f64::consts::TAU * i as f64 / n as f64;
            let r = if i == 0 { far } else { 1.0 };
            vertices.push(Point3::new(r * angle.cos(), r * angle.sin(), 0.0));
            faces.push([0, 1 + i, 1 + (i + 1) % n]);
        }
        build_from_triangles(&vertices, &faces).unwrap()
    }

    fn strategy() -> ValenceBalancing {
        ValenceBalancing::new(ValenceOptions::default()).unwrap()
    }

    #[test]
    fn test_options() {
        let options = ValenceOptions::from_pairs(&[
            ("coplanarity", "0.8"),
            ("checkNormals", "false"),
            ("minValence", "3"),
            ("maxValence", "12"),
            ("pattern75", "false"),
        ])
        .unwrap();
        assert_eq!(options.coplanarity, 0.8);
        assert!(!options.check_normals);
        assert_eq!((options.min_valence, options.max_valence), (3, 12));
        assert!(!options.pattern75);

        assert!(ValenceOptions::from_pairs(&[("minValence", "8"), ("maxValence", "4")]).is_err());
        assert!(matches!(
            ValenceOptions::from_pairs(&[("rho", "8")]),
            Err(MeshError::UnknownOption { .. })
        ));
    }

    #[test]
    fn test_cost_table() {
        let valence = strategy();
        for (n, expected) in [(3, 4.1), (4, 3.1), (5, 50.0), (8, 2.9), (9, 1.9), (10, 0.5), (12, -12.0)] {
            let mesh = create_fan(n, 1.0);
            assert_eq!(valence.cost(&mesh, VertexId::new(0)), expected, "valence {}", n);
            // Rim vertices are on the boundary.
            assert_eq!(valence.cost(&mesh, VertexId::new(1)), FROZEN);
        }
    }

    #[test]
    fn test_valence_range_freezes() {
        let valence =
            ValenceBalancing::new(ValenceOptions::default().with_valence_range(4, 8)).unwrap();
        let mesh = create_fan(9, 1.0);
        assert_eq!(valence.cost(&mesh, VertexId::new(0)), FROZEN);
    }

    #[test]
    fn test_sharp_vertex_is_frozen() {
        let mut mesh = create_fan(4, 1.0);
        let e = mesh.find_edge(VertexId::new(0), VertexId::new(1)).unwrap();
        mesh.set_edge_flags(e, EdgeFlags::SHARP);
        let mut valence = strategy();
        assert_eq!(valence.cost(&mesh, VertexId::new(0)), FROZEN);
        assert!(!valence.can_process(&mesh, VertexId::new(0)));
    }

    #[test]
    fn test_pattern_detection() {
        assert!(alternates_5_7(&[5, 7, 5, 7, 5, 7]));
        assert!(alternates_5_7(&[7, 5, 7, 5, 7, 5]));
        assert!(!alternates_5_7(&[5, 5, 7, 7, 5, 7]));
        assert!(!alternates_5_7(&[5, 7, 5, 7, 6, 7]));
        assert!(!alternates_5_7(&[5, 7, 5, 7]));
    }

    #[test]
    fn test_valence_3_is_removed() {
        let mut mesh = create_fan(3, 1.0);
        let stats = improve_valence(&mut mesh, &ValenceOptions::default()).unwrap();
        assert_eq!(stats.processed, 1);
        assert_eq!(mesh.num_triangles(), 1);
        assert!(!mesh.is_vertex_alive(VertexId::new(0)));
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_valence_4_collapses_onto_nearest() {
        let vertices = vec![
            Point3::new(0.4, 0.4, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let faces = vec![[0, 1, 2], [0, 2, 3], [0, 3, 4], [0, 4, 1]];
        let mut mesh = build_from_triangles(&vertices, &faces).unwrap();
        let mut engine = VertexEngine::new(&mut mesh, strategy());
        let stats = engine.compute().unwrap();
        assert_eq!(engine.strategy().removed(), (0, 1));
        drop(engine);

        assert_eq!(stats.processed, 1);
        assert_eq!(mesh.num_triangles(), 2);
        assert!(mesh.is_valid());
        assert!(mesh.find_edge(VertexId::new(1), VertexId::new(3)).is_some());
    }

    #[test]
    fn test_high_valence_gets_a_vertex() {
        let mut mesh = create_fan(9, 1.5);
        let area = mesh.surface_area();
        let mut engine = VertexEngine::new(&mut mesh, strategy());
        let stats = engine.compute().unwrap();
        assert!(engine.strategy().inserted() >= 1);
        drop(engine);

        assert!(stats.processed >= 1);
        assert!(mesh.is_valid());
        assert!(mesh.valence(VertexId::new(0)) < 9);
        assert!((mesh.surface_area() - area).abs() < 1e-9);
    }

    #[test]
    fn test_bent_vertex_fails_normal_check() {
        let mut mesh = create_fan(4, 1.0);
        mesh.set_position(VertexId::new(0), Point3::new(0.0, 0.0, 2.0));
        let mut valence = strategy();
        assert!(!valence.can_process(&mesh, VertexId::new(0)));

        let mut lenient =
            ValenceBalancing::new(ValenceOptions::default().with_check_normals(false)).unwrap();
        assert!(lenient.can_process(&mesh, VertexId::new(0)));
    }
}
