//! Local edits: edge collapse, edge swap and vertex split.
//!
//! Each edit has a predicate that callers are expected to run first. The
//! edits themselves only assert their structural preconditions in debug
//! builds.

use nalgebra::{Point3, Vector3};
use smallvec::SmallVec;
use tracing::trace;

use super::attributes::EdgeFlags;
use super::halfedge::{Mesh, DEGENERATE_RATIO};
use super::index::{HalfEdgeId, TriangleId, VertexId};

/// Reason an edge collapse was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollapseReject {
    /// The half-edge belongs to a dead or outer triangle.
    Outer,
    /// The edge is flagged `IMMUTABLE`.
    Immutable,
    /// The endpoints share a neighbour which is not an apex of the edge.
    LinkCondition,
    /// Both other edges of an incident triangle are boundary or non-manifold.
    BorderWings,
    /// An interior edge joins two vertices lying on borders.
    Pinch,
    /// Two surviving triangles would become identical.
    DuplicateTriangle,
    /// A surviving triangle would flip.
    Inverted,
    /// A surviving triangle would lose its area.
    Degenerate,
}

fn cross(p: &[Point3<f64>; 3]) -> Vector3<f64> {
    (p[1] - p[0]).cross(&(p[2] - p[0]))
}

fn max_length_squared(p: &[Point3<f64>; 3]) -> f64 {
    (p[1] - p[0])
        .norm_squared()
        .max((p[2] - p[1]).norm_squared())
        .max((p[0] - p[2]).norm_squared())
}

fn is_degenerate(p: &[Point3<f64>; 3]) -> bool {
    cross(p).norm() <= DEGENERATE_RATIO * max_length_squared(p)
}

fn perimeter(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    (b - a).norm() + (c - b).norm() + (a - c).norm()
}

fn min_sine_at(apex: &Point3<f64>, p: &Point3<f64>, q: &Point3<f64>) -> f64 {
    let u = p - apex;
    let v = q - apex;
    let denom = u.norm() * v.norm();
    if denom <= 0.0 {
        0.0
    } else {
        u.cross(&v).norm() / denom
    }
}

/// The four vertices around a manifold edge `o -> d`: `a` is the apex of `e`,
/// `n` the apex of its twin.
struct SwapQuad {
    o: Point3<f64>,
    d: Point3<f64>,
    a: Point3<f64>,
    n: Point3<f64>,
}

impl Mesh {
    // ==================== Collapse ====================

    /// Whether `e` can be collapsed with the merged vertex placed at `target`.
    pub fn can_collapse_edge(&self, e: HalfEdgeId, target: &Point3<f64>) -> bool {
        match self.check_collapse(e, target) {
            Ok(()) => true,
            Err(reason) => {
                trace!(?e, ?reason, "Collapse refused");
                false
            }
        }
    }

    /// Check every precondition of [`edge_collapse`](Self::edge_collapse).
    ///
    /// The collapse is refused when it would:
    /// - edit an outer or immutable edge
    /// - merge two vertices sharing a neighbour that is not an apex of the edge
    /// - remove a triangle whose two other edges are both free or non-manifold
    /// - join two border vertices through an interior edge
    /// - make two surviving triangles identical
    /// - flip or flatten a surviving triangle
    pub fn check_collapse(
        &self,
        e: HalfEdgeId,
        target: &Point3<f64>,
    ) -> Result<(), CollapseReject> {
        if !self.is_halfedge_alive(e) || self.triangle(e.triangle()).is_outer() {
            return Err(CollapseReject::Outer);
        }
        if self.has_flags(e, EdgeFlags::IMMUTABLE) {
            return Err(CollapseReject::Immutable);
        }
        let o = self.origin(e);
        let d = self.destination(e);
        let fan = self.fan(e);

        let mut apexes: SmallVec<[VertexId; 4]> = fan.iter().map(|&h| self.apex(h)).collect();
        apexes.sort_unstable();
        apexes.dedup();
        let neighbors_d = self.vertex_neighbors(d);
        let common: SmallVec<[VertexId; 4]> = self
            .vertex_neighbors(o)
            .into_iter()
            .filter(|x| *x != d && neighbors_d.binary_search(x).is_ok())
            .collect();
        if common != apexes {
            return Err(CollapseReject::LinkCondition);
        }

        for &h in &fan {
            if self.has_flags(h.next(), EdgeFlags::TOPOLOGY)
                && self.has_flags(h.prev(), EdgeFlags::TOPOLOGY)
            {
                return Err(CollapseReject::BorderWings);
            }
        }

        if !self.has_flags(e, EdgeFlags::TOPOLOGY)
            && self.is_border_vertex(o)
            && self.is_border_vertex(d)
        {
            return Err(CollapseReject::Pinch);
        }

        let fan_triangles: SmallVec<[TriangleId; 4]> = fan.iter().map(|h| h.triangle()).collect();
        let survivors = |v: VertexId| {
            self.vertex_triangles(v)
                .iter()
                .copied()
                .filter(|t| !fan_triangles.contains(t))
        };
        let image = |t: TriangleId| {
            let mut vs = self.triangle(t).vertices;
            for x in vs.iter_mut() {
                if *x == o || *x == d {
                    *x = VertexId::invalid();
                }
            }
            vs.sort_unstable();
            vs
        };
        for to in survivors(o) {
            let merged = image(to);
            if survivors(d).any(|td| image(td) == merged) {
                return Err(CollapseReject::DuplicateTriangle);
            }
        }

        let ring_normal: Vector3<f64> = self
            .vertex_triangles(o)
            .iter()
            .chain(self.vertex_triangles(d))
            .map(|&t| self.triangle_normal(t))
            .sum();
        for t in survivors(o).chain(survivors(d)) {
            let old = self.triangle_positions(t);
            let mut new = old;
            for (k, &v) in self.triangle(t).vertices.iter().enumerate() {
                if v == o || v == d {
                    new[k] = *target;
                }
            }
            let was_degenerate = is_degenerate(&old);
            if is_degenerate(&new) {
                if !was_degenerate {
                    return Err(CollapseReject::Degenerate);
                }
                continue;
            }
            let reference = if was_degenerate { ring_normal } else { cross(&old) };
            if cross(&new).dot(&reference) <= 0.0 {
                return Err(CollapseReject::Inverted);
            }
        }
        Ok(())
    }

    /// Collapse `e`, merging its endpoints into `target`.
    ///
    /// `target` is either endpoint of `e` or a fresh vertex returned by
    /// [`create_vertex`](Self::create_vertex). All triangles of the fan of
    /// `e` are removed, and endpoints other than `target` are unlinked.
    ///
    /// Returns a half-edge leaving `target` whose apex is the former apex of
    /// `e`, or any half-edge leaving `target` when that triangle is gone.
    pub fn edge_collapse(&mut self, e: HalfEdgeId, target: VertexId) -> HalfEdgeId {
        let o = self.origin(e);
        let d = self.destination(e);
        let a = self.apex(e);
        debug_assert!(!self.has_flags(e, EdgeFlags::IMMUTABLE));
        debug_assert!(target == o || target == d || self.vertex_triangles(target).is_empty());

        for h in self.fan(e) {
            self.remove_triangle(h.triangle());
        }
        for v in [o, d] {
            if v == target {
                continue;
            }
            let moved = std::mem::take(&mut self.vertices[v.index()].triangles);
            for &t in &moved {
                for x in self.triangles[t.index()].vertices.iter_mut() {
                    if *x == v {
                        *x = target;
                    }
                }
            }
            self.vertices[target.index()].triangles.extend(moved);
            self.free_vertex(v);
        }
        self.relink_vertex(target);

        let outgoing = self.outgoing(target);
        outgoing
            .iter()
            .copied()
            .find(|&h| self.apex(h) == a)
            .or_else(|| outgoing.first().copied())
            .unwrap_or_else(HalfEdgeId::invalid)
    }

    // ==================== Swap ====================

    fn swap_quad(&self, e: HalfEdgeId, forbidden: EdgeFlags) -> Option<SwapQuad> {
        if !self.is_halfedge_alive(e) || self.has_flags(e, forbidden) {
            return None;
        }
        let sym = self.sym(e)?;
        for t in [e.triangle(), sym.triangle()] {
            let tri = self.triangle(t);
            if tri.is_outer() || !tri.is_writable() {
                return None;
            }
        }
        let a = self.apex(e);
        let n = self.apex(sym);
        if a == n || self.find_edge(a, n).is_some() {
            return None;
        }
        Some(SwapQuad {
            o: *self.position(self.origin(e)),
            d: *self.position(self.destination(e)),
            a: *self.position(a),
            n: *self.position(n),
        })
    }

    /// Quality reached by swapping `e`, or `-1.0` when the swap is refused.
    ///
    /// The quality of a triangle is its area divided by its squared
    /// perimeter. The swap is accepted when both triangles keep their
    /// orientation, the dihedral cosine of the current pair is at least
    /// `min_cos`, and the worst quality strictly improves.
    pub fn check_swap_3d(&self, e: HalfEdgeId, min_cos: f64) -> f64 {
        let forbidden = EdgeFlags::TOPOLOGY | EdgeFlags::IMMUTABLE | EdgeFlags::SHARP;
        let Some(q) = self.swap_quad(e, forbidden) else {
            return -1.0;
        };
        let v1 = (q.d - q.o).cross(&(q.a - q.o));
        let v2 = (q.o - q.d).cross(&(q.n - q.d));
        let (Some(n1), Some(n2)) = (v1.try_normalize(1e-20), v2.try_normalize(1e-20)) else {
            return -1.0;
        };
        if n1.dot(&n2) < min_cos {
            return -1.0;
        }
        let s3 = 0.5 * n1.dot(&(q.n - q.o).cross(&(q.a - q.o)));
        let s4 = 0.5 * n1.dot(&(q.a - q.d).cross(&(q.n - q.d)));
        if s3 <= 0.0 || s4 <= 0.0 {
            return -1.0;
        }
        let s1 = 0.5 * v1.norm();
        let s2 = 0.5 * v2.norm();
        let p1 = perimeter(&q.o, &q.d, &q.a);
        let p2 = perimeter(&q.d, &q.o, &q.n);
        let p3 = perimeter(&q.o, &q.n, &q.a);
        let p4 = perimeter(&q.d, &q.a, &q.n);
        let before = (s1 / (p1 * p1)).min(s2 / (p2 * p2));
        let after = (s3 / (p3 * p3)).min(s4 / (p4 * p4));
        if after > before {
            after
        } else {
            -1.0
        }
    }

    /// Quality of the swapped configuration of `e` when both new unit
    /// normals make a cosine of at least `min_cos` with `normal`, else `-1.0`.
    pub fn check_swap_normal(&self, e: HalfEdgeId, min_cos: f64, normal: &Vector3<f64>) -> f64 {
        let forbidden = EdgeFlags::TOPOLOGY | EdgeFlags::IMMUTABLE | EdgeFlags::SHARP;
        let Some(q) = self.swap_quad(e, forbidden) else {
            return -1.0;
        };
        let v3 = (q.n - q.o).cross(&(q.a - q.o));
        let v4 = (q.a - q.d).cross(&(q.n - q.d));
        let (Some(n3), Some(n4)) = (v3.try_normalize(1e-20), v4.try_normalize(1e-20)) else {
            return -1.0;
        };
        if n3.dot(normal) < min_cos || n4.dot(normal) < min_cos {
            return -1.0;
        }
        let p3 = perimeter(&q.o, &q.n, &q.a);
        let p4 = perimeter(&q.d, &q.a, &q.n);
        (0.5 * v3.norm() / (p3 * p3)).min(0.5 * v4.norm() / (p4 * p4))
    }

    /// Flip the diagonal of the two triangles sharing the manifold edge `e`.
    ///
    /// With `e = o -> d` in `(o, d, a)` and its twin in `(d, o, n)`, the
    /// triangles become `(o, n, a)` and `(d, a, n)` and keep their ids. Flags
    /// of the four outer edges follow them.
    ///
    /// Returns the new diagonal `n -> a`, in the triangle that held `e`.
    pub fn edge_swap(&mut self, e: HalfEdgeId) -> HalfEdgeId {
        let Some(sym) = self.sym(e) else {
            debug_assert!(false, "{:?} is not manifold", e);
            return HalfEdgeId::invalid();
        };
        let o = self.origin(e);
        let d = self.destination(e);
        let a = self.apex(e);
        let n = self.apex(sym);
        let user = !EdgeFlags::TOPOLOGY;
        let f_da = self.edge_flags(e.next()) & user;
        let f_ao = self.edge_flags(e.prev()) & user;
        let f_on = self.edge_flags(sym.next()) & user;
        let f_nd = self.edge_flags(sym.prev()) & user;

        let t1 = e.triangle();
        let t2 = sym.triangle();
        {
            let tri = &mut self.triangles[t1.index()];
            tri.vertices = [o, n, a];
            tri.edge_flags = [f_on, EdgeFlags::empty(), f_ao];
        }
        {
            let tri = &mut self.triangles[t2.index()];
            tri.vertices = [d, a, n];
            tri.edge_flags = [f_da, EdgeFlags::empty(), f_nd];
        }
        self.vertices[o.index()].triangles.retain(|&t| t != t2);
        self.vertices[d.index()].triangles.retain(|&t| t != t1);
        self.vertices[a.index()].triangles.push(t2);
        self.vertices[n.index()].triangles.push(t1);

        for (x, y) in [(o, n), (n, a), (a, o), (d, a), (n, d), (o, d)] {
            self.relink_edge(x, y);
        }
        HalfEdgeId::from_parts(t1, 1)
    }

    // ==================== Split ====================

    /// Whether splitting `e` at `position` keeps every new angle at the
    /// inserted vertex and at the apexes above `min_sine`.
    pub fn can_split_edge(&self, e: HalfEdgeId, position: &Point3<f64>, min_sine: f64) -> bool {
        if !self.is_halfedge_alive(e) || self.has_flags(e, EdgeFlags::IMMUTABLE) {
            return false;
        }
        self.fan(e).iter().all(|&h| {
            let x = *self.position(self.origin(h));
            let y = *self.position(self.destination(h));
            let z = *self.position(self.apex(h));
            let v = *position;
            min_sine_at(&v, &z, &x) >= min_sine
                && min_sine_at(&z, &x, &v) >= min_sine
                && min_sine_at(&v, &y, &z) >= min_sine
                && min_sine_at(&z, &v, &y) >= min_sine
        })
    }

    /// Insert the unlinked vertex `v` on the edge of `e`.
    ///
    /// Every triangle `(x, y, z)` of the fan becomes `(x, v, z)` and a new
    /// triangle `(v, y, z)` is added with the same group and flags. The two
    /// halves of the split edge keep its user flags.
    ///
    /// Returns the half-edge `origin(e) -> v`.
    pub fn vertex_split(&mut self, e: HalfEdgeId, v: VertexId) -> HalfEdgeId {
        debug_assert!(self.vertex_triangles(v).is_empty());
        let o = self.origin(e);
        let d = self.destination(e);
        let split_flags = self.edge_flags(e) & EdgeFlags::SHARED;
        let mut result = HalfEdgeId::invalid();
        let mut outer_edges: SmallVec<[(VertexId, VertexId); 4]> = SmallVec::new();

        for h in self.fan(e) {
            let t = h.triangle();
            let slot = h.slot();
            let (vertices, group, flags, edge_flags) = {
                let tri = &self.triangles[t.index()];
                (tri.vertices, tri.group, tri.flags, tri.edge_flags)
            };
            let y = vertices[(slot + 1) % 3];
            let z = vertices[(slot + 2) % 3];

            let mut kept = vertices;
            kept[(slot + 1) % 3] = v;
            self.set_triangle_vertices(t, kept);
            {
                let tri = &mut self.triangles[t.index()];
                tri.edge_flags[slot] = split_flags;
                tri.edge_flags[(slot + 1) % 3] = EdgeFlags::empty();
            }

            let created = self.push_triangle([v, y, z], group);
            let tri = &mut self.triangles[created.index()];
            tri.flags = flags;
            tri.edge_flags = [
                split_flags,
                edge_flags[(slot + 1) % 3] & !EdgeFlags::TOPOLOGY,
                EdgeFlags::empty(),
            ];

            outer_edges.push((y, z));
            if h == e {
                result = HalfEdgeId::from_parts(t, slot);
            }
        }

        self.relink_vertex(v);
        for (y, z) in outer_edges {
            self.relink_edge(y, z);
        }
        self.relink_edge(o, d);
        result
    }
}
