//! Arena half-edge mesh.
//!
//! Triangles and vertices are stored in arenas and addressed by
//! [`TriangleId`] and [`VertexId`]. A half-edge is not an object of its own:
//! [`HalfEdgeId`] packs `(triangle, slot)`, and slot `i` of triangle
//! `[v0, v1, v2]` is the directed edge `v[i] -> v[i + 1]` whose apex is
//! `v[i + 2]`.
//!
//! # Adjacency
//!
//! Every half-edge carries an [`Adjacency`]: no twin on a free boundary, a
//! single twin with opposite orientation, or the whole fan of half-edges when
//! more than two triangles share the edge. Each vertex keeps the list of its
//! incident triangles, which is enough to rebuild the adjacency of any edge
//! locally after an edit.
//!
//! # Lifecycle
//!
//! Slots are never reused. Removing a triangle marks it dead and a vertex
//! that loses all its triangles during a collapse is unlinked, so handles held
//! by an algorithm never silently point to a different element.

use nalgebra::{Point3, Vector3};
use smallvec::SmallVec;
use tracing::debug;

use super::attributes::{Adjacency, EdgeFlags, TriangleFlags, VertexFlags};
use super::index::{HalfEdgeId, TriangleId, VertexId};
use crate::error::{MeshError, Result};

/// Relative threshold under which a triangle is considered degenerate.
pub(crate) const DEGENERATE_RATIO: f64 = 1e-12;

/// A vertex of the mesh.
#[derive(Debug, Clone)]
pub struct Vertex {
    /// The 3D position of this vertex.
    pub position: Point3<f64>,

    /// Boundary or feature group id, 0 for interior vertices.
    pub reference: i32,

    /// Mutability and access attributes.
    pub flags: VertexFlags,

    /// Incident live triangles.
    pub(crate) triangles: Vec<TriangleId>,

    pub(crate) alive: bool,
}

impl Vertex {
    /// Create a new vertex at the given position.
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            reference: 0,
            flags: VertexFlags::default(),
            triangles: Vec::new(),
            alive: true,
        }
    }

    /// Whether the vertex may be moved or merged.
    #[inline]
    pub fn is_mutable(&self) -> bool {
        self.flags.contains(VertexFlags::MUTABLE)
    }

    /// Whether the neighbourhood of the vertex is known.
    #[inline]
    pub fn is_readable(&self) -> bool {
        self.flags.contains(VertexFlags::READABLE)
    }

    /// Whether the neighbourhood of the vertex may be modified.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.flags.contains(VertexFlags::WRITABLE)
    }

    /// Incident live triangles.
    #[inline]
    pub fn triangles(&self) -> &[TriangleId] {
        &self.triangles
    }
}

/// A triangle of the mesh.
#[derive(Debug, Clone)]
pub struct Triangle {
    /// The three vertices, in counter-clockwise order.
    pub vertices: [VertexId; 3],

    /// Group (material or surface patch) this triangle belongs to.
    pub group: i32,

    /// Triangle attributes.
    pub flags: TriangleFlags,

    pub(crate) adjacency: [Adjacency; 3],
    pub(crate) edge_flags: [EdgeFlags; 3],
    pub(crate) alive: bool,
}

impl Triangle {
    fn new(vertices: [VertexId; 3], group: i32) -> Self {
        Self {
            vertices,
            group,
            flags: TriangleFlags::WRITABLE,
            adjacency: Default::default(),
            edge_flags: [EdgeFlags::BOUNDARY; 3],
            alive: true,
        }
    }

    /// Whether this is a virtual triangle outside of the domain.
    #[inline]
    pub fn is_outer(&self) -> bool {
        self.flags.contains(TriangleFlags::OUTER)
    }

    /// Whether algorithms may modify this triangle.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.flags.contains(TriangleFlags::WRITABLE)
    }

    /// Slot of `v` in this triangle.
    #[inline]
    pub fn slot_of(&self, v: VertexId) -> Option<usize> {
        self.vertices.iter().position(|&x| x == v)
    }
}

/// A triangle mesh with half-edge adjacency.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) triangles: Vec<Triangle>,
    live_vertices: usize,
    live_triangles: usize,
}

impl Mesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mesh with pre-allocated capacity.
    pub fn with_capacity(num_vertices: usize, num_triangles: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(num_vertices),
            triangles: Vec::with_capacity(num_triangles),
            live_vertices: 0,
            live_triangles: 0,
        }
    }

    // ==================== Accessors ====================

    /// Number of live vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.live_vertices
    }

    /// Number of live triangles, including outer ones.
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.live_triangles
    }

    /// Number of live triangles which are not `OUTER`.
    pub fn num_inner_triangles(&self) -> usize {
        self.triangle_ids()
            .filter(|&t| !self.triangle(t).is_outer())
            .count()
    }

    /// Get a vertex by ID.
    #[inline]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.index()]
    }

    /// Get a mutable reference to a vertex.
    #[inline]
    pub fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex {
        &mut self.vertices[id.index()]
    }

    /// Get a triangle by ID.
    #[inline]
    pub fn triangle(&self, id: TriangleId) -> &Triangle {
        &self.triangles[id.index()]
    }

    /// Get a mutable reference to a triangle.
    #[inline]
    pub fn triangle_mut(&mut self, id: TriangleId) -> &mut Triangle {
        &mut self.triangles[id.index()]
    }

    /// Get the position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId) -> &Point3<f64> {
        &self.vertices[v.index()].position
    }

    /// Set the position of a vertex.
    #[inline]
    pub fn set_position(&mut self, v: VertexId, pos: Point3<f64>) {
        self.vertices[v.index()].position = pos;
    }

    /// Whether the vertex handle refers to a linked vertex.
    #[inline]
    pub fn is_vertex_alive(&self, v: VertexId) -> bool {
        v.is_valid() && v.index() < self.vertices.len() && self.vertices[v.index()].alive
    }

    /// Whether the triangle handle refers to a live triangle.
    #[inline]
    pub fn is_triangle_alive(&self, t: TriangleId) -> bool {
        t.is_valid() && t.index() < self.triangles.len() && self.triangles[t.index()].alive
    }

    /// Whether the half-edge belongs to a live triangle.
    #[inline]
    pub fn is_halfedge_alive(&self, e: HalfEdgeId) -> bool {
        e.is_valid() && self.is_triangle_alive(e.triangle())
    }

    // ==================== Iteration ====================

    /// Iterate over live vertex IDs.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.alive)
            .map(|(i, _)| VertexId::new(i))
    }

    /// Iterate over live triangle IDs.
    pub fn triangle_ids(&self) -> impl Iterator<Item = TriangleId> + '_ {
        self.triangles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.alive)
            .map(|(i, _)| TriangleId::new(i))
    }

    /// Iterate over the half-edges of live triangles.
    pub fn halfedge_ids(&self) -> impl Iterator<Item = HalfEdgeId> + '_ {
        self.triangle_ids()
            .flat_map(|t| (0..3).map(move |slot| HalfEdgeId::from_parts(t, slot)))
    }

    /// Iterate over the canonical half-edge of every geometric edge.
    pub fn edge_ids(&self) -> impl Iterator<Item = HalfEdgeId> + '_ {
        self.halfedge_ids()
            .filter(move |&e| self.unique_orientation(e) == e)
    }

    // ==================== Topology Queries ====================

    /// Origin vertex of a half-edge.
    #[inline]
    pub fn origin(&self, e: HalfEdgeId) -> VertexId {
        self.triangles[e.triangle().index()].vertices[e.slot()]
    }

    /// Destination vertex of a half-edge.
    #[inline]
    pub fn destination(&self, e: HalfEdgeId) -> VertexId {
        self.triangles[e.triangle().index()].vertices[(e.slot() + 1) % 3]
    }

    /// Vertex opposite to a half-edge in its triangle.
    #[inline]
    pub fn apex(&self, e: HalfEdgeId) -> VertexId {
        self.triangles[e.triangle().index()].vertices[(e.slot() + 2) % 3]
    }

    /// Adjacency record of a half-edge.
    #[inline]
    pub fn adjacency(&self, e: HalfEdgeId) -> &Adjacency {
        &self.triangles[e.triangle().index()].adjacency[e.slot()]
    }

    /// The twin of a manifold half-edge.
    #[inline]
    pub fn sym(&self, e: HalfEdgeId) -> Option<HalfEdgeId> {
        self.adjacency(e).sym()
    }

    /// Attribute bits of a half-edge.
    #[inline]
    pub fn edge_flags(&self, e: HalfEdgeId) -> EdgeFlags {
        self.triangles[e.triangle().index()].edge_flags[e.slot()]
    }

    /// Whether the half-edge carries any of `flags`.
    #[inline]
    pub fn has_flags(&self, e: HalfEdgeId, flags: EdgeFlags) -> bool {
        self.edge_flags(e).intersects(flags)
    }

    /// Whether the edge lies on a free boundary.
    #[inline]
    pub fn is_boundary_edge(&self, e: HalfEdgeId) -> bool {
        self.has_flags(e, EdgeFlags::BOUNDARY)
    }

    /// Whether the edge is shared by more than two triangles.
    #[inline]
    pub fn is_nonmanifold_edge(&self, e: HalfEdgeId) -> bool {
        self.has_flags(e, EdgeFlags::NONMANIFOLD)
    }

    /// All half-edges sharing the geometric edge of `e`, `e` included.
    ///
    /// This is `[e]` on a boundary, `[e, sym]` on a manifold edge and the
    /// whole fan, sorted by id, on a non-manifold edge.
    pub fn fan(&self, e: HalfEdgeId) -> SmallVec<[HalfEdgeId; 4]> {
        match self.adjacency(e) {
            Adjacency::Boundary => smallvec::smallvec![e],
            Adjacency::Manifold(s) => smallvec::smallvec![e, *s],
            Adjacency::NonManifold(fan) => fan.clone(),
        }
    }

    /// Canonical half-edge of the geometric edge of `e`.
    ///
    /// The smallest id of the fan is chosen, so the result does not depend
    /// on which half-edge is passed in and applying it twice is a no-op.
    pub fn unique_orientation(&self, e: HalfEdgeId) -> HalfEdgeId {
        match self.adjacency(e) {
            Adjacency::Boundary => e,
            Adjacency::Manifold(s) => e.min(*s),
            Adjacency::NonManifold(fan) => fan.iter().copied().min().unwrap_or(e),
        }
    }

    /// Set user attribute bits on every half-edge of the edge of `e`.
    ///
    /// Topology bits are owned by the mesh and are ignored.
    pub fn set_edge_flags(&mut self, e: HalfEdgeId, flags: EdgeFlags) {
        let flags = flags.difference(EdgeFlags::TOPOLOGY);
        for h in self.fan(e) {
            self.triangles[h.triangle().index()].edge_flags[h.slot()].insert(flags);
        }
    }

    /// Clear user attribute bits on every half-edge of the edge of `e`.
    pub fn clear_edge_flags(&mut self, e: HalfEdgeId, flags: EdgeFlags) {
        let flags = flags.difference(EdgeFlags::TOPOLOGY);
        for h in self.fan(e) {
            self.triangles[h.triangle().index()].edge_flags[h.slot()].remove(flags);
        }
    }

    /// Triangles incident to a vertex.
    #[inline]
    pub fn vertex_triangles(&self, v: VertexId) -> &[TriangleId] {
        &self.vertices[v.index()].triangles
    }

    /// Half-edges leaving `v`, one per incident triangle.
    pub fn outgoing(&self, v: VertexId) -> SmallVec<[HalfEdgeId; 8]> {
        self.vertex_triangles(v)
            .iter()
            .filter_map(|&t| {
                self.triangle(t)
                    .slot_of(v)
                    .map(|slot| HalfEdgeId::from_parts(t, slot))
            })
            .collect()
    }

    /// Sorted, de-duplicated neighbours of a vertex.
    pub fn vertex_neighbors(&self, v: VertexId) -> Vec<VertexId> {
        let mut out = Vec::with_capacity(self.vertex_triangles(v).len() + 2);
        for &t in self.vertex_triangles(v) {
            for &x in &self.triangle(t).vertices {
                if x != v {
                    out.push(x);
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Number of distinct neighbours of a vertex.
    pub fn valence(&self, v: VertexId) -> usize {
        self.vertex_neighbors(v).len()
    }

    /// Half-edge going from `a` to `b`, if any.
    pub fn find_halfedge(&self, a: VertexId, b: VertexId) -> Option<HalfEdgeId> {
        self.vertex_triangles(a).iter().find_map(|&t| {
            let tri = self.triangle(t);
            let slot = tri.slot_of(a)?;
            (tri.vertices[(slot + 1) % 3] == b).then(|| HalfEdgeId::from_parts(t, slot))
        })
    }

    /// A half-edge joining `a` and `b` in either direction.
    pub fn find_edge(&self, a: VertexId, b: VertexId) -> Option<HalfEdgeId> {
        self.find_halfedge(a, b).or_else(|| self.find_halfedge(b, a))
    }

    /// Whether any edge incident to `v` carries one of `flags`.
    pub fn vertex_has_edge_flags(&self, v: VertexId, flags: EdgeFlags) -> bool {
        self.vertex_triangles(v).iter().any(|&t| {
            let tri = self.triangle(t);
            match tri.slot_of(v) {
                Some(slot) => {
                    tri.edge_flags[slot].intersects(flags)
                        || tri.edge_flags[(slot + 2) % 3].intersects(flags)
                }
                None => false,
            }
        })
    }

    /// Whether the vertex lies on a free boundary.
    pub fn is_boundary_vertex(&self, v: VertexId) -> bool {
        self.vertex_has_edge_flags(v, EdgeFlags::BOUNDARY)
    }

    /// Whether the vertex is on a boundary, on a non-manifold edge, or is itself
    /// non-manifold.
    pub fn is_border_vertex(&self, v: VertexId) -> bool {
        self.vertex_has_edge_flags(v, EdgeFlags::TOPOLOGY) || !self.is_manifold_vertex(v)
    }

    /// Whether the triangles around `v` form a single fan of manifold edges.
    pub fn is_manifold_vertex(&self, v: VertexId) -> bool {
        let tris = self.vertex_triangles(v);
        if tris.is_empty() {
            return true;
        }
        if self.vertex_has_edge_flags(v, EdgeFlags::NONMANIFOLD) {
            return false;
        }
        let mut seen: SmallVec<[TriangleId; 16]> = SmallVec::new();
        let mut stack: SmallVec<[TriangleId; 16]> = smallvec::smallvec![tris[0]];
        while let Some(t) = stack.pop() {
            if seen.contains(&t) {
                continue;
            }
            seen.push(t);
            let Some(slot) = self.triangle(t).slot_of(v) else {
                continue;
            };
            for h in [
                HalfEdgeId::from_parts(t, slot),
                HalfEdgeId::from_parts(t, (slot + 2) % 3),
            ] {
                if let Some(s) = self.sym(h) {
                    stack.push(s.triangle());
                }
            }
        }
        seen.len() == tris.len()
    }

    /// Outgoing half-edges of an interior manifold vertex, in
    /// counter-clockwise order.
    ///
    /// Returns `None` when the vertex touches a boundary or is not manifold.
    pub fn vertex_ring(&self, v: VertexId) -> Option<Vec<HalfEdgeId>> {
        let tris = self.vertex_triangles(v);
        let first = *tris.first()?;
        let start = HalfEdgeId::from_parts(first, self.triangle(first).slot_of(v)?);
        let mut ring = Vec::with_capacity(tris.len());
        let mut h = start;
        loop {
            ring.push(h);
            // h = v -> a in (v, a, b); the next one is v -> b, twin of b -> v.
            h = self.sym(h.prev())?;
            if h == start {
                break;
            }
            if ring.len() > tris.len() {
                return None;
            }
        }
        (ring.len() == tris.len()).then_some(ring)
    }

    // ==================== Geometry ====================

    /// Positions of the three vertices of a triangle.
    #[inline]
    pub fn triangle_positions(&self, t: TriangleId) -> [Point3<f64>; 3] {
        let [a, b, c] = self.triangle(t).vertices;
        [*self.position(a), *self.position(b), *self.position(c)]
    }

    /// Non-normalized normal of a triangle; its norm is twice the area.
    pub fn triangle_normal(&self, t: TriangleId) -> Vector3<f64> {
        let [p0, p1, p2] = self.triangle_positions(t);
        (p1 - p0).cross(&(p2 - p0))
    }

    /// Unit normal of a triangle, `None` when it is degenerate.
    pub fn triangle_unit_normal(&self, t: TriangleId) -> Option<Vector3<f64>> {
        self.triangle_normal(t).try_normalize(1e-20)
    }

    /// Area of a triangle.
    pub fn triangle_area(&self, t: TriangleId) -> f64 {
        0.5 * self.triangle_normal(t).norm()
    }

    /// Area-weighted normal of a vertex, zero if all incident triangles are
    /// degenerate.
    pub fn vertex_normal(&self, v: VertexId) -> Vector3<f64> {
        let sum: Vector3<f64> = self
            .vertex_triangles(v)
            .iter()
            .map(|&t| self.triangle_normal(t))
            .sum();
        sum.try_normalize(1e-20).unwrap_or_else(Vector3::zeros)
    }

    /// Vector from origin to destination.
    #[inline]
    pub fn edge_vector(&self, e: HalfEdgeId) -> Vector3<f64> {
        self.position(self.destination(e)) - self.position(self.origin(e))
    }

    /// Length of a half-edge.
    #[inline]
    pub fn edge_length(&self, e: HalfEdgeId) -> f64 {
        self.edge_vector(e).norm()
    }

    /// Squared length of a half-edge.
    #[inline]
    pub fn edge_length_squared(&self, e: HalfEdgeId) -> f64 {
        self.edge_vector(e).norm_squared()
    }

    /// Midpoint of a half-edge.
    pub fn edge_midpoint(&self, e: HalfEdgeId) -> Point3<f64> {
        let p0 = self.position(self.origin(e));
        let p1 = self.position(self.destination(e));
        Point3::from((p0.coords + p1.coords) * 0.5)
    }

    /// Total area of the live triangles.
    pub fn surface_area(&self) -> f64 {
        self.triangle_ids().map(|t| self.triangle_area(t)).sum()
    }

    // ==================== Construction ====================

    /// Create an unlinked vertex.
    pub fn create_vertex(&mut self, position: Point3<f64>) -> VertexId {
        let id = VertexId::new(self.vertices.len());
        self.vertices.push(Vertex::new(position));
        self.live_vertices += 1;
        id
    }

    /// Add a triangle and update incidence lists, without linking its edges.
    pub(crate) fn push_triangle(&mut self, vertices: [VertexId; 3], group: i32) -> TriangleId {
        let t = TriangleId::new(self.triangles.len());
        self.triangles.push(Triangle::new(vertices, group));
        self.live_triangles += 1;
        for v in vertices {
            self.vertices[v.index()].triangles.push(t);
        }
        t
    }

    /// Add a triangle and link its three edges.
    pub(crate) fn add_triangle(&mut self, vertices: [VertexId; 3], group: i32) -> TriangleId {
        let t = self.push_triangle(vertices, group);
        for slot in 0..3 {
            self.relink_edge(vertices[slot], vertices[(slot + 1) % 3]);
        }
        t
    }

    /// Remove a triangle and relink the edges it leaves behind.
    pub(crate) fn remove_triangle(&mut self, t: TriangleId) {
        let vertices = self.triangles[t.index()].vertices;
        self.triangles[t.index()].alive = false;
        self.live_triangles -= 1;
        for v in vertices {
            self.vertices[v.index()].triangles.retain(|&x| x != t);
        }
        for slot in 0..3 {
            self.relink_edge(vertices[slot], vertices[(slot + 1) % 3]);
        }
    }

    /// Replace the vertices of a live triangle, keeping incidence lists in
    /// sync. Adjacency is not updated, callers relink the affected edges.
    pub(crate) fn set_triangle_vertices(&mut self, t: TriangleId, vertices: [VertexId; 3]) {
        let old = self.triangles[t.index()].vertices;
        for v in old {
            if !vertices.contains(&v) {
                self.vertices[v.index()].triangles.retain(|&x| x != t);
            }
        }
        for v in vertices {
            if !old.contains(&v) {
                self.vertices[v.index()].triangles.push(t);
            }
        }
        self.triangles[t.index()].vertices = vertices;
    }

    /// Unlink a vertex which no longer has incident triangles.
    pub(crate) fn free_vertex(&mut self, v: VertexId) {
        let vertex = &mut self.vertices[v.index()];
        debug_assert!(vertex.triangles.is_empty(), "{:?} is still referenced", v);
        if vertex.alive {
            vertex.alive = false;
            self.live_vertices -= 1;
        }
    }

    /// Recompute adjacency and topology bits of the edge `{a, b}`.
    pub(crate) fn relink_edge(&mut self, a: VertexId, b: VertexId) {
        let mut members: SmallVec<[HalfEdgeId; 4]> = SmallVec::new();
        for &t in &self.vertices[a.index()].triangles {
            let tri = &self.triangles[t.index()];
            for slot in 0..3 {
                let o = tri.vertices[slot];
                let d = tri.vertices[(slot + 1) % 3];
                if (o == a && d == b) || (o == b && d == a) {
                    members.push(HalfEdgeId::from_parts(t, slot));
                }
            }
        }
        if members.is_empty() {
            return;
        }
        members.sort_unstable();
        let shared = members
            .iter()
            .fold(EdgeFlags::empty(), |acc, &h| acc | self.edge_flags(h))
            & EdgeFlags::SHARED;

        let adjacency: SmallVec<[Adjacency; 4]> = match members.len() {
            1 => smallvec::smallvec![Adjacency::Boundary],
            2 if self.origin(members[0]) == self.destination(members[1]) => smallvec::smallvec![
                Adjacency::Manifold(members[1]),
                Adjacency::Manifold(members[0])
            ],
            _ => members
                .iter()
                .map(|_| Adjacency::NonManifold(members.clone()))
                .collect(),
        };
        for (&h, adj) in members.iter().zip(adjacency) {
            let tri = &mut self.triangles[h.triangle().index()];
            tri.edge_flags[h.slot()] = shared | adj.flags();
            tri.adjacency[h.slot()] = adj;
        }
    }

    /// Relink every edge incident to `v`.
    pub(crate) fn relink_vertex(&mut self, v: VertexId) {
        for n in self.vertex_neighbors(v) {
            self.relink_edge(v, n);
        }
    }

    // ==================== Tagging ====================

    /// Set `flags` on every edge separating two triangles of different groups.
    ///
    /// Returns the number of tagged edges.
    pub fn tag_group_boundaries(&mut self, flags: EdgeFlags) -> usize {
        let edges: Vec<HalfEdgeId> = self
            .edge_ids()
            .filter(|&e| {
                let group = self.triangle(e.triangle()).group;
                self.fan(e)
                    .iter()
                    .any(|h| self.triangle(h.triangle()).group != group)
            })
            .collect();
        for &e in &edges {
            self.set_edge_flags(e, flags);
        }
        debug!(edges = edges.len(), "Tagged group boundaries");
        edges.len()
    }

    /// Flag as `SHARP` every manifold edge whose adjacent unit normals have a
    /// dot product below `min_cos`.
    ///
    /// Returns the number of tagged edges.
    pub fn build_ridges(&mut self, min_cos: f64) -> usize {
        let edges: Vec<HalfEdgeId> = self
            .edge_ids()
            .filter(|&e| {
                let Some(s) = self.sym(e) else {
                    return false;
                };
                match (
                    self.triangle_unit_normal(e.triangle()),
                    self.triangle_unit_normal(s.triangle()),
                ) {
                    (Some(n1), Some(n2)) => n1.dot(&n2) < min_cos,
                    _ => false,
                }
            })
            .collect();
        for &e in &edges {
            self.set_edge_flags(e, EdgeFlags::SHARP);
        }
        debug!(edges = edges.len(), min_cos, "Tagged ridges");
        edges.len()
    }

    /// Give `reference` to every endpoint of an edge carrying one of `flags`
    /// whose reference is still 0.
    ///
    /// Returns the number of updated vertices.
    pub fn mark_feature_vertices(&mut self, flags: EdgeFlags, reference: i32) -> usize {
        let targets: Vec<VertexId> = self
            .vertex_ids()
            .filter(|&v| self.vertex(v).reference == 0 && self.vertex_has_edge_flags(v, flags))
            .collect();
        for &v in &targets {
            self.vertices[v.index()].reference = reference;
        }
        targets.len()
    }

    // ==================== Export ====================

    /// Compact positions and triangle indices of the live mesh.
    pub fn to_triangles(&self) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut positions = Vec::with_capacity(self.live_vertices);
        for v in self.vertex_ids() {
            remap[v.index()] = positions.len();
            positions.push(*self.position(v));
        }
        let faces = self
            .triangle_ids()
            .map(|t| {
                let [a, b, c] = self.triangle(t).vertices;
                [remap[a.index()], remap[b.index()], remap[c.index()]]
            })
            .collect();
        (positions, faces)
    }

    // ==================== Validation ====================

    /// Check that the mesh is valid.
    ///
    /// This verifies:
    /// - Every live triangle has three distinct live vertices and is not degenerate
    /// - Vertex incidence lists match the triangles
    /// - Adjacency and topology bits match a fresh recomputation
    /// - Twins of manifold edges have opposite orientations
    pub fn check_valid(&self) -> Result<()> {
        let fail = |msg: String| Err(MeshError::InvalidState(msg));

        let mut live_vertices = 0;
        for (i, vertex) in self.vertices.iter().enumerate() {
            let v = VertexId::new(i);
            if !vertex.alive {
                if !vertex.triangles.is_empty() {
                    return fail(format!("dead vertex {:?} is referenced", v));
                }
                continue;
            }
            live_vertices += 1;
            for (k, &t) in vertex.triangles.iter().enumerate() {
                if !self.is_triangle_alive(t) {
                    return fail(format!("{:?} links dead triangle {:?}", v, t));
                }
                if self.triangle(t).slot_of(v).is_none() {
                    return fail(format!("{:?} links {:?} which does not use it", v, t));
                }
                if vertex.triangles[..k].contains(&t) {
                    return fail(format!("{:?} links {:?} twice", v, t));
                }
            }
        }
        if live_vertices != self.live_vertices {
            return fail("live vertex count is out of sync".to_string());
        }

        let mut live_triangles = 0;
        for t in self.triangle_ids() {
            live_triangles += 1;
            let tri = self.triangle(t);
            let [a, b, c] = tri.vertices;
            if a == b || b == c || c == a {
                return fail(format!("{:?} has duplicate vertices", t));
            }
            for v in tri.vertices {
                if !self.is_vertex_alive(v) {
                    return fail(format!("{:?} uses dead vertex {:?}", t, v));
                }
                if !self.vertex_triangles(v).contains(&t) {
                    return fail(format!("{:?} is missing from the list of {:?}", t, v));
                }
            }
            let [p0, p1, p2] = self.triangle_positions(t);
            let scale = (p1 - p0)
                .norm_squared()
                .max((p2 - p1).norm_squared())
                .max((p0 - p2).norm_squared());
            if self.triangle_normal(t).norm() <= DEGENERATE_RATIO * 1e-2 * scale {
                return fail(format!("{:?} is degenerate", t));
            }
            for slot in 0..3 {
                let e = HalfEdgeId::from_parts(t, slot);
                if let Err(msg) = self.check_adjacency(e) {
                    return fail(msg);
                }
            }
        }
        if live_triangles != self.live_triangles {
            return fail("live triangle count is out of sync".to_string());
        }
        Ok(())
    }

    /// Whether [`check_valid`](Self::check_valid) succeeds.
    pub fn is_valid(&self) -> bool {
        match self.check_valid() {
            Ok(()) => true,
            Err(err) => {
                debug!(%err, "Mesh validation failed");
                false
            }
        }
    }

    fn check_adjacency(&self, e: HalfEdgeId) -> std::result::Result<(), String> {
        let o = self.origin(e);
        let d = self.destination(e);
        let mut members: SmallVec<[HalfEdgeId; 4]> = SmallVec::new();
        for &t in self.vertex_triangles(o) {
            let tri = self.triangle(t);
            for slot in 0..3 {
                let a = tri.vertices[slot];
                let b = tri.vertices[(slot + 1) % 3];
                if (a == o && b == d) || (a == d && b == o) {
                    members.push(HalfEdgeId::from_parts(t, slot));
                }
            }
        }
        members.sort_unstable();
        let adjacency = self.adjacency(e);
        let ok = match adjacency {
            Adjacency::Boundary => members.as_slice() == [e],
            Adjacency::Manifold(s) => {
                members.len() == 2
                    && members.contains(s)
                    && self.sym(*s) == Some(e)
                    && self.origin(*s) == d
                    && self.destination(*s) == o
            }
            Adjacency::NonManifold(fan) => members.len() > 1 && *fan == members,
        };
        if !ok {
            return Err(format!("{:?} has inconsistent adjacency {:?}", e, adjacency));
        }
        if self.edge_flags(e) & EdgeFlags::TOPOLOGY != adjacency.flags() {
            return Err(format!("{:?} has stale topology flags", e));
        }
        Ok(())
    }
}
