//! Attribute bits and adjacency records attached to mesh elements.

use smallvec::SmallVec;

use super::index::HalfEdgeId;

bitflags::bitflags! {
    /// Attributes of a half-edge.
    ///
    /// `BOUNDARY` and `NONMANIFOLD` mirror the [`Adjacency`] of the half-edge and
    /// are recomputed by the mesh whenever an edit relinks the edge. The other
    /// bits are user attributes and are shared by every half-edge of an edge.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EdgeFlags: u8 {
        /// The edge has no twin.
        const BOUNDARY = 0b0000_0001;
        /// The edge is shared by more than two triangles.
        const NONMANIFOLD = 0b0000_0010;
        /// The edge must never be edited.
        const IMMUTABLE = 0b0000_0100;
        /// Ridge or feature edge.
        const SHARP = 0b0000_1000;
    }
}

impl EdgeFlags {
    /// Bits derived from adjacency.
    pub const TOPOLOGY: EdgeFlags = EdgeFlags::BOUNDARY.union(EdgeFlags::NONMANIFOLD);

    /// Bits shared by all half-edges of a geometric edge.
    pub const SHARED: EdgeFlags = EdgeFlags::IMMUTABLE.union(EdgeFlags::SHARP);

    /// Bits marking an edge along which the surface is not smooth and open.
    pub const FEATURE: EdgeFlags = EdgeFlags::BOUNDARY
        .union(EdgeFlags::NONMANIFOLD)
        .union(EdgeFlags::SHARP)
        .union(EdgeFlags::IMMUTABLE);
}

bitflags::bitflags! {
    /// Attributes of a triangle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TriangleFlags: u8 {
        /// Virtual triangle outside of the domain.
        const OUTER = 0b0000_0001;
        /// Triangle may be modified by algorithms.
        const WRITABLE = 0b0000_0010;
    }
}

bitflags::bitflags! {
    /// Attributes of a vertex.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VertexFlags: u8 {
        /// The vertex may be moved or merged.
        const MUTABLE = 0b0000_0001;
        /// Its neighbourhood is known.
        const READABLE = 0b0000_0010;
        /// Its neighbourhood may be modified.
        const WRITABLE = 0b0000_0100;
    }
}

impl Default for VertexFlags {
    fn default() -> Self {
        VertexFlags::all()
    }
}

/// Twin relation of a half-edge.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Adjacency {
    /// No twin: the edge lies on a free boundary.
    #[default]
    Boundary,
    /// Exactly one twin with opposite orientation.
    Manifold(HalfEdgeId),
    /// All half-edges sharing this edge, including this one, sorted by id.
    NonManifold(SmallVec<[HalfEdgeId; 4]>),
}

impl Adjacency {
    /// The twin, if this edge is manifold.
    #[inline]
    pub fn sym(&self) -> Option<HalfEdgeId> {
        match self {
            Adjacency::Manifold(s) => Some(*s),
            _ => None,
        }
    }

    /// Topology bits corresponding to this adjacency.
    pub fn flags(&self) -> EdgeFlags {
        match self {
            Adjacency::Boundary => EdgeFlags::BOUNDARY,
            Adjacency::Manifold(_) => EdgeFlags::empty(),
            Adjacency::NonManifold(_) => EdgeFlags::NONMANIFOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_groups() {
        assert!(EdgeFlags::TOPOLOGY.contains(EdgeFlags::BOUNDARY));
        assert!(!EdgeFlags::SHARED.intersects(EdgeFlags::TOPOLOGY));
        assert!(EdgeFlags::FEATURE.contains(EdgeFlags::SHARP));
        assert_eq!(VertexFlags::default(), VertexFlags::all());
    }

    #[test]
    fn test_adjacency_flags() {
        let fan: SmallVec<[HalfEdgeId; 4]> =
            [HalfEdgeId::new(0), HalfEdgeId::new(4), HalfEdgeId::new(8)].into_iter().collect();
        assert_eq!(Adjacency::Boundary.flags(), EdgeFlags::BOUNDARY);
        assert_eq!(Adjacency::NonManifold(fan).flags(), EdgeFlags::NONMANIFOLD);
        assert_eq!(Adjacency::Manifold(HalfEdgeId::new(3)).sym(), Some(HalfEdgeId::new(3)));
    }
}
