//! Index types for mesh elements.
//!
//! Vertices and triangles live in arenas and are addressed by small integer
//! handles. Half-edges are not stored on their own: a half-edge is the pair
//! `(triangle, slot)` packed as `triangle * 3 + slot`.

use std::fmt::{self, Debug};

const INVALID: u32 = u32::MAX;

/// A type-safe vertex index.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct VertexId(u32);

/// A type-safe triangle index.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct TriangleId(u32);

/// A type-safe half-edge index, derived from a triangle and a slot in `0..3`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct HalfEdgeId(u32);

macro_rules! impl_index_type {
    ($name:ident, $display:literal) => {
        impl $name {
            /// Create a new index from a raw value.
            #[inline]
            pub fn new(index: usize) -> Self {
                debug_assert!(index < INVALID as usize, "index {} too large", index);
                Self(index as u32)
            }

            /// Create an invalid/null index.
            #[inline]
            pub fn invalid() -> Self {
                Self(INVALID)
            }

            /// Get the raw index value.
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// Check if this is a valid (non-null) index.
            #[inline]
            pub fn is_valid(self) -> bool {
                self.0 != INVALID
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", $display, self.index())
                } else {
                    write!(f, "{}(INVALID)", $display)
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::invalid()
            }
        }

        impl From<usize> for $name {
            fn from(index: usize) -> Self {
                Self::new(index)
            }
        }
    };
}

impl_index_type!(VertexId, "V");
impl_index_type!(TriangleId, "T");
impl_index_type!(HalfEdgeId, "H");

impl HalfEdgeId {
    /// The half-edge in `slot` of triangle `t`.
    #[inline]
    pub fn from_parts(t: TriangleId, slot: usize) -> Self {
        debug_assert!(slot < 3);
        Self::new(t.index() * 3 + slot)
    }

    /// Triangle owning this half-edge.
    #[inline]
    pub fn triangle(self) -> TriangleId {
        TriangleId::new(self.index() / 3)
    }

    /// Slot of this half-edge inside its triangle.
    #[inline]
    pub fn slot(self) -> usize {
        self.index() % 3
    }

    /// Next half-edge in the same triangle.
    #[inline]
    pub fn next(self) -> Self {
        Self::from_parts(self.triangle(), (self.slot() + 1) % 3)
    }

    /// Previous half-edge in the same triangle.
    #[inline]
    pub fn prev(self) -> Self {
        Self::from_parts(self.triangle(), (self.slot() + 2) % 3)
    }
}
