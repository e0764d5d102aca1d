//! Property tests for the mesh and quadric invariants.

mod common;

use common::{create_cross, create_height_field};
use nalgebra::{Point3, Vector3};
use proptest::prelude::*;
use whittle::algo::quadric::Quadric;
use whittle::mesh::HalfEdgeId;

fn plane() -> impl Strategy<Value = (Vector3<f64>, f64, f64)> {
    (
        (-1.0..1.0f64, -1.0..1.0f64, -1.0..1.0f64),
        -5.0..5.0f64,
        0.1..10.0f64,
    )
        .prop_filter_map("zero normal", |((x, y, z), d, w)| {
            Vector3::new(x, y, z)
                .try_normalize(1e-6)
                .map(|n| (n, d, w))
        })
}

fn point() -> impl Strategy<Value = Point3<f64>> {
    (-10.0..10.0f64, -10.0..10.0f64, -10.0..10.0f64).prop_map(|(x, y, z)| Point3::new(x, y, z))
}

proptest! {
    #[test]
    fn quadric_value_is_additive(a in plane(), b in plane(), p in point()) {
        let q1 = Quadric::from_plane(&a.0, a.1, a.2);
        let q2 = Quadric::from_plane(&b.0, b.1, b.2);
        let sum = (q1 + q2).value(&p);
        let expected = q1.value(&p) + q2.value(&p);
        prop_assert!((sum - expected).abs() <= 1e-9 * (1.0 + expected.abs()));
    }

    #[test]
    fn quadric_value_is_squared_distance(a in plane(), p in point()) {
        let q = Quadric::from_plane(&a.0, a.1, 1.0);
        let distance = a.0.dot(&p.coords) + a.1;
        prop_assert!((q.value(&p) - distance * distance).abs() <= 1e-9 * (1.0 + distance * distance));
    }

    #[test]
    fn unique_orientation_is_idempotent(n in 1usize..6, amplitude in 0.0..0.5f64) {
        let mesh = create_height_field(n, |x, y| amplitude * (x * 1.3).sin() * (y * 0.7).cos());
        for e in mesh.halfedge_ids() {
            let u = mesh.unique_orientation(e);
            prop_assert_eq!(mesh.unique_orientation(u), u);
            for h in mesh.fan(e) {
                prop_assert_eq!(mesh.unique_orientation(h), u);
            }
        }
    }

    #[test]
    fn collapse_removes_the_fan(index in 0usize..200) {
        let mut mesh = create_height_field(4, |_, _| 0.0);
        let edges: Vec<HalfEdgeId> = mesh.edge_ids().collect();
        let e = edges[index % edges.len()];
        let target = mesh.edge_midpoint(e);
        prop_assume!(mesh.can_collapse_edge(e, &target));

        let before = mesh.num_triangles();
        let removed = mesh.fan(e).len();
        let v = mesh.create_vertex(target);
        mesh.edge_collapse(e, v);

        prop_assert_eq!(mesh.num_triangles(), before - removed);
        prop_assert!(mesh.is_valid());
    }
}

#[test]
fn test_non_manifold_fan_has_one_canonical_edge() {
    let mesh = create_cross(3);
    let mut canonical: Vec<HalfEdgeId> = mesh
        .halfedge_ids()
        .map(|e| mesh.unique_orientation(e))
        .collect();
    canonical.sort_unstable();
    canonical.dedup();
    assert_eq!(canonical.len(), mesh.edge_ids().count());
}

#[test]
fn test_swap_keeps_the_triangle_count() {
    let edges: Vec<HalfEdgeId> = create_height_field(3, |_, _| 0.0).edge_ids().collect();
    let mut swapped = 0;
    for e in edges {
        let mut mesh = create_height_field(3, |_, _| 0.0);
        if mesh.check_swap_normal(e, 0.0, &Vector3::z()) < 0.0 {
            continue;
        }
        let before = mesh.num_triangles();
        mesh.edge_swap(e);
        swapped += 1;

        assert_eq!(mesh.num_triangles(), before);
        assert!(mesh.is_valid(), "swap of {:?}", e);
    }
    assert!(swapped > 0);
}
