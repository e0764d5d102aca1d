//! Mesh fixtures shared by the integration tests.

#![allow(dead_code)]

use nalgebra::Point3;
use whittle::prelude::*;

/// Triangles of a strip of `rows` rows, three vertices wide. Vertex
/// `3 * i + k` sits at `(k - 1, i, 0)`; every row is cut into four
/// triangles around its middle column.
fn shell_faces(rows: usize, index: impl Fn(usize) -> usize) -> Vec<[usize; 3]> {
    let mut faces = Vec::with_capacity(4 * rows);
    for i in 0..rows {
        let b = 3 * i;
        faces.push([index(b), index(b + 1), index(b + 3)]);
        faces.push([index(b + 1), index(b + 4), index(b + 3)]);
        faces.push([index(b + 5), index(b + 4), index(b + 1)]);
        faces.push([index(b + 1), index(b + 2), index(b + 5)]);
    }
    faces
}

fn shell_vertices(rows: usize) -> Vec<Point3<f64>> {
    let mut vertices = Vec::with_capacity(3 * (rows + 1));
    for i in 0..=rows {
        for k in 0..3 {
            vertices.push(Point3::new(k as f64 - 1.0, i as f64, 0.0));
        }
    }
    vertices
}

/// Flat strip of `4 * rows` triangles in the plane `z = 0`.
pub fn create_shell(rows: usize) -> Mesh {
    build_from_triangles(&shell_vertices(rows), &shell_faces(rows, |i| i)).unwrap()
}

/// Two strips crossing along their middle column, the second one rotated
/// by a quarter turn around the y axis. Edges of the middle column are
/// shared by four triangles.
pub fn create_cross(rows: usize) -> Mesh {
    let mut vertices = shell_vertices(rows);
    let original = vertices.len();
    let mut rotated = vec![0; original];
    for i in 0..original {
        if i % 3 == 1 {
            rotated[i] = i;
        } else {
            let p = vertices[i];
            rotated[i] = vertices.len();
            vertices.push(Point3::new(-p.z, p.y, p.x));
        }
    }
    let mut faces = shell_faces(rows, |i| i);
    faces.extend(shell_faces(rows, |i| rotated[i]));
    build_from_triangles(&vertices, &faces).unwrap()
}

/// Regular `n` by `n` grid with unit spacing, two triangles per cell.
pub fn create_grid_mesh(n: usize) -> Mesh {
    create_height_field(n, |_, _| 0.0)
}

/// Grid whose vertex `(i, j)` is lifted to `height(x, y)`.
pub fn create_height_field(n: usize, height: impl Fn(f64, f64) -> f64) -> Mesh {
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    let mut faces = Vec::with_capacity(n * n * 2);

    for j in 0..=n {
        for i in 0..=n {
            let (x, y) = (i as f64, j as f64);
            vertices.push(Point3::new(x, y, height(x, y)));
        }
    }

    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;

            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }

    build_from_triangles(&vertices, &faces).unwrap()
}

/// Sum of the lengths of the free edges.
pub fn boundary_length(mesh: &Mesh) -> f64 {
    mesh.edge_ids()
        .filter(|&e| mesh.is_boundary_edge(e))
        .map(|e| mesh.edge_length(e))
        .sum()
}

/// Whether a live vertex sits at `p`.
pub fn has_vertex_at(mesh: &Mesh, p: Point3<f64>) -> bool {
    mesh.vertex_ids()
        .filter(|&v| !mesh.vertex_triangles(v).is_empty())
        .any(|v| (mesh.position(v) - p).norm() < 1e-9)
}
