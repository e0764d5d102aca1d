//! Benchmarks for mesh construction and decimation.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use nalgebra::Point3;
use whittle::prelude::*;

fn grid(n: usize, height: impl Fn(f64, f64) -> f64) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
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

    (vertices, faces)
}

fn wavy(x: f64, y: f64) -> f64 {
    0.3 * (x * 0.4).sin() * (y * 0.3).cos()
}

fn bench_mesh_construction(c: &mut Criterion) {
    let (vertices, faces) = grid(50, wavy);

    c.bench_function("build_grid_50x50", |b| {
        b.iter(|| build_from_triangles(&vertices, &faces).unwrap());
    });
}

fn bench_decimation(c: &mut Criterion) {
    let (vertices, faces) = grid(40, wavy);

    c.bench_function("qem_grid_40x40_to_500", |b| {
        let options = QemOptions::default().with_max_triangles(500);
        b.iter_batched(
            || build_from_triangles(&vertices, &faces).unwrap(),
            |mut mesh| decimate_qem(&mut mesh, &options).unwrap(),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("length_grid_40x40", |b| {
        let options = LengthOptions::default().with_size(1.2);
        b.iter_batched(
            || build_from_triangles(&vertices, &faces).unwrap(),
            |mut mesh| decimate_length(&mut mesh, &options).unwrap(),
            BatchSize::SmallInput,
        );
    });
}

fn bench_refinement(c: &mut Criterion) {
    let (vertices, faces) = grid(20, wavy);

    c.bench_function("split_grid_20x20_to_3000", |b| {
        let options = SplitOptions::default().with_max_triangles(3000);
        b.iter_batched(
            || build_from_triangles(&vertices, &faces).unwrap(),
            |mut mesh| split_edges(&mut mesh, &options).unwrap(),
            BatchSize::SmallInput,
        );
    });

    c.bench_function("valence_after_split", |b| {
        let options = ValenceOptions::default();
        b.iter_batched(
            || {
                let mut mesh = build_from_triangles(&vertices, &faces).unwrap();
                split_edges(&mut mesh, &SplitOptions::default().with_max_triangles(3000)).unwrap();
                mesh
            },
            |mut mesh| improve_valence(&mut mesh, &options).unwrap(),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_mesh_construction, bench_decimation, bench_refinement);
criterion_main!(benches);
