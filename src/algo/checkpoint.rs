//! Periodic snapshots of a running engine.
//!
//! A [`Checkpoint`] is called before every main-loop iteration and fires
//! every `n` iterations with the mesh and the queued candidates, which helps
//! when inspecting a run that goes astray.

use std::fmt::Debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::mesh::Mesh;

type Sink<K> = Box<dyn FnMut(&Mesh, &[(K, f64)]) -> Result<()>>;

/// Callback fired every `every` engine iterations.
pub struct Checkpoint<K> {
    every: usize,
    ticks: usize,
    sink: Sink<K>,
}

impl<K: Copy + Debug + 'static> Checkpoint<K> {
    /// Fire `sink` every `every` iterations. `every == 0` disables it.
    pub fn new<F>(every: usize, sink: F) -> Self
    where
        F: FnMut(&Mesh, &[(K, f64)]) -> Result<()> + 'static,
    {
        Self {
            every,
            ticks: 0,
            sink: Box::new(sink),
        }
    }

    /// Overwrite a plain-text snapshot at `path` every `every` iterations.
    ///
    /// See [`write_snapshot`] for the format.
    pub fn to_path(path: impl Into<PathBuf>, every: usize) -> Self {
        let path = path.into();
        Self::new(every, move |mesh, queue| {
            debug!(path = %path.display(), queued = queue.len(), "Writing checkpoint");
            save_snapshot(&path, mesh, queue)
        })
    }

    /// Count one iteration, and fire when due.
    pub(crate) fn tick<F>(&mut self, mesh: &Mesh, queue: F) -> Result<()>
    where
        F: FnOnce() -> Vec<(K, f64)>,
    {
        if self.every == 0 {
            return Ok(());
        }
        self.ticks += 1;
        if self.ticks % self.every != 0 {
            return Ok(());
        }
        let entries = queue();
        (self.sink)(mesh, &entries)
    }
}

impl<K> Debug for Checkpoint<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkpoint")
            .field("every", &self.every)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

fn save_snapshot<K: Debug>(path: &Path, mesh: &Mesh, queue: &[(K, f64)]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_snapshot(&mut writer, mesh, queue)?;
    writer.flush()?;
    Ok(())
}

/// Write a snapshot of `mesh` and `queue`.
///
/// ```text
/// vertices <n>
/// v <x> <y> <z>
/// triangles <m>
/// f <i> <j> <k>          (0-based, into the vertex list above)
/// queue <k>
/// q <key> <cost>
/// ```
pub fn write_snapshot<W: Write, K: Debug>(
    writer: &mut W,
    mesh: &Mesh,
    queue: &[(K, f64)],
) -> Result<()> {
    let (positions, triangles) = mesh.to_triangles();
    writeln!(writer, "vertices {}", positions.len())?;
    for p in &positions {
        writeln!(writer, "v {} {} {}", p.x, p.y, p.z)?;
    }
    writeln!(writer, "triangles {}", triangles.len())?;
    for [a, b, c] in &triangles {
        writeln!(writer, "f {} {} {}", a, b, c)?;
    }
    writeln!(writer, "queue {}", queue.len())?;
    for (key, cost) in queue {
        writeln!(writer, "q {:?} {}", key, cost)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{build_from_triangles, HalfEdgeId};
    use nalgebra::Point3;
    use std::cell::Cell;
    use std::rc::Rc;

    fn triangle() -> Mesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        build_from_triangles(&vertices, &[[0, 1, 2]]).unwrap()
    }

    #[test]
    fn test_snapshot_format() {
        let mesh = triangle();
        let mut out = Vec::new();
        write_snapshot(&mut out, &mesh, &[(HalfEdgeId::new(1), 0.5)]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "vertices 3");
        assert_eq!(lines[1], "v 0 0 0");
        assert_eq!(lines[4], "triangles 1");
        assert_eq!(lines[5], "f 0 1 2");
        assert_eq!(lines[6], "queue 1");
        assert_eq!(lines[7], "q H(1) 0.5");
    }

    #[test]
    fn test_fires_every_n_ticks() {
        let mesh = triangle();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let mut checkpoint = Checkpoint::<HalfEdgeId>::new(3, move |_, _| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        for _ in 0..7 {
            checkpoint.tick(&mesh, Vec::new).unwrap();
        }
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn test_disabled() {
        let mesh = triangle();
        let mut checkpoint = Checkpoint::<HalfEdgeId>::new(0, |_, _| unreachable!());
        checkpoint.tick(&mesh, Vec::new).unwrap();
    }
}
