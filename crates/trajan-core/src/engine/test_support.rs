use crate::core::io::traits::{FrameLoader, LoadError};
use crate::core::models::atom::Atom;
use crate::core::models::frame::Frame;
use crate::core::models::stream::{FrameFormat, Stream, StreamFlags};
use nalgebra::Point3;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Serves frames from memory, keyed by path. Unknown paths fail to load.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    frames: Mutex<HashMap<PathBuf, Frame>>,
    loads: AtomicUsize,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, frame: Frame) {
        self.frames.lock().unwrap().insert(PathBuf::from(path), frame);
    }

    pub fn remove(&self, path: &str) {
        self.frames.lock().unwrap().remove(Path::new(path));
    }

    /// Number of successful and failed `load` calls so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl FrameLoader for MemoryLoader {
    fn load(
        &self,
        _worker: usize,
        _format: FrameFormat,
        path: &Path,
        _flags: StreamFlags,
    ) -> Result<Frame, LoadError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.frames
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_path_buf()))
    }
}

/// A backbone-only frame: one CA atom per residue at each position.
pub fn ca_frame(positions: &[Point3<f64>]) -> Frame {
    let atoms = (0..positions.len())
        .map(|i| Atom::new(i as u32 + 1, "CA", "ALA", i as i32 + 1, 'A'))
        .collect();
    Frame::new(atoms, positions.to_vec())
}

/// Registers `frames` under `f0.pdb`, `f1.pdb`, ... and returns their paths.
pub fn register(loader: &MemoryLoader, prefix: &str, frames: &[Frame]) -> Vec<PathBuf> {
    frames
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            let path = format!("{prefix}{i}.pdb");
            loader.insert(&path, frame.clone());
            PathBuf::from(path)
        })
        .collect()
}

pub fn stream_of(loader: &MemoryLoader, frames: &[Frame]) -> Stream {
    let files = register(loader, "f", frames);
    Stream::new(
        "traj",
        FrameFormat::Pdb,
        StreamFlags::default(),
        files,
        frames[0].clone(),
    )
}

/// A rigid four-atom backbone that is not coplanar, translated and rotated
/// about z by `angle` radians.
pub fn moved_backbone(angle: f64, shift: [f64; 3]) -> Frame {
    let base = [
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
        Point3::new(-1.5, -0.5, 0.5),
        Point3::new(0.3, 0.2, 1.7),
    ];
    let (s, c) = angle.sin_cos();
    let moved: Vec<_> = base
        .iter()
        .map(|p| Point3::new(c * p.x - s * p.y + shift[0], s * p.x + c * p.y + shift[1], p.z + shift[2]))
        .collect();
    ca_frame(&moved)
}
