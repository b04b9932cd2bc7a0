//! Frame snapshots as binary PPM (`P6`) files.
//!
//! PPM is RGB888 with a three-line text header, so a `DisplayFrame`
//! is written out unchanged.

use std::io;
use std::path::{Path, PathBuf};

use telecam_core::DisplayFrame;
use tracing::debug;

/// Encode `frame` as a PPM image.
pub fn encode_ppm(frame: &DisplayFrame) -> Vec<u8> {
    let header = format!("P6\n{} {}\n255\n", frame.width(), frame.height());
    let mut out = Vec::with_capacity(header.len() + frame.data.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&frame.data);
    out
}

/// Writes every Nth frame it is offered into a directory.
pub struct SnapshotWriter {
    dir: PathBuf,
    every: u64,
    offered: u64,
    written: u64,
}

impl SnapshotWriter {
    /// Returns `None` when snapshots are disabled (empty `dir` or
    /// `every == 0`).
    pub fn new(dir: impl AsRef<Path>, every: u64) -> Option<Self> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() || every == 0 {
            return None;
        }
        Some(Self {
            dir: dir.to_path_buf(),
            every,
            offered: 0,
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Write `frame` if it is due. Returns the path written, if any.
    pub async fn offer(&mut self, frame: &DisplayFrame) -> io::Result<Option<PathBuf>> {
        self.offered += 1;
        if (self.offered - 1) % self.every != 0 {
            return Ok(None);
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("frame-{:06}.ppm", frame.sequence));
        tokio::fs::write(&path, encode_ppm(frame)).await?;
        self.written += 1;
        debug!(path = %path.display(), "snapshot written");
        Ok(Some(path))
    }
}
