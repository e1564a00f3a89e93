// src/video.rs
//
// Frame source collaborator. The pipeline only needs ordered RGB frames
// plus the container properties (fps, total frame count) before any
// geometric or kinematic work starts; codec details stay outside.
//
// The shipped implementation reads a directory of numbered PNG/JPEG
// frames next to a `sequence.yaml` metadata file, which is how exported
// recordings arrive without pulling a video decoder into this crate.

use crate::error::{PipelineError, Result};
use crate::types::Frame;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub width: usize,
    pub height: usize,
    pub fps: f64,
    pub total_frames: usize,
}

/// Ordered frame producer for one recording.
pub trait FrameSource {
    fn info(&self) -> &VideoInfo;

    /// Next frame in order, `None` once exhausted.
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Drain the source into memory. The pipeline holds all frames for
    /// its lifetime (stage 3 needs adjacent pairs, stage 6 re-reads the
    /// reference frame), so this is the normal entry point.
    fn read_all(&mut self) -> Result<Vec<Frame>> {
        let mut frames = Vec::with_capacity(self.info().total_frames);
        while let Some(frame) = self.read_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }
}

/// Metadata sidecar for an exported frame sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceMeta {
    pub fps: f64,
}

pub const SEQUENCE_META_FILE: &str = "sequence.yaml";

/// Directory of numbered image frames plus a `sequence.yaml`.
#[derive(Debug)]
pub struct ImageSequenceSource {
    info: VideoInfo,
    frame_paths: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let meta_path = dir.join(SEQUENCE_META_FILE);
        if !meta_path.exists() {
            return Err(PipelineError::MissingSequenceMeta {
                path: meta_path,
            });
        }
        let meta: SequenceMeta = serde_yaml::from_str(&std::fs::read_to_string(&meta_path)?)?;

        let mut frame_paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("png" | "jpg" | "jpeg" | "PNG" | "JPG" | "JPEG")
                )
            })
            .collect();
        frame_paths.sort();

        if frame_paths.is_empty() {
            return Err(PipelineError::EmptyVideo {
                path: dir.to_path_buf(),
            });
        }

        // Probe the first frame for dimensions.
        let first = image::open(&frame_paths[0])?.to_rgb8();
        let info = VideoInfo {
            width: first.width() as usize,
            height: first.height() as usize,
            fps: meta.fps,
            total_frames: frame_paths.len(),
        };

        info!(
            "Frame sequence: {}x{} @ {:.1} FPS, {} frames ({})",
            info.width,
            info.height,
            info.fps,
            info.total_frames,
            dir.display()
        );

        Ok(Self {
            info,
            frame_paths,
            next: 0,
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.frame_paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let rgb = image::open(path)?.to_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        Ok(Some(Frame::new(rgb.into_raw(), width, height)))
    }
}

/// In-memory source used by the pipeline tests.
pub struct MemoryFrameSource {
    info: VideoInfo,
    frames: std::vec::IntoIter<Frame>,
}

impl MemoryFrameSource {
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        let (width, height) = frames
            .first()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0));
        let info = VideoInfo {
            width,
            height,
            fps,
            total_frames: frames.len(),
        };
        Self {
            info,
            frames: frames.into_iter(),
        }
    }
}

impl FrameSource for MemoryFrameSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_frame(width: usize, height: usize, value: u8) -> Frame {
        Frame::new(vec![value; width * height * 3], width, height)
    }

    #[test]
    fn test_memory_source_drains_in_order() {
        let frames = vec![flat_frame(4, 4, 10), flat_frame(4, 4, 20)];
        let mut source = MemoryFrameSource::new(frames, 25.0);
        assert_eq!(source.info().total_frames, 2);

        let all = source.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].data[0], 10);
        assert_eq!(all[1].data[0], 20);
        assert!(source.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_missing_meta_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageSequenceSource::open(dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingSequenceMeta { .. }));
    }
}
