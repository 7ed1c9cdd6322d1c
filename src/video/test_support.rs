//! In-memory videos for exercising the extraction engine without ffmpeg.

use crate::video::{ExtractError, FrameSource, VideoOpener};
use image::{Rgb, RgbImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
struct SyntheticVideo {
    frame_rate: f64,
    frame_count: u64,
    fail_at: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct SyntheticOpener {
    videos: HashMap<PathBuf, SyntheticVideo>,
}

impl SyntheticOpener {
    pub const WIDTH: u32 = 16;
    pub const HEIGHT: u32 = 8;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(mut self, path: &str, frame_rate: f64, frame_count: u64) -> Self {
        self.videos.insert(PathBuf::from(path), SyntheticVideo {
            frame_rate,
            frame_count,
            fail_at: None,
        });
        self
    }

    /// A video whose decoder errors when asked for frame `fail_at`.
    pub fn with_broken_video(mut self, path: &str, frame_rate: f64, fail_at: u64) -> Self {
        self.videos.insert(PathBuf::from(path), SyntheticVideo {
            frame_rate,
            frame_count: u64::MAX,
            fail_at: Some(fail_at),
        });
        self
    }
}

impl VideoOpener for SyntheticOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, ExtractError> {
        let video = self.videos.get(path).copied().ok_or_else(|| ExtractError::Probe {
            path: path.to_path_buf(),
            message: "no such file".to_string(),
        })?;
        Ok(Box::new(SyntheticSource {
            path: path.to_path_buf(),
            video,
            next_index: 0,
        }))
    }
}

struct SyntheticSource {
    path: PathBuf,
    video: SyntheticVideo,
    next_index: u64,
}

impl FrameSource for SyntheticSource {
    fn frame_rate(&self) -> f64 {
        self.video.frame_rate
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, ExtractError> {
        if self.video.fail_at == Some(self.next_index) {
            return Err(ExtractError::Decode {
                path: self.path.clone(),
                message: "corrupt packet".to_string(),
            });
        }
        if self.next_index >= self.video.frame_count {
            return Ok(None);
        }

        let shade = (self.next_index % 256) as u8;
        self.next_index += 1;
        Ok(Some(RgbImage::from_pixel(
            SyntheticOpener::WIDTH,
            SyntheticOpener::HEIGHT,
            Rgb([shade, 128, 255 - shade]),
        )))
    }
}

/// A fresh, empty directory under the system temp dir.
pub fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("frame-sampler-{}-{}", label, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("Failed to create scratch directory");
    dir
}
