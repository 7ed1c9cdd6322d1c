use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("No video files selected")]
    NoVideos,
    #[error("No output folder selected")]
    NoOutputFolder,
    #[error("Frame rate must be a whole number, got \"{0}\"")]
    InvalidFrameRate(String),
    #[error("Frame rate must be greater than zero")]
    ZeroFrameRate,
    #[error("Failed to create output folder {path}: {source}")]
    CreateOutputFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One batch of videos to sample into a single output folder.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub videos: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub target_fps: u32,
}

impl JobRequest {
    /// Builds a request from the raw text of the three input fields.
    pub fn from_inputs(video_list: &str, output_folder: &str, frame_rate: &str) -> Result<Self, RequestError> {
        let videos: Vec<PathBuf> = video_list
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect();
        if videos.is_empty() {
            return Err(RequestError::NoVideos);
        }

        let output_folder = output_folder.trim();
        if output_folder.is_empty() {
            return Err(RequestError::NoOutputFolder);
        }

        let frame_rate = frame_rate.trim();
        let target_fps = frame_rate
            .parse::<u32>()
            .map_err(|_| RequestError::InvalidFrameRate(frame_rate.to_string()))?;
        if target_fps == 0 {
            return Err(RequestError::ZeroFrameRate);
        }

        Ok(Self {
            videos,
            output_dir: PathBuf::from(output_folder),
            target_fps,
        })
    }

    pub fn prepare_output_dir(&self) -> Result<(), RequestError> {
        if !self.output_dir.exists() {
            log::info!("Creating output folder {}", self.output_dir.display());
        }
        std::fs::create_dir_all(&self.output_dir).map_err(|source| RequestError::CreateOutputFolder {
            path: self.output_dir.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalPlan {
    pub interval: u64,
    /// The target rate exceeded the native rate and every frame is kept.
    pub clamped: bool,
}

/// floor(native / target), never below 1.
pub fn sampling_interval(native_fps: f64, target_fps: u32) -> IntervalPlan {
    let raw = (native_fps / f64::from(target_fps)).floor();
    if raw >= 1.0 {
        IntervalPlan { interval: raw as u64, clamped: false }
    } else {
        IntervalPlan { interval: 1, clamped: true }
    }
}

pub fn frame_file_name(video_path: &Path, frame_index: u64) -> String {
    let base = video_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    format!("{}_frame_{}.jpg", base, frame_index)
}

/// Percentage of finished videos in the running job.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    share: f64,
    value: f64,
    completed: usize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        let share = if total == 0 { 100.0 } else { 100.0 / total as f64 };
        Self { share, value: 0.0, completed: 0 }
    }

    pub fn advance(&mut self) {
        self.completed += 1;
        self.value = (self.value + self.share).min(100.0);
    }

    pub fn percent(&self) -> f64 {
        self.value
    }

    pub fn completed(&self) -> usize {
        self.completed
    }
}

/// Idle/running flag shared between the window and the worker.
#[derive(Debug, Clone, Default)]
pub struct JobState {
    running: Arc<AtomicBool>,
}

impl JobState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the flag. Returns `None` when a job is already running.
    pub fn try_begin(&self) -> Option<JobGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| JobGuard { running: self.running.clone() })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Releases the job flag when dropped, including during a panic unwind.
#[derive(Debug)]
pub struct JobGuard {
    running: Arc<AtomicBool>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
