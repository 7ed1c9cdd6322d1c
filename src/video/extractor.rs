use crate::core::{frame_file_name, sampling_interval, JobGuard, JobRequest, ProgressTracker};
use crate::video::{ExtractError, VideoOpener};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub const JPEG_QUALITY: u8 = 95;

/// Messages from the extraction worker to the window.
#[derive(Debug, Clone)]
pub enum JobEvent {
    VideoStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    VideoFinished {
        path: PathBuf,
        stats: VideoStats,
        progress: f64,
    },
    VideoFailed {
        path: PathBuf,
        error: String,
        progress: f64,
    },
    Completed(JobSummary),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoStats {
    pub interval: u64,
    pub decoded_frames: u64,
    pub saved_frames: u64,
}

#[derive(Debug, Clone, Default)]
pub struct JobSummary {
    pub videos_processed: usize,
    pub frames_saved: u64,
    pub failures: Vec<(PathBuf, String)>,
    pub elapsed: Duration,
}

impl JobSummary {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct FrameExtractor;

impl FrameExtractor {
    /// Samples one video into `output_dir`, keeping frames whose index is a
    /// multiple of the sampling interval.
    pub fn extract_video(
        opener: &dyn VideoOpener,
        video_path: &Path,
        output_dir: &Path,
        target_fps: u32,
    ) -> Result<VideoStats, ExtractError> {
        let mut source = opener.open(video_path)?;

        let native_fps = source.frame_rate();
        let plan = sampling_interval(native_fps, target_fps);
        if plan.clamped {
            log::warn!(
                "Target rate {} fps is above the native {:.3} fps of {}, keeping every frame",
                target_fps,
                native_fps,
                video_path.display()
            );
        }
        log::info!(
            "Sampling {} at {:.3} fps, keeping every {} frame(s)",
            video_path.display(),
            native_fps,
            plan.interval
        );

        let mut stats = VideoStats {
            interval: plan.interval,
            ..Default::default()
        };

        let mut frame_index: u64 = 0;
        while let Some(frame) = source.next_frame()? {
            if frame_index % plan.interval == 0 {
                let output_path = output_dir.join(frame_file_name(video_path, frame_index));
                Self::write_frame(&frame, &output_path)?;
                stats.saved_frames += 1;
                log::debug!("Saved frame {} to {}", frame_index, output_path.display());
            }
            frame_index += 1;
        }
        stats.decoded_frames = frame_index;

        Ok(stats)
    }

    /// Encodes `frame` as JPEG, replacing any file already at `path`.
    pub fn write_frame(frame: &RgbImage, path: &Path) -> Result<(), ExtractError> {
        let to_write_error = |source| ExtractError::WriteFrame {
            path: path.to_path_buf(),
            source,
        };

        let file = std::fs::File::create(path).map_err(|e| to_write_error(image::ImageError::IoError(e)))?;
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
            .encode_image(frame)
            .map_err(to_write_error)?;
        writer
            .flush()
            .map_err(|e| to_write_error(image::ImageError::IoError(e)))
    }

    /// Runs the whole batch on the calling thread. Each video failure is
    /// reported and the job moves on to the next video.
    pub fn run_job(
        request: &JobRequest,
        opener: &dyn VideoOpener,
        events: &mpsc::UnboundedSender<JobEvent>,
    ) -> JobSummary {
        let started = Instant::now();
        let total = request.videos.len();
        let mut progress = ProgressTracker::new(total);
        let mut summary = JobSummary::default();

        log::info!(
            "Starting extraction of {} video(s) into {} at {} fps",
            total,
            request.output_dir.display(),
            request.target_fps
        );

        for (index, path) in request.videos.iter().enumerate() {
            emit(events, JobEvent::VideoStarted {
                index,
                total,
                path: path.clone(),
            });

            match Self::extract_video(opener, path, &request.output_dir, request.target_fps) {
                Ok(stats) => {
                    summary.videos_processed += 1;
                    summary.frames_saved += stats.saved_frames;
                    progress.advance();
                    log::info!(
                        "Finished {}: saved {} of {} frames ({:.0}%)",
                        path.display(),
                        stats.saved_frames,
                        stats.decoded_frames,
                        progress.percent()
                    );
                    emit(events, JobEvent::VideoFinished {
                        path: path.clone(),
                        stats,
                        progress: progress.percent(),
                    });
                }
                Err(e) => {
                    log::error!("Frame extraction failed for {}: {}", path.display(), e);
                    progress.advance();
                    summary.failures.push((path.clone(), e.to_string()));
                    emit(events, JobEvent::VideoFailed {
                        path: path.clone(),
                        error: e.to_string(),
                        progress: progress.percent(),
                    });
                }
            }
        }

        summary.elapsed = started.elapsed();
        log::info!(
            "Extraction finished in {:.1}s: {}/{} video(s) done, {} frame(s) saved, {} failure(s)",
            summary.elapsed.as_secs_f64(),
            progress.completed(),
            total,
            summary.frames_saved,
            summary.failures.len()
        );
        summary
    }

    /// Starts the job on a background thread. The job flag is released
    /// before `Completed` is sent, so the window can start another job as
    /// soon as it sees the event.
    pub fn spawn_job(
        request: JobRequest,
        opener: Arc<dyn VideoOpener>,
        guard: JobGuard,
    ) -> anyhow::Result<mpsc::UnboundedReceiver<JobEvent>> {
        let (event_sender, event_receiver) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("frame-extractor".to_string())
            .spawn(move || {
                let summary = Self::run_job(&request, opener.as_ref(), &event_sender);
                drop(guard);
                emit(&event_sender, JobEvent::Completed(summary));
            })
            .map_err(|e| anyhow::anyhow!("Failed to start extraction thread: {}", e))?;

        Ok(event_receiver)
    }
}

fn emit(events: &mpsc::UnboundedSender<JobEvent>, event: JobEvent) {
    if let Err(e) = events.send(event) {
        log::debug!("Window stopped listening for job events: {:?}", e.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JobState;
    use crate::video::test_support::{scratch_dir, SyntheticOpener};

    fn saved_indices(dir: &Path, base: &str) -> Vec<u64> {
        let prefix = format!("{}_frame_", base);
        let mut indices: Vec<u64> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter_map(|name| {
                name.strip_prefix(&prefix)
                    .and_then(|rest| rest.strip_suffix(".jpg"))
                    .and_then(|n| n.parse().ok())
            })
            .collect();
        indices.sort_unstable();
        indices
    }

    fn drain(receiver: &mut mpsc::UnboundedReceiver<JobEvent>) -> Vec<JobEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_keeps_multiples_of_interval() {
        let out = scratch_dir("interval");
        let opener = SyntheticOpener::new().with_video("a.mp4", 30.0, 90);

        let stats = FrameExtractor::extract_video(&opener, Path::new("a.mp4"), &out, 1).unwrap();

        assert_eq!(stats, VideoStats { interval: 30, decoded_frames: 90, saved_frames: 3 });
        assert_eq!(saved_indices(&out, "a.mp4"), vec![0, 30, 60]);
    }

    #[test]
    fn test_non_integer_ratio_truncates() {
        let out = scratch_dir("truncate");
        let opener = SyntheticOpener::new().with_video("b.mov", 29.97, 100);

        let stats = FrameExtractor::extract_video(&opener, Path::new("b.mov"), &out, 2).unwrap();

        // floor(29.97 / 2) = 14
        assert_eq!(stats.interval, 14);
        assert_eq!(saved_indices(&out, "b.mov"), vec![0, 14, 28, 42, 56, 70, 84, 98]);
    }

    #[test]
    fn test_equal_rates_keep_every_frame() {
        let out = scratch_dir("equal");
        let opener = SyntheticOpener::new().with_video("c.mp4", 25.0, 10);

        let stats = FrameExtractor::extract_video(&opener, Path::new("c.mp4"), &out, 25).unwrap();

        assert_eq!(stats.interval, 1);
        assert_eq!(saved_indices(&out, "c.mp4"), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_target_above_native_keeps_every_frame() {
        let out = scratch_dir("clamp");
        let opener = SyntheticOpener::new().with_video("d.mp4", 24.0, 5);

        let stats = FrameExtractor::extract_video(&opener, Path::new("d.mp4"), &out, 60).unwrap();

        assert_eq!(stats.interval, 1);
        assert_eq!(stats.saved_frames, 5);
    }

    #[test]
    fn test_written_frames_are_jpeg() {
        let out = scratch_dir("jpeg");
        let opener = SyntheticOpener::new().with_video("e.mp4", 10.0, 1);

        FrameExtractor::extract_video(&opener, Path::new("e.mp4"), &out, 10).unwrap();

        let image = image::open(out.join("e.mp4_frame_0.jpg")).expect("saved frame should decode");
        assert_eq!((image.width(), image.height()), (SyntheticOpener::WIDTH, SyntheticOpener::HEIGHT));
    }

    #[test]
    fn test_rerun_overwrites_existing_frames() {
        let out = scratch_dir("overwrite");
        let opener = SyntheticOpener::new().with_video("f.mp4", 30.0, 60);
        std::fs::write(out.join("f.mp4_frame_30.jpg"), b"stale").unwrap();

        FrameExtractor::extract_video(&opener, Path::new("f.mp4"), &out, 1).unwrap();
        FrameExtractor::extract_video(&opener, Path::new("f.mp4"), &out, 1).unwrap();

        assert_eq!(saved_indices(&out, "f.mp4"), vec![0, 30]);
        assert!(image::open(out.join("f.mp4_frame_30.jpg")).is_ok());
    }

    #[test]
    fn test_unwritable_output_is_an_error() {
        let out = scratch_dir("unwritable").join("missing");
        let opener = SyntheticOpener::new().with_video("g.mp4", 30.0, 3);

        let result = FrameExtractor::extract_video(&opener, Path::new("g.mp4"), &out, 30);
        assert!(matches!(result, Err(ExtractError::WriteFrame { .. })));
    }

    #[test]
    fn test_run_job_two_videos_progress() {
        let out = scratch_dir("two-videos");
        let opener = SyntheticOpener::new()
            .with_video("first.mp4", 30.0, 90)
            .with_video("second.mp4", 30.0, 90);
        let request = JobRequest {
            videos: vec![PathBuf::from("first.mp4"), PathBuf::from("second.mp4")],
            output_dir: out.clone(),
            target_fps: 1,
        };
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let summary = FrameExtractor::run_job(&request, &opener, &sender);

        assert!(summary.succeeded());
        assert_eq!(summary.videos_processed, 2);
        assert_eq!(summary.frames_saved, 6);
        assert_eq!(saved_indices(&out, "first.mp4"), vec![0, 30, 60]);
        assert_eq!(saved_indices(&out, "second.mp4"), vec![0, 30, 60]);

        let progress: Vec<f64> = drain(&mut receiver)
            .into_iter()
            .filter_map(|event| match event {
                JobEvent::VideoFinished { progress, .. } => Some(progress),
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), 2);
        assert!((progress[0] - 50.0).abs() < 1e-9);
        assert!((progress[1] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_job_continues_after_failure() {
        let out = scratch_dir("failure");
        let opener = SyntheticOpener::new()
            .with_video("good.mp4", 30.0, 30)
            .with_broken_video("broken.mp4", 30.0, 31);
        let request = JobRequest {
            videos: vec![
                PathBuf::from("missing.mp4"),
                PathBuf::from("broken.mp4"),
                PathBuf::from("good.mp4"),
            ],
            output_dir: out.clone(),
            target_fps: 1,
        };
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let summary = FrameExtractor::run_job(&request, &opener, &sender);

        assert_eq!(summary.videos_processed, 1);
        assert_eq!(summary.failures.len(), 2);
        assert_eq!(summary.failures[0].0, PathBuf::from("missing.mp4"));
        // Frames written before the decode error stay on disk.
        assert_eq!(saved_indices(&out, "broken.mp4"), vec![0, 30]);
        assert_eq!(saved_indices(&out, "good.mp4"), vec![0]);

        let events = drain(&mut receiver);
        let failed = events.iter().filter(|e| matches!(e, JobEvent::VideoFailed { .. })).count();
        assert_eq!(failed, 2);
        match events.last() {
            Some(JobEvent::VideoFinished { progress, .. }) => assert!((progress - 100.0).abs() < 1e-9),
            other => panic!("Unexpected last event: {:?}", other),
        }
    }

    #[test]
    fn test_run_job_survives_closed_receiver() {
        let out = scratch_dir("closed");
        let opener = SyntheticOpener::new().with_video("h.mp4", 30.0, 30);
        let request = JobRequest {
            videos: vec![PathBuf::from("h.mp4")],
            output_dir: out,
            target_fps: 1,
        };
        let (sender, receiver) = mpsc::unbounded_channel();
        drop(receiver);

        let summary = FrameExtractor::run_job(&request, &opener, &sender);
        assert_eq!(summary.frames_saved, 1);
    }

    #[test]
    fn test_spawn_job_releases_flag_before_completion() {
        let out = scratch_dir("spawn");
        let opener: Arc<dyn VideoOpener> = Arc::new(SyntheticOpener::new().with_video("i.mp4", 30.0, 60));
        let request = JobRequest {
            videos: vec![PathBuf::from("i.mp4")],
            output_dir: out,
            target_fps: 1,
        };
        let state = JobState::new();
        let guard = state.try_begin().unwrap();

        let mut receiver = FrameExtractor::spawn_job(request, opener, guard).unwrap();

        let mut completed = None;
        while let Some(event) = receiver.blocking_recv() {
            if let JobEvent::Completed(summary) = event {
                assert!(!state.is_running());
                completed = Some(summary);
            }
        }
        let summary = completed.expect("worker should report completion");
        assert_eq!(summary.frames_saved, 2);
    }
}
