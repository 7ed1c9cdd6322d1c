use crate::core::AppConfig;
use crate::video::probe::{VideoInfo, VideoProbe};
use crate::video::ExtractError;
use image::RgbImage;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

/// A video opened for sequential decoding.
pub trait FrameSource {
    /// Native frames per second of the stream.
    fn frame_rate(&self) -> f64;

    /// The next decoded frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, ExtractError>;
}

pub trait VideoOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, ExtractError>;
}

/// Opens videos through the ffprobe/ffmpeg command line tools.
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegOpener {
    pub fn new(ffmpeg: PathBuf, ffprobe: PathBuf) -> Self {
        Self { ffmpeg, ffprobe }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.ffmpeg_command(), config.ffprobe_command())
    }
}

impl VideoOpener for FfmpegOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, ExtractError> {
        let info = VideoProbe::get_video_info(&self.ffprobe, path)?;
        log::debug!(
            "{}: {}x{} @ {:.3} fps ({} frames reported)",
            path.display(),
            info.width,
            info.height,
            info.frame_rate,
            info.frame_count.map_or_else(|| "unknown".to_string(), |n| n.to_string())
        );
        let reader = FfmpegFrameReader::spawn(&self.ffmpeg, path, info)?;
        Ok(Box::new(reader))
    }
}

/// Streams raw RGB24 frames out of an ffmpeg child process.
pub struct FfmpegFrameReader {
    path: PathBuf,
    info: VideoInfo,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_reader: Option<JoinHandle<String>>,
    frame_size: usize,
    finished: bool,
}

impl FfmpegFrameReader {
    pub fn spawn(ffmpeg: &Path, path: &Path, info: VideoInfo) -> Result<Self, ExtractError> {
        let mut cmd = Command::new(ffmpeg);
        cmd.arg("-v").arg("error")
            // Frame size must stay what ffprobe reported.
            .arg("-noautorotate")
            .arg("-i").arg(path)
            .arg("-map").arg("0:v:0")
            .arg("-f").arg("rawvideo")
            .arg("-pix_fmt").arg("rgb24")
            // One output frame per decoded frame, no duplication or drops.
            .arg("-vsync").arg("passthrough")
            .arg("-an")
            .arg("-");

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null());

        let mut child = cmd.spawn().map_err(|source| ExtractError::Spawn {
            tool: ffmpeg.display().to_string(),
            source,
        })?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExtractError::Decode {
                    path: path.to_path_buf(),
                    message: "ffmpeg stdout was not captured".to_string(),
                });
            }
        };

        // A full stderr pipe would stall the decoder.
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        let frame_size = info.width as usize * info.height as usize * 3;

        Ok(Self {
            path: path.to_path_buf(),
            info,
            child,
            stdout: BufReader::with_capacity(frame_size.max(8192), stdout),
            stderr_reader,
            frame_size,
            finished: false,
        })
    }

    fn finish(&mut self) -> Result<(), ExtractError> {
        self.finished = true;
        let status = self.child.wait()?;
        let stderr = self
            .stderr_reader
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() {
            if !stderr.trim().is_empty() {
                log::warn!("ffmpeg reported for {}: {}", self.path.display(), stderr.trim());
            }
            Ok(())
        } else {
            let message = if stderr.trim().is_empty() {
                format!("ffmpeg exited with {}", status)
            } else {
                stderr.trim().to_string()
            };
            Err(ExtractError::Decode {
                path: self.path.clone(),
                message,
            })
        }
    }
}

impl FrameSource for FfmpegFrameReader {
    fn frame_rate(&self) -> f64 {
        self.info.frame_rate
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, ExtractError> {
        if self.finished {
            return Ok(None);
        }

        let mut buffer = vec![0u8; self.frame_size];
        let read = read_raw_frame(&mut self.stdout, &mut buffer).map_err(|e| ExtractError::Decode {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        match read {
            FrameRead::Full => RgbImage::from_raw(self.info.width, self.info.height, buffer)
                .map(Some)
                .ok_or_else(|| ExtractError::Decode {
                    path: self.path.clone(),
                    message: "frame buffer does not match frame size".to_string(),
                }),
            FrameRead::Truncated(bytes) => {
                log::warn!(
                    "Dropping truncated trailing frame in {} ({} of {} bytes)",
                    self.path.display(),
                    bytes,
                    self.frame_size
                );
                self.finish()?;
                Ok(None)
            }
            FrameRead::End => {
                self.finish()?;
                Ok(None)
            }
        }
    }
}

impl Drop for FfmpegFrameReader {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRead {
    Full,
    /// The stream ended cleanly on a frame boundary.
    End,
    /// The stream ended partway through a frame; holds the bytes that arrived.
    Truncated(usize),
}

/// Fills `buffer` with exactly one frame from `reader`.
pub fn read_raw_frame<R: Read>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<FrameRead> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(if filled == buffer.len() {
        FrameRead::Full
    } else if filled == 0 {
        FrameRead::End
    } else {
        FrameRead::Truncated(filled)
    })
}
