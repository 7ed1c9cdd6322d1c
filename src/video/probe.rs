use crate::video::ExtractError;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
    /// Container-reported frame count, when the muxer records one.
    pub frame_count: Option<u64>,
}

pub struct VideoProbe;

impl VideoProbe {
    pub fn get_video_info(ffprobe: &Path, file_path: &Path) -> Result<VideoInfo, ExtractError> {
        log::debug!("Probing {} with {}", file_path.display(), ffprobe.display());

        let output = Command::new(ffprobe)
            .arg("-v").arg("quiet")
            .arg("-print_format").arg("json")
            .arg("-show_streams")
            .arg("-select_streams").arg("v:0")
            .arg(file_path)
            .output()
            .map_err(|source| ExtractError::Spawn {
                tool: ffprobe.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExtractError::Probe {
                path: file_path.to_path_buf(),
                message: format!("ffprobe exited with {}", output.status),
            });
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(&json_str, file_path)
    }

    pub fn parse_probe_output(json_str: &str, file_path: &Path) -> Result<VideoInfo, ExtractError> {
        let info: serde_json::Value = serde_json::from_str(json_str).map_err(|e| ExtractError::Probe {
            path: file_path.to_path_buf(),
            message: format!("unreadable ffprobe output: {}", e),
        })?;

        let empty_vec = vec![];
        let streams = info["streams"].as_array().unwrap_or(&empty_vec);
        let video_stream = streams
            .iter()
            .find(|s| s["codec_type"].as_str() == Some("video"))
            .ok_or_else(|| ExtractError::NoVideoStream(file_path.to_path_buf()))?;

        // r_frame_rate is what players treat as the nominal rate; some
        // containers leave it as 0/0 and only fill avg_frame_rate.
        let frame_rate = ["r_frame_rate", "avg_frame_rate"]
            .iter()
            .filter_map(|key| video_stream[*key].as_str())
            .filter_map(parse_frame_rate)
            .next()
            .ok_or_else(|| ExtractError::InvalidFrameRate {
                path: file_path.to_path_buf(),
                value: video_stream["r_frame_rate"].as_str().unwrap_or("missing").to_string(),
            })?;

        let width = video_stream["width"].as_u64().unwrap_or(0) as u32;
        let height = video_stream["height"].as_u64().unwrap_or(0) as u32;
        if width == 0 || height == 0 {
            return Err(ExtractError::Probe {
                path: file_path.to_path_buf(),
                message: format!("invalid frame size {}x{}", width, height),
            });
        }

        let frame_count = video_stream["nb_frames"]
            .as_str()
            .and_then(|s| s.parse::<u64>().ok());

        Ok(VideoInfo {
            frame_rate,
            width,
            height,
            frame_count,
        })
    }
}

/// Parses "30000/1001" or "25" into frames per second. Zero and
/// non-finite rates are rejected.
pub fn parse_frame_rate(value: &str) -> Option<f64> {
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let numerator: f64 = num.trim().parse().ok()?;
            let denominator: f64 = den.trim().parse().ok()?;
            if denominator == 0.0 {
                return None;
            }
            numerator / denominator
        }
        None => value.trim().parse().ok()?,
    };

    if rate.is_finite() && rate > 0.0 {
        Some(rate)
    } else {
        None
    }
}
