use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not read video info for {path}: {message}")]
    Probe { path: PathBuf, message: String },
    #[error("No video stream found in {0}")]
    NoVideoStream(PathBuf),
    #[error("Unusable frame rate \"{value}\" reported for {path}")]
    InvalidFrameRate { path: PathBuf, value: String },
    #[error("Decoding {path} failed: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("Failed to write frame {path}: {source}")]
    WriteFrame {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
