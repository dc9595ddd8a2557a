use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid color {0:?}, expected #RRGGBB")]
    InvalidColor(String),
}

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("canvas dimensions must be non-zero, got {width}x{height}")]
    EmptyCanvas { width: u32, height: u32 },
    #[error("background source is not a supported data URI")]
    InvalidDataUri,
    #[error("failed to decode base64 background data")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to read background image {path}")]
    ReadBackground {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image codec failure")]
    Image(#[from] image::ImageError),
    #[error("background resize failed: {0}")]
    Resize(String),
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("camera or input source unavailable: {0}")]
    Acquisition(String),
    #[error("detector initialization failed: {0}")]
    Init(String),
    #[error("detector inference failed: {0}")]
    Inference(String),
    #[error("malformed detector record on line {line}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
