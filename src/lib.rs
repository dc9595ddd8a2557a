pub mod aggregator;
pub mod canvas;
pub mod config;
pub mod debounce;
pub mod error;
pub mod fingers;
pub mod gesture;
pub mod landmarks;
pub mod pipeline;
pub mod types;

pub use config::AppConfig;
pub use pipeline::{DrawingSession, FrameLoop, HandDetector};
