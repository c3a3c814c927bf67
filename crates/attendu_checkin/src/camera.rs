//! Camera abstraction for the check-in flow.
//!
//! The camera stream is an exclusively-owned resource: starting a stream
//! always supersedes any prior one, every code path that disables capture
//! stops it, and every path that re-enables capture re-acquires it. Real
//! capture hardware lives behind this trait so the session logic can be
//! driven with a test camera.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

use attendu_common::services::BoxFuture;

/// Errors from the camera resource.
#[derive(Error, Debug)]
pub enum CameraError {
    /// No camera is available, or the platform refused access.
    #[error("Camera unavailable: {0}")]
    Unavailable(String),

    /// A frame was requested while no stream is active.
    #[error("Camera stream is not active")]
    Inactive,
}

/// One captured still frame.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CapturedFrame {
    /// The frame as a `data:image/jpeg;base64,...` URL, the shape the
    /// classifier endpoint expects.
    pub fn to_data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", STANDARD.encode(&self.jpeg))
    }
}

/// An owned camera stream.
pub trait CameraSource: Send + Sync {
    /// Acquires the stream, stopping any prior stream first.
    fn start(&self) -> BoxFuture<'_, (), CameraError>;

    /// Synchronous teardown; safe to call when no stream is active.
    fn stop(&self);

    /// Whether a stream is currently active.
    fn is_active(&self) -> bool;

    /// Captures one frame from the active stream.
    fn capture_frame(&self) -> BoxFuture<'_, CapturedFrame, CameraError>;
}
