use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to open capture source {source_name}: {reason}")]
    Open { source_name: String, reason: String },
    #[error("capture source {0} has no more frames")]
    EndOfStream(String),
    #[error("failed to decode frame: {0}")]
    Decode(#[from] ffmpeg_next::Error),
    #[error("capture source is closed")]
    Closed,
}

/// Produces frames one at a time, blocking until the next one is ready.
///
/// A failed read is reported as an error rather than an empty frame so
/// callers can tell "no frame" apart from a valid result.
pub trait FrameSource: Send {
    fn read(&mut self) -> Result<Frame, CaptureError>;

    /// Releases the underlying device or file. Idempotent.
    fn close(&mut self);
}
