//! Error taxonomy for the annotation surface.
//!
//! Configuration errors are fatal and rejected at the call site. Save
//! failures are recoverable and surfaced through the listener with a fixed
//! error code. No-op conditions (undo on an empty log, zero-distance shapes)
//! are silently tolerated and never reach this module.

use thiserror::Error;

/// Stable error codes delivered through [`crate::surface::SurfaceListener::on_error`].
/// Values match the codes hosts have historically switched on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    InitError = -1,
    SaveError = -2,
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The surface was constructed without a usable source image.
    #[error("source image is empty ({width}x{height})")]
    EmptySource { width: u32, height: u32 },

    /// Replaying a logged operation failed. Nothing in the gesture path is
    /// expected to fail, so this indicates the log holds a corrupted record
    /// and is treated as a fatal invariant violation.
    #[error("operation log replay failed: {0}")]
    CorruptLog(String),
}

impl SurfaceError {
    /// The listener-facing code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            SurfaceError::EmptySource { .. } => ErrorCode::InitError,
            SurfaceError::CorruptLog(_) => ErrorCode::SaveError,
        }
    }
}
