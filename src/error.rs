use std::path::PathBuf;

use crate::format::ImageFormat;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while inspecting or sanitizing a single image.
///
/// None of these are fatal to a batch: the pipeline turns each one into a
/// per-file `Skipped` or `Failed` outcome and moves on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The byte stream is not one of the supported image containers.
    #[error("not a supported image")]
    NotAnImage,

    /// Segment/chunk framing or IFD structure is inconsistent with the stream.
    #[error("malformed {format} container: {reason}")]
    MalformedContainer { format: ImageFormat, reason: String },

    /// Pixels could not be decoded (or re-encoded) for an orientation rebake.
    #[error("unsupported pixel format for orientation rebake: {0}")]
    UnsupportedPixelFormat(String),

    /// Reading or writing a file failed.
    #[error("I/O failure on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A safe-default output resolved to the original file.
    #[error("refusing to overwrite original '{}' without in-place mode", path.display())]
    UnsafeOutput { path: PathBuf },

    /// The rebuilt container failed re-serialization or validation.
    #[error("failed to re-serialize image: {0}")]
    Encode(String),
}

impl Error {
    pub fn malformed(format: ImageFormat, reason: impl Into<String>) -> Self {
        Error::MalformedContainer {
            format,
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-friendly reason code for reports.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotAnImage => "not-an-image",
            Error::MalformedContainer { .. } => "malformed-container",
            Error::UnsupportedPixelFormat(_) => "unsupported-pixel-format",
            Error::Io { .. } => "io-failure",
            Error::UnsafeOutput { .. } => "unsafe-output",
            Error::Encode(_) => "encode-failure",
        }
    }
}
