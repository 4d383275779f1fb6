//! Crate-level error types.

use std::fmt;

/// Errors produced by the molsurf crate.
#[derive(Debug)]
pub enum SurfaceError {
    /// Generic I/O failure.
    Io(std::io::Error),
    /// Failed to spawn a worker thread.
    ThreadSpawn(std::io::Error),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
    /// A worker's inbound queue was closed (the worker thread exited).
    WorkerDisconnected(usize),
    /// The isosurface extractor rejected a job.
    Extract(ExtractError),
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::ThreadSpawn(e) => {
                write!(f, "failed to spawn worker thread: {e}")
            }
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
            Self::WorkerDisconnected(idx) => {
                write!(f, "surface worker {idx} disconnected")
            }
            Self::Extract(e) => write!(f, "extraction failed: {e}"),
        }
    }
}

impl std::error::Error for SurfaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) | Self::ThreadSpawn(e) => Some(e),
            Self::Extract(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SurfaceError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ExtractError> for SurfaceError {
    fn from(e: ExtractError) -> Self {
        Self::Extract(e)
    }
}

/// Failure reported by an isosurface extractor for a single chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractError {
    message: String,
}

impl ExtractError {
    /// Create an error with a human-readable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ExtractError {}
