//! Output error types

use thiserror::Error;

/// Errors that can occur while injecting key events
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to create virtual keyboard: {0}")]
    CreateDevice(#[source] std::io::Error),

    #[error("Failed to emit key event: {0}")]
    Emit(#[source] std::io::Error),

    #[error("Output backend not available: {0}")]
    Unavailable(String),
}
