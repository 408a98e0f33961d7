//! Error types for chime
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the chime playback layer
#[derive(Error, Debug)]
pub enum Error {
    /// Container or codec is not one of the supported formats
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Container header or chunk framing is structurally inconsistent
    #[error("Corrupt stream: {0}")]
    CorruptStream(String),

    /// Buffer pool index outside [0, pool size)
    #[error("Buffer index {index} out of range (pool size {len})")]
    IndexOutOfRange {
        /// Requested slot index
        index: usize,
        /// Number of slots in the pool
        len: usize,
    },

    /// More chunks supplied than the pool has slots
    #[error("Oversized input: {supplied} chunks for {capacity} buffer slots")]
    OversizedInput {
        /// Number of chunks supplied
        supplied: usize,
        /// Number of slots in the pool
        capacity: usize,
    },

    /// The audio backend reported an error after an operation
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation invalid in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using chime Error
pub type Result<T> = std::result::Result<T, Error>;
