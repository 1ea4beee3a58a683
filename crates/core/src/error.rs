//! Error types for settlemap

use thiserror::Error;

/// Main error type for settlemap operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    #[error("Geometry mismatch: expected {expected}, got {actual}")]
    GeometryMismatch { expected: String, actual: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Unknown band: {0}")]
    UnknownBand(String),

    #[error("Band already present: {0}")]
    DuplicateBand(String),

    #[error("No training samples for class {class} ({region})")]
    InsufficientSamples { class: i32, region: String },

    #[error("Export of {pixels} pixels exceeds ceiling of {max_pixels}")]
    CapacityExceeded { pixels: u64, max_pixels: u64 },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for settlemap operations
pub type Result<T> = std::result::Result<T, Error>;
