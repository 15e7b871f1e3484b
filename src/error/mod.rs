//! # Error Module
//!
//! User-friendly error types for the image difference service.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, upload names, what went wrong
//! - **One failure, one request** - nothing here is retried

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum ImageDiffError {
    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),

    /// The server-side reference image could not be loaded; the path stays in the source chain
    #[error("Reference image is unavailable")]
    Reference(#[source] DecodeError),

    #[error("Comparison error: {0}")]
    Compare(#[from] CompareError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that occur while turning bytes into pixels
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Image data is empty")]
    EmptyInput,

    #[error("Failed to decode image {source_name}: {reason}")]
    DecodeFailed { source_name: String, reason: String },

    #[error("Failed to read image file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while comparing two images
#[derive(Error, Debug)]
pub enum CompareError {
    #[error("Image dimensions differ: {left_width}x{left_height} vs {right_width}x{right_height}")]
    DimensionMismatch {
        left_width: u32,
        left_height: u32,
        right_width: u32,
        right_height: u32,
    },

    #[error("Image is {width}x{height}, smaller than the {window}x{window} similarity window")]
    ImageTooSmall { width: u32, height: u32, window: u32 },

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Resize failed: {0}")]
    ResizeFailed(String),
}

/// Errors that occur while persisting uploads and artifacts
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
}

/// Errors raised by the HTTP front end
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server stopped unexpectedly: {0}")]
    Serve(#[source] std::io::Error),

    #[error("Request is missing the '{field}' upload field")]
    MissingUpload { field: String },

    #[error("Malformed multipart request: {0}")]
    Multipart(String),

    #[error("Upload is {size} bytes, the limit is {limit} bytes")]
    UploadTooLarge { size: usize, limit: usize },

    #[error("Comparison task failed: {0}")]
    Task(String),
}

impl ImageDiffError {
    /// Whether the failure was caused by what the caller sent rather than by the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ImageDiffError::Decode(DecodeError::EmptyInput)
                | ImageDiffError::Decode(DecodeError::DecodeFailed { .. })
                | ImageDiffError::Server(ServerError::MissingUpload { .. })
                | ImageDiffError::Server(ServerError::Multipart(_))
                | ImageDiffError::Server(ServerError::UploadTooLarge { .. })
        )
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, ImageDiffError>;
