//! Error types for cave generation
//!
//! Carving itself never fails once a generator exists: an empty rock mask or
//! an unsatisfied connectivity target are normal outcomes. Errors come from
//! rejected parameters and from the file I/O around the generator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaveError {
    #[error("invalid cave parameters: {0}")]
    InvalidParams(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, CaveError>;
