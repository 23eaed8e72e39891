use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF file not found at {}", .0.display())]
    InputNotFound(PathBuf),
    #[error("page index {index} out of range (0..{count})")]
    PageOutOfRange { index: usize, count: usize },
    #[error("cannot read PDF: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("cannot encode image: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("cannot serialize records: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
