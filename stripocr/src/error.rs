use thiserror::Error;

#[derive(Error, Debug)]
pub enum StripError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Image too large: {size} bytes, maximum {max} bytes")]
    InputTooLarge { size: usize, max: usize },

    #[error("Image dimensions {width}x{height} exceed the encoder limit of {max} pixels per side")]
    DimensionsTooLarge { width: u32, height: u32, max: u32 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("OCR operation timed out after {secs} seconds")]
    OcrTimeout { secs: u64 },

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("No text extracted from image ({failed} of {parts_total} parts failed)")]
    NoTextExtracted { parts_total: usize, failed: usize },
}

pub type Result<T> = std::result::Result<T, StripError>;
