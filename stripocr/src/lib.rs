//! Text extraction for arbitrarily tall images.
//!
//! An image is decoded, cut into horizontal strips that each fit an OCR service's
//! payload ceiling, re-encoded as JPEG and sent to the service one strip at a time.
//! The per-strip text is merged back in top-to-bottom order.

pub mod config;
pub mod error;
pub mod models;
pub mod ocr;
pub mod processing;

pub use config::Config;
pub use error::{Result, StripError};
pub use models::MergedDocument;
pub use processing::JobDriver;
