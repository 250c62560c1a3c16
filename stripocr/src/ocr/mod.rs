//! OCR (Optical Character Recognition) Module
//!
//! Text extraction backends consumed by the strip pipeline.
//!
//! # Architecture
//!
//! - `TextExtractor` is the seam the pipeline depends on; tests substitute their own
//! - `OcrProvider` implements it by dispatching to one configured backend
//! - `OcrSpaceClient` talks to the OCR.space `parse/image` endpoint
//! - `VisionChatClient` talks to OpenAI-compatible chat completions (OpenAI, Mistral, DeepSeek)
//! - Local Tesseract via leptess, behind the `tesseract` cargo feature
//!
//! # Configuration
//!
//! Backend selection is driven by `OcrConfig` (see `config.rs`):
//! - `model`: Provider/model selection (e.g., "ocrspace/2", "openai/gpt-4o", "local/tesseract")
//! - `api_key`: Authentication for cloud providers
//! - `base_url`: Custom endpoint for self-hosted or proxy setups
//! - `language`: Language hint passed on every call
//! - `timeout_secs`: Per-call timeout
//!
//! # Usage
//!
//! ```rust,ignore
//! let ocr: Arc<dyn TextExtractor> = Arc::new(OcrProvider::new(&config.ocr)?);
//! let text = ocr.extract(&jpeg_bytes, "image/jpeg", "kor").await?;
//! ```

mod api;
mod preprocessing;
mod provider;

use async_trait::async_trait;

use crate::error::Result;

pub use api::{OcrSpaceClient, VisionChatClient};
pub use preprocessing::preprocess_image;
pub use provider::OcrProvider;

/// A remote or local service that turns an encoded image into text.
///
/// Implementations must be safe to share between concurrently running jobs.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, payload: &[u8], content_type: &str, language_hint: &str)
        -> Result<String>;

    fn is_available(&self) -> bool {
        true
    }
}
