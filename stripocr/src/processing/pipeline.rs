use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, InputConfig, PreprocessConfig, SplitConfig, MAX_ENCODABLE_DIMENSION};
use crate::error::{Result, StripError};
use crate::models::{ImagePart, JobStage, MergedDocument};
use crate::ocr::{preprocess_image, TextExtractor};

use super::compress::{compress_strip, CompressionParams};
use super::orchestrator::ExtractionOrchestrator;
use super::partition::{decode_image, partition};

/// Runs one image through decode, partition, compression and extraction.
///
/// A driver is built once from [`Config`] and cloned into every concurrent job; jobs
/// share nothing but the extractor behind the `Arc`.
#[derive(Clone)]
pub struct JobDriver {
    extractor: Arc<dyn TextExtractor>,
    orchestrator: ExtractionOrchestrator,
    splitting: SplitConfig,
    compression: CompressionParams,
    input: InputConfig,
    preprocessing: PreprocessConfig,
}

impl JobDriver {
    pub fn new(config: &Config, extractor: Arc<dyn TextExtractor>) -> Result<Self> {
        config.validate()?;

        let orchestrator =
            ExtractionOrchestrator::new(extractor.clone(), &config.pipeline, &config.ocr);

        Ok(Self {
            extractor,
            orchestrator,
            splitting: config.splitting.clone(),
            compression: CompressionParams::from(&config.compression),
            input: config.input.clone(),
            preprocessing: config.preprocessing.clone(),
        })
    }

    pub async fn submit(&self, image_bytes: &[u8]) -> Result<MergedDocument> {
        self.submit_with_cancel(image_bytes, &CancellationToken::new())
            .await
    }

    pub async fn submit_with_cancel(
        &self,
        image_bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<MergedDocument> {
        let started = Instant::now();

        if !self.extractor.is_available() {
            return Err(StripError::OcrUnavailable(
                "no text extraction backend is configured".to_string(),
            ));
        }

        self.validate_input(image_bytes)?;

        if cancel.is_cancelled() {
            return Err(StripError::Cancelled);
        }

        let bytes = image_bytes.to_vec();
        let splitting = self.splitting.clone();
        let compression = self.compression;
        let preprocessing = self.preprocessing.clone();

        let parts = tokio::task::spawn_blocking(move || {
            prepare_parts(&bytes, &splitting, &compression, &preprocessing)
        })
        .await
        .map_err(|e| StripError::Processing(format!("Image preparation task failed: {e}")))??;

        let doc = self.orchestrator.run(parts, cancel).await?;

        if doc.is_partial() {
            warn!(
                parts_total = doc.parts_total,
                failed_parts = ?doc.failed_parts,
                "Job completed with missing parts"
            );
        }
        info!(
            parts_total = doc.parts_total,
            failed = doc.failed_parts.len(),
            chars = doc.char_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Job complete"
        );

        Ok(doc)
    }

    fn validate_input(&self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.input.max_input_bytes {
            return Err(StripError::InputTooLarge {
                size: bytes.len(),
                max: self.input.max_input_bytes,
            });
        }

        // Unrecognized signatures are left for the decoder to reject.
        if let Some(kind) = infer::get(bytes) {
            let supported = kind.matcher_type() == infer::MatcherType::Image
                && extension_aliases(kind.extension())
                    .iter()
                    .any(|ext| self.input.supported_formats.iter().any(|f| f == ext));

            if !supported {
                return Err(StripError::UnsupportedFormat(kind.mime_type().to_string()));
            }
        }

        Ok(())
    }
}

fn extension_aliases(ext: &str) -> Vec<&str> {
    match ext {
        "jpg" | "jpeg" => vec!["jpg", "jpeg"],
        "tif" | "tiff" => vec!["tif", "tiff"],
        other => vec![other],
    }
}

/// CPU-bound half of a job: the decoded image lives only inside this call.
fn prepare_parts(
    bytes: &[u8],
    splitting: &SplitConfig,
    compression: &CompressionParams,
    preprocessing: &PreprocessConfig,
) -> Result<Vec<ImagePart>> {
    debug!(stage = %JobStage::Decoding, bytes = bytes.len(), "Decoding image");
    let image = decode_image(bytes)?;
    let image = preprocess_image(image, preprocessing);

    // Strips are full-width, so no amount of splitting makes a wider image encodable.
    if image.width() > MAX_ENCODABLE_DIMENSION {
        return Err(StripError::DimensionsTooLarge {
            width: image.width(),
            height: image.height(),
            max: MAX_ENCODABLE_DIMENSION,
        });
    }

    debug!(stage = %JobStage::Partitioning, "Partitioning image");
    let strips = partition(&image, bytes.len(), splitting);

    strips
        .iter()
        .map(|strip| {
            debug!(stage = %JobStage::Compressing, part = strip.index, "Compressing part");
            compress_strip(&image, strip, compression)
        })
        .collect()
}
