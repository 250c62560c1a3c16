use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{OcrConfig, PipelineConfig};
use crate::error::{Result, StripError};
use crate::models::{
    ExtractionOutcome, ImagePart, JobStage, MergedDocument, PartFailure, TextBlock,
};
use crate::ocr::TextExtractor;

use super::compress::PAYLOAD_CONTENT_TYPE;

/// Submits encoded parts to the text extractor one at a time and merges the results.
///
/// Calls are made strictly in ascending part order with `pacing` between the end of
/// one call and the start of the next. A failed part is recorded and skipped; only
/// cancellation or a job with no text at all turns into an error.
#[derive(Clone)]
pub struct ExtractionOrchestrator {
    extractor: Arc<dyn TextExtractor>,
    pacing: Duration,
    delimiter: String,
    language: String,
}

impl ExtractionOrchestrator {
    pub fn new(extractor: Arc<dyn TextExtractor>, pipeline: &PipelineConfig, ocr: &OcrConfig) -> Self {
        Self {
            extractor,
            pacing: Duration::from_millis(pipeline.pacing_interval_ms),
            delimiter: pipeline.segment_delimiter.clone(),
            language: ocr.language.clone(),
        }
    }

    pub async fn run(
        &self,
        mut parts: Vec<ImagePart>,
        cancel: &CancellationToken,
    ) -> Result<MergedDocument> {
        parts.sort_by_key(|p| p.index);
        let parts_total = parts.len();
        let mut outcomes = Vec::with_capacity(parts_total);

        // Each part is consumed so its payload is released once its outcome is recorded.
        for (position, part) in parts.into_iter().enumerate() {
            if position > 0 {
                self.pace(cancel).await?;
            }

            if cancel.is_cancelled() {
                info!(
                    part = part.index,
                    completed = outcomes.len(),
                    parts_total,
                    "Job cancelled before next extraction call"
                );
                return Err(StripError::Cancelled);
            }

            debug!(
                stage = %JobStage::Extracting,
                part = part.index,
                parts_total,
                bytes = part.payload_size,
                "Extracting part"
            );
            outcomes.push(self.extract_part(&part).await);
        }

        debug!(stage = %JobStage::Merging, parts_total, "Merging part results");
        merge_outcomes(outcomes, parts_total, &self.delimiter)
    }

    async fn pace(&self, cancel: &CancellationToken) -> Result<()> {
        if self.pacing.is_zero() {
            return Ok(());
        }

        tokio::select! {
            _ = cancel.cancelled() => Err(StripError::Cancelled),
            _ = tokio::time::sleep(self.pacing) => Ok(()),
        }
    }

    async fn extract_part(&self, part: &ImagePart) -> ExtractionOutcome {
        let result = self
            .extractor
            .extract(&part.payload, PAYLOAD_CONTENT_TYPE, &self.language)
            .await;

        match result {
            Ok(raw) => {
                let text = normalize_text(&raw);
                if text.is_empty() {
                    debug!(part = part.index, "Part produced no text");
                }
                ExtractionOutcome::text(part.index, text)
            }
            Err(e) => {
                warn!(part = part.index, error = %e, "Part extraction failed, continuing with next part");
                ExtractionOutcome::failed(part.index, PartFailure::from(&e))
            }
        }
    }
}

/// Trim every line and drop blank ones.
pub fn normalize_text(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join the text of every successful part in ascending part order.
///
/// Fails with `NoTextExtracted` when no part produced any text, whether because the
/// calls failed or because the service found nothing.
pub fn merge_outcomes(
    mut outcomes: Vec<ExtractionOutcome>,
    parts_total: usize,
    delimiter: &str,
) -> Result<MergedDocument> {
    outcomes.sort_by_key(|o| o.part_index);

    let mut blocks = Vec::new();
    let mut failed_parts = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(text) if !text.is_empty() => blocks.push(TextBlock {
                part_index: outcome.part_index,
                text,
            }),
            Ok(_) => {}
            Err(_) => failed_parts.push(outcome.part_index),
        }
    }

    if blocks.is_empty() {
        return Err(StripError::NoTextExtracted {
            parts_total,
            failed: failed_parts.len(),
        });
    }

    let text = blocks
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join(delimiter);

    Ok(MergedDocument {
        text,
        blocks,
        parts_total,
        failed_parts,
    })
}
