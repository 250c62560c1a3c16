use serde::Serialize;

use crate::error::StripError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartFailureKind {
    Timeout,
    Service,
    Unavailable,
}

/// Why a single part contributed no text.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PartFailure {
    pub kind: PartFailureKind,
    pub message: String,
}

impl From<&StripError> for PartFailure {
    fn from(err: &StripError) -> Self {
        let kind = match err {
            StripError::OcrTimeout { .. } => PartFailureKind::Timeout,
            StripError::OcrUnavailable(_) => PartFailureKind::Unavailable,
            _ => PartFailureKind::Service,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Result of one extraction call. The text is already normalized and may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub part_index: usize,
    pub result: Result<String, PartFailure>,
}

impl ExtractionOutcome {
    pub fn text(part_index: usize, text: String) -> Self {
        Self {
            part_index,
            result: Ok(text),
        }
    }

    pub fn failed(part_index: usize, failure: PartFailure) -> Self {
        Self {
            part_index,
            result: Err(failure),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TextBlock {
    pub part_index: usize,
    pub text: String,
}

/// Ordered, delimited text of every part that produced text.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MergedDocument {
    pub text: String,
    pub blocks: Vec<TextBlock>,
    pub parts_total: usize,
    pub failed_parts: Vec<usize>,
}

impl MergedDocument {
    /// Whether some parts failed and the text covers only a subset of the image.
    pub fn is_partial(&self) -> bool {
        !self.failed_parts.is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
