// Common test utilities for integration tests
#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Mutex, Once};
use std::time::Instant;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use tokio_util::sync::CancellationToken;

use stripocr::config::{
    CompressionConfig, Config, InputConfig, OcrConfig, PipelineConfig, PreprocessConfig,
    SplitConfig,
};
use stripocr::error::{Result, StripError};
use stripocr::ocr::TextExtractor;

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// A config that does not read the environment.
pub fn test_config(pacing_ms: u64) -> Config {
    Config {
        ocr: OcrConfig {
            model: "ocrspace/2".to_string(),
            api_key: None,
            base_url: None,
            language: "kor".to_string(),
            timeout_secs: 5,
        },
        splitting: SplitConfig::default(),
        compression: CompressionConfig::default(),
        pipeline: PipelineConfig {
            pacing_interval_ms: pacing_ms,
            ..PipelineConfig::default()
        },
        input: InputConfig::default(),
        preprocessing: PreprocessConfig::default(),
    }
}

/// Encode a blank RGB image of the given size as PNG.
pub fn png_image(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("Failed to encode PNG fixture");
    buf.into_inner()
}

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail,
    Timeout,
}

pub fn text(s: &str) -> Reply {
    Reply::Text(s.to_string())
}

#[derive(Debug, Clone)]
pub struct Call {
    pub started: Instant,
    pub payload_len: usize,
    pub content_type: String,
    pub language: String,
}

/// Extractor that answers from a script and records every call.
///
/// Calls past the end of the script get `Reply::Text("part N")`.
pub struct ScriptedExtractor {
    replies: Vec<Reply>,
    calls: Mutex<Vec<Call>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl ScriptedExtractor {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            calls: Mutex::new(Vec::new()),
            cancel_after: None,
        }
    }

    /// Cancel `token` as soon as the `n`th call (1-based) has been answered.
    pub fn cancel_after(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

#[async_trait]
impl TextExtractor for ScriptedExtractor {
    async fn extract(&self, payload: &[u8], content_type: &str, language_hint: &str) -> Result<String> {
        let n = {
            let mut calls = self.calls.lock().expect("calls lock poisoned");
            calls.push(Call {
                started: Instant::now(),
                payload_len: payload.len(),
                content_type: content_type.to_string(),
                language: language_hint.to_string(),
            });
            calls.len() - 1
        };

        if let Some((after, token)) = &self.cancel_after {
            if n + 1 == *after {
                token.cancel();
            }
        }

        match self.replies.get(n) {
            Some(Reply::Text(s)) => Ok(s.clone()),
            Some(Reply::Fail) => Err(StripError::Ocr(format!("scripted failure on call {n}"))),
            Some(Reply::Timeout) => Err(StripError::OcrTimeout { secs: 1 }),
            None => Ok(format!("part {n}")),
        }
    }
}

// Re-export commonly used crates for convenience
pub use serial_test::serial;
pub use wiremock;
