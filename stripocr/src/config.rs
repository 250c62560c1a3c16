use serde::Deserialize;
use std::env;

use crate::error::{Result, StripError};

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse a comma-separated list env var, lowercasing and dropping empty entries.
fn parse_env_list(var: &str, default: &[&str]) -> Vec<String> {
    match env::var(var) {
        Ok(val) if !val.trim().is_empty() => val
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}

/// Env files cannot carry raw newlines comfortably, so `\n` and `\t` escapes are expanded.
fn unescape_delimiter(raw: &str) -> String {
    raw.replace("\\n", "\n").replace("\\t", "\t")
}

pub const DEFAULT_SEGMENT_DELIMITER: &str = "\n\n-----\n\n";

/// Largest width or height the JPEG encoder accepts.
pub const MAX_ENCODABLE_DIMENSION: u32 = 65_535;

pub const MAX_UPSCALE_FACTOR: f32 = 4.0;

pub const MAX_DENOISE_RADIUS: u32 = 8;

const DEFAULT_SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ocr: OcrConfig,
    pub splitting: SplitConfig,
    pub compression: CompressionConfig,
    pub pipeline: PipelineConfig,
    pub input: InputConfig,
    pub preprocessing: PreprocessConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Language hint forwarded on every extraction call (ISO 639-2, e.g. `kor`).
    pub language: String,
    pub timeout_secs: u64,
}

/// Thresholds that decide whether an image is split, and the strip height when it is.
#[derive(Debug, Clone, Deserialize)]
pub struct SplitConfig {
    pub strip_height_px: u32,
    pub max_single_height_px: u32,
    pub max_single_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompressionConfig {
    pub max_part_bytes: usize,
    pub start_quality: u8,
    pub floor_quality: u8,
    pub step: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub pacing_interval_ms: u64,
    pub segment_delimiter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    pub max_input_bytes: usize,
    pub supported_formats: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreprocessConfig {
    pub enabled: bool,
    pub equalize: bool,
    /// Median filter radius; 0 skips denoising.
    pub denoise_radius: u32,
    pub binarize: bool,
    pub upscale_below_height: u32,
    pub upscale_factor: f32,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            strip_height_px: 2000,
            max_single_height_px: 2000,
            max_single_bytes: 1_000_000,
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_part_bytes: 1_000_000,
            start_quality: 90,
            floor_quality: 20,
            step: 10,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pacing_interval_ms: 1500,
            segment_delimiter: DEFAULT_SEGMENT_DELIMITER.to_string(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 50 * 1024 * 1024,
            supported_formats: DEFAULT_SUPPORTED_FORMATS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            equalize: true,
            denoise_radius: 1,
            binarize: true,
            upscale_below_height: 1000,
            upscale_factor: 2.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let split = SplitConfig::default();
        let compression = CompressionConfig::default();
        let pipeline = PipelineConfig::default();
        let input = InputConfig::default();
        let preprocessing = PreprocessConfig::default();

        Self {
            ocr: OcrConfig {
                model: env::var("OCR_MODEL").unwrap_or_else(|_| "ocrspace/2".to_string()),
                api_key: env::var("OCR_API_KEY").ok(),
                base_url: env::var("OCR_BASE_URL").ok(),
                language: env::var("OCR_LANGUAGE").unwrap_or_else(|_| "kor".to_string()),
                timeout_secs: parse_env_or("OCR_TIMEOUT", 60),
            },
            splitting: SplitConfig {
                strip_height_px: parse_env_or("STRIP_HEIGHT_PX", split.strip_height_px),
                max_single_height_px: parse_env_or(
                    "MAX_SINGLE_HEIGHT_PX",
                    split.max_single_height_px,
                ),
                max_single_bytes: parse_env_or("MAX_SINGLE_BYTES", split.max_single_bytes),
            },
            compression: CompressionConfig {
                max_part_bytes: parse_env_or("MAX_PART_BYTES", compression.max_part_bytes),
                start_quality: parse_env_or("COMPRESSOR_START_QUALITY", compression.start_quality),
                floor_quality: parse_env_or("COMPRESSOR_FLOOR_QUALITY", compression.floor_quality),
                step: parse_env_or("COMPRESSOR_STEP", compression.step),
            },
            pipeline: PipelineConfig {
                pacing_interval_ms: parse_env_or("PACING_INTERVAL_MS", pipeline.pacing_interval_ms),
                segment_delimiter: env::var("SEGMENT_DELIMITER")
                    .map(|raw| unescape_delimiter(&raw))
                    .unwrap_or(pipeline.segment_delimiter),
            },
            input: InputConfig {
                max_input_bytes: parse_env_or("MAX_INPUT_BYTES", input.max_input_bytes),
                supported_formats: parse_env_list("SUPPORTED_FORMATS", DEFAULT_SUPPORTED_FORMATS),
            },
            preprocessing: PreprocessConfig {
                enabled: parse_env_or("PREPROCESS_ENHANCE", preprocessing.enabled),
                equalize: parse_env_or("PREPROCESS_EQUALIZE", preprocessing.equalize),
                denoise_radius: parse_env_or(
                    "PREPROCESS_DENOISE_RADIUS",
                    preprocessing.denoise_radius,
                ),
                binarize: parse_env_or("PREPROCESS_BINARIZE", preprocessing.binarize),
                upscale_below_height: parse_env_or(
                    "PREPROCESS_UPSCALE_BELOW",
                    preprocessing.upscale_below_height,
                ),
                upscale_factor: parse_env_or(
                    "PREPROCESS_UPSCALE_FACTOR",
                    preprocessing.upscale_factor,
                ),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Reject settings that would make partitioning or the quality search ill-defined.
    pub fn validate(&self) -> Result<()> {
        let split = &self.splitting;
        if split.strip_height_px == 0 {
            return Err(StripError::Validation(
                "STRIP_HEIGHT_PX must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("STRIP_HEIGHT_PX", split.strip_height_px),
            ("MAX_SINGLE_HEIGHT_PX", split.max_single_height_px),
        ] {
            if value > MAX_ENCODABLE_DIMENSION {
                return Err(StripError::Validation(format!(
                    "{name} ({value}) exceeds the encoder limit of {MAX_ENCODABLE_DIMENSION} pixels"
                )));
            }
        }

        let c = &self.compression;
        if c.max_part_bytes == 0 {
            return Err(StripError::Validation(
                "MAX_PART_BYTES must be greater than 0".to_string(),
            ));
        }
        if c.step == 0 {
            return Err(StripError::Validation(
                "COMPRESSOR_STEP must be greater than 0".to_string(),
            ));
        }
        if c.floor_quality == 0 || c.start_quality > 100 {
            return Err(StripError::Validation(format!(
                "Compressor qualities must lie in 1..=100 (start={}, floor={})",
                c.start_quality, c.floor_quality
            )));
        }
        if c.floor_quality > c.start_quality {
            return Err(StripError::Validation(format!(
                "COMPRESSOR_FLOOR_QUALITY ({}) must not exceed COMPRESSOR_START_QUALITY ({})",
                c.floor_quality, c.start_quality
            )));
        }

        if self.pipeline.segment_delimiter.trim().is_empty() {
            return Err(StripError::Validation(
                "SEGMENT_DELIMITER must contain a visible separator".to_string(),
            ));
        }

        let pre = &self.preprocessing;
        if pre.enabled && !(1.0..=MAX_UPSCALE_FACTOR).contains(&pre.upscale_factor) {
            return Err(StripError::Validation(format!(
                "PREPROCESS_UPSCALE_FACTOR must lie in 1.0..={MAX_UPSCALE_FACTOR} (got {})",
                pre.upscale_factor
            )));
        }
        if pre.enabled && pre.denoise_radius > MAX_DENOISE_RADIUS {
            return Err(StripError::Validation(format!(
                "PREPROCESS_DENOISE_RADIUS must not exceed {MAX_DENOISE_RADIUS}"
            )));
        }

        Ok(())
    }
}

/// Known OCR backends, selected by the prefix of `OCR_MODEL`.
pub const KNOWN_OCR_PROVIDERS: &[&str] = &["ocrspace", "openai", "mistral", "deepseek", "local"];

/// Parse an OCR model name into (provider, model) tuple.
pub fn parse_ocr_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_OCR_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    // Bare names are treated as local engines
    ("local", model)
}
