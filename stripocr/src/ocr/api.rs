use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::OcrConfig;
use crate::error::{Result, StripError};

const OCR_SPACE_BASE_URL: &str = "https://api.ocr.space";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";

fn data_url(payload: &[u8], content_type: &str) -> String {
    format!("data:{content_type};base64,{}", STANDARD.encode(payload))
}

fn build_http_client(config: &OcrConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| StripError::Ocr(format!("Failed to create HTTP client: {e}")))
}

fn map_send_error(e: reqwest::Error, timeout_secs: u64) -> StripError {
    if e.is_timeout() {
        StripError::OcrTimeout { secs: timeout_secs }
    } else {
        StripError::Ocr(format!("API request failed: {e}"))
    }
}

// ---------------------------------------------------------------------------
// OCR.space
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct OcrSpaceClient {
    client: Client,
    api_key: String,
    base_url: String,
    engine: String,
    timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    #[serde(default)]
    parsed_results: Vec<OcrSpaceParsedResult>,
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceParsedResult {
    #[serde(default)]
    parsed_text: String,
}

/// OCR.space reports errors as a string or as a list of strings.
fn flatten_error_message(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
        None => "unknown error".to_string(),
    }
}

impl OcrSpaceClient {
    pub fn new(config: &OcrConfig, engine: &str) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| StripError::Ocr("API key required for OCR.space".to_string()))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| OCR_SPACE_BASE_URL.to_string());

        let engine = if engine.is_empty() { "2" } else { engine };

        Ok(Self {
            client: build_http_client(config)?,
            api_key,
            base_url,
            engine: engine.to_string(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn ocr(&self, payload: &[u8], content_type: &str, language: &str) -> Result<String> {
        let form = [
            ("apikey", self.api_key.clone()),
            ("base64Image", data_url(payload, content_type)),
            ("language", language.to_string()),
            ("OCREngine", self.engine.clone()),
            ("isOverlayRequired", "false".to_string()),
            ("detectOrientation", "true".to_string()),
            ("scale", "true".to_string()),
        ];

        let url = format!("{}/parse/image", self.base_url.trim_end_matches('/'));
        debug!(url = %url, bytes = payload.len(), "Sending OCR.space request");

        let resp = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout_secs))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StripError::Ocr(format!(
                "OCR.space request failed: {status} - {body}"
            )));
        }

        let parsed: OcrSpaceResponse = resp
            .json()
            .await
            .map_err(|e| StripError::Ocr(format!("Failed to parse OCR.space response: {e}")))?;

        if parsed.is_errored_on_processing {
            return Err(StripError::Ocr(format!(
                "OCR.space processing error: {}",
                flatten_error_message(parsed.error_message.as_ref())
            )));
        }

        Ok(parsed
            .parsed_results
            .into_iter()
            .map(|r| r.parsed_text)
            .collect::<String>())
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible vision chat
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct VisionChatClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

fn default_chat_base_url(provider: &str) -> &'static str {
    match provider {
        "mistral" => MISTRAL_BASE_URL,
        "deepseek" => DEEPSEEK_BASE_URL,
        _ => OPENAI_BASE_URL,
    }
}

fn extraction_prompt(language: &str) -> String {
    format!(
        "Extract all text from this image. The text is most likely in language '{language}'. \
         Return only the extracted text, top to bottom, without translation, explanations or formatting."
    )
}

impl VisionChatClient {
    pub fn new(config: &OcrConfig, provider: &str, model: &str) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| StripError::Ocr(format!("API key required for {provider} OCR")))?;

        if model.is_empty() {
            return Err(StripError::Ocr(format!("Model name required for {provider} OCR")));
        }

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_chat_base_url(provider).to_string());

        Ok(Self {
            client: build_http_client(config)?,
            api_key,
            base_url,
            model: model.to_string(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn ocr(&self, payload: &[u8], content_type: &str, language: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: extraction_prompt(language),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: data_url(payload, content_type),
                        },
                    },
                ],
            }],
            max_tokens: 4096,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(url = %url, model = %self.model, bytes = payload.len(), "Sending vision OCR request");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout_secs))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(StripError::Ocr(format!(
                "API rate limit exceeded: {status}"
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StripError::Ocr(format!("API request failed: {status} - {body}")));
        }

        let chat_response: ChatResponse = resp
            .json()
            .await
            .map_err(|e| StripError::Ocr(format!("Failed to parse response: {e}")))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| StripError::Ocr("No response from API".to_string()))
    }
}
