use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

#[cfg(feature = "tesseract")]
use std::sync::Arc;

#[cfg(feature = "tesseract")]
use leptess::LepTess;
#[cfg(feature = "tesseract")]
use tokio::sync::Mutex;

use crate::config::{parse_ocr_provider_model, OcrConfig};
use crate::error::{Result, StripError};

use super::api::{OcrSpaceClient, VisionChatClient};
use super::TextExtractor;

#[derive(Clone)]
enum OcrApiClient {
    OcrSpace(OcrSpaceClient),
    Vision(VisionChatClient),
}

impl OcrApiClient {
    async fn ocr(&self, payload: &[u8], content_type: &str, language: &str) -> Result<String> {
        match self {
            OcrApiClient::OcrSpace(c) => c.ocr(payload, content_type, language).await,
            OcrApiClient::Vision(c) => c.ocr(payload, content_type, language).await,
        }
    }
}

#[derive(Clone)]
enum OcrBackend {
    #[cfg(feature = "tesseract")]
    Local { tesseract: Arc<Mutex<LepTess>> },
    Api { client: OcrApiClient },
    Unavailable { reason: String },
}

/// The process-wide text extraction handle.
///
/// Built once at startup and shared (behind `Arc`) by every job. Cloning is cheap:
/// HTTP backends share a pooled client, the local engine is loaded once.
#[derive(Clone)]
pub struct OcrProvider {
    backend: OcrBackend,
    config: OcrConfig,
}

fn unavailable(reason: String) -> OcrBackend {
    warn!("{}", reason);
    OcrBackend::Unavailable { reason }
}

#[cfg(feature = "tesseract")]
fn create_local_backend(config: &OcrConfig) -> OcrBackend {
    match LepTess::new(None, &config.language) {
        Ok(lt) => {
            info!(language = %config.language, "Tesseract OCR initialized");
            OcrBackend::Local {
                tesseract: Arc::new(Mutex::new(lt)),
            }
        }
        Err(e) => unavailable(format!("Tesseract not available: {e}")),
    }
}

#[cfg(not(feature = "tesseract"))]
fn create_local_backend(_config: &OcrConfig) -> OcrBackend {
    unavailable(
        "Tesseract support not compiled in; rebuild with `--features tesseract`".to_string(),
    )
}

impl OcrProvider {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let (provider, model) = parse_ocr_provider_model(&config.model);

        let backend = match provider.to_lowercase().as_str() {
            "ocrspace" => match OcrSpaceClient::new(config, model) {
                Ok(client) => {
                    info!(engine = %model, "OCR.space backend initialized");
                    OcrBackend::Api {
                        client: OcrApiClient::OcrSpace(client),
                    }
                }
                Err(e) => unavailable(format!("OCR.space backend unavailable: {e}")),
            },
            name @ ("openai" | "mistral" | "deepseek") => {
                match VisionChatClient::new(config, name, model) {
                    Ok(client) => {
                        info!(provider = %name, model = %model, "Vision OCR backend initialized");
                        OcrBackend::Api {
                            client: OcrApiClient::Vision(client),
                        }
                    }
                    Err(e) => unavailable(format!("{name} OCR backend unavailable: {e}")),
                }
            }
            _ => create_local_backend(config),
        };

        Ok(Self {
            backend,
            config: config.clone(),
        })
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, OcrBackend::Unavailable { .. })
    }

    pub async fn ocr(&self, payload: &[u8], content_type: &str, language: &str) -> Result<String> {
        let timeout_duration = Duration::from_secs(self.config.timeout_secs);

        let result = tokio::time::timeout(
            timeout_duration,
            self.ocr_internal(payload, content_type, language),
        )
        .await;

        match result {
            Ok(inner_result) => inner_result,
            Err(_) => Err(StripError::OcrTimeout {
                secs: self.config.timeout_secs,
            }),
        }
    }

    async fn ocr_internal(
        &self,
        payload: &[u8],
        content_type: &str,
        language: &str,
    ) -> Result<String> {
        match &self.backend {
            #[cfg(feature = "tesseract")]
            OcrBackend::Local { tesseract } => {
                let bytes = payload.to_vec();
                let tesseract = Arc::clone(tesseract);

                let text = tokio::task::spawn_blocking(move || {
                    let mut lt = tesseract.blocking_lock();
                    lt.set_image_from_mem(&bytes)
                        .map_err(|e| StripError::Ocr(format!("Failed to set image: {e}")))?;
                    lt.get_utf8_text()
                        .map_err(|e| StripError::Ocr(format!("Failed to extract text: {e}")))
                })
                .await
                .map_err(|e| StripError::Ocr(format!("OCR task panicked: {e}")))??;

                Ok(text)
            }
            OcrBackend::Api { client } => client.ocr(payload, content_type, language).await,
            OcrBackend::Unavailable { reason } => {
                Err(StripError::OcrUnavailable(reason.clone()))
            }
        }
    }
}

#[async_trait]
impl TextExtractor for OcrProvider {
    async fn extract(
        &self,
        payload: &[u8],
        content_type: &str,
        language_hint: &str,
    ) -> Result<String> {
        self.ocr(payload, content_type, language_hint).await
    }

    fn is_available(&self) -> bool {
        OcrProvider::is_available(self)
    }
}
