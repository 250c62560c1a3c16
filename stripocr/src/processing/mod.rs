mod compress;
mod orchestrator;
mod partition;
mod pipeline;

pub use compress::{compress, compress_strip, CompressedPayload, CompressionParams, PAYLOAD_CONTENT_TYPE};
pub(crate) use compress::over_white;
pub use orchestrator::{merge_outcomes, normalize_text, ExtractionOrchestrator};
pub use partition::{crop_strip, decode_image, partition, plan_strips};
pub use pipeline::JobDriver;
