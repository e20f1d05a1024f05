//! LLM provider abstraction

pub mod openai;
pub mod router;
pub mod types;

pub use openai::OpenAiProvider;
pub use router::ModelRouter;
pub use types::{
    LlmBlock, LlmContent, LlmMessage, LlmProvider, LlmResponse, LlmResponseBlock, LlmRole,
    LlmUsage, StopReason,
};
