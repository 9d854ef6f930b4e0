pub mod openai_compat;
pub mod registry;
pub mod traits;
pub(crate) mod sse;
pub(crate) mod util;

// Re-exports for convenience.
pub use openai_compat::OpenAiCompatProvider;
pub use registry::{ProviderRegistry, ResolvedModel};
pub use traits::{ChatRequest, ChatResponse, LlmProvider};
