//! Chat-completion providers implementing [`slackrelay_core::LlmProvider`].

pub mod mock;
pub mod openai;

pub use mock::MockProvider;
pub use openai::OpenAiProvider;
