pub mod error;
pub mod traits;

pub use error::RelayError;
pub use traits::{LlmProvider, LlmRequest, LlmResponse, MessagingClient, PostedMessage};
