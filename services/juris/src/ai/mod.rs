//! services/juris/src/ai/mod.rs
//!
//! The AI request gateway: prompt construction, retry policy and output
//! cleanup on top of the `AiProvider` port.

pub mod audio;
pub mod gateway;
pub mod prompts;
pub mod retry;
pub mod text;

pub use gateway::{is_quota_error, is_usable_key, AiGateway};
pub use retry::{with_retry, RetryFailure, RetryPolicy};
