//! LLM Provider implementations for Pengate.
//!
//! All providers implement the `pengate_core::Provider` trait.
//! The router selects the correct provider based on configuration and the
//! request's model override.

pub mod anthropic;
pub mod openai_compat;
pub mod router;
mod sse;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, ResolvedModel, build_from_config};
