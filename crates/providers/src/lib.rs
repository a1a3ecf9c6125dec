//! LLM Provider implementations for turnstile.
//!
//! All providers implement the `turnstile_core::Provider` trait.
//! The router selects the correct provider based on configuration, and
//! `ProviderReasoner` turns any provider into a structured-output reasoner.

pub mod openai_compat;
pub mod reasoner;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use reasoner::ProviderReasoner;
pub use router::{build_from_config, ProviderRouter};
