//! Core types and traits for the AI Studio service client.
//!
//! Provides the provider-agnostic vocabulary shared by the transport and the
//! client: `Request`, `Prompt`, `Attachment`, `Completion`, `StreamChunk`,
//! `ModelDescriptor`, the error taxonomy, the TOML `Config`, and the
//! `Provider` trait every upstream backend implements.

pub use {
    config::{
        ApiKey, Config, ProviderConfig, QuotaConfig, QuotaLimits, RegistryConfig, RetryConfig,
        SafetySetting, SessionConfig, WorkspaceConfig, expand_env_vars,
    },
    error::{CancelReason, Error, ProviderError, ProviderErrorKind, redact},
    model::{DEFAULT_TOKEN_FLOOR, ModelDescriptor, RemoteModel, default_token_limit},
    prompt::{Attachment, Prompt, Request},
    provider::Provider,
    response::{Completion, StreamChunk, TextChunk, Usage},
};

mod config;
mod error;
mod model;
mod prompt;
mod provider;
mod response;
