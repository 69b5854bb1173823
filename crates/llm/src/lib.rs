//! Model gateway adapter.
//!
//! Implements [`pipeline::ModelGateway`] against the Together chat-completions
//! API. HTTP status codes and transport failures are mapped onto
//! [`pipeline::GatewayError`] so the pipeline can classify them without knowing
//! anything about HTTP.
//!
//! | Module       | Contents                                         |
//! |--------------|--------------------------------------------------|
//! | [`together`] | [`TogetherClient`], request/response wire types  |
//! | [`error`]    | [`ClientError`] for the management calls         |
//!
//! The client never retries. Rate-limit advice (`Retry-After`) is surfaced on
//! the returned error and left to the caller.

pub mod error;
pub mod together;

pub use error::ClientError;
pub use together::{
    ModelInfo, ModelPricing, TogetherClient, TogetherConfig, DEFAULT_BASE_URL,
    DEFAULT_HTTP_TIMEOUT,
};
