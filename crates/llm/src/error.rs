//! Errors of the management calls (`list_models`, `test_connection`).
//!
//! Generation calls report [`pipeline::GatewayError`] instead, since that is
//! what the pipeline classifies.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("model endpoint rejected the credentials")]
    Unauthorized,

    #[error("model endpoint returned HTTP {status}: {body}")]
    Server { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
