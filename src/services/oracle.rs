use async_trait::async_trait;
use thiserror::Error;

use crate::models::Pixels;

/// One classification request: the image plus the fixed prompt.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub pixels: Pixels,
    pub prompt: String,
}

/// Whatever the oracle sent back.
///
/// `text` is `None` when the service answered but produced no candidate text
/// (safety block, empty candidate). The reasons are passed through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OracleReply {
    pub text: Option<String>,
    pub block_reason: Option<String>,
    pub finish_reason: Option<String>,
}

impl OracleReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn blocked(block_reason: Option<String>, finish_reason: Option<String>) -> Self {
        Self {
            text: None,
            block_reason,
            finish_reason,
        }
    }

    /// The reply text, if there is any that is not whitespace.
    pub fn usable_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Call-level failures. The variants carry technical detail for logs only.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed oracle response: {0}")]
    MalformedResponse(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Image classifier that answers a prompt about a picture.
///
/// Implementations make exactly one attempt per call; retrying is not their job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    /// Short identifier for logs, e.g. the model name.
    fn name(&self) -> &str;

    async fn generate(&self, request: OracleRequest) -> Result<OracleReply, OracleError>;
}
