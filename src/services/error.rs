use thiserror::Error;

use super::oracle::OracleError;
use super::pixels::PixelLoadError;
use crate::models::FAILED_TO_GET_IMAGE;

/// Every way a classification cycle can end without a result.
///
/// `Display` carries technical detail for the log; [`user_message`](Self::user_message)
/// is what ends up in `UiState::Error`.
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("No image reference was supplied")]
    ImageAcquisitionFailed,

    #[error(transparent)]
    ImageDecodeFailed(#[from] PixelLoadError),

    #[error("Classification oracle is not configured")]
    OracleNotConfigured,

    #[error("Oracle call failed: {0}")]
    OracleCallFailed(#[from] OracleError),

    #[error("Oracle returned no usable text (block reason: {block_reason:?}, finish reason: {finish_reason:?})")]
    OracleResponseBlocked {
        block_reason: Option<String>,
        finish_reason: Option<String>,
    },

    #[error("Oracle response has no recognizable classification")]
    ResponseParseFailed,

    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

impl ClassifyError {
    pub fn user_message(&self) -> String {
        match self {
            ClassifyError::ImageAcquisitionFailed => FAILED_TO_GET_IMAGE.to_string(),
            ClassifyError::ImageDecodeFailed(e) => e.user_message().to_string(),
            ClassifyError::OracleNotConfigured => "API Key Error. AI Disabled.".to_string(),
            ClassifyError::OracleCallFailed(_) => {
                "Analysis failed. Check your connection and try again.".to_string()
            }
            ClassifyError::OracleResponseBlocked {
                block_reason,
                finish_reason,
            } => {
                let reasons: Vec<&str> = [finish_reason, block_reason]
                    .into_iter()
                    .filter_map(|r| r.as_deref())
                    .collect();
                if reasons.is_empty() {
                    "Empty or blocked response from AI.".to_string()
                } else {
                    format!("Empty or blocked response from AI. Reason: {}", reasons.join(" / "))
                }
            }
            ClassifyError::ResponseParseFailed => {
                "Could not understand AI response format.".to_string()
            }
            ClassifyError::Unexpected(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}
