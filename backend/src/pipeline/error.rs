use super::classifier::ClassifierError;

/// Terminal failure of a single inference request.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("File must be an image (declared content type: {0:?})")]
    InvalidContentType(String),
    #[error("Invalid image file: {0}")]
    InvalidImageData(String),
    #[error("Model invocation failed: {0}")]
    ModelInvocation(#[from] ClassifierError),
    #[error("{0}")]
    Unclassified(String),
}

impl InferenceError {
    /// True when the caller sent something we cannot process.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            InferenceError::InvalidContentType(_) | InferenceError::InvalidImageData(_)
        )
    }
}
