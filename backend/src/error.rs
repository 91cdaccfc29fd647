use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use shared::ErrorResponse;

use crate::pipeline::InferenceError;

/// Failures that happen before the pipeline sees the upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file uploaded")]
    MissingFile,
    #[error("Malformed upload: {0}")]
    Malformed(String),
    #[error("File too large (limit {limit} bytes)")]
    TooLarge { limit: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl ApiError {
    /// Message sent to the client.
    fn detail(&self) -> String {
        match self {
            ApiError::Inference(InferenceError::InvalidContentType(_)) => {
                "File must be an image".to_string()
            }
            ApiError::Inference(InferenceError::InvalidImageData(_)) => {
                "Invalid image file".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Upload(UploadError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Upload(_) => StatusCode::BAD_REQUEST,
            ApiError::Inference(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.detail()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ClassifierError;

    #[test]
    fn client_errors_map_to_400() {
        let err = ApiError::from(InferenceError::InvalidContentType("text/plain".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.detail(), "File must be an image");

        let err = ApiError::from(InferenceError::InvalidImageData("bad magic".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.detail(), "Invalid image file");
    }

    #[test]
    fn server_errors_carry_the_underlying_message() {
        let err = ApiError::from(InferenceError::ModelInvocation(ClassifierError::Backend(
            "device lost".into(),
        )));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail(), "Model invocation failed: device lost");

        let err = ApiError::from(InferenceError::Unclassified("thread pool gone".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail(), "thread pool gone");
    }

    #[test]
    fn upload_errors() {
        assert_eq!(
            ApiError::from(UploadError::MissingFile).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(UploadError::TooLarge { limit: 10 }).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}
