use crate::engine::EngineError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rollcall_core::LocatorError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    MissingInput(&'static str),

    #[error("Invalid image data: {0}")]
    ImageDecodeFailure(String),

    #[error("No face detected in the image")]
    NoFaceDetected,

    #[error("Multiple faces detected ({0}). Please use a photo with only one face")]
    MultipleFacesDetected(usize),

    #[error("No registered faces")]
    NoRegisteredFaces,

    #[error("Database error: {0}")]
    PersistenceFailure(#[from] StoreError),

    #[error("Server error: {0}")]
    UnhandledException(String),
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Decode(e) => AppError::ImageDecodeFailure(e.to_string()),
            EngineError::Locator(LocatorError::NoFaceDetected | LocatorError::OutOfFrame) => {
                AppError::NoFaceDetected
            }
            EngineError::Locator(LocatorError::MultipleFacesDetected(n)) => {
                AppError::MultipleFacesDetected(n)
            }
            other => AppError::UnhandledException(other.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::UnhandledException(e.to_string())
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingInput(_)
            | AppError::ImageDecodeFailure(_)
            | AppError::NoFaceDetected
            | AppError::MultipleFacesDetected(_)
            | AppError::NoRegisteredFaces => StatusCode::BAD_REQUEST,
            AppError::PersistenceFailure(_) | AppError::UnhandledException(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        (
            status,
            Json(json!({
                "status": "error",
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}
