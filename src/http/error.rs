use log::error;
use rouille::Response;
use serde::Serialize;
use thiserror::Error;

use crate::{catalog::CatalogError, domain::track::ValidationError, storage::error::StorageError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::TrackNotFound(_) => ApiError::NotFound("Song not found".into()),

            StorageError::Database(_) | StorageError::Internal(_) => {
                error!("storage failure: {err}");
                ApiError::Internal("internal server error".into())
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(format!("Invalid song data: {err}"))
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotConfigured => ApiError::Unavailable("Song search is not configured".into()),
            other => {
                error!("catalog failure: {other}");
                ApiError::Internal("Failed to search songs".into())
            }
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized => 401,
            ApiError::Unavailable(_) => 503,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn into_response(self) -> Response {
        let message = self.to_string();
        Response::json(&ErrorBody { error: &message }).with_status_code(self.status_code())
    }
}
