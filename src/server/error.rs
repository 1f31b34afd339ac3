use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::core::DatabaseError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The requested entity does not exist
    #[error("{0}")]
    NotFound(String),
    /// A statement failed; `context` is what the client sees
    #[error("{context}")]
    Database {
        context: String,
        #[source]
        source: DatabaseError,
    },
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Attach a client-facing message to a database failure
pub trait DatabaseContext<T> {
    fn context(self, context: impl Into<String>) -> ApiResult<T>;
}

impl<T> DatabaseContext<T> for Result<T, DatabaseError> {
    fn context(self, context: impl Into<String>) -> ApiResult<T> {
        self.map_err(|source| ApiError::Database {
            context: context.into(),
            source,
        })
    }
}

/// Response envelope shared by every route
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn data(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        })
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            message: Some(message.into()),
            error: None,
        })
    }

    fn failure(error: String) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            message: None,
            error: Some(error),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database { context, source } => {
                tracing::error!(
                    error = %source,
                    kind = ?source.kind(),
                    "{context}"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Envelope::failure(self.to_string())).into_response()
    }
}
