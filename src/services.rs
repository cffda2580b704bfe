use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use diesel::result::DatabaseErrorKind;
use serde_json::json;
use thiserror::Error;

use crate::db::DbError;
use crate::models::ValidationErrors;

pub mod messages;
pub mod rooms;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed")]
    Validation(ValidationErrors),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("database error: {0}")]
    Db(#[from] DbError),
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<BlockingError> for ServiceError {
    fn from(err: BlockingError) -> Self {
        Self::Db(Box::new(err))
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::Validation(errors) => HttpResponse::UnprocessableEntity().json(json!({
                "errors": errors,
            })),
            Self::Forbidden(message) => HttpResponse::Forbidden().json(json!({
                "message": message,
            })),
            Self::NotFound(message) => HttpResponse::NotFound().json(json!({
                "message": message,
            })),
            Self::Db(err) => {
                log::error!("database error: {err}");
                HttpResponse::InternalServerError().json(json!({
                    "message": "internal server error",
                }))
            }
        }
    }
}

pub(crate) fn is_unique_violation(err: &DbError) -> bool {
    matches!(
        err.downcast_ref::<diesel::result::Error>(),
        Some(diesel::result::Error::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            _
        ))
    )
}
