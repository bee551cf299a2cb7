//! REST route handlers, grouped by resource.

pub mod admin;
pub mod health;
pub mod search;
pub mod users;
pub mod works;

use axum::Json;
use axum::extract::Query;
use axum::extract::rejection::{JsonRejection, QueryRejection};

use crate::error::ApiError;

/// Unwrap a JSON body, reporting malformed input in the error envelope.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|e| ApiError::Validation(e.body_text()))
}

/// Unwrap query parameters, reporting malformed input in the error envelope.
pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query.map(|Query(value)| value).map_err(|e| ApiError::Validation(e.body_text()))
}
