//! API handlers

pub mod account;
pub mod auth;
pub mod health;

use crate::error::AppError;
use axum::{extract::rejection::JsonRejection, Json};

/// Unwrap a JSON body, turning axum's rejection into a 400
pub(crate) fn parse_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::InvalidArgument(rejection.body_text()))
}
