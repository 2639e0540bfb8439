// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::repositories::permit_repository::RepositoryError;
use crate::orchestrator::OrchestratorError;
use crate::store::StoreError;
use thiserror::Error;

/// 请求参数错误，映射为 400
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BadRequest(pub String);

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

fn status_for(error: &anyhow::Error) -> StatusCode {
    if error.downcast_ref::<BadRequest>().is_some() {
        return StatusCode::BAD_REQUEST;
    }
    if let Some(e) = error.downcast_ref::<OrchestratorError>() {
        return match e {
            OrchestratorError::UnknownAuthority(_) => StatusCode::BAD_REQUEST,
            OrchestratorError::RunNotFound => StatusCode::NOT_FOUND,
            OrchestratorError::RunAlreadyFinished(_) => StatusCode::CONFLICT,
            OrchestratorError::Repository(e) => repository_status(e),
        };
    }
    if let Some(e) = error.downcast_ref::<StoreError>() {
        return match e {
            StoreError::Repository(e) => repository_status(e),
            StoreError::PersistentConflict(_) => StatusCode::CONFLICT,
        };
    }
    if let Some(e) = error.downcast_ref::<RepositoryError>() {
        return repository_status(e);
    }
    StatusCode::INTERNAL_SERVER_ERROR
}

fn repository_status(e: &RepositoryError) -> StatusCode {
    match e {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        RepositoryError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
