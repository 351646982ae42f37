use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use fleetwatch::MonitorError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Monitor(#[from] MonitorError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Monitor(MonitorError::DeviceNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Monitor(
                MonitorError::DeviceAlreadyRegistered(_) | MonitorError::CheckerAlreadyRegistered(_),
            ) => StatusCode::CONFLICT,
            ApiError::Monitor(MonitorError::InvalidInterval(_)) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
