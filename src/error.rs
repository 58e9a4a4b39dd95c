//! Error taxonomy shared by the MCP servers and the chat services.
//!
//! - `Validation`: a required argument is missing or malformed (400)
//! - `NotFound`: unknown tool, prompt, resource or record (404)
//! - `Remote`: a backend answered with an error status; status and body are relayed
//! - `Transport`: the backend could not be reached at all (500)

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Backend returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("MCP server error: {0}")]
    Transport(String),
}

impl ServiceError {
    pub fn missing_fields(missing: &[&str]) -> Self {
        ServiceError::Validation(format!("Missing required arguments: {}", missing.join(", ")))
    }

    /// True for a backend 404, which the multi-transport client treats as "try the next base".
    pub fn is_remote_not_found(&self) -> bool {
        matches!(self, ServiceError::Remote { status: 404, .. })
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ServiceError::Remote {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => ServiceError::Transport(err.to_string()),
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Remote { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ServiceError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // relay the backend body untouched so callers see the original detail
            ServiceError::Remote { body, .. } => body.clone(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "message": message }))
    }
}
