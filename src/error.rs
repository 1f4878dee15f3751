use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Upload exceeds the limit of {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Failed to create job directory: {0}")]
    DirectoryCreation(#[source] std::io::Error),

    #[error("Failed to process the sheet music with the OMR engine.")]
    EngineExecution { exit_code: i32, stderr: String },

    #[error("The OMR engine did not finish within {} seconds.", .0.as_secs())]
    EngineTimeout(Duration),

    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl From<std::io::Error> for JobError {
    fn from(err: std::io::Error) -> Self {
        JobError::Unexpected(err.to_string())
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl JobError {
    fn details(&self) -> Option<String> {
        match self {
            JobError::EngineExecution { stderr, .. } => Some(stderr.clone()),
            JobError::EngineTimeout(_) => Some("The engine process was killed.".to_owned()),
            _ => None,
        }
    }
}

impl ResponseError for JobError {
    fn status_code(&self) -> StatusCode {
        match self {
            JobError::Validation(_) => StatusCode::BAD_REQUEST,
            JobError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            JobError::DirectoryCreation(_)
            | JobError::EngineExecution { .. }
            | JobError::EngineTimeout(_)
            | JobError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
            details: self.details(),
        })
    }
}
