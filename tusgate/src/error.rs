use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TusError {
    // Startup errors, fatal for the embedding service
    #[error("invalid tus listen address `{0}`")]
    InvalidListenAddr(String),

    #[error("failed to launch tus server `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to attach tus server {0}")]
    OutputStream(&'static str),

    #[error("tus server did not become ready within {0:?}")]
    NotReady(Duration),

    #[error("tus server exited during startup: {0}")]
    ExitedEarly(ExitStatus),

    // Control plane errors
    #[error("object id must not be empty")]
    InvalidObjectId,

    #[error("expected tus status code 201, got {0}")]
    UnexpectedStatus(reqwest::StatusCode),

    #[error("missing Location header in tus response")]
    MissingLocation,

    #[error("tus request failed: {0}")]
    Transport(#[from] reqwest::Error),

    // Finish errors
    #[error("unable to find upload for {0}")]
    UploadUnknown(String),

    #[error("session location `{0}` does not name an upload file")]
    InvalidLocation(String),

    #[error("finished upload {} is unavailable: {source}", path.display())]
    FinishedUpload {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("content store rejected {oid}: {source}")]
    Store {
        oid: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid object id: {0}")]
    OidInvalid(String),

    #[error(transparent)]
    Tus(#[from] TusError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::OidInvalid(_) => StatusCode::BAD_REQUEST,
            Self::Tus(err) => match err {
                TusError::InvalidObjectId => StatusCode::BAD_REQUEST,
                TusError::UploadUnknown(_) => StatusCode::NOT_FOUND,
                TusError::FinishedUpload { .. } => StatusCode::CONFLICT,
                TusError::UnexpectedStatus(_)
                | TusError::MissingLocation
                | TusError::Transport(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!("Generating response for AppError: {:?}", self);
        } else {
            tracing::debug!("Generating response for AppError: {:?}", self);
        }

        // Internal details stay in the log.
        let message = if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            "an internal server error occurred".to_string()
        } else {
            self.to_string()
        };
        (status_code, Json(json!({ "message": message }))).into_response()
    }
}
