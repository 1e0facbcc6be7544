use std::error::Error as StdError;

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::application::{error::AppError, error::ErrorReport, render::RenderError};
use crate::domain::error::ValidationError;

const SOURCE: &str = "infra::http::formula";

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const NO_RENDERER: &str = "no_renderer";
    pub const RENDER: &str = "render_error";
    pub const ENGINE: &str = "engine_error";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    hint: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            hint,
            report: None,
        }
    }

    /// Server-side failures keep their full source chain for the access log.
    fn with_source(mut self, error: &dyn StdError) -> Self {
        self.report = Some(ErrorReport::from_error(SOURCE, self.status, error));
        self
    }

    pub fn bad_request(message: impl Into<String>, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = format!(
            "{}: {}",
            self.code,
            self.hint.as_deref().unwrap_or(&self.message)
        );
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message,
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report
            .unwrap_or_else(|| ErrorReport::from_message(SOURCE, self.status, detail))
            .attach(&mut response);
        response
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid formula request",
            Some(err.to_string()),
        )
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        match &err {
            RenderError::NoRenderer { .. } => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::NO_RENDERER,
                "Unsupported output type",
                Some(err.to_string()),
            ),
            RenderError::Render { .. } => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::RENDER,
                "Formula could not be rendered",
                Some(err.to_string()),
            ),
            RenderError::Engine { .. } => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::ENGINE,
                "Typesetting engine failed",
                Some(err.to_string()),
            )
            .with_source(&err),
            RenderError::EmptyVector | RenderError::Rasterization(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                "Rendering failed",
                Some(err.to_string()),
            )
            .with_source(&err),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(err) => err.into(),
            AppError::Render(err) => err.into(),
            other => ApiError::new(
                other.status_code(),
                codes::INTERNAL,
                "Unexpected error occurred",
                Some(other.to_string()),
            )
            .with_source(&other),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request("Malformed query string", Some(rejection.body_text()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request("Malformed JSON body", Some(rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render::RasterError;

    fn report(error: ApiError) -> ErrorReport {
        let mut response = error.into_response();
        response
            .extensions_mut()
            .remove::<ErrorReport>()
            .expect("error report attached")
    }

    #[test]
    fn server_errors_report_their_source_chain() {
        let report = report(RenderError::from(RasterError::PixmapAlloc).into());
        assert_eq!(report.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            report.messages,
            [
                "rasterization failed: failed to allocate pixmap for raster rendering",
                "failed to allocate pixmap for raster rendering",
            ]
        );
    }

    #[test]
    fn client_errors_report_code_and_hint() {
        let report = report(RenderError::no_renderer("pdf").into());
        assert_eq!(report.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            report.messages,
            ["no_renderer: no renderer for output type `pdf`"]
        );
    }
}
