use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dog_tenancy::TenancyError;

/// A [`TenancyError`] on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct TenancyRejection {
    pub error: TenancyError,
    pub expose_diagnostics: bool,
}

impl TenancyRejection {
    pub fn new(error: TenancyError, expose_diagnostics: bool) -> Self {
        Self {
            error,
            expose_diagnostics,
        }
    }
}

impl From<TenancyError> for TenancyRejection {
    fn from(error: TenancyError) -> Self {
        Self::new(error, false)
    }
}

impl IntoResponse for TenancyRejection {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self.error, "tenancy failure");
        } else {
            tracing::debug!(error = %self.error, reason = self.error.reason(), "tenant request rejected");
        }

        (status, Json(self.error.to_json(self.expose_diagnostics))).into_response()
    }
}
