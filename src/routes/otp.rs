use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::domain::UserEmail;
use crate::otp_service::OtpError;
use crate::startup::AppState;

#[derive(Deserialize)]
pub struct ResendOtpRequest {
    email: String,
}

#[derive(Deserialize)]
pub struct VerifyEmailRequest {
    email: String,
    otp: String,
}

/// HTTP rendering of [`OtpError`] plus request validation failures.
pub struct OtpApiError {
    status: StatusCode,
    message: String,
}

impl From<OtpError> for OtpApiError {
    fn from(e: OtpError) -> Self {
        let status = match &e {
            OtpError::UserNotFound => StatusCode::NOT_FOUND,
            OtpError::InvalidOtp => StatusCode::BAD_REQUEST,
            OtpError::SendEmail(_) | OtpError::UnexpectedError(_) => {
                tracing::error!("\nServer error: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match &e {
            OtpError::UnexpectedError(_) => "Unexpected internal server error.".to_owned(),
            other => other.to_string(),
        };
        Self { status, message }
    }
}

impl IntoResponse for OtpApiError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(serde_json::json!({
            "error": self.message
        }));
        (self.status, body).into_response()
    }
}

fn parse_email(raw: String) -> Result<UserEmail, OtpApiError> {
    UserEmail::parse(raw).map_err(|message| OtpApiError {
        status: StatusCode::BAD_REQUEST,
        message,
    })
}

#[tracing::instrument(name = "Resend OTP request", skip(state, body))]
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(body): Json<ResendOtpRequest>,
) -> Result<impl IntoResponse, OtpApiError> {
    let email = parse_email(body.email)?;
    state.otp_service.resend_otp(&email).await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "OTP resent successfully!" })),
    ))
}

#[tracing::instrument(name = "Verify email request", skip(state, body))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(body): Json<VerifyEmailRequest>,
) -> Result<impl IntoResponse, OtpApiError> {
    let email = parse_email(body.email)?;
    state.otp_service.verify_email(&email, &body.otp).await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Email verified successfully!" })),
    ))
}
