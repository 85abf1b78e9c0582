use anyhow::Context;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use base64::Engine;
use secrecy::{ExposeSecret, Secret};

use crate::startup::AppState;
use crate::store::UserStore;
use crate::telemetry::spawn_blocking_with_tracing;
use crate::utils::error_chain_fmt;

// Verified against when the email is unknown, so both paths cost one hash.
const FALLBACK_PASSWORD_HASH: &str = "$argon2id$v=19$m=15000,t=2,p=1$\
gZiV/M1gPc22ElAH/Jh1Hw$CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno";

#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: Secret<String>,
}

#[derive(thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials.")]
    InvalidCredentials(#[source] anyhow::Error),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::InvalidCredentials(e) => {
                tracing::warn!(error.cause_chain = ?e, "Authentication failed.");
                (
                    StatusCode::UNAUTHORIZED,
                    [(
                        header::WWW_AUTHENTICATE,
                        HeaderValue::from_static(r#"Basic realm="profile""#),
                    )],
                    Json(serde_json::json!({ "error": "Authentication failed." })),
                )
                    .into_response()
            }
            Self::UnexpectedError(e) => {
                tracing::error!("\nServer error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "Unexpected internal server error." })),
                )
                    .into_response()
            }
        }
    }
}

/// The authenticated caller. Handlers taking a `Principal` only run once the
/// Basic credentials on the request have been verified.
#[derive(Debug, Clone)]
pub struct Principal {
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let credentials =
            basic_authentication(&parts.headers).map_err(AuthError::InvalidCredentials)?;
        let email = validate_credentials(credentials, state.users.as_ref()).await?;
        Ok(Principal { email })
    }
}

pub fn basic_authentication(headers: &HeaderMap) -> Result<Credentials, anyhow::Error> {
    let header_value = headers
        .get(header::AUTHORIZATION)
        .context("The 'Authorization' header was missing.")?
        .to_str()
        .context("The 'Authorization' header was not a valid UTF-8 string.")?;
    let base64encoded_segment = header_value
        .strip_prefix("Basic ")
        .context("The 'Authorization' scheme was not 'Basic'.")?;
    let decoded_bytes = base64::engine::general_purpose::STANDARD
        .decode(base64encoded_segment)
        .context("Failed to base64-decode 'Basic' credentials.")?;
    let decoded_credentials = String::from_utf8(decoded_bytes)
        .context("The decoded credentials string is not valid UTF-8.")?;

    // Split into two segments using ":" as delimiter
    let mut credentials = decoded_credentials.splitn(2, ':');
    let username = credentials
        .next()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| anyhow::anyhow!("A username must be provided in 'Basic' auth."))?
        .to_string();
    let password = credentials
        .next()
        .ok_or_else(|| anyhow::anyhow!("A password must be provided in 'Basic' auth."))?
        .to_string();

    Ok(Credentials {
        username,
        password: Secret::new(password),
    })
}

/// Checks the password against the stored hash and returns the caller's
/// email on success.
#[tracing::instrument(name = "Validate credentials", skip(credentials, users))]
pub async fn validate_credentials(
    credentials: Credentials,
    users: &dyn UserStore,
) -> Result<String, AuthError> {
    let mut known_email = None;
    let mut expected_password_hash = Secret::new(FALLBACK_PASSWORD_HASH.to_string());

    if let Some(user) = users
        .find_user_by_email(&credentials.username)
        .await
        .context("Failed to retrieve stored credentials.")?
    {
        known_email = Some(user.email);
        expected_password_hash = user.password_hash;
    }

    spawn_blocking_with_tracing(move || {
        verify_password_hash(expected_password_hash, credentials.password)
    })
    .await
    .context("Failed to spawn blocking task.")??;

    known_email
        .ok_or_else(|| anyhow::anyhow!("Unknown email."))
        .map_err(AuthError::InvalidCredentials)
}

#[tracing::instrument(
    name = "Verify password hash",
    skip(expected_password_hash, password_candidate)
)]
fn verify_password_hash(
    expected_password_hash: Secret<String>,
    password_candidate: Secret<String>,
) -> Result<(), AuthError> {
    let expected_password_hash = PasswordHash::new(expected_password_hash.expose_secret())
        .context("Failed to parse hash in PHC string format.")?;

    Argon2::default()
        .verify_password(
            password_candidate.expose_secret().as_bytes(),
            &expected_password_hash,
        )
        .context("Invalid password.")
        .map_err(AuthError::InvalidCredentials)
}

/// Hashes a password into a PHC string with the parameters used for stored
/// credentials.
pub fn compute_password_hash(password: Secret<String>) -> Result<Secret<String>, anyhow::Error> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let password_hash = Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        Params::new(15000, 2, 1, None).context("Invalid argon2 parameters.")?,
    )
    .hash_password(password.expose_secret().as_bytes(), &salt)
    .context("Failed to hash password.")?
    .to_string();
    Ok(Secret::new(password_hash))
}
