use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_macros::debug_handler;
use serde::{Deserialize, Deserializer};

use crate::authentication::Principal;
use crate::domain::{Age, BodyMeasure, NickName, ProfileName, ProfilePatch};
use crate::startup::AppState;
use crate::store::PatchOutcome;
use crate::utils::error_chain_fmt;

/// Body of `PATCH /api/profile/basic`. Every field is optional; a `null`
/// `nick_name` clears the nickname, a missing one leaves it alone.
#[derive(Deserialize, Debug, Default)]
pub struct ProfilePatchRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub nick_name: Option<Option<String>>,
    pub age: Option<i64>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
}

fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl TryFrom<ProfilePatchRequest> for ProfilePatch {
    type Error = String;

    fn try_from(value: ProfilePatchRequest) -> Result<Self, Self::Error> {
        let name = value.name.map(ProfileName::parse).transpose()?;
        let nick_name = match value.nick_name {
            None => None,
            Some(None) => Some(None),
            Some(Some(nick_name)) => Some(Some(NickName::parse(nick_name)?)),
        };
        let age = value.age.map(Age::parse).transpose()?;
        let height = value
            .height
            .map(|h| BodyMeasure::parse(h, "Height"))
            .transpose()?;
        let weight = value
            .weight
            .map(|w| BodyMeasure::parse(w, "Weight"))
            .transpose()?;

        Ok(Self {
            name,
            nick_name,
            age,
            height,
            weight,
        })
    }
}

#[derive(thiserror::Error)]
pub enum ProfileError {
    #[error("{0}")]
    ValidationError(String),
    #[error("User not found")]
    UserNotFound,
    #[error("Profile not found")]
    ProfileNotFound,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for ProfileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl IntoResponse for ProfileError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            Self::ValidationError(e) => {
                tracing::warn!("Rejected profile patch: {}", e);
                (StatusCode::BAD_REQUEST, e)
            }
            Self::UserNotFound => (StatusCode::NOT_FOUND, "User not found".to_owned()),
            Self::ProfileNotFound => (StatusCode::NOT_FOUND, "Profile not found".to_owned()),
            Self::UnexpectedError(e) => {
                tracing::error!("\nServer error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Unexpected internal server error.".to_owned(),
                )
            }
        };

        let body = Json(serde_json::json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[tracing::instrument(
    name = "Patch basic profile info",
    skip(state, principal, patch),
    fields(principal = %principal.email, user_id = tracing::field::Empty)
)]
#[debug_handler(state = AppState)]
pub async fn patch_basic_info(
    State(state): State<AppState>,
    principal: Principal,
    Json(patch): Json<ProfilePatchRequest>,
) -> Result<StatusCode, ProfileError> {
    let patch: ProfilePatch = patch.try_into().map_err(ProfileError::ValidationError)?;

    let current_user = state
        .users
        .find_user_by_email(&principal.email)
        .await
        .context("Failed to resolve the authenticated user.")?
        .ok_or(ProfileError::UserNotFound)?;
    tracing::Span::current().record("user_id", tracing::field::display(current_user.id));

    match state
        .profiles
        .patch_profile_basic(current_user.id, &patch)
        .await
        .context("Failed to apply the profile patch.")?
    {
        PatchOutcome::Applied => Ok(StatusCode::OK),
        PatchOutcome::ProfileMissing => Err(ProfileError::ProfileNotFound),
    }
}
