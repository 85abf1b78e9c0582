//! Persistence seams. Handlers and services only see these traits; the
//! running binary plugs in [`PostgresStore`].

mod postgres;

pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::Secret;

use crate::domain::{OtpCode, ProfilePatch};

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: Secret<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error>;

    async fn mark_email_verified(&self, email: &str) -> Result<(), anyhow::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    /// The user exists but has not created a profile yet.
    ProfileMissing,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn patch_profile_basic(
        &self,
        user_id: i64,
        patch: &ProfilePatch,
    ) -> Result<PatchOutcome, anyhow::Error>;
}

#[derive(Debug, Clone)]
pub struct NewOtp {
    pub email: String,
    pub code: OtpCode,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn clear_otps(&self, email: &str) -> Result<(), anyhow::Error>;

    async fn store_otp(&self, otp: &NewOtp) -> Result<(), anyhow::Error>;

    /// True when an unused, unexpired OTP with this code exists for `email`.
    async fn is_otp_valid(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error>;

    async fn mark_otps_used(&self, email: &str) -> Result<(), anyhow::Error>;

    /// Returns how many rows were removed.
    async fn delete_expired_otps(&self, now: DateTime<Utc>) -> Result<u64, anyhow::Error>;
}
