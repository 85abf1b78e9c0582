use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::Secret;
use sqlx::PgPool;

use super::{NewOtp, OtpStore, PatchOutcome, ProfileStore, User, UserStore};
use crate::domain::ProfilePatch;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            password_hash: Secret::new(row.password),
        }
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    #[tracing::instrument(name = "Find user by email", skip(self))]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password FROM users
                WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query the users table.")?;

        Ok(row.map(User::from))
    }

    #[tracing::instrument(name = "Mark user email as verified", skip(self))]
    async fn mark_email_verified(&self, email: &str) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            UPDATE users SET is_email_verified = TRUE
                WHERE email = $1
            "#,
        )
        .bind(email)
        .execute(&self.pool)
        .await
        .context("Failed to mark the user's email as verified.")?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for PostgresStore {
    #[tracing::instrument(name = "Patch basic profile fields", skip(self, patch))]
    async fn patch_profile_basic(
        &self,
        user_id: i64,
        patch: &ProfilePatch,
    ) -> Result<PatchOutcome, anyhow::Error> {
        let (set_nick_name, nick_name) = match &patch.nick_name {
            None => (false, None),
            Some(value) => (true, value.as_ref().map(|n| n.as_ref())),
        };

        let result = sqlx::query(
            r#"
            UPDATE profiles SET
                name = COALESCE($2, name),
                nick_name = CASE WHEN $3 THEN $4 ELSE nick_name END,
                age = COALESCE($5, age),
                height = COALESCE($6, height),
                weight = COALESCE($7, weight)
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(patch.name.as_ref().map(|n| n.as_ref()))
        .bind(set_nick_name)
        .bind(nick_name)
        .bind(patch.age.map(|a| a.value()))
        .bind(patch.height.map(|h| h.value()))
        .bind(patch.weight.map(|w| w.value()))
        .execute(&self.pool)
        .await
        .context("Failed to update the profile.")?;

        if result.rows_affected() == 0 {
            Ok(PatchOutcome::ProfileMissing)
        } else {
            Ok(PatchOutcome::Applied)
        }
    }
}

#[async_trait]
impl OtpStore for PostgresStore {
    #[tracing::instrument(name = "Clear OTPs", skip(self))]
    async fn clear_otps(&self, email: &str) -> Result<(), anyhow::Error> {
        sqlx::query("DELETE FROM otps WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await
            .context("Failed to clear previous OTPs.")?;
        Ok(())
    }

    #[tracing::instrument(name = "Store OTP", skip(self, otp), fields(email = %otp.email))]
    async fn store_otp(&self, otp: &NewOtp) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            INSERT INTO otps (email, otp_code, is_used, created_at, expires_at)
                VALUES ($1, $2, FALSE, $3, $4)
            "#,
        )
        .bind(&otp.email)
        .bind(otp.code.as_ref())
        .bind(otp.created_at)
        .bind(otp.expires_at)
        .execute(&self.pool)
        .await
        .context("Failed to store the OTP.")?;
        Ok(())
    }

    #[tracing::instrument(name = "Check OTP", skip(self, code))]
    async fn is_otp_valid(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error> {
        let (valid,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM otps
                    WHERE email = $1
                    AND otp_code = $2
                    AND is_used = FALSE
                    AND expires_at > $3
            )
            "#,
        )
        .bind(email)
        .bind(code)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("Failed to look up the OTP.")?;
        Ok(valid)
    }

    #[tracing::instrument(name = "Mark OTPs as used", skip(self))]
    async fn mark_otps_used(&self, email: &str) -> Result<(), anyhow::Error> {
        sqlx::query("UPDATE otps SET is_used = TRUE WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await
            .context("Failed to mark OTPs as used.")?;
        Ok(())
    }

    #[tracing::instrument(name = "Delete expired OTPs", skip(self))]
    async fn delete_expired_otps(&self, now: DateTime<Utc>) -> Result<u64, anyhow::Error> {
        let result = sqlx::query("DELETE FROM otps WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .context("Failed to delete expired OTPs.")?;
        Ok(result.rows_affected())
    }
}
