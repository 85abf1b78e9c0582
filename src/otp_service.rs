use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::task::JoinHandle;

use crate::domain::{OtpCode, UserEmail, OTP_VALIDITY_MINUTES};
use crate::otp_email::{EmailService, SendOtpEmailError};
use crate::store::{NewOtp, OtpStore, UserStore};
use crate::utils::error_chain_fmt;

#[derive(thiserror::Error)]
pub enum OtpError {
    #[error("User not found")]
    UserNotFound,
    #[error("Invalid or expired OTP")]
    InvalidOtp,
    #[error(transparent)]
    SendEmail(#[from] SendOtpEmailError),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for OtpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Issues verification codes, emails them and checks them back.
pub struct OtpService {
    users: Arc<dyn UserStore>,
    otps: Arc<dyn OtpStore>,
    email_service: EmailService,
}

impl OtpService {
    pub fn new(
        users: Arc<dyn UserStore>,
        otps: Arc<dyn OtpStore>,
        email_service: EmailService,
    ) -> Self {
        Self {
            users,
            otps,
            email_service,
        }
    }

    /// Replaces any outstanding codes for `email` with a fresh one and mails it.
    #[tracing::instrument(name = "Resend OTP", skip(self), fields(email = %email))]
    pub async fn resend_otp(&self, email: &UserEmail) -> Result<(), OtpError> {
        self.require_user(email).await?;

        let code = OtpCode::generate();
        let created_at = Utc::now();
        let otp = NewOtp {
            email: email.as_ref().to_owned(),
            code: code.clone(),
            created_at,
            expires_at: created_at + chrono::Duration::minutes(OTP_VALIDITY_MINUTES),
        };

        self.otps
            .clear_otps(email.as_ref())
            .await
            .context("Failed to clear previous OTPs.")?;
        self.otps
            .store_otp(&otp)
            .await
            .context("Failed to store the new OTP.")?;

        self.email_service
            .send_otp_email(email.as_ref(), code.as_ref())
            .await?;
        Ok(())
    }

    #[tracing::instrument(name = "Verify email", skip(self, otp), fields(email = %email))]
    pub async fn verify_email(&self, email: &UserEmail, otp: &str) -> Result<(), OtpError> {
        self.require_user(email).await?;

        let code = OtpCode::parse(otp.to_owned()).map_err(|_| OtpError::InvalidOtp)?;
        let valid = self
            .otps
            .is_otp_valid(email.as_ref(), code.as_ref(), Utc::now())
            .await
            .context("Failed to check the OTP.")?;
        if !valid {
            return Err(OtpError::InvalidOtp);
        }

        self.otps
            .mark_otps_used(email.as_ref())
            .await
            .context("Failed to mark OTPs as used.")?;
        self.users
            .mark_email_verified(email.as_ref())
            .await
            .context("Failed to mark the email as verified.")?;
        Ok(())
    }

    #[tracing::instrument(name = "Purge expired OTPs", skip(self))]
    pub async fn purge_expired(&self) -> Result<u64, anyhow::Error> {
        self.otps.delete_expired_otps(Utc::now()).await
    }

    async fn require_user(&self, email: &UserEmail) -> Result<(), OtpError> {
        self.users
            .find_user_by_email(email.as_ref())
            .await
            .context("Failed to look up the user.")?
            .map(|_| ())
            .ok_or(OtpError::UserNotFound)
    }
}

/// Deletes expired codes every `period`. Failures are logged and the loop
/// keeps going.
pub fn spawn_otp_cleanup(service: Arc<OtpService>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period.max(Duration::from_secs(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match service.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Deleted expired OTPs"),
                Err(e) => tracing::error!(
                    error.cause_chain = ?e,
                    "Failed to delete expired OTPs"
                ),
            }
        }
    })
}
