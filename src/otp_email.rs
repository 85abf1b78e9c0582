use crate::domain::OTP_VALIDITY_MINUTES;
use crate::email_client::EmailClient;
use crate::utils::error_chain_fmt;

pub const OTP_EMAIL_SUBJECT: &str = "Your Email Verification Code";

/// The rendered verification email, ready to hand to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpEmail {
    pub subject: &'static str,
    pub html_body: String,
    pub text_body: String,
}

pub fn compose_otp_email(otp: &str) -> OtpEmail {
    let html_body = format!(
        "<h3>Hello,</h3>\
        <p>Thank you for signing up. Please use the following One-Time Password (OTP) \
        to verify your email address:</p>\
        <h2>{}</h2>\
        <p>This OTP is valid for {} minutes. If you did not request this, \
        please ignore this email.</p>\
        <br>\
        <p>Best regards,<br>She&amp;Soul Team</p>",
        htmlescape::encode_minimal(otp),
        OTP_VALIDITY_MINUTES
    );
    let text_body = format!(
        "Hello,\n\
        Thank you for signing up. Please use the following One-Time Password (OTP) \
        to verify your email address: {}\n\
        This OTP is valid for {} minutes. If you did not request this, \
        please ignore this email.\n\n\
        Best regards,\nShe&Soul Team",
        otp, OTP_VALIDITY_MINUTES
    );
    OtpEmail {
        subject: OTP_EMAIL_SUBJECT,
        html_body,
        text_body,
    }
}

#[derive(thiserror::Error)]
#[error("Failed to send OTP email.")]
pub struct SendOtpEmailError(#[source] reqwest::Error);

impl std::fmt::Debug for SendOtpEmailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

pub struct EmailService {
    email_client: EmailClient,
}

impl EmailService {
    pub fn new(email_client: EmailClient) -> Self {
        Self { email_client }
    }

    /// Sends the verification email once. Neither argument is validated and
    /// transport failures are not retried.
    #[tracing::instrument(name = "Send OTP email", skip(self, to, otp), fields(email = %to))]
    pub async fn send_otp_email(&self, to: &str, otp: &str) -> Result<(), SendOtpEmailError> {
        let email = compose_otp_email(otp);
        self.email_client
            .send_email(to, email.subject, &email.html_body, &email.text_body)
            .await
            .map_err(|e| {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Failed to send OTP email: {}",
                    e
                );
                SendOtpEmailError(e)
            })
    }
}
