use reqwest::{Client, Url};
use secrecy::{ExposeSecret, Secret};

use crate::domain::UserEmail;

/// Client for a Postmark-compatible HTTP mail API.
pub struct EmailClient {
    http_client: Client,
    base_url: Url,
    sender: UserEmail,
    authorization_token: Secret<String>,
}

impl EmailClient {
    pub fn new(
        base_url: Url,
        sender: UserEmail,
        authorization_token: Secret<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            sender,
            authorization_token,
        })
    }

    /// Submits a single message. Non-2xx responses are returned as errors.
    pub async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), reqwest::Error> {
        // Only fails for cannot-be-a-base URLs.
        let url = match self.base_url.join("email") {
            Ok(url) => url,
            Err(_) => self.base_url.clone(),
        };
        let request_body = SendEmailRequest {
            from: self.sender.as_ref(),
            to: recipient,
            subject,
            html_body: html_content,
            text_body: text_content,
        };

        self.http_client
            .post(url)
            .header(
                "X-Postmark-Server-Token",
                self.authorization_token.expose_secret(),
            )
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
}
