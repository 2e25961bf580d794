use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures_util::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, info};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers verification codes out of band.
pub trait Mailer: Send + Sync {
    fn send_verification<'a>(
        &'a self,
        email: &'a str,
        username: &'a str,
        code: &'a str,
    ) -> BoxFuture<'a, Result<()>>;
}

pub struct VerificationEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub fn verification_email(username: &str, code: &str) -> VerificationEmail {
    VerificationEmail {
        subject: "Hush | Verification code for your account".to_string(),
        html: format!(
            "<p>Hello {username},</p>\
             <p>Thank you for registering. Use the following code to verify your account:</p>\
             <p><strong>{code}</strong></p>\
             <p>If you did not request this code, please ignore this email.</p>"
        ),
        text: format!(
            "Hello {username},\n\nYour Hush verification code is {code}.\n\n\
             If you did not request this code, please ignore this email.\n"
        ),
    }
}

#[derive(Debug, Serialize)]
struct ResendEmailBody<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Sends mail through the Resend HTTP API.
pub struct ResendMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: String, from: String) -> Result<Self> {
        Self::with_endpoint(RESEND_ENDPOINT.to_string(), SEND_TIMEOUT, api_key, from)
    }

    fn with_endpoint(
        endpoint: String,
        timeout: Duration,
        api_key: String,
        from: String,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building mail HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            from,
        })
    }
}

impl Mailer for ResendMailer {
    fn send_verification<'a>(
        &'a self,
        email: &'a str,
        username: &'a str,
        code: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mail = verification_email(username, code);
            let body = ResendEmailBody {
                from: &self.from,
                to: [email],
                subject: &mail.subject,
                html: &mail.html,
                text: &mail.text,
            };

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;

            let status = resp.status();
            if status.is_success() {
                debug!("Verification email sent to {}", email);
                return Ok(());
            }

            let detail = resp.text().await.unwrap_or_default();
            bail!("Resend send failed (status={status}): {detail}")
        })
    }
}

/// Development mailer: writes the code to the log instead of sending it.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_verification<'a>(
        &'a self,
        email: &'a str,
        username: &'a str,
        code: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            info!("Verification code for {} <{}>: {}", username, email, code);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_carries_username_and_code() {
        let mail = verification_email("alice", "482910");
        assert!(mail.subject.contains("Verification code"));
        assert!(mail.html.contains("alice"));
        assert!(mail.html.contains("482910"));
        assert!(mail.text.contains("482910"));
    }

    #[test]
    fn resend_body_shape() {
        let body = ResendEmailBody {
            from: "onboarding@resend.dev",
            to: ["a@x.com"],
            subject: "s",
            html: "<p>h</p>",
            text: "t",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["to"], serde_json::json!(["a@x.com"]));
        assert_eq!(json["from"], "onboarding@resend.dev");
    }

    #[tokio::test]
    async fn stalled_provider_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer.
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mailer = ResendMailer::with_endpoint(
            format!("http://{addr}/emails"),
            Duration::from_millis(200),
            "key".into(),
            "onboarding@resend.dev".into(),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let result = mailer.send_verification("a@x.com", "alice", "123456").await;
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        LogMailer
            .send_verification("a@x.com", "alice", "123456")
            .await
            .unwrap();
    }
}
