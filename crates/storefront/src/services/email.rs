//! Email service for password restoration codes.
//!
//! Uses SMTP via lettre for delivery with Askama templates. Without SMTP
//! settings the service only logs what it would have sent.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use vitrina_core::Language;

use crate::config::EmailConfig;

/// HTML template for the restoration code email.
#[derive(Template)]
#[template(path = "email/restore_code.html")]
struct RestoreCodeHtml<'a> {
    code: &'a str,
    ukrainian: bool,
}

/// Plain text template for the restoration code email.
#[derive(Template)]
#[template(path = "email/restore_code.txt")]
struct RestoreCodeText<'a> {
    code: &'a str,
    ukrainian: bool,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Clone)]
struct Relay {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    relay: Option<Relay>,
}

impl EmailService {
    /// Create an email service. `None` yields a service that only logs.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: Option<&EmailConfig>) -> Result<Self, SmtpError> {
        let Some(config) = config else {
            tracing::warn!("SMTP_HOST not set, emails will be logged instead of sent");
            return Ok(Self::disabled());
        };

        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            relay: Some(Relay {
                mailer,
                from_address: config.from_address.clone(),
            }),
        })
    }

    /// A service that never connects anywhere.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { relay: None }
    }

    /// Send a password restoration code.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_restore_code(
        &self,
        to: &str,
        code: &str,
        lang: Language,
    ) -> Result<(), EmailError> {
        let ukrainian = lang == Language::Ua;
        let html = RestoreCodeHtml { code, ukrainian }.render()?;
        let text = RestoreCodeText { code, ukrainian }.render()?;
        let subject = if ukrainian {
            "Відновлення пароля"
        } else {
            "Password restoration"
        };

        self.send_multipart_email(to, subject, &text, &html).await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let Some(relay) = &self.relay else {
            tracing::info!(to = %to, subject = %subject, "Email not sent (SMTP disabled)");
            return Ok(());
        };

        let email = Message::builder()
            .from(
                relay
                    .from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(relay.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        relay.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// Generate a 6-digit verification code.
#[must_use]
pub fn generate_verification_code() -> String {
    use rand::Rng;
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_verification_code_format() {
        for _ in 0..100 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_templates_render_code() {
        let text = RestoreCodeText {
            code: "482913",
            ukrainian: false,
        }
        .render()
        .unwrap();
        assert!(text.contains("482913"));

        let html = RestoreCodeHtml {
            code: "482913",
            ukrainian: true,
        }
        .render()
        .unwrap();
        assert!(html.contains("482913"));
        assert!(html.contains("lang=\"uk\""));
    }

    #[tokio::test]
    async fn test_disabled_service_succeeds() {
        let email = EmailService::disabled();
        assert!(
            email
                .send_restore_code("olena@example.com", "123456", Language::En)
                .await
                .is_ok()
        );
    }
}
