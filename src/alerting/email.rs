//! Email channel over SMTP
//!
//! Uses lettre's async transport, which keeps the blocking socket work
//! off the async workers. STARTTLS is negotiated when TLS is configured.

use std::future::Future;
use std::pin::Pin;

use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{AlertError, ChannelAlerter};
use crate::models::NotificationPayload;

/// Sends alerts as MIME multipart mail via SMTP
pub struct EmailAlerter {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl EmailAlerter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        username: Option<&str>,
        password: Option<&str>,
        use_tls: bool,
        from_name: &str,
        from_email: &str,
        recipients: &[String],
    ) -> Result<Self, AlertError> {
        if recipients.is_empty() {
            return Err(AlertError::Config("no email recipients configured".to_string()));
        }

        let mut builder = if use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)
                .map_err(|e| AlertError::Config(format!("SMTP relay setup failed: {}", e)))?
                .port(smtp_port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host).port(smtp_port)
        };

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        let from: Mailbox = format!("{} <{}>", from_name, from_email)
            .parse()
            .map_err(|e| AlertError::Config(format!("invalid from address: {}", e)))?;

        let recipients = recipients
            .iter()
            .map(|r| {
                r.parse::<Mailbox>()
                    .map_err(|e| AlertError::Config(format!("invalid recipient '{}': {}", r, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EmailAlerter {
            transport: builder.build(),
            from,
            recipients,
        })
    }

    fn build_message(&self, payload: &NotificationPayload) -> Result<Message, AlertError> {
        let subject = format!(
            "{} Alert: {}",
            payload.severity.to_string().to_uppercase(),
            payload.title
        );

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject)
            .date_now();
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }

        builder
            .multipart(
                MultiPart::alternative().singlepart(SinglePart::plain(payload.render_text())),
            )
            .map_err(|e| AlertError::Config(format!("failed to build message: {}", e)))
    }

    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), AlertError> {
        let message = self.build_message(payload)?;

        match self.transport.send(message).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // Failure class matters only for the logs; the public
                // contract stays a single transport error
                if e.is_timeout() {
                    log::warn!("SMTP delivery timed out: {}", e);
                } else if e.is_permanent() {
                    log::error!("SMTP server rejected message: {}", e);
                } else if e.is_client() {
                    log::error!("SMTP client-side failure (auth?): {}", e);
                } else {
                    log::warn!("SMTP delivery failed: {}", e);
                }
                Err(AlertError::Smtp(e.to_string()))
            }
        }
    }
}

impl ChannelAlerter for EmailAlerter {
    fn name(&self) -> &'static str {
        "email"
    }

    fn send_alert<'a>(
        &'a self,
        payload: &'a NotificationPayload,
    ) -> Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + 'a>> {
        Box::pin(self.deliver(payload))
    }
}
