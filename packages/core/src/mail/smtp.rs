use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Mailer, ReportEmail, PDF_CONTENT_TYPE};
use crate::config::SmtpSettings;
use crate::error::DeliveryError;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends reports as MIME `multipart/mixed` messages over SMTP.
pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(from: &str, settings: &SmtpSettings) -> Result<Self, DeliveryError> {
        let from = parse_mailbox(from)?;

        // 465 is implicit TLS; everything else negotiates STARTTLS.
        let builder = if settings.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
        }
        .map_err(|err| DeliveryError::Transport(err.to_string()))?;

        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self { from, transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &ReportEmail) -> Result<(), DeliveryError> {
        let message = build_message(&self.from, email)?;

        self.transport
            .send(message)
            .await
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;

        Ok(())
    }

    fn transport_name(&self) -> &str {
        "smtp"
    }
}

/// HTML body part followed by the PDF attachment part.
pub fn build_message(from: &Mailbox, email: &ReportEmail) -> Result<Message, DeliveryError> {
    let to = parse_mailbox(&email.to)?;

    let content_type = ContentType::parse(PDF_CONTENT_TYPE)
        .map_err(|err| DeliveryError::Message(err.to_string()))?;
    let attachment = Attachment::new(email.attachment_name.clone())
        .body(email.attachment.clone(), content_type);

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.as_str())
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::html(email.html_body.clone()))
                .singlepart(attachment),
        )
        .map_err(|err| DeliveryError::Message(err.to_string()))
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse::<Mailbox>().map_err(|err| DeliveryError::Address {
        address: address.to_string(),
        message: err.to_string(),
    })
}
