use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::Serialize;

use super::{Mailer, ReportEmail, PDF_CONTENT_TYPE};
use crate::config::HttpApiSettings;
use crate::error::DeliveryError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
    attachments: Vec<AttachmentPayload<'a>>,
}

#[derive(Debug, Serialize)]
struct AttachmentPayload<'a> {
    filename: &'a str,
    content: String,
    content_type: &'a str,
}

/// Posts reports to a transactional email HTTP API as JSON with a base64
/// encoded attachment, authenticated by bearer token.
#[derive(Clone)]
pub struct HttpMailer {
    from: String,
    api_url: String,
    api_key: String,
    http: Client,
}

impl HttpMailer {
    pub fn new(from: &str, settings: &HttpApiSettings) -> Result<Self, DeliveryError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;

        Ok(Self {
            from: from.to_string(),
            api_url: settings.api_url.clone(),
            api_key: settings.api_key.clone(),
            http,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &ReportEmail) -> Result<(), DeliveryError> {
        let payload = SendEmailRequest {
            from: &self.from,
            to: vec![email.to.as_str()],
            subject: &email.subject,
            html: &email.html_body,
            attachments: vec![AttachmentPayload {
                filename: &email.attachment_name,
                content: STANDARD.encode(&email.attachment),
                content_type: PDF_CONTENT_TYPE,
            }],
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected { status: status.as_u16(), body });
        }

        Ok(())
    }

    fn transport_name(&self) -> &str {
        "http"
    }
}
