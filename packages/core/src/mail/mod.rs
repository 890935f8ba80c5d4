//! Report delivery.
//!
//! Two transports are supported: plain SMTP ([`smtp::SmtpMailer`]) and a
//! managed transactional-email HTTP API ([`http::HttpMailer`]). Both take a
//! [`ReportEmail`] and report success or failure synchronously; nothing
//! tracks delivery receipts.

pub mod http;
pub mod smtp;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::MailSettings;
use crate::error::DeliveryError;
use crate::report::document::format_date;
use crate::report::RenderedReport;
use crate::scheduler::window::ReportWindow;

pub const REPORT_SUBJECT: &str = "Your Scheduled Temperature Report";
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A report email with its PDF attachment.
#[derive(Debug, Clone)]
pub struct ReportEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachment_name: String,
    pub attachment: Vec<u8>,
}

impl ReportEmail {
    pub fn for_report(to: impl Into<String>, window: &ReportWindow, report: &RenderedReport) -> Self {
        Self {
            to: to.into(),
            subject: REPORT_SUBJECT.to_string(),
            html_body: html_body(window),
            attachment_name: report.filename.clone(),
            attachment: report.bytes.clone(),
        }
    }
}

fn html_body(window: &ReportWindow) -> String {
    format!(
        concat!(
            "<div style=\"font-family: Arial, sans-serif;\">\n",
            "  <h2>{}</h2>\n",
            "  <p>Please find your temperature report attached.</p>\n",
            "  <p>Report period: {} to {}</p>\n",
            "</div>\n"
        ),
        REPORT_SUBJECT,
        format_date(window.start),
        format_date(window.end)
    )
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &ReportEmail) -> Result<(), DeliveryError>;

    /// Short transport name for logs.
    fn transport_name(&self) -> &str;
}

/// Build the configured mailer.
pub fn build_mailer(from: &str, settings: &MailSettings) -> Result<Arc<dyn Mailer>, DeliveryError> {
    let mailer: Arc<dyn Mailer> = match settings {
        MailSettings::Smtp(smtp) => Arc::new(smtp::SmtpMailer::new(from, smtp)?),
        MailSettings::Http(api) => Arc::new(http::HttpMailer::new(from, api)?),
    };
    Ok(mailer)
}
