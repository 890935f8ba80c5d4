//! Report rendering.
//!
//! [`ReportDocument`] decides what goes on the page, [`render_pdf`] lays it
//! out, and [`ReportRenderer`] keeps a copy of each rendered file in the
//! scheduler's working directory (which the cleanup loop later prunes).

pub mod document;
pub mod pdf;

use std::path::PathBuf;

use crate::error::RenderError;
use crate::scheduler::window::ReportWindow;

pub use document::ReportDocument;
pub use pdf::render_pdf;

/// A rendered report ready to attach.
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub filename: String,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ReportRenderer {
    output_dir: PathBuf,
}

impl ReportRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    /// Render `document` and write it to
    /// `<output_dir>/temperature-report-<job>-<start date>.pdf`.
    pub async fn render(
        &self,
        job_id: &str,
        document: &ReportDocument,
        window: &ReportWindow,
    ) -> Result<RenderedReport, RenderError> {
        let bytes = render_pdf(document)?;

        let filename = attachment_filename(window);
        let path = self.output_dir.join(format!(
            "temperature-report-{}-{}.pdf",
            sanitize(job_id),
            window.start_date_label()
        ));

        tokio::fs::create_dir_all(&self.output_dir).await?;
        tokio::fs::write(&path, &bytes).await?;

        tracing::debug!("Wrote {} ({} bytes)", path.display(), bytes.len());

        Ok(RenderedReport { filename, path, bytes })
    }
}

/// Name the recipient sees: `temperature-report-YYYY-MM-DD.pdf`.
pub fn attachment_filename(window: &ReportWindow) -> String {
    format!("temperature-report-{}.pdf", window.start_date_label())
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
