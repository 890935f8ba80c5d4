//! A4 PDF output for a [`ReportDocument`] using the PDF base-14 fonts.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use super::document::{ReportDocument, ReportTable};
use crate::error::RenderError;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const ROW_HEIGHT: f32 = 6.0;

/// Column widths in mm.
const OVERALL_COLUMNS: [f32; 4] = [45.0, 22.0, 40.0, 65.0];
const SENSOR_COLUMNS: [f32; 6] = [32.0, 18.0, 38.0, 18.0, 38.0, 18.0];

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Writes text top-down, starting new pages when the bottom margin is hit.
struct PageCursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl<'a> PageCursor<'a> {
    fn new(doc: &'a PdfDocumentReference, layer: PdfLayerReference) -> Self {
        Self { doc, layer, y: PAGE_HEIGHT - MARGIN }
    }

    fn ensure_room(&mut self, height: f32) -> bool {
        if self.y - height >= MARGIN {
            return false;
        }
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
        true
    }

    fn line(&mut self, text: &str, size: f32, font: &IndirectFontRef, advance: f32) {
        self.ensure_room(advance);
        self.layer.use_text(text, size, Mm(MARGIN), Mm(self.y), font);
        self.y -= advance;
    }

    fn row(&mut self, cells: &[String], widths: &[f32], size: f32, font: &IndirectFontRef) {
        let mut x = MARGIN;
        for (cell, width) in cells.iter().zip(widths) {
            if !cell.is_empty() {
                self.layer.use_text(cell.as_str(), size, Mm(x), Mm(self.y), font);
            }
            x += width;
        }
        self.y -= ROW_HEIGHT;
    }

    fn table(&mut self, table: &ReportTable, widths: &[f32], size: f32, fonts: &Fonts) {
        self.y -= 4.0;
        self.line(&table.heading, 16.0, &fonts.bold, 9.0);
        self.ensure_room(ROW_HEIGHT * 2.0);
        self.row(&table.columns, widths, size, &fonts.bold);

        for row in &table.rows {
            // Repeat the header on each continuation page.
            if self.ensure_room(ROW_HEIGHT) {
                self.row(&table.columns, widths, size, &fonts.bold);
            }
            self.row(row, widths, size, &fonts.regular);
        }
    }
}

/// Render `report` to PDF bytes.
pub fn render_pdf(report: &ReportDocument) -> Result<Vec<u8>, RenderError> {
    let (doc, page, layer) =
        PdfDocument::new(report.title.as_str(), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");

    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|err| RenderError::Pdf(err.to_string()))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|err| RenderError::Pdf(err.to_string()))?,
    };

    {
        let mut cursor = PageCursor::new(&doc, doc.get_page(page).get_layer(layer));

        cursor.line(&report.title, 20.0, &fonts.bold, 10.0);
        cursor.line(&report.period, 12.0, &fonts.regular, 10.0);

        cursor.table(&report.overall, &OVERALL_COLUMNS, 10.0, &fonts);
        if let Some(note) = &report.note {
            cursor.line(note, 12.0, &fonts.regular, 8.0);
        }

        cursor.y -= 6.0;
        cursor.table(&report.sensors, &SENSOR_COLUMNS, 8.0, &fonts);
    }

    doc.save_to_bytes()
        .map_err(|err| RenderError::Pdf(err.to_string()))
}
