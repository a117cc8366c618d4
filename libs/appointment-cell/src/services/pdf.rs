use std::io::BufWriter;

use chrono::Utc;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use crate::models::{AppointmentError, ReportDocument};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const WRAP_COLUMNS: usize = 90;

/// Writes lines top to bottom, starting a new A4 page when the bottom
/// margin is reached.
struct PageCursor {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl PageCursor {
    fn new(title: &str) -> Result<Self, AppointmentError> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| AppointmentError::PdfError(format!("font error: {e}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| AppointmentError::PdfError(format!("font error: {e}")))?;

        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
        })
    }

    fn ensure_space(&mut self, height: f32) {
        if self.y - height < MARGIN {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn text(&mut self, text: &str, size: f32, bold: bool, indent: f32) {
        let advance = size * 0.45 + 1.5;
        self.ensure_space(advance);
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(MARGIN + indent), Mm(self.y), font);
        self.y -= advance;
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn field(&mut self, label: &str, value: &str) {
        self.text(&format!("{}: {}", label, value), 10.0, false, 0.0);
    }

    fn section(&mut self, heading: &str, body: &str) {
        self.gap(3.0);
        self.text(heading, 11.0, true, 0.0);
        for line in wrap_text(body, WRAP_COLUMNS) {
            self.text(&line, 10.0, false, 4.0);
        }
    }

    fn finish(self) -> Result<Vec<u8>, AppointmentError> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| AppointmentError::PdfError(format!("save error: {e}")))?;
        buf.into_inner()
            .map_err(|e| AppointmentError::PdfError(format!("buffer error: {e}")))
    }
}

/// Renders an appointment report as an A4 PDF.
pub fn render_report_pdf(document: &ReportDocument) -> Result<Vec<u8>, AppointmentError> {
    let report = &document.report;
    let mut cursor = PageCursor::new(&format!("{} - Appointment Report", document.clinic_name))?;

    cursor.text(&document.clinic_name, 16.0, true, 0.0);
    cursor.text("Appointment Report", 12.0, false, 0.0);
    cursor.gap(4.0);

    cursor.field("Patient", &document.patient_name);
    if let Some(dob) = document.patient_date_of_birth {
        cursor.field("Date of birth", &dob.format("%d/%m/%Y").to_string());
    }
    cursor.field("Doctor", &document.doctor_name);
    cursor.field(
        "Appointment",
        &format!(
            "{} at {}",
            document.appointment_date.format("%d/%m/%Y"),
            document.appointment_time
        ),
    );
    if let Some(treatment_type) = &document.treatment_type {
        cursor.field("Treatment type", treatment_type);
    }

    cursor.section("Diagnosis", &report.diagnosis);
    cursor.section("Treatment performed", &report.treatment_performed);
    if let Some(recommendations) = &report.recommendations {
        cursor.section("Recommendations", recommendations);
    }
    if let Some(prescriptions) = &report.prescriptions {
        cursor.section("Prescriptions", prescriptions);
    }
    if let Some(next_visit) = report.next_visit {
        cursor.section("Next visit", &next_visit.format("%d/%m/%Y").to_string());
    }

    cursor.gap(8.0);
    cursor.text(
        &format!("Generated {}", Utc::now().format("%d/%m/%Y %H:%M UTC")),
        8.0,
        false,
        0.0,
    );

    cursor.finish()
}

/// Greedy word wrap; blank input yields one empty line so sections keep
/// their spacing.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if !current.is_empty() && current.len() + word.len() + 1 > max_chars {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
