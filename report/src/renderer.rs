//! PDF report rendering
//!
//! Single-analysis and batch summary reports on A4 pages using the built-in
//! Helvetica fonts. Built-in fonts only cover WinAnsi, so every string is
//! reduced to ASCII before it is placed on the page.

use chrono::{DateTime, Utc};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference, Point, Rgb,
};
use uuid::Uuid;

use crate::error::{ReportError, Result};
use shared::{AnalysisResult, BatchReport, DISCLAIMER, DiagnosticClass, Patient, RiskLevel};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const BODY_SIZE: f32 = 10.0;
/// Characters per line for wrapped body text at `BODY_SIZE`
const WRAP_WIDTH: usize = 95;
const PT_TO_MM: f32 = 0.3528;
/// Failures listed by name on the batch summary
const MAX_BATCH_FAILURE_LINES: usize = 5;

/// Attachment / download name for a single analysis report
pub fn report_file_name(analysis_id: Uuid) -> String {
    format!("colpovision-report-{}.pdf", &analysis_id.simple().to_string()[..8])
}

/// Download name for a batch summary
pub fn batch_report_file_name(batch_id: Uuid) -> String {
    format!("colpovision-batch-{}.pdf", &batch_id.simple().to_string()[..8])
}

/// Reduce text to printable ASCII, folding common accented letters
pub fn ascii_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c,
            'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
            'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ç' => 'c',
            'Ç' => 'C',
            '\t' | '\n' | '\r' => ' ',
            '–' | '—' => '-',
            '‘' | '’' => '\'',
            '“' | '”' => '"',
            _ => '?',
        })
        .collect()
}

/// Greedy word wrap; words longer than `width` are split
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word);
            word = rest;
        }
        if current.is_empty() {
            current = word;
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(&word);
        } else {
            lines.push(std::mem::replace(&mut current, word));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn risk_color(risk: RiskLevel) -> Color {
    match risk {
        RiskLevel::Low => Color::Rgb(Rgb::new(0.13, 0.55, 0.13, None)),
        RiskLevel::Medium => Color::Rgb(Rgb::new(0.85, 0.55, 0.0, None)),
        RiskLevel::High => Color::Rgb(Rgb::new(0.8, 0.1, 0.1, None)),
    }
}

fn black() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn font_error(e: impl std::fmt::Display) -> ReportError {
    ReportError::Font(e.to_string())
}

/// Cursor over a growing document
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    pages: usize,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(ascii_text(title), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Page 1");
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(font_error)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(font_error)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
            pages: 1,
        })
    }

    fn line_height(size: f32) -> f32 {
        size * PT_TO_MM * 1.45
    }

    /// Start a new page when `height` no longer fits
    fn ensure(&mut self, height: f32) {
        if self.y - height >= MARGIN {
            return;
        }
        self.pages += 1;
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Page {}", self.pages));
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn text_at(&self, text: &str, size: f32, x: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(ascii_text(text), size, Mm(x), Mm(self.y), font);
    }

    fn heading(&mut self, text: &str, size: f32) {
        let height = Self::line_height(size);
        self.ensure(height);
        self.y -= height;
        self.text_at(text, size, MARGIN, true);
    }

    fn line(&mut self, text: &str) {
        let height = Self::line_height(BODY_SIZE);
        self.ensure(height);
        self.y -= height;
        self.text_at(text, BODY_SIZE, MARGIN, false);
    }

    fn field(&mut self, label: &str, value: &str) {
        let height = Self::line_height(BODY_SIZE);
        self.ensure(height);
        self.y -= height;
        self.text_at(label, BODY_SIZE, MARGIN, true);
        self.text_at(value, BODY_SIZE, MARGIN + 45.0, false);
    }

    fn colored_field(&mut self, label: &str, value: &str, color: Color) {
        let height = Self::line_height(BODY_SIZE);
        self.ensure(height);
        self.y -= height;
        self.text_at(label, BODY_SIZE, MARGIN, true);
        self.layer.set_fill_color(color);
        self.text_at(value, BODY_SIZE, MARGIN + 45.0, true);
        self.layer.set_fill_color(black());
    }

    /// Left-aligned cells at fixed x offsets from the margin
    fn row(&mut self, cells: &[(&str, f32)], bold: bool) {
        let height = Self::line_height(BODY_SIZE);
        self.ensure(height);
        self.y -= height;
        for (text, offset) in cells {
            self.text_at(text, BODY_SIZE, MARGIN + offset, bold);
        }
    }

    fn paragraph(&mut self, text: &str) {
        for line in wrap(&ascii_text(text), WRAP_WIDTH) {
            self.line(&line);
        }
    }

    fn rule(&mut self) {
        self.ensure(4.0);
        self.y -= 2.0;
        self.layer.set_outline_thickness(0.5);
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN), Mm(self.y)), false),
                (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(self.y)), false),
            ],
            is_closed: false,
        });
        self.y -= 2.0;
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    /// Vertical space left on the current page
    fn remaining(&self) -> f32 {
        self.y - MARGIN
    }

    /// Body lines that fit in `height`
    fn lines_fitting(height: f32) -> usize {
        (height / Self::line_height(BODY_SIZE)).floor().max(0.0) as usize
    }

    fn finish(self) -> Result<Vec<u8>> {
        self.doc
            .save_to_bytes()
            .map_err(|e| ReportError::Serialize(e.to_string()))
    }
}

/// Renders analyses into PDF documents
#[derive(Debug, Clone)]
pub struct PdfReportRenderer {
    clinic_name: String,
}

impl PdfReportRenderer {
    pub fn new(clinic_name: impl Into<String>) -> Self {
        Self {
            clinic_name: clinic_name.into(),
        }
    }

    fn header(&self, writer: &mut PageWriter, title: &str) {
        writer.heading(&self.clinic_name, 18.0);
        writer.heading(title, 14.0);
        writer.line(&format!("Generated: {}", timestamp(Utc::now())));
        writer.rule();
    }

    fn footer_height() -> f32 {
        8.0 + (wrap(&ascii_text(DISCLAIMER), WRAP_WIDTH).len() + 1) as f32 * PageWriter::line_height(BODY_SIZE)
    }

    fn footer(writer: &mut PageWriter) {
        writer.gap(4.0);
        writer.rule();
        writer.paragraph(DISCLAIMER);
    }

    /// One analysis with optional patient details
    pub fn render_analysis(&self, result: &AnalysisResult, patient: Option<&Patient>) -> Result<Vec<u8>> {
        let mut writer = PageWriter::new("Colposcopy image analysis report")?;
        self.header(&mut writer, "Colposcopy Image Analysis Report");

        writer.heading("Patient", 12.0);
        match patient {
            Some(patient) => {
                writer.field("Name:", &patient.full_name);
                writer.field("Age:", &patient.age.to_string());
                writer.field("Document ID:", &patient.document_id);
            }
            None => writer.field("Name:", "Anonymous"),
        }
        writer.gap(3.0);

        writer.heading("Image", 12.0);
        writer.field("File:", &result.file_name);
        writer.field(
            "Dimensions:",
            &format!("{} x {} px", result.image.width, result.image.height),
        );
        writer.field(
            "Format:",
            &format!("{} ({})", result.image.format, result.image.color_mode),
        );
        writer.field("Classifier:", &result.backend.to_string());
        writer.field(
            "Enhancement:",
            if result.enhanced { "CLAHE applied" } else { "None" },
        );
        writer.field("Analysed at:", &timestamp(result.created_at));
        writer.field("Analysis ID:", &result.id.to_string());
        writer.gap(3.0);

        writer.heading("Result", 12.0);
        writer.field("Primary diagnosis:", result.predicted.label());
        writer.field("Confidence:", &format!("{:.1}%", result.confidence * 100.0));
        writer.colored_field("Risk level:", &result.risk_level.to_string(), risk_color(result.risk_level));
        writer.gap(3.0);

        writer.heading("Class probabilities", 12.0);
        writer.row(&[("Class", 0.0), ("Probability", 60.0), ("Percent", 100.0)], true);
        for (class, p) in result.probabilities.iter() {
            let probability = format!("{p:.4}");
            let percent = format!("{:.2}%", p * 100.0);
            writer.row(
                &[(class.label(), 0.0), (probability.as_str(), 60.0), (percent.as_str(), 100.0)],
                class == result.predicted,
            );
        }
        writer.gap(3.0);

        writer.heading("Recommendation", 12.0);
        writer.paragraph(&result.recommendation);

        Self::footer(&mut writer);
        writer.finish()
    }

    /// One-page batch summary
    ///
    /// Per-image rows and failures are cut to what fits on the page; the
    /// remainder is reported as a count.
    pub fn render_batch(&self, report: &BatchReport) -> Result<Vec<u8>> {
        self.write_batch(report)?.finish()
    }

    fn write_batch(&self, report: &BatchReport) -> Result<PageWriter> {
        let mut writer = PageWriter::new("Colposcopy batch analysis summary")?;
        self.header(&mut writer, "Batch Analysis Summary");

        writer.field("Batch ID:", &report.batch_id.to_string());
        writer.field("Classifier:", &report.backend.to_string());
        writer.field("Created at:", &timestamp(report.created_at));
        writer.field("Images:", &report.total().to_string());
        writer.field("Analysed:", &report.results.len().to_string());
        writer.field("Failed:", &report.failures.len().to_string());
        writer.gap(3.0);

        writer.heading("Diagnosis distribution", 12.0);
        writer.row(&[("Class", 0.0), ("Count", 60.0), ("Share", 100.0)], true);
        for class in DiagnosticClass::ALL {
            let count = report.counts.get(&class).copied().unwrap_or(0).to_string();
            let share = format!("{:.1}%", report.distribution.get(&class).copied().unwrap_or(0.0) * 100.0);
            writer.row(&[(class.label(), 0.0), (count.as_str(), 60.0), (share.as_str(), 100.0)], false);
        }
        writer.gap(3.0);

        let section = PageWriter::line_height(12.0) + 3.0;
        let failure_lines = if report.failures.is_empty() {
            0
        } else {
            report.failures.len().min(MAX_BATCH_FAILURE_LINES) + 1
        };
        let failure_height = if failure_lines == 0 {
            0.0
        } else {
            section + failure_lines as f32 * PageWriter::line_height(BODY_SIZE)
        };

        if !report.results.is_empty() {
            // Heading, column titles and a possible "more" line come out of the budget
            let budget = writer.remaining() - Self::footer_height() - failure_height - section;
            let rows = PageWriter::lines_fitting(budget).saturating_sub(2);
            let shown = if report.results.len() <= rows + 1 {
                report.results.len()
            } else {
                rows
            };

            writer.heading("Images", 12.0);
            writer.row(
                &[("File", 0.0), ("Diagnosis", 75.0), ("Confidence", 110.0), ("Risk", 145.0)],
                true,
            );
            for result in report.results.iter().take(shown) {
                let name = truncate(&result.file_name, 40);
                let confidence = format!("{:.1}%", result.confidence * 100.0);
                let risk = result.risk_level.to_string();
                writer.row(
                    &[
                        (name.as_str(), 0.0),
                        (result.predicted.label(), 75.0),
                        (confidence.as_str(), 110.0),
                        (risk.as_str(), 145.0),
                    ],
                    false,
                );
            }
            if shown < report.results.len() {
                writer.line(&format!("... and {} more images", report.results.len() - shown));
            }
            writer.gap(3.0);
        }

        if !report.failures.is_empty() {
            writer.heading("Not analysed", 12.0);
            for failure in report.failures.iter().take(MAX_BATCH_FAILURE_LINES) {
                writer.line(&truncate(&format!("{}: {}", failure.file_name, failure.message), WRAP_WIDTH));
            }
            if report.failures.len() > MAX_BATCH_FAILURE_LINES {
                writer.line(&format!(
                    "... and {} more failures",
                    report.failures.len() - MAX_BATCH_FAILURE_LINES
                ));
            }
        }

        Self::footer(&mut writer);
        Ok(writer)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
