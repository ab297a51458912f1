//! Plain-text PDF rendering of maintenance reports.
//!
//! Output uses the standard Helvetica fonts with WinAnsi encoding, so no font
//! data is embedded. Layout is a single column of labelled lines on A4 pages,
//! wrapped by an average glyph width and broken into pages when the column
//! fills up.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{DocumentError, ReportContext, ReportGenerator};
use crate::domain::DocumentHandle;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 72.0;
const BOTTOM_MARGIN: f32 = 54.0;
const AVERAGE_GLYPH_WIDTH: f32 = 0.52;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Title,
    Heading,
    Label,
    Body,
    Footer,
}

impl Style {
    fn font(self) -> &'static str {
        match self {
            Style::Title | Style::Heading | Style::Label => "F2",
            Style::Body | Style::Footer => "F1",
        }
    }

    fn size(self) -> f32 {
        match self {
            Style::Title => 20.0,
            Style::Heading => 13.0,
            Style::Label | Style::Body => 11.0,
            Style::Footer => 8.0,
        }
    }

    fn leading(self) -> f32 {
        match self {
            Style::Title => 30.0,
            Style::Heading => 22.0,
            _ => self.size() * 1.45,
        }
    }
}

/// Accumulates styled lines and serialises them into PDF bytes
#[derive(Debug, Default)]
struct PdfText {
    lines: Vec<(Style, String)>,
}

impl PdfText {
    fn push(&mut self, style: Style, text: impl Into<String>) {
        let text = text.into();
        let width = ((PAGE_WIDTH - 2.0 * MARGIN) / (style.size() * AVERAGE_GLYPH_WIDTH)) as usize;
        for line in wrap(&text, width) {
            self.lines.push((style, line));
        }
    }

    fn field(&mut self, label: &str, value: impl AsRef<str>) {
        self.push(Style::Body, format!("{label}: {}", value.as_ref()));
    }

    fn gap(&mut self) {
        self.lines.push((Style::Body, String::new()));
    }

    fn paginate(&self) -> Vec<String> {
        let mut pages = Vec::new();
        let mut content = String::new();
        let mut y = PAGE_HEIGHT - MARGIN;

        for (style, text) in &self.lines {
            if y - style.leading() < BOTTOM_MARGIN && !content.is_empty() {
                pages.push(std::mem::take(&mut content));
                y = PAGE_HEIGHT - MARGIN;
            }
            y -= style.leading();
            if text.is_empty() {
                continue;
            }
            content.push_str(&format!(
                "BT /{} {} Tf {} {} Td ({}) Tj ET\n",
                style.font(),
                style.size(),
                MARGIN,
                y,
                escape(text)
            ));
        }

        pages.push(content);
        pages
    }

    fn into_bytes(self) -> Vec<u8> {
        let pages = self.paginate();
        let first_page_obj = 5;
        let kids: Vec<String> = (0..pages.len())
            .map(|i| format!("{} 0 R", first_page_obj + i * 2))
            .collect();

        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                pages.len()
            ),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
                .to_string(),
        ];
        for (i, content) in pages.iter().enumerate() {
            let content_obj = first_page_obj + i * 2 + 1;
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {content_obj} 0 R >>"
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}endstream",
                content.len(),
                content
            ));
        }

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, object) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
        }

        let xref_at = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_at
            )
            .as_bytes(),
        );
        out
    }
}

/// Greedy word wrap by character count; words longer than `width` are split
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let rest = word.split_off(width);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let word: String = word.into_iter().collect();
            let needed = current.chars().count() + usize::from(!current.is_empty()) + word.chars().count();
            if needed > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Escape a string for a PDF literal. Latin-1 characters become octal escapes
/// (WinAnsi agrees with Latin-1 above 0xA0); anything else becomes `?`.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            '\u{a0}'..='\u{ff}' => out.push_str(&format!("\\{:03o}", c as u32)),
            _ => out.push('?'),
        }
    }
    out
}

fn render(context: &ReportContext, generated_at: DateTime<Utc>) -> Vec<u8> {
    let ReportContext {
        report,
        request,
        machine,
        branch,
        author,
    } = context;
    let mut text = PdfText::default();

    text.push(Style::Title, "MAINTENANCE REPORT");
    text.push(Style::Body, "MantenTask");
    text.gap();

    text.push(Style::Heading, "GENERAL INFORMATION");
    text.field("Request", format!("#{}", request.id));
    text.field("Report date", report.created_at.format("%d/%m/%Y %H:%M").to_string());
    text.field("Prepared by", author.full_name());
    text.field("State", request.state.label());
    if let Some(date) = request.scheduled_for {
        text.field("Scheduled for", date.format("%d/%m/%Y").to_string());
    }
    text.gap();

    text.push(Style::Heading, "MACHINE");
    text.field("Code", machine.id.to_string());
    text.field("Brand", &machine.brand);
    text.field("Model", &machine.model);
    if let Some(serial) = &machine.serial_number {
        text.field("Serial number", serial);
    }
    if let Some(branch) = branch {
        text.field("Branch", &branch.name);
    }
    text.field("Purchased", machine.purchased_on.format("%d/%m/%Y").to_string());
    text.field("Installed", machine.installed_on.format("%d/%m/%Y").to_string());
    if let Some(date) = machine.last_maintenance_on {
        text.field("Last maintenance", date.format("%d/%m/%Y").to_string());
    }
    text.gap();

    text.push(Style::Heading, "WORK DESCRIPTION");
    text.push(Style::Label, "Reported problem:");
    text.push(Style::Body, &request.description);
    text.gap();
    text.push(Style::Label, "Summary:");
    text.push(Style::Body, &report.fields.description);

    let optional_sections = [
        ("Work performed:", &report.fields.work_performed),
        ("Parts replaced:", &report.fields.parts_replaced),
        ("Recommendations:", &report.fields.recommendations),
    ];
    for (label, value) in optional_sections {
        if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            text.gap();
            text.push(Style::Label, label);
            text.push(Style::Body, value);
        }
    }

    text.gap();
    text.gap();
    text.push(
        Style::Footer,
        format!(
            "Generated automatically by MantenTask on {}",
            generated_at.format("%d/%m/%Y %H:%M:%S")
        ),
    );

    text.into_bytes()
}

/// Writes one PDF per report into a directory
#[derive(Debug, Clone)]
pub struct PdfReportGenerator {
    output_dir: PathBuf,
}

impl PdfReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render without touching the filesystem
    pub fn render(context: &ReportContext, generated_at: DateTime<Utc>) -> Vec<u8> {
        render(context, generated_at)
    }

    pub fn file_name(request_id: i64, generated_at: DateTime<Utc>) -> String {
        format!(
            "report_request_{}_{}.pdf",
            request_id,
            generated_at.format("%Y%m%d_%H%M%S")
        )
    }
}

#[async_trait]
impl ReportGenerator for PdfReportGenerator {
    async fn generate_document(
        &self,
        context: &ReportContext,
    ) -> Result<DocumentHandle, DocumentError> {
        let generated_at = Utc::now();
        let bytes = render(context, generated_at);
        let path = self
            .output_dir
            .join(Self::file_name(context.request.id, generated_at));

        debug!(
            request_id = context.request.id,
            bytes = bytes.len(),
            "Rendered report document"
        );
        tokio::fs::create_dir_all(&self.output_dir).await?;
        tokio::fs::write(&path, &bytes).await?;
        info!(request_id = context.request.id, path = %path.display(), "Report document written");

        Ok(DocumentHandle {
            location: path.to_string_lossy().into_owned(),
            generated_at,
        })
    }
}
