use crate::models::DesignScheme;
use printpdf::*;
use std::io::{BufWriter, Cursor};
use thiserror::Error;
use tracing::warn;

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN_X: f32 = 15.0;
const TOP: f32 = 280.0;
const BOTTOM: f32 = 20.0;
/// Columns per wrapped body line at 10pt on A4. Wide (CJK) characters take two.
const WRAP_WIDTH: usize = 95;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("pdf error: {0}")] Pdf(#[from] printpdf::Error),
}

/// Text-only A4 report of one scheme.
///
/// The builtin Helvetica only covers Latin-1. Pass the bytes of a TrueType font
/// (`PDF_FONT_PATH`) to embed it for both weights so CJK prompts and schemes render.
pub fn generate_pdf(prompt: &str, scheme: &DesignScheme, font: Option<&[u8]>) -> Result<Vec<u8>, PdfError> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Design scheme: {}", truncate(prompt, 48)),
        Mm(PAGE_W),
        Mm(PAGE_H),
        "Layer 1",
    );
    let (font, bold) = match font {
        Some(bytes) => (
            doc.add_external_font(Cursor::new(bytes))?,
            doc.add_external_font(Cursor::new(bytes))?,
        ),
        None => {
            if needs_unicode_font(prompt, scheme) {
                warn!("⚠️ Scheme has characters outside Latin-1 and no PDF_FONT_PATH is set; they will not render");
            }
            (
                doc.add_builtin_font(BuiltinFont::Helvetica)?,
                doc.add_builtin_font(BuiltinFont::HelveticaBold)?,
            )
        }
    };
    let layer = doc.get_page(page).get_layer(layer);
    let mut writer = PageWriter { doc, layer, y: TOP, pages: 1 };

    writer.line("3D Phantasm Design Scheme", 20.0, &bold, 12.0);
    for line in wrap(prompt, WRAP_WIDTH) {
        writer.line(&line, 10.0, &font, 5.0);
    }
    writer.gap(6.0);

    let sections: [(&str, Vec<String>); 6] = [
        ("Style", wrap(&scheme.style, WRAP_WIDTH)),
        ("Dimensions", wrap(&scheme.dimensions, WRAP_WIDTH)),
        ("Print-friendly design", wrap(&scheme.friendly_design, WRAP_WIDTH)),
        ("Modeling key points", wrap(&scheme.modeling_keys, WRAP_WIDTH)),
        ("Print parameters", bullets(&scheme.print_param_lines())),
        ("Failure risks", bullets(&scheme.failure_risk_lines())),
    ];
    for (title, lines) in sections {
        writer.line(title, 13.0, &bold, 7.0);
        for line in lines {
            writer.line(&line, 10.0, &font, 5.0);
        }
        writer.gap(5.0);
    }
    writer.line("Wall thickness is compensated for a 0.4mm nozzle.", 8.0, &font, 4.0);

    writer.finish()
}

struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    pages: usize,
}

impl PageWriter {
    fn line(&mut self, text: &str, size: f32, font: &IndirectFontRef, advance: f32) {
        if self.y - advance < BOTTOM {
            self.pages += 1;
            let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), format!("Page {}", self.pages));
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP;
        }
        self.layer.use_text(text, size, Mm(MARGIN_X), Mm(self.y), font);
        self.y -= advance;
    }

    fn gap(&mut self, amount: f32) {
        self.y -= amount;
    }

    fn finish(self) -> Result<Vec<u8>, PdfError> {
        let mut buf: Vec<u8> = Vec::new();
        {
            let mut writer = BufWriter::new(&mut buf);
            self.doc.save(&mut writer)?;
        }
        Ok(buf)
    }
}

fn bullets(lines: &[&str]) -> Vec<String> {
    lines.iter()
        .flat_map(|line| wrap(&format!("- {line}"), WRAP_WIDTH))
        .collect()
}

fn needs_unicode_font(prompt: &str, scheme: &DesignScheme) -> bool {
    [
        prompt,
        scheme.style.as_str(),
        scheme.dimensions.as_str(),
        scheme.friendly_design.as_str(),
        scheme.modeling_keys.as_str(),
        scheme.print_params.as_str(),
        scheme.failure_risks.as_str(),
    ]
    .iter()
    .flat_map(|text| text.chars())
        .any(|c| u32::from(c) > 0xFF)
}

fn is_wide(c: char) -> bool {
    matches!(u32::from(c),
        0x1100..=0x115F
        | 0x2E80..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6)
}

fn columns(text: &str) -> usize {
    text.chars().map(|c| if is_wide(c) { 2 } else { 1 }).sum()
}

/// Splits off the longest prefix of `word` that fits in `width` columns (at least one char).
fn split_head(word: &str, width: usize) -> (String, String) {
    let mut used = 0;
    let mut cut = 0;
    for (i, c) in word.char_indices() {
        let w = if is_wide(c) { 2 } else { 1 };
        if used + w > width && i > 0 {
            break;
        }
        used += w;
        cut = i + c.len_utf8();
    }
    (word[..cut].to_string(), word[cut..].to_string())
}

/// Word-wraps each `\n`-separated line to at most `width` columns. Empty lines are kept.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    for raw in text.split('\n') {
        let mut current = String::new();
        for word in raw.split_whitespace() {
            let mut word = word.to_string();
            // Words longer than a line are hard-split.
            while columns(&word) > width {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                let (head, rest) = split_head(&word, width);
                word = rest;
                out.push(head);
            }
            let needed = if current.is_empty() { 0 } else { columns(&current) + 1 };
            if needed + columns(&word) > width {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        out.push(current);
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max { s.to_string() } else { format!("{}…", s.chars().take(max).collect::<String>()) }
}
