//! Minimal single-font-family PDF 1.4 writer.
//!
//! Coordinates are in points with the origin at the top-left corner of the page, which is how
//! invoice layouts are usually described. Output is byte-for-byte deterministic for the same
//! sequence of drawing calls, so rendered documents can be compared and cached.

use std::fmt::Write as _;

pub const A4_WIDTH: f32 = 595.28;
pub const A4_HEIGHT: f32 = 841.89;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Helvetica,
    HelveticaBold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Helvetica => "F1",
            Font::HelveticaBold => "F2",
        }
    }

    fn base_name(self) -> &'static str {
        match self {
            Font::Helvetica => "Helvetica",
            Font::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// Advance width in thousandths of the font size.
    fn glyph_width(self, c: char) -> u16 {
        let code = c as u32;
        if !(32..=126).contains(&code) {
            return 556;
        }
        let table = match self {
            Font::Helvetica => &HELVETICA_WIDTHS,
            Font::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        };
        table[(code - 32) as usize]
    }
}

// Standard 14 font metrics for the printable ASCII range.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Width of `text` in points when set in `font` at `size`.
pub fn text_width(text: &str, font: Font, size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(font.glyph_width(c))).sum();
    units as f32 * size / 1000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const WHITE: Color = Color::rgb(255, 255, 255);

    fn operands(self) -> String {
        format!(
            "{} {} {}",
            number(f32::from(self.r) / 255.0),
            number(f32::from(self.g) / 255.0),
            number(f32::from(self.b) / 255.0)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font: Font,
    pub size: f32,
    pub color: Color,
}

impl TextStyle {
    pub const fn new(font: Font, size: f32, color: Color) -> Self {
        Self { font, size, color }
    }
}

/// Optional box a line of text is aligned within
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBox {
    pub width: f32,
    pub align: Align,
}

#[derive(Debug, Clone, Default)]
struct DocumentInfo {
    title: Option<String>,
    creation_date: Option<String>,
}

/// Accumulates drawing operations page by page and serializes them on [`finish`](Self::finish).
#[derive(Debug, Clone)]
pub struct PdfDocument {
    width: f32,
    height: f32,
    pages: Vec<String>,
    info: DocumentInfo,
}

impl Default for PdfDocument {
    fn default() -> Self {
        Self::a4()
    }
}

impl PdfDocument {
    pub fn a4() -> Self {
        Self {
            width: A4_WIDTH,
            height: A4_HEIGHT,
            pages: vec![String::new()],
            info: DocumentInfo::default(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn new_page(&mut self) {
        self.pages.push(String::new());
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.info.title = Some(title.into());
    }

    /// `D:YYYYMMDDHHmmSSZ`, supplied by the caller so output stays reproducible.
    pub fn set_creation_date(&mut self, date: impl Into<String>) {
        self.info.creation_date = Some(date.into());
    }

    fn current(&mut self) -> &mut String {
        if self.pages.is_empty() {
            self.pages.push(String::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Draws one line of text whose top edge sits at `top`.
    pub fn text(&mut self, content: &str, style: TextStyle, x: f32, top: f32, layout: Option<TextBox>) {
        let x = match layout {
            Some(TextBox { width, align }) => {
                let measured = text_width(content, style.font, style.size);
                match align {
                    Align::Left => x,
                    Align::Center => x + (width - measured) / 2.0,
                    Align::Right => x + width - measured,
                }
            }
            None => x,
        };
        let baseline = self.height - top - style.size;
        let op = format!(
            "BT /{} {} Tf {} rg {} {} Td {} Tj ET\n",
            style.font.resource(),
            number(style.size),
            style.color.operands(),
            number(x),
            number(baseline),
            literal(content)
        );
        self.current().push_str(&op);
    }

    pub fn fill_rect(&mut self, x: f32, top: f32, width: f32, height: f32, color: Color) {
        let y = self.height - top - height;
        let op = format!(
            "{} rg {} {} {} {} re f\n",
            color.operands(),
            number(x),
            number(y),
            number(width),
            number(height)
        );
        self.current().push_str(&op);
    }

    pub fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: f32) {
        let op = format!(
            "{} RG {} w {} {} m {} {} l S\n",
            color.operands(),
            number(width),
            number(from.0),
            number(self.height - from.1),
            number(to.0),
            number(self.height - to.1)
        );
        self.current().push_str(&op);
    }

    /// Serializes the document.
    pub fn finish(self) -> Vec<u8> {
        // 1 catalog, 2 page tree, 3-4 fonts, 5 info, then a page and its content per page
        let page_ids: Vec<usize> = (0..self.pages.len()).map(|i| 6 + i * 2).collect();
        let mut objects: Vec<Vec<u8>> = Vec::with_capacity(5 + self.pages.len() * 2);

        objects.push(b"<< /Type /Catalog /Pages 2 0 R >>".to_vec());
        let kids = page_ids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");
        objects.push(
            format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, page_ids.len()).into_bytes(),
        );
        for font in [Font::Helvetica, Font::HelveticaBold] {
            objects.push(
                format!(
                    "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                    font.base_name()
                )
                .into_bytes(),
            );
        }
        let mut info = String::from("<< /Producer (FreshEats)");
        if let Some(title) = &self.info.title {
            let _ = write!(info, " /Title {}", literal(title));
        }
        if let Some(date) = &self.info.creation_date {
            let _ = write!(info, " /CreationDate {}", literal(date));
        }
        info.push_str(" >>");
        objects.push(info.into_bytes());

        for (index, content) in self.pages.iter().enumerate() {
            let content_id = page_ids[index] + 1;
            objects.push(
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                    number(self.width),
                    number(self.height),
                    content_id
                )
                .into_bytes(),
            );
            let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
            stream.extend_from_slice(content.as_bytes());
            stream.extend_from_slice(b"\nendstream");
            objects.push(stream);
        }

        let mut out: Vec<u8> = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (index, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref_at = out.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            let _ = writeln!(xref, "{:010} 00000 n ", offset);
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        );
        out.extend_from_slice(xref.as_bytes());
        out
    }
}

/// Trims trailing zeros so operands stay short and stable.
fn number(value: f32) -> String {
    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// WinAnsiEncoding code for `c`, if the encoding has a glyph for it.
fn win_ansi(c: char) -> Option<u8> {
    let code = c as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => u8::try_from(code).ok(),
        _ => {
            let byte = match c {
                '€' => 0x80,
                '‚' => 0x82,
                'ƒ' => 0x83,
                '„' => 0x84,
                '…' => 0x85,
                '†' => 0x86,
                '‡' => 0x87,
                'ˆ' => 0x88,
                '‰' => 0x89,
                'Š' => 0x8A,
                '‹' => 0x8B,
                'Œ' => 0x8C,
                'Ž' => 0x8E,
                '‘' => 0x91,
                '’' => 0x92,
                '“' => 0x93,
                '”' => 0x94,
                '•' => 0x95,
                '–' => 0x96,
                '\u{2014}' => 0x97,
                '˜' => 0x98,
                '™' => 0x99,
                'š' => 0x9A,
                '›' => 0x9B,
                'œ' => 0x9C,
                'ž' => 0x9E,
                'Ÿ' => 0x9F,
                _ => return None,
            };
            Some(byte)
        }
    }
}

/// PDF literal string in WinAnsiEncoding. Characters without a WinAnsi glyph become `?`.
fn literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('(');
    for c in text.chars() {
        match win_ansi(c) {
            Some(b'(') | Some(b')') | Some(b'\\') => {
                out.push('\\');
                out.push(c);
            }
            Some(byte @ 0x20..=0x7E) => out.push(char::from(byte)),
            Some(byte) => {
                let _ = write!(out, "\\{:03o}", byte);
            }
            None => out.push('?'),
        }
    }
    out.push(')');
    out
}
