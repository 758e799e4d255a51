//! Minimal PDF 1.4 writer for plain text exports.
//!
//! Lays text out top to bottom on A4 pages in Helvetica with WinAnsi
//! encoding. Text outside Latin-1 is refused rather than mangled.

use std::fmt::Write;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("PDF export only supports Latin-1 text and cannot encode '{0}'; export as txt or csv instead")]
pub struct UnsupportedChar(pub char);

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN: u32 = 50;
const FONT_SIZE: u32 = 11;
const LEADING: u32 = 15;
const MAX_LINE_CHARS: usize = 90;

const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const FONT_ID: usize = 3;
const INFO_ID: usize = 4;
const FIRST_PAGE_ID: usize = 5;

pub fn lines_per_page() -> usize {
    ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize
}

pub fn render(title: &str, text: &str) -> Result<Vec<u8>, UnsupportedChar> {
    let lines = wrap_lines(text);
    let pages: Vec<&[String]> = if lines.is_empty() {
        vec![lines.as_slice()]
    } else {
        lines.chunks(lines_per_page()).collect()
    };

    let mut writer = ObjectWriter::new();

    writer.object(
        CATALOG_ID,
        format!("<< /Type /Catalog /Pages {PAGES_ID} 0 R >>").as_bytes(),
    );

    let kids = (0..pages.len())
        .map(|i| format!("{} 0 R", page_id(i)))
        .collect::<Vec<_>>()
        .join(" ");
    writer.object(
        PAGES_ID,
        format!(
            "<< /Type /Pages /Kids [{kids}] /Count {} /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] >>",
            pages.len()
        )
        .as_bytes(),
    );

    writer.object(
        FONT_ID,
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
    );

    let mut info = b"<< /Title (".to_vec();
    info.extend(encode_text(title)?);
    info.extend_from_slice(b") /Producer (teacher-eval) >>");
    writer.object(INFO_ID, &info);

    for (index, page_lines) in pages.iter().enumerate() {
        let content_id = page_id(index) + 1;
        writer.object(
            page_id(index),
            format!(
                "<< /Type /Page /Parent {PAGES_ID} 0 R /Resources << /Font << /F1 {FONT_ID} 0 R >> >> /Contents {content_id} 0 R >>"
            )
            .as_bytes(),
        );

        let stream = content_stream(page_lines)?;
        let mut body = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
        body.extend(stream);
        body.extend_from_slice(b"\nendstream");
        writer.object(content_id, &body);
    }

    Ok(writer.finish(CATALOG_ID, INFO_ID))
}

fn page_id(index: usize) -> usize {
    FIRST_PAGE_ID + index * 2
}

fn content_stream(lines: &[String]) -> Result<Vec<u8>, UnsupportedChar> {
    let mut stream = format!(
        "BT\n/F1 {FONT_SIZE} Tf\n{LEADING} TL\n{MARGIN} {} Td\n",
        PAGE_HEIGHT - MARGIN
    )
    .into_bytes();
    for line in lines {
        stream.push(b'(');
        stream.extend(encode_text(line)?);
        stream.extend_from_slice(b") Tj T*\n");
    }
    stream.extend_from_slice(b"ET");
    Ok(stream)
}

fn wrap_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for line in text.lines() {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            lines.push(String::new());
            continue;
        }
        for chunk in chars.chunks(MAX_LINE_CHARS) {
            lines.push(chunk.iter().collect());
        }
    }
    lines
}

/// WinAnsi bytes for a PDF literal string, with delimiters escaped.
fn encode_text(text: &str) -> Result<Vec<u8>, UnsupportedChar> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(ch as u8);
            }
            ' '..='~' => out.push(ch as u8),
            '\u{a0}'..='\u{ff}' => out.push(ch as u32 as u8),
            '\t' => out.push(b' '),
            other => return Err(UnsupportedChar(other)),
        }
    }
    Ok(out)
}

struct ObjectWriter {
    out: Vec<u8>,
    offsets: Vec<(usize, usize)>,
}

impl ObjectWriter {
    fn new() -> Self {
        let mut out = b"%PDF-1.4\n".to_vec();
        out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        Self {
            out,
            offsets: Vec::new(),
        }
    }

    fn object(&mut self, id: usize, body: &[u8]) {
        self.offsets.push((id, self.out.len()));
        self.out.extend(format!("{id} 0 obj\n").into_bytes());
        self.out.extend_from_slice(body);
        self.out.extend_from_slice(b"\nendobj\n");
    }

    fn finish(mut self, root: usize, info: usize) -> Vec<u8> {
        self.offsets.sort_by_key(|(id, _)| *id);
        let size = self.offsets.len() + 1;
        let xref_offset = self.out.len();

        let mut xref = String::new();
        let _ = writeln!(xref, "xref");
        let _ = writeln!(xref, "0 {size}");
        let _ = writeln!(xref, "0000000000 65535 f ");
        for (_, offset) in &self.offsets {
            let _ = writeln!(xref, "{offset:010} 00000 n ");
        }
        let _ = writeln!(xref, "trailer");
        let _ = writeln!(xref, "<< /Size {size} /Root {root} 0 R /Info {info} 0 R >>");
        let _ = writeln!(xref, "startxref");
        let _ = writeln!(xref, "{xref_offset}");
        let _ = write!(xref, "%%EOF");

        self.out.extend(xref.into_bytes());
        self.out
    }
}
