//! PDF rendering with `printpdf`.
//!
//! A4 portrait, builtin Helvetica. The table starts below the title on the
//! first page and continues on further pages only when rows overflow.
//! `printpdf` writes a random trailer `/ID` on every save; it is replaced
//! with a digest of the document so equal input gives equal bytes.

use chrono::{DateTime, Utc};
use dashboard_core::error::{DashboardError, DashboardResult};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::table::{Block, HEADER};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const TITLE_SIZE: f32 = 16.0;
const SUBTITLE_SIZE: f32 = 10.0;
const BODY_SIZE: f32 = 11.0;
const ROW_HEIGHT: f32 = 8.0;
const TITLE_BLOCK: f32 = 20.0;
const VALUE_X: f32 = 110.0;

/// One line of the laid-out table.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Section(&'static str),
    Header,
    Row(&'static str, u64),
    Blank,
}

/// Rows that fit on the first page and on every later page.
fn capacities() -> (usize, usize) {
    let usable = PAGE_HEIGHT - 2.0 * MARGIN;
    let first = ((usable - TITLE_BLOCK) / ROW_HEIGHT) as usize;
    let rest = (usable / ROW_HEIGHT) as usize;
    (first, rest)
}

fn lay_out(blocks: &[Block]) -> Vec<Line> {
    let mut lines = Vec::new();
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            lines.push(Line::Blank);
        }
        if blocks.len() > 1 {
            lines.push(Line::Section(block.title));
        }
        lines.push(Line::Header);
        lines.extend(block.rows.iter().map(|r| Line::Row(r.metric, r.value)));
    }
    lines
}

/// Splits lines into pages. A page that starts mid-table repeats the header.
fn paginate(lines: Vec<Line>, first: usize, rest: usize) -> Vec<Vec<Line>> {
    let mut pages = vec![Vec::new()];
    let mut capacity = first.max(2);

    for line in lines {
        let page_len = pages.last().map_or(0, Vec::len);
        if page_len >= capacity {
            capacity = rest.max(2);
            let mut page = Vec::new();
            if matches!(line, Line::Row(..)) {
                page.push(Line::Header);
            }
            pages.push(page);
        }
        if let Some(page) = pages.last_mut() {
            if page.is_empty() && line == Line::Blank {
                continue;
            }
            page.push(line);
        }
    }
    pages
}

/// Renders the blocks as a titled, paginated table.
///
/// Document dates are pinned to `at`.
pub fn render(
    blocks: &[Block],
    title: &str,
    subtitle: &str,
    at: DateTime<Utc>,
) -> DashboardResult<Vec<u8>> {
    let stamp = OffsetDateTime::from_unix_timestamp(at.timestamp())
        .map_err(|e| DashboardError::export("pdf", e.to_string()))?;

    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let doc = doc
        .with_document_id(format!("meetdesk-{}", at.timestamp()))
        .with_creation_date(stamp)
        .with_mod_date(stamp)
        .with_metadata_date(stamp);

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_error)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_error)?;

    let (first, rest) = capacities();
    let pages = paginate(lay_out(blocks), first, rest);

    for (n, lines) in pages.iter().enumerate() {
        let layer = if n == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            doc.get_page(page).get_layer(layer)
        };

        let mut y = PAGE_HEIGHT - MARGIN;
        if n == 0 {
            layer.use_text(title, TITLE_SIZE, Mm(MARGIN), Mm(y), &bold);
            layer.use_text(subtitle, SUBTITLE_SIZE, Mm(MARGIN), Mm(y - 7.0), &regular);
            y -= TITLE_BLOCK;
        }
        for line in lines {
            draw_line(&layer, line, y, &regular, &bold);
            y -= ROW_HEIGHT;
        }
    }

    doc.save_to_bytes().map(pin_document_ids).map_err(pdf_error)
}

/// Overwrites every occurrence of the trailer `/ID` strings with a digest of
/// the document taken with those strings zeroed. Lengths are preserved, so
/// cross-reference offsets stay valid.
fn pin_document_ids(mut bytes: Vec<u8>) -> Vec<u8> {
    let mut spans = Vec::new();
    for id in trailer_ids(&bytes) {
        spans.extend(positions(&bytes, &id).map(|start| start..start + id.len()));
    }
    if spans.is_empty() {
        return bytes;
    }

    for span in &spans {
        bytes[span.clone()].fill(b'0');
    }
    let digest = hex::encode(Sha256::digest(&bytes));
    for span in spans {
        for (byte, hex) in bytes[span].iter_mut().zip(digest.bytes().cycle()) {
            *byte = hex;
        }
    }
    bytes
}

/// Returns the string contents of the last `/ID [..]` array.
fn trailer_ids(bytes: &[u8]) -> Vec<Vec<u8>> {
    let Some(at) = bytes.windows(3).rposition(|w| w == b"/ID") else {
        return Vec::new();
    };
    let mut rest = bytes[at + 3..].iter().copied().skip_while(u8::is_ascii_whitespace);
    if rest.next() != Some(b'[') {
        return Vec::new();
    }

    let mut ids = Vec::new();
    loop {
        let close = match rest.by_ref().find(|b| !b.is_ascii_whitespace()) {
            Some(b'(') => b')',
            Some(b'<') => b'>',
            _ => break,
        };
        let id: Vec<u8> = rest.by_ref().take_while(|b| *b != close).collect();
        if !id.is_empty() && !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

fn positions<'a>(haystack: &'a [u8], needle: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(move |(_, window)| *window == needle)
        .map(|(start, _)| start)
}

fn draw_line(
    layer: &PdfLayerReference,
    line: &Line,
    y: f32,
    regular: &IndirectFontRef,
    bold: &IndirectFontRef,
) {
    match line {
        Line::Section(title) => layer.use_text(*title, BODY_SIZE + 1.0, Mm(MARGIN), Mm(y), bold),
        Line::Header => {
            layer.use_text(HEADER[0], BODY_SIZE, Mm(MARGIN), Mm(y), bold);
            layer.use_text(HEADER[1], BODY_SIZE, Mm(VALUE_X), Mm(y), bold);
        }
        Line::Row(metric, value) => {
            layer.use_text(*metric, BODY_SIZE, Mm(MARGIN), Mm(y), regular);
            layer.use_text(value.to_string(), BODY_SIZE, Mm(VALUE_X), Mm(y), regular);
        }
        Line::Blank => {}
    }
}

fn pdf_error(err: printpdf::Error) -> DashboardError {
    DashboardError::export("pdf", err.to_string())
}
