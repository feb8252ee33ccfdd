//! Minimal single-font PDF writer for printable text reports.
//!
//! Produces PDF 1.4 with the built-in Courier font, US Letter pages, and a
//! correct cross-reference table. Only printable ASCII is emitted; other
//! characters are replaced with `?`.

const PAGE_WIDTH: u32 = 612;
const PAGE_HEIGHT: u32 = 792;
const MARGIN: u32 = 50;
const FONT_SIZE: u32 = 9;
const TITLE_FONT_SIZE: u32 = 14;
const LEADING: u32 = 12;
/// Courier glyphs are 0.6 em wide: (612 - 2 * 50) / (0.6 * 9) ≈ 94.
const MAX_COLUMNS: usize = 94;

fn lines_per_page() -> usize {
    ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize
}

/// Escape a string for a PDF literal `( ... )`.
fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\t' => out.push_str("    "),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Hard-wrap a line at the printable width.
fn wrap(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(MAX_COLUMNS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn page_stream(title: Option<&str>, lines: &[String]) -> String {
    let mut stream = String::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    if let Some(title) = title {
        stream.push_str(&format!(
            "BT /F1 {TITLE_FONT_SIZE} Tf {MARGIN} {y} Td ({}) Tj ET\n",
            escape_text(title)
        ));
        y -= LEADING * 2;
    }

    stream.push_str(&format!("BT /F1 {FONT_SIZE} Tf {LEADING} TL {MARGIN} {y} Td\n"));
    for line in lines {
        stream.push_str(&format!("({}) Tj T*\n", escape_text(line)));
    }
    stream.push_str("ET\n");
    stream
}

/// Render `lines` under `title` into a complete PDF file.
pub fn text_document(title: &str, lines: &[String]) -> Vec<u8> {
    let wrapped: Vec<String> = lines.iter().flat_map(|l| wrap(l)).collect();

    // The first page gives up two lines to the title.
    let first_capacity = lines_per_page().saturating_sub(2).max(1);
    let mut pages: Vec<&[String]> = Vec::new();
    let (first, mut rest) = wrapped.split_at(first_capacity.min(wrapped.len()));
    pages.push(first);
    while !rest.is_empty() {
        let (page, tail) = rest.split_at(lines_per_page().min(rest.len()));
        pages.push(page);
        rest = tail;
    }

    let mut objects: Vec<String> = Vec::new();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect();
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        pages.len()
    ));
    objects.push(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Courier /Encoding /WinAnsiEncoding >>"
            .to_string(),
    );
    for (i, page) in pages.iter().enumerate() {
        let content_id = 5 + 2 * i;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {content_id} 0 R >>"
        ));
        let stream = page_stream((i == 0).then_some(title), page);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{stream}endstream",
            stream.len()
        ));
    }

    let mut out: Vec<u8> = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_text(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn escapes_parentheses_and_non_ascii() {
        assert_eq!(escape_text("f(x) \\ é"), "f\\(x\\) \\\\ ?");
    }

    #[test]
    fn wraps_long_lines() {
        let long = "x".repeat(MAX_COLUMNS * 2 + 3);
        let parts = wrap(&long);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 3);
    }

    #[test]
    fn single_page_document_structure() {
        let pdf = as_text(&text_document("Title", &["hello".to_string()]));
        assert!(pdf.starts_with("%PDF-1.4\n"));
        assert!(pdf.contains("/Count 1"));
        assert!(pdf.contains("(hello) Tj T*"));
        assert!(pdf.contains("xref\n0 6\n"));
        assert!(pdf.ends_with("%%EOF\n"));
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let bytes = text_document("T", &["a".to_string(), "b".to_string()]);
        let text = as_text(&bytes);
        let xref_start = text.find("xref\n").unwrap();
        let entries: Vec<&str> = text[xref_start..].lines().skip(3).take(5).collect();
        for (i, entry) in entries.iter().enumerate() {
            let offset: usize = entry[..10].parse().unwrap();
            assert!(text[offset..].starts_with(&format!("{} 0 obj", i + 1)));
        }
    }

    #[test]
    fn long_reports_span_pages() {
        let lines: Vec<String> = (0..150).map(|i| format!("line {i}")).collect();
        let pdf = as_text(&text_document("Long", &lines));
        assert!(pdf.contains("/Count 3"));
    }
}
