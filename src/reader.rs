//! File reading: resolved path in, plain text + metadata out.
//!
//! Thin, extension-dispatched plumbing over format libraries. Markdown
//! carries optional YAML front-matter (only the body is embedded; the
//! front-matter becomes metadata). Binary formats delegate to `pdf-extract`
//! and `zip` + `quick-xml`; CSV and plain text are read as-is. Anything
//! deeper than text recovery belongs to the format libraries, not here.
//!
//! Front-matter values that parse as dates are normalized to ISO-8601 text
//! before they reach the metadata coercer — this is the last point in the
//! pipeline where a date is still distinguishable from any other string.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::error::IngestError;
use crate::models::Metadata;

/// File extensions the reader understands.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "csv", "pdf", "docx", "xlsx"];

/// Decompressed bytes cap per ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extracted text plus normalized-ready metadata for one source file.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub body: String,
    pub metadata: Metadata,
}

/// Read a file into plain text and metadata, dispatching on extension.
///
/// The caller hands in a resolved path; this function still rejects
/// non-regular files with a descriptive error rather than panicking on a
/// directory. Metadata defaults — `filename`, `doc_id` (file stem),
/// `source_ext`, `type` — are filled in only where the source (e.g.
/// front-matter) did not provide them.
pub fn read_file(path: &Path) -> Result<SourceDocument, IngestError> {
    if !path.is_file() {
        return Err(IngestError::Unreadable {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let (body, mut metadata, doc_type) = match ext.as_str() {
        "md" | "markdown" => {
            let text = read_to_string(path)?;
            let (front, body) = split_front_matter(&text);
            let metadata = front.map(parse_front_matter).unwrap_or_default();
            (body.to_string(), metadata, "unknown")
        }
        "txt" | "csv" => (read_to_string(path)?, Metadata::new(), "file"),
        "pdf" => (read_pdf(path)?, Metadata::new(), "file"),
        "docx" => (read_docx(path)?, Metadata::new(), "file"),
        "xlsx" => (read_xlsx(path)?, Metadata::new(), "file"),
        other => return Err(IngestError::UnsupportedFormat(other.to_string())),
    };

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("doc")
        .to_string();

    insert_default(&mut metadata, "filename", Value::String(filename));
    insert_default(&mut metadata, "doc_id", Value::String(stem));
    insert_default(&mut metadata, "source_ext", Value::String(ext));
    insert_default(&mut metadata, "type", Value::String(doc_type.to_string()));

    Ok(SourceDocument { body, metadata })
}

fn insert_default(metadata: &mut Metadata, key: &str, value: Value) {
    if !metadata.contains_key(key) {
        metadata.insert(key.to_string(), value);
    }
}

fn read_to_string(path: &Path) -> Result<String, IngestError> {
    std::fs::read_to_string(path).map_err(|e| IngestError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, IngestError> {
    std::fs::read(path).map_err(|e| IngestError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

// ============ Front-matter ============

/// Split leading `---` delimited front-matter from the body. Returns
/// `(front_matter, body)`; no delimiter means no front-matter.
fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text.strip_prefix("---") else {
        return (None, text);
    };
    let Some(rest) = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")) else {
        return (None, text);
    };
    match rest.find("\n---") {
        Some(close) => {
            let front = &rest[..close];
            let after = &rest[close + 4..];
            let body = after
                .strip_prefix("\r\n")
                .or_else(|| after.strip_prefix('\n'))
                .unwrap_or(after);
            (Some(front), body)
        }
        None => (None, text),
    }
}

/// Line-based `key: value` front-matter parsing. Values are parsed into
/// JSON scalars where they look like one (bool, number, inline list),
/// date-likes are normalized to ISO-8601 text, and everything else stays a
/// string. Block-style YAML structures are beyond this reader.
fn parse_front_matter(front: &str) -> Metadata {
    let mut metadata = Metadata::new();
    for line in front.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        metadata.insert(key.to_string(), parse_front_matter_value(value.trim()));
    }
    metadata
}

fn parse_front_matter_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }

    // Quoted strings keep their text verbatim.
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return Value::String(raw[1..raw.len() - 1].to_string());
        }
    }

    match raw {
        "null" | "~" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }

    if raw.starts_with('[') && raw.ends_with(']') {
        if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
            return parsed;
        }
        // Unquoted inline list: [Rust, SQL] — split on commas.
        let items = raw[1..raw.len() - 1]
            .split(',')
            .map(|item| Value::String(item.trim().to_string()))
            .filter(|item| item != &Value::String(String::new()))
            .collect();
        return Value::Array(items);
    }

    if let Some(iso) = normalize_date(raw) {
        return Value::String(iso);
    }

    Value::String(raw.to_string())
}

/// Render date-like text as ISO-8601, or `None` if it isn't a date.
fn normalize_date(raw: &str) -> Option<String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.to_rfc3339());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string());
    }
    None
}

// ============ Binary formats ============

fn read_pdf(path: &Path) -> Result<String, IngestError> {
    let bytes = read_bytes(path)?;
    pdf_extract::extract_text_from_mem(&bytes).map_err(|e| IngestError::Unreadable {
        path: path.to_path_buf(),
        reason: format!("PDF extraction failed: {e}"),
    })
}

fn read_docx(path: &Path) -> Result<String, IngestError> {
    let bytes = read_bytes(path)?;
    let xml = read_zip_entry(path, &bytes, "word/document.xml")?;
    collect_text_runs(path, &xml)
}

/// XLSX cell text lives in the shared-strings table; numeric cells are not
/// rendered. That recovers the prose content (skills, project names, role
/// descriptions) that matters for embedding.
fn read_xlsx(path: &Path) -> Result<String, IngestError> {
    let bytes = read_bytes(path)?;
    let xml = read_zip_entry(path, &bytes, "xl/sharedStrings.xml")?;
    collect_text_runs(path, &xml)
}

fn read_zip_entry(path: &Path, bytes: &[u8], name: &str) -> Result<Vec<u8>, IngestError> {
    let unreadable = |reason: String| IngestError::Unreadable {
        path: path.to_path_buf(),
        reason,
    };

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| unreadable(format!("not a valid archive: {e}")))?;
    let entry = archive
        .by_name(name)
        .map_err(|e| unreadable(format!("{name} not found: {e}")))?;

    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| unreadable(e.to_string()))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(unreadable(format!("{name} exceeds size limit")));
    }
    Ok(out)
}

/// Collect the text content of every `t` element (`w:t` in DOCX, `t` under
/// `si` in the XLSX shared-strings table), breaking lines at paragraph and
/// string-item boundaries.
fn collect_text_runs(path: &Path, xml: &[u8]) -> Result<String, IngestError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut out = String::new();
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" | b"si" => {
                    if !out.ends_with('\n') && !out.is_empty() {
                        out.push('\n');
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::Unreadable {
                    path: path.to_path_buf(),
                    reason: format!("XML parse failed: {e}"),
                })
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_temp(name: &str, content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn markdown_front_matter_becomes_metadata() {
        let (_dir, path) = write_temp(
            "2025-05-01-acme.md",
            "---\ntitle: Backend role\ncompany: Acme\ntype: application\nyear: 2025\nremote: true\ndate: 2025-05-01\nskills: [Rust, SQL]\n---\n# Body\n\nThe letter itself.",
        );
        let doc = read_file(&path).unwrap();
        assert!(doc.body.starts_with("# Body"));
        assert_eq!(doc.metadata.get("title"), Some(&json!("Backend role")));
        assert_eq!(doc.metadata.get("company"), Some(&json!("Acme")));
        assert_eq!(doc.metadata.get("type"), Some(&json!("application")));
        assert_eq!(doc.metadata.get("year"), Some(&json!(2025)));
        assert_eq!(doc.metadata.get("remote"), Some(&json!(true)));
        assert_eq!(doc.metadata.get("date"), Some(&json!("2025-05-01")));
        assert_eq!(doc.metadata.get("skills"), Some(&json!(["Rust", "SQL"])));
        // Defaults fill the gaps without clobbering front-matter.
        assert_eq!(doc.metadata.get("doc_id"), Some(&json!("2025-05-01-acme")));
        assert_eq!(doc.metadata.get("filename"), Some(&json!("2025-05-01-acme.md")));
    }

    #[test]
    fn markdown_without_front_matter_gets_defaults() {
        let (_dir, path) = write_temp("notes.md", "Just some notes.");
        let doc = read_file(&path).unwrap();
        assert_eq!(doc.body, "Just some notes.");
        assert_eq!(doc.metadata.get("type"), Some(&json!("unknown")));
        assert_eq!(doc.metadata.get("doc_id"), Some(&json!("notes")));
    }

    #[test]
    fn unclosed_front_matter_is_treated_as_body() {
        let (_dir, path) = write_temp("broken.md", "---\ntitle: dangling\nno close");
        let doc = read_file(&path).unwrap();
        assert!(doc.body.contains("dangling"));
        assert!(doc.metadata.get("title").is_none());
    }

    #[test]
    fn txt_and_csv_read_verbatim() {
        let (_dir, path) = write_temp("skills.csv", "name,years\nRust,4\nSQL,6\n");
        let doc = read_file(&path).unwrap();
        assert!(doc.body.contains("Rust,4"));
        assert_eq!(doc.metadata.get("type"), Some(&json!("file")));
        assert_eq!(doc.metadata.get("source_ext"), Some(&json!("csv")));
    }

    #[test]
    fn quoted_front_matter_value_stays_verbatim() {
        assert_eq!(parse_front_matter_value("\"2025-05-01\""), json!("2025-05-01"));
        assert_eq!(parse_front_matter_value("'42'"), json!("42"));
    }

    #[test]
    fn datetime_values_normalize_to_iso8601() {
        assert_eq!(
            parse_front_matter_value("2025-05-01 09:30:00"),
            json!("2025-05-01T09:30:00")
        );
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let (_dir, path) = write_temp("photo.png", "not text");
        assert!(matches!(
            read_file(&path).unwrap_err(),
            IngestError::UnsupportedFormat(ext) if ext == "png"
        ));
    }

    #[test]
    fn invalid_pdf_is_unreadable() {
        let (_dir, path) = write_temp("cv.pdf", "not a pdf");
        assert!(matches!(
            read_file(&path).unwrap_err(),
            IngestError::Unreadable { .. }
        ));
    }

    #[test]
    fn invalid_docx_is_unreadable() {
        let (_dir, path) = write_temp("cv.docx", "not a zip");
        assert!(matches!(
            read_file(&path).unwrap_err(),
            IngestError::Unreadable { .. }
        ));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = read_file(Path::new("/no/such/file.md")).unwrap_err();
        assert!(matches!(err, IngestError::Unreadable { .. }));
    }

    #[test]
    fn docx_text_runs_are_collected() {
        let xml = br#"<?xml version="1.0"?><w:document xmlns:w="ns"><w:body><w:p><w:r><w:t>Senior engineer</w:t></w:r></w:p><w:p><w:r><w:t>Five years of Rust</w:t></w:r></w:p></w:body></w:document>"#;
        let text = collect_text_runs(Path::new("cv.docx"), xml).unwrap();
        assert_eq!(text, "Senior engineer\nFive years of Rust");
    }
}
