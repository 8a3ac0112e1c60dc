use std::io::{Cursor, Read};
use std::path::Path;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;
use crate::errors::AttestError;

static DOCX_TEXT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|</w:p>|<w:tab/>|<w:br/>").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PlainText,
    Pdf,
    Docx,
    Unknown,
}

impl DocumentKind {
    /// Declared MIME wins; generic or missing MIME falls back to the extension.
    pub fn detect(mime_type: &str, path: &Path) -> Self {
        let mime = mime_type.trim().to_lowercase();
        let by_mime = match mime.as_str() {
            "application/pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some(Self::Docx),
            "application/json" | "application/xml" | "application/csv" | "application/x-yaml" => Some(Self::PlainText),
            m if m.starts_with("text/") => Some(Self::PlainText),
            _ => None,
        };
        if let Some(kind) = by_mime {
            return kind;
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "txt" | "md" | "csv" | "json" | "xml" | "yaml" | "yml" | "log" | "html" | "htm" => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Unknown => "unknown",
        }
    }

    /// MIME type to record for an upload that did not declare one.
    pub fn guess_mime(path: &Path) -> &'static str {
        match Self::detect("", path) {
            Self::Pdf => "application/pdf",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::PlainText => "text/plain",
            Self::Unknown => "application/octet-stream",
        }
    }
}

pub fn plain_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{FEFF}').unwrap_or(&text).to_string()
}

/// PDF text via `pdf-extract`. A PDF with no text layer yields an empty string.
pub async fn pdf_text(bytes: Vec<u8>) -> Result<String, AttestError> {
    let result = on_blocking_thread("PDF", move || pdf_extract::extract_text_from_mem(&bytes)).await?;

    match result {
        Ok(text) => Ok(text
            .lines()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n")),
        Err(e) => {
            warn!(error = %e, "PDF extraction failed");
            Err(AttestError::ExtractionFailed(format!("unreadable PDF: {}", e)))
        }
    }
}

/// DOCX text from `word/document.xml`, one line per paragraph.
pub async fn docx_text(bytes: Vec<u8>) -> Result<String, AttestError> {
    on_blocking_thread("DOCX", move || docx_text_blocking(&bytes)).await?
}

/// Run a parser off the async runtime. Parsers panic on some malformed
/// input; a panic is an unreadable file, not a server fault.
async fn on_blocking_thread<T, F>(kind: &'static str, parse: F) -> Result<T, AttestError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(parse).await.map_err(|e| {
        warn!(kind, error = %e, "Parser aborted");
        let reason = if e.is_panic() { "parser panicked" } else { "parser task cancelled" };
        AttestError::ExtractionFailed(format!("unreadable {}: {}", kind, reason))
    })
}

fn docx_text_blocking(bytes: &[u8]) -> Result<String, AttestError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AttestError::ExtractionFailed(format!("unreadable DOCX: {}", e)))?;

    let Ok(mut document) = archive.by_name("word/document.xml") else {
        return Ok(String::new());
    };
    let mut xml = String::new();
    document.read_to_string(&mut xml)
        .map_err(|e| AttestError::ExtractionFailed(format!("unreadable DOCX body: {}", e)))?;

    let mut text = String::new();
    for caps in DOCX_TEXT_RUN.captures_iter(&xml) {
        match caps.get(1) {
            Some(run) => text.push_str(&decode_xml_entities(run.as_str())),
            None if &caps[0] == "<w:tab/>" => text.push('\t'),
            None => text.push('\n'),
        }
    }
    Ok(text)
}

fn decode_xml_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_parser_panic_is_extraction_failure() {
        let result: Result<String, AttestError> = on_blocking_thread("PDF", || -> String { panic!("malformed xref table") }).await;
        match result {
            Err(AttestError::ExtractionFailed(msg)) => assert_eq!(msg, "unreadable PDF: parser panicked"),
            other => panic!("expected ExtractionFailed, got {:?}", other),
        }
    }

    fn docx_bytes(body: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("word/document.xml", options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_detect_prefers_mime_then_extension() {
        assert_eq!(DocumentKind::detect("application/pdf", Path::new("x.bin")), DocumentKind::Pdf);
        assert_eq!(DocumentKind::detect("text/csv", Path::new("x")), DocumentKind::PlainText);
        assert_eq!(DocumentKind::detect("application/octet-stream", Path::new("r.DOCX")), DocumentKind::Docx);
        assert_eq!(DocumentKind::detect("", Path::new("photo.jpg")), DocumentKind::Unknown);
        assert_eq!(DocumentKind::guess_mime(Path::new("a.txt")), "text/plain");
    }

    #[tokio::test]
    async fn test_docx_paragraphs_and_entities() {
        let xml = r#"<w:document><w:body><w:p><w:r><w:t>Access &amp; review</w:t></w:r></w:p><w:p><w:r><w:t xml:space="preserve">Annual </w:t><w:t>cycle</w:t></w:r></w:p></w:body></w:document>"#;
        let text = docx_text(docx_bytes(xml)).await.unwrap();
        assert_eq!(text, "Access & review\nAnnual cycle\n");
    }

    #[tokio::test]
    async fn test_docx_without_body_is_empty() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default()).unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        assert_eq!(docx_text(buf.into_inner()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_garbage_docx_is_extraction_failure() {
        let err = docx_text(b"not a zip".to_vec()).await.unwrap_err();
        assert!(matches!(err, AttestError::ExtractionFailed(_)));
    }

    #[test]
    fn test_plain_text_strips_bom() {
        assert_eq!(plain_text("\u{FEFF}hello".as_bytes()), "hello");
    }
}
