use crate::error::{Result, TutorError};
use log::{debug, info, warn};
use mime_guess::from_path;
use std::fs;
use std::panic;
use std::path::Path;
use std::sync::Mutex;
use std::thread;

/// Serializes swaps of the process-wide panic hook
static PANIC_HOOK_LOCK: Mutex<()> = Mutex::new(());

/// How a source document is turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    /// Map a MIME type onto a supported document kind
    pub fn from_mime(mime_type: &str) -> Result<Self> {
        match mime_type {
            mime if mime.starts_with("application/pdf") => Ok(DocumentKind::Pdf),
            mime if mime.starts_with("text/") => Ok(DocumentKind::Text),
            other => Err(TutorError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Raw document bytes plus the metadata needed to extract them
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// The document's file name
    pub name: String,
    /// The document's MIME type
    pub mime_type: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    /// Read a document from disk, rejecting formats that cannot be extracted
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TutorError::Extraction(format!("Invalid file name: {}", path.display())))?
            .to_string();

        let mime_type = from_path(path).first_or_octet_stream().to_string();
        debug!("Detected MIME type: {}", mime_type);

        let kind = DocumentKind::from_mime(&mime_type)?;
        let bytes = fs::read(path)?;

        Ok(SourceDocument {
            name,
            mime_type,
            kind,
            bytes,
        })
    }

    /// Extract the document's text according to its kind
    pub fn extract_text(&self) -> Result<String> {
        match self.kind {
            DocumentKind::Pdf => {
                info!("Processing PDF document: {}", self.name);
                extract_pdf_text(&self.bytes)
            }
            DocumentKind::Text => {
                info!("Processing text document: {}", self.name);
                let content = String::from_utf8(self.bytes.clone())
                    .map_err(|e| TutorError::Extraction(format!("Invalid UTF-8 text: {}", e)))?;
                Ok(normalize_line_endings(&content))
            }
        }
    }
}

/// Extract text from in-memory PDF bytes.
///
/// The parser may panic on malformed files; that is reported as an
/// extraction failure like any other parse error, without the panic
/// message reaching stderr.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let content = catch_silent(move || pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| TutorError::Extraction("PDF parser aborted on malformed input".to_string()))?
        .map_err(|e| TutorError::Extraction(e.to_string()))?;

    let content = normalize_line_endings(&content);
    if content.trim().is_empty() {
        warn!("Extracted PDF content is empty or contains only whitespace");
    }

    Ok(content)
}

/// Run `f`, turning a panic into `Err` with the panic hook muted for the call.
///
/// The hook is process-wide, so panics on other threads during the call are
/// muted too.
fn catch_silent<T>(f: impl FnOnce() -> T + panic::UnwindSafe) -> thread::Result<T> {
    let _guard = PANIC_HOOK_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let previous = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let outcome = panic::catch_unwind(f);
    panic::set_hook(previous);

    outcome
}

/// Drop carriage returns so paragraph breaks are always a literal "\n\n"
fn normalize_line_endings(text: &str) -> String {
    text.replace('\r', "")
}

/// A minimal one-page PDF showing `text` in Helvetica
#[cfg(test)]
pub(crate) fn one_page_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in &offsets {
        xref.push_str(&format!("{:010} 00000 n \n", offset));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));
    pdf.extend_from_slice(xref.as_bytes());

    pdf
}
