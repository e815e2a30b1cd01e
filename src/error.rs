use thiserror::Error;

/// Failures surfaced by the document session and its collaborators
#[derive(Error, Debug)]
pub enum TutorError {
    /// The source bytes could not be decoded into text
    #[error("Failed to extract text from document: {0}")]
    Extraction(String),

    /// A query was issued before any document was loaded
    #[error("No document has been processed. Please upload a PDF first.")]
    NotReady,

    /// Retrieval ran but produced nothing usable
    #[error("No relevant content found in the document")]
    NoMatch,

    #[error("Unsupported document format: {0}. Only text and PDF files are supported.")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TutorError>;
