use std::time::Duration;
use thiserror::Error;

pub const NO_DOCUMENT_MESSAGE: &str = "Please upload a document first.";
pub const NOT_INDEXED_MESSAGE: &str = "Document not indexed yet. Please wait or re-upload.";
pub const NO_RELEVANT_CONTENT_MESSAGE: &str = "No relevant content found in the document.";
pub const TEMPORARY_ISSUE_MESSAGE: &str = "Temporary issue with the AI model. Please try again.";
pub const NO_CLEAR_ANSWER_MESSAGE: &str = "No clear answer found.";

/// Failures the answer router can hit while serving one query.
///
/// None of these ever reach the caller as an error value: [`QueryError::user_message`]
/// turns each into the fixed sentence shown to the user.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no document loaded")]
    NoDocumentLoaded,

    #[error("document has no indexable text")]
    UnindexableDocument,

    #[error("retrieval returned no chunks")]
    NoRelevantContent,

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("no status column could be located")]
    MalformedTable,
}

impl QueryError {
    pub fn user_message(&self) -> &'static str {
        match self {
            QueryError::NoDocumentLoaded => NO_DOCUMENT_MESSAGE,
            QueryError::UnindexableDocument => NOT_INDEXED_MESSAGE,
            QueryError::NoRelevantContent => NO_RELEVANT_CONTENT_MESSAGE,
            QueryError::Generation(GenerationError::EmptyAnswer) => NO_CLEAR_ANSWER_MESSAGE,
            QueryError::Generation(_) => TEMPORARY_ISSUE_MESSAGE,
            // The counter falls through to retrieval on a missing table.
            QueryError::MalformedTable => NO_RELEVANT_CONTENT_MESSAGE,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    Backend { backend: String, details: String },

    #[error("malformed completion payload: {0}")]
    MalformedResponse(String),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("model returned an empty answer")]
    EmptyAnswer,

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl GenerationError {
    /// Blank output is a definitive answer from the model, not a transport fault.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GenerationError::EmptyAnswer)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("csv parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("file is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("path has no extension: {0}")]
    MissingExtension(String),
}

pub type Result<T, E = QueryError> = std::result::Result<T, E>;
