use thiserror::Error;

/// Errors that abort an export session.
///
/// Problems with individual messages are not reported through this type;
/// they end up as [`crate::export::ExportIncident`] records instead.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot have both mailbox and message ids")]
    ConflictingSelection,

    #[error("cannot export multiple files with mbox")]
    MultipleEntries,

    #[error("archive already closed")]
    ArchiveClosed,

    #[error("Invalid archive path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Archive(String),

    #[error("transaction: {0}")]
    Snapshot(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ExportError>,
    },
}

impl ExportError {
    /// Innermost error, below any added context
    pub fn root(&self) -> &ExportError {
        match self {
            ExportError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// Attach a description of what was being done to an error
pub trait ResultExt<T> {
    fn context(self, context: &str) -> Result<T>;
}

impl<T, E: Into<ExportError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|e| ExportError::Context {
            context: context.to_string(),
            source: Box::new(e.into()),
        })
    }
}
