//! Recoverable export problems
//!
//! Problems with single messages do not abort an export. Each one becomes an
//! [`ExportIncident`] and the whole list is written to `errors.txt` at the end.

use std::fmt;
use std::path::PathBuf;
use tracing::warn;

/// Name of the archive entry listing the incidents
pub const ERRORS_FILE: &str = "errors.txt";

/// What went wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncidentKind {
    /// Message lookup failed
    Lookup(String),
    /// No message with this id
    NotFound,
    /// Message is expunged
    Expunged,
    /// Overflow file could not be opened
    Open { path: PathBuf, error: String },
    /// Overflow file could not be inspected
    Stat { path: PathBuf, error: String },
    /// Recorded size differs from what is on disk. The message is exported.
    SizeMismatch {
        recorded: u64,
        prefix: u64,
        file: u64,
    },
    /// Reading the message failed halfway
    Read(String),
    /// Keyword got no maildir letter. The message is exported without it.
    KeywordDropped(String),
    /// Keyword cannot be written out. The message is exported without it.
    InvalidKeyword(String),
}

impl IncidentKind {
    /// Whether the message was left out of the archive
    pub fn skips_message(&self) -> bool {
        !matches!(
            self,
            IncidentKind::SizeMismatch { .. }
                | IncidentKind::KeywordDropped(_)
                | IncidentKind::InvalidKeyword(_)
        )
    }
}

/// A recoverable problem with one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportIncident {
    pub message_id: i64,
    pub kind: IncidentKind,
}

impl fmt::Display for ExportIncident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.message_id;
        match &self.kind {
            IncidentKind::Lookup(error) => write!(f, "get message with id {}: {}", id, error),
            IncidentKind::NotFound => write!(f, "get message with id {}: not found", id),
            IncidentKind::Expunged => write!(f, "message with id {} is expunged", id),
            IncidentKind::Open { path, error } => write!(
                f,
                "open message file for id {}, path {}: {} (message skipped)",
                id,
                path.display(),
                error
            ),
            IncidentKind::Stat { path, error } => write!(
                f,
                "stat message file for id {}, path {}: {} (message skipped)",
                id,
                path.display(),
                error
            ),
            IncidentKind::SizeMismatch {
                recorded,
                prefix,
                file,
            } => write!(
                f,
                "message size mismatch for message id {}, database has {}, size is {}+{}={}, using calculated size",
                id,
                recorded,
                prefix,
                file,
                prefix + file
            ),
            IncidentKind::Read(error) => write!(
                f,
                "reading from message for id {}: {} (message skipped)",
                id, error
            ),
            IncidentKind::KeywordDropped(keyword) => write!(
                f,
                "keyword {} of message id {} not exported, maildir has room for 26 keywords per mailbox",
                keyword, id
            ),
            IncidentKind::InvalidKeyword(keyword) => write!(
                f,
                "keyword {:?} of message id {} not exported, keywords cannot contain whitespace, control characters or commas",
                keyword, id
            ),
        }
    }
}

/// Ordered list of incidents for one export session
#[derive(Debug, Default)]
pub struct ExportLog {
    incidents: Vec<ExportIncident>,
}

impl ExportLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an incident
    pub fn record(&mut self, message_id: i64, kind: IncidentKind) {
        let incident = ExportIncident { message_id, kind };
        warn!("Export: {}", incident);
        self.incidents.push(incident);
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    pub fn incidents(&self) -> &[ExportIncident] {
        &self.incidents
    }

    /// Contents of errors.txt, one line per incident
    pub fn render(&self) -> String {
        self.incidents
            .iter()
            .map(|incident| format!("{}\n", incident))
            .collect()
    }

    pub fn into_incidents(self) -> Vec<ExportIncident> {
        self.incidents
    }
}
