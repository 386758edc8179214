//! Export types
//!
//! Data structures describing an export request and its outcome.

use super::report::ExportIncident;
use crate::error::{ExportError, Result};
use serde::{Deserialize, Serialize};

/// How messages are encoded inside the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// One directory per mailbox, one file per message
    #[default]
    Maildir,
    /// One file per mailbox with all messages concatenated
    Mbox,
}

/// Container the export is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    #[default]
    Tar,
    /// Gzip-compressed tar
    Tgz,
    Zip,
    /// Plain directory tree
    Dir,
    /// A single mbox stream, only one mailbox fits
    Mbox,
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Maildir => write!(f, "maildir"),
            ExportFormat::Mbox => write!(f, "mbox"),
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maildir" => Ok(ExportFormat::Maildir),
            "mbox" => Ok(ExportFormat::Mbox),
            other => Err(format!("unknown export format: {}", other)),
        }
    }
}

impl std::str::FromStr for ArchiveKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tar" => Ok(ArchiveKind::Tar),
            "tgz" | "tar.gz" => Ok(ArchiveKind::Tgz),
            "zip" => Ok(ArchiveKind::Zip),
            "dir" | "directory" => Ok(ArchiveKind::Dir),
            "mbox" => Ok(ArchiveKind::Mbox),
            other => Err(format!("unknown archive kind: {}", other)),
        }
    }
}

/// Export request
///
/// `mailbox` and `message_ids` are mutually exclusive. With neither set,
/// every mailbox is exported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Encoding of the exported messages
    pub format: ExportFormat,
    /// Mailbox to export
    pub mailbox: Option<String>,
    /// Explicit messages to export, in this order
    pub message_ids: Option<Vec<i64>>,
    /// Include descendants of `mailbox`
    pub recursive: bool,
}

/// What an export covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportSelection {
    /// Every mailbox in the account
    All,
    /// One mailbox, optionally with its descendants
    Mailbox { name: String, recursive: bool },
    /// Listed messages, gathered in a synthetic "Export" mailbox
    Messages(Vec<i64>),
}

impl ExportRequest {
    /// Resolve the request into a selection
    pub fn selection(&self) -> Result<ExportSelection> {
        let mailbox = self.mailbox.as_deref().filter(|name| !name.is_empty());
        match (mailbox, &self.message_ids) {
            (Some(_), Some(ids)) if !ids.is_empty() => Err(ExportError::ConflictingSelection),
            (Some(name), _) => Ok(ExportSelection::Mailbox {
                name: name.to_string(),
                recursive: self.recursive,
            }),
            (None, Some(ids)) => Ok(ExportSelection::Messages(ids.clone())),
            (None, None) => Ok(ExportSelection::All),
        }
    }
}

/// Outcome of a finished export
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    /// Mailboxes written to the archive
    pub mailboxes: usize,
    /// Messages written to the archive
    pub messages: u64,
    /// Recoverable problems, also written to errors.txt
    pub incidents: Vec<ExportIncident>,
}

impl ExportSummary {
    /// Number of messages left out of the archive
    pub fn skipped(&self) -> usize {
        self.incidents.iter().filter(|i| i.kind.skips_message()).count()
    }
}
