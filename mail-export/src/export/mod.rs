//! Mailbox export
//!
//! Converts stored mailboxes into portable archives:
//! - [`archiver`]: tar, zip, directory and single-stream destinations
//! - [`maildir`] and [`mbox`]: message encoders
//! - [`mailbox`]: per-mailbox exporter
//! - [`manager`]: selection, ordering and the error report

pub mod archiver;
pub mod flags;
pub mod mailbox;
pub mod maildir;
pub mod manager;
pub mod mbox;
pub mod report;
pub mod source;
pub mod types;

pub use archiver::{Archiver, DirArchiver, EntryWriter, MboxArchiver, TarArchiver, ZipArchiver};
pub use flags::MaildirFlags;
pub use mailbox::{MailboxExporter, SessionContext};
pub use manager::{export_messages, select_mailboxes, Exporter, SelectedMailbox, EXPORT_MAILBOX};
pub use mbox::MboxWriter;
pub use report::{ExportIncident, ExportLog, IncidentKind, ERRORS_FILE};
pub use types::*;
