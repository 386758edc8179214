//! Export orchestration
//!
//! Validates the selection, holds one read snapshot for the whole export,
//! feeds mailboxes and messages to [`MailboxExporter`]s in a stable order and
//! writes `errors.txt` when anything had to be skipped.

use super::archiver::Archiver;
use super::mailbox::{write_entry, MailboxExporter, SessionContext};
use super::report::{ExportLog, IncidentKind, ERRORS_FILE};
use super::types::{ExportRequest, ExportSelection, ExportSummary};
use crate::error::{ExportError, Result, ResultExt};
use crate::store::{parent_mailbox_name, Mailbox, MessageStore, ReadSnapshot};
use chrono::Utc;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the mailbox holding messages exported by id
pub const EXPORT_MAILBOX: &str = "Export";

/// Read snapshot that is rolled back when dropped
struct SnapshotGuard<'s> {
    snapshot: Box<dyn ReadSnapshot + 's>,
}

impl<'s> SnapshotGuard<'s> {
    fn begin(store: &'s dyn MessageStore) -> Result<Self> {
        let snapshot = store
            .begin_read()
            .map_err(|e| ExportError::Snapshot(e.to_string()))?;
        Ok(Self { snapshot })
    }
}

impl<'s> Deref for SnapshotGuard<'s> {
    type Target = dyn ReadSnapshot + 's;

    fn deref(&self) -> &Self::Target {
        self.snapshot.as_ref()
    }
}

impl Drop for SnapshotGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.snapshot.rollback() {
            warn!("transaction rollback: {}", e);
        }
    }
}

/// A mailbox picked for export with its name inside the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedMailbox {
    pub mailbox: Mailbox,
    pub export_name: String,
}

/// Pick the mailboxes to export, parents before their children
///
/// Expunged mailboxes are left out. When a single mailbox is exported without
/// its children, its parent path is stripped so the archive starts at the
/// mailbox itself.
pub fn select_mailboxes(mut mailboxes: Vec<Mailbox>, selection: &ExportSelection) -> Vec<SelectedMailbox> {
    mailboxes.retain(|mb| !mb.expunged);
    mailboxes.sort_by(|a, b| a.name.cmp(&b.name));

    let (wanted, recursive) = match selection {
        ExportSelection::All => (None, false),
        ExportSelection::Mailbox { name, recursive } => (Some(name.as_str()), *recursive),
        ExportSelection::Messages(_) => return Vec::new(),
    };

    let child_prefix = wanted.map(|name| format!("{}/", name));
    let trim_prefix = match wanted {
        Some(name) if !recursive => parent_mailbox_name(name).map(|parent| format!("{}/", parent)),
        _ => None,
    };

    mailboxes
        .into_iter()
        .filter(|mb| match (wanted, &child_prefix) {
            (Some(name), Some(prefix)) => {
                mb.name == name || (recursive && mb.name.starts_with(prefix.as_str()))
            }
            _ => true,
        })
        .map(|mailbox| {
            let export_name = match &trim_prefix {
                Some(prefix) => mailbox
                    .name
                    .strip_prefix(prefix.as_str())
                    .unwrap_or(&mailbox.name)
                    .to_string(),
                None => mailbox.name.clone(),
            };
            SelectedMailbox {
                mailbox,
                export_name,
            }
        })
        .collect()
}

/// Export orchestrator
pub struct Exporter<'s> {
    store: &'s dyn MessageStore,
    scratch_dir: PathBuf,
}

impl<'s> Exporter<'s> {
    /// Create an exporter keeping mbox scratch files in the system temp dir
    pub fn new(store: &'s dyn MessageStore) -> Self {
        Self {
            store,
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Keep mbox scratch files in `dir`
    pub fn with_scratch_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.scratch_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Export the selected messages into `archiver` and close it
    ///
    /// Problems with individual messages are recorded in the summary and in
    /// errors.txt. Errors are only returned when the export as a whole
    /// failed.
    pub fn export(&self, archiver: &mut dyn Archiver, request: &ExportRequest) -> Result<ExportSummary> {
        let selection = request.selection()?;
        info!("Starting {} export of {:?}", request.format, selection);

        let snapshot = SnapshotGuard::begin(self.store)?;
        let ctx = SessionContext {
            store: self.store,
            start: Utc::now(),
            scratch_dir: &self.scratch_dir,
        };
        let mut log = ExportLog::new();
        let mut summary = ExportSummary::default();

        match &selection {
            ExportSelection::Messages(ids) => {
                let mut exporter =
                    MailboxExporter::new(ctx, archiver, &mut log, EXPORT_MAILBOX, request.format)?;
                for &id in ids {
                    match snapshot.message(id) {
                        Err(e) => exporter.record_incident(id, IncidentKind::Lookup(e.to_string())),
                        Ok(None) => exporter.record_incident(id, IncidentKind::NotFound),
                        Ok(Some(m)) if m.expunged => {
                            exporter.record_incident(id, IncidentKind::Expunged)
                        }
                        Ok(Some(m)) => exporter
                            .export_message(&m)
                            .context("exporting messages")?,
                    }
                }
                summary.messages += exporter.finish().context("exporting messages")?;
                summary.mailboxes = 1;
            }
            ExportSelection::All | ExportSelection::Mailbox { .. } => {
                let mailboxes = snapshot.mailboxes().context("query mailboxes")?;
                let selected = select_mailboxes(mailboxes, &selection);
                if selected.is_empty() {
                    warn!("No mailboxes match {:?}", selection);
                }

                for SelectedMailbox {
                    mailbox,
                    export_name,
                } in selected
                {
                    let mut messages = snapshot
                        .mailbox_messages(mailbox.id)
                        .context("query messages")?;
                    messages.retain(|m| !m.expunged);
                    messages.sort_by_key(|m| (m.received, m.id));
                    debug!(
                        "Exporting mailbox {} as {} with {} messages",
                        mailbox.name,
                        export_name,
                        messages.len()
                    );

                    let mut exporter =
                        MailboxExporter::new(ctx, archiver, &mut log, &export_name, request.format)?;
                    for m in &messages {
                        exporter.export_message(m)?;
                    }
                    summary.messages += exporter.finish()?;
                    summary.mailboxes += 1;
                }
            }
        }

        if !log.is_empty() {
            write_entry(archiver, ERRORS_FILE, log.render().as_bytes(), Utc::now())
                .context("adding errors.txt to archive")?;
        }
        archiver.close().context("closing archive")?;

        summary.incidents = log.into_incidents();
        info!(
            "Export finished: {} mailboxes, {} messages, {} problems",
            summary.mailboxes,
            summary.messages,
            summary.incidents.len()
        );
        Ok(summary)
    }
}

/// Export messages from `store` with default settings
pub fn export_messages(
    store: &dyn MessageStore,
    archiver: &mut dyn Archiver,
    request: &ExportRequest,
) -> Result<ExportSummary> {
    Exporter::new(store).export(archiver, request)
}
