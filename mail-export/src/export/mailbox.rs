//! Per-mailbox export
//!
//! A [`MailboxExporter`] turns the messages of one mailbox into archive
//! entries. In maildir mode each message is written straight to the archive.
//! In mbox mode messages are collected in a scratch file that becomes a single
//! "<mailbox>.mbox" entry when the exporter is finished.

use super::archiver::Archiver;
use super::flags::MaildirFlags;
use super::maildir::{invalid_keywords, maildir_name, read_lf};
use super::mbox::{EncodeError, MboxWriter};
use super::report::{ExportLog, IncidentKind};
use super::source::open_message;
use super::types::ExportFormat;
use crate::error::{ExportError, Result, ResultExt};
use crate::store::{Message, MessageStore};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const SCRATCH_PREFIX: &str = "mail-export-mbox";

/// Settings shared by all mailbox exports of one session
#[derive(Clone, Copy)]
pub struct SessionContext<'a> {
    pub store: &'a dyn MessageStore,
    /// Session start, used as mtime for generated entries
    pub start: DateTime<Utc>,
    /// Where mbox scratch files are created
    pub scratch_dir: &'a Path,
}

enum FormatState {
    Maildir {
        flags: MaildirFlags,
        /// Keywords already reported as dropped
        reported: HashSet<String>,
    },
    Mbox {
        writer: Option<MboxWriter<BufWriter<NamedTempFile>>>,
    },
}

/// Exports the messages of one mailbox
pub struct MailboxExporter<'a> {
    ctx: SessionContext<'a>,
    archiver: &'a mut dyn Archiver,
    log: &'a mut ExportLog,
    mailbox_name: String,
    state: FormatState,
    exported: u64,
}

impl<'a> MailboxExporter<'a> {
    /// Start exporting a mailbox
    ///
    /// For maildir the new, cur and tmp directories are added right away. For
    /// mbox a scratch file is opened; it is removed again however the
    /// exporter ends.
    pub fn new(
        ctx: SessionContext<'a>,
        archiver: &'a mut dyn Archiver,
        log: &'a mut ExportLog,
        mailbox_name: &str,
        format: ExportFormat,
    ) -> Result<Self> {
        let state = match format {
            ExportFormat::Maildir => {
                for subdir in ["new", "cur", "tmp"] {
                    archiver
                        .create(&format!("{}/{}/", mailbox_name, subdir), 0, ctx.start)
                        .context(&format!("adding maildir {} directory", subdir))?;
                }
                FormatState::Maildir {
                    flags: MaildirFlags::new(),
                    reported: HashSet::new(),
                }
            }
            ExportFormat::Mbox => {
                let tmp = tempfile::Builder::new()
                    .prefix(SCRATCH_PREFIX)
                    .tempfile_in(ctx.scratch_dir)
                    .context("creating temp mbox file")?;
                debug!("Collecting mbox for {} in {}", mailbox_name, tmp.path().display());
                FormatState::Mbox {
                    writer: Some(MboxWriter::new(BufWriter::new(tmp))),
                }
            }
        };

        Ok(Self {
            ctx,
            archiver,
            log,
            mailbox_name: mailbox_name.to_string(),
            state,
            exported: 0,
        })
    }

    /// Record a problem with a message that never reached this exporter
    pub fn record_incident(&mut self, message_id: i64, kind: IncidentKind) {
        self.log.record(message_id, kind);
    }

    /// Add a message
    ///
    /// Messages that cannot be read are skipped and recorded in the export
    /// log. Errors are only returned for failures that end the export.
    pub fn export_message(&mut self, m: &Message) -> Result<()> {
        let Some(content) = open_message(self.ctx.store, m, self.log) else {
            return Ok(());
        };

        match &mut self.state {
            FormatState::Maildir { flags, reported } => {
                // The size has to be known before the entry is created, and
                // line ending conversion changes it.
                let data = match read_lf(content) {
                    Ok(data) => data,
                    Err(e) => {
                        self.log.record(m.id, IncidentKind::Read(e.to_string()));
                        return Ok(());
                    }
                };

                let name = maildir_name(m, flags);
                let path = name.path(&self.mailbox_name);
                write_entry(self.archiver, &path, &data, m.received)
                    .context("adding message to archive")?;
                debug!("Exported message {} as {}", m.id, path);

                for keyword in name.dropped {
                    if reported.insert(keyword.clone()) {
                        self.log.record(m.id, IncidentKind::KeywordDropped(keyword));
                    }
                }
            }
            FormatState::Mbox { writer } => {
                let writer = writer
                    .as_mut()
                    .ok_or_else(|| ExportError::Archive("mbox already finished".to_string()))?;
                match writer.write_message(m, content) {
                    Ok(()) => debug!("Exported message {} to {}.mbox", m.id, self.mailbox_name),
                    Err(EncodeError::Read(e)) => {
                        self.log.record(m.id, IncidentKind::Read(e.to_string()));
                        return Ok(());
                    }
                    Err(EncodeError::Write(e)) => {
                        return Err(e).context("write message to mbox temp file");
                    }
                }
            }
        }

        for keyword in invalid_keywords(m) {
            self.log
                .record(m.id, IncidentKind::InvalidKeyword(keyword.to_string()));
        }
        self.exported += 1;
        Ok(())
    }

    /// Write the final entries of the mailbox: the dovecot-keywords file for
    /// maildir, the collected mbox file for mbox. Returns the number of
    /// messages exported.
    pub fn finish(mut self) -> Result<u64> {
        let start = self.ctx.start;
        match &mut self.state {
            FormatState::Maildir { flags, .. } => {
                if !flags.is_empty() {
                    let name = format!("{}/dovecot-keywords", self.mailbox_name);
                    write_entry(self.archiver, &name, flags.keywords_file().as_bytes(), start)
                        .context("adding dovecot-keywords")?;
                }
            }
            FormatState::Mbox { writer } => {
                let writer = writer
                    .take()
                    .ok_or_else(|| ExportError::Archive("mbox already finished".to_string()))?;
                // On error the scratch file is removed when `tmp` is dropped.
                let mut tmp = writer
                    .finish()
                    .into_inner()
                    .map_err(|e| e.into_error())
                    .context("flush mbox writer")?;
                let metadata = tmp
                    .as_file()
                    .metadata()
                    .context("stat temporary mbox file")?;
                tmp.seek(SeekFrom::Start(0))
                    .context("seek to start of temporary mbox file")?;
                let mtime = metadata.modified().map(DateTime::<Utc>::from).unwrap_or(start);

                let name = format!("{}.mbox", self.mailbox_name);
                let mut w = self
                    .archiver
                    .create(&name, metadata.len(), mtime)
                    .context("add mbox to archive")?;
                io::copy(&mut tmp, &mut w).context("copying temp mbox file to archive")?;
                w.finish().context("closing mbox file")?;

                remove_scratch(tmp);
            }
        }
        Ok(self.exported)
    }

    /// Remove the scratch file, if still present
    pub fn cleanup(&mut self) {
        if let FormatState::Mbox { writer } = &mut self.state {
            if let Some(writer) = writer.take() {
                // Unflushed data is of no use anymore.
                let (tmp, _) = writer.finish().into_parts();
                remove_scratch(tmp);
            }
        }
    }
}

impl Drop for MailboxExporter<'_> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove_scratch(tmp: NamedTempFile) {
    let path = tmp.path().to_path_buf();
    if let Err(e) = tmp.close() {
        warn!("Removing temporary mbox file {}: {}", path.display(), e);
    }
}

/// Add a complete entry to the archive
pub(crate) fn write_entry(
    archiver: &mut dyn Archiver,
    name: &str,
    data: &[u8],
    mtime: DateTime<Utc>,
) -> Result<()> {
    let mut w = archiver.create(name, data.len() as u64, mtime)?;
    w.write_all(data)?;
    w.finish()?;
    Ok(())
}
