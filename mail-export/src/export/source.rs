use super::report::{ExportLog, IncidentKind};
use crate::store::{Message, MessageStore};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

/// Open the full content of a message: the inline prefix, followed by the
/// overflow file unless the prefix already covers the recorded size.
///
/// Returns `None` when the message cannot be read; the reason is recorded in
/// `log`. A size mismatch is recorded too, but the message is still returned.
pub fn open_message<'m>(
    store: &dyn MessageStore,
    m: &'m Message,
    log: &mut ExportLog,
) -> Option<Box<dyn BufRead + 'm>> {
    if m.is_inline() {
        return Some(Box::new(m.msg_prefix.as_slice()));
    }

    let path = store.message_file(m.id);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => {
            log.record(
                m.id,
                IncidentKind::Open {
                    path,
                    error: e.to_string(),
                },
            );
            return None;
        }
    };
    let file_size = match file.metadata() {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            log.record(
                m.id,
                IncidentKind::Stat {
                    path,
                    error: e.to_string(),
                },
            );
            return None;
        }
    };

    let prefix = m.msg_prefix.len() as u64;
    if prefix + file_size != m.size {
        log.record(
            m.id,
            IncidentKind::SizeMismatch {
                recorded: m.size,
                prefix,
                file: file_size,
            },
        );
    }

    Some(Box::new(BufReader::new(m.msg_prefix.as_slice().chain(file))))
}
