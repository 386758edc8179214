//! On-disk account store
//!
//! Keeps a JSON index of mailboxes and messages in `index.json` and the part
//! of each message that is not held inline in `msg/<dir>/<id>`.

use super::path::message_path;
use super::types::{Flags, Mailbox, Message};
use super::{MessageStore, ReadSnapshot};
use crate::error::{ExportError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AccountIndex {
    next_mailbox_id: i64,
    next_message_id: i64,
    mailboxes: Vec<Mailbox>,
    messages: BTreeMap<i64, Message>,
}

/// A message to add to a mailbox
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    /// Bytes kept inline in the index
    pub prefix: Vec<u8>,
    /// Bytes written to the overflow file
    pub body: Vec<u8>,
    pub received: DateTime<Utc>,
    pub mail_from: Option<String>,
    pub flags: Flags,
    pub keywords: Vec<String>,
}

/// Mail account stored in a directory
pub struct AccountStore {
    dir: PathBuf,
    index: RwLock<AccountIndex>,
}

impl AccountStore {
    /// Open an account directory, creating an empty index when there is none
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let index_path = dir.join(INDEX_FILE);

        let index = if index_path.exists() {
            let data = fs::read(&index_path)?;
            serde_json::from_slice(&data)?
        } else {
            fs::create_dir_all(dir.join("msg"))?;
            AccountIndex {
                next_mailbox_id: 1,
                next_message_id: 1,
                ..Default::default()
            }
        };

        info!("Opened account store at {}", dir.display());

        Ok(Self {
            dir,
            index: RwLock::new(index),
        })
    }

    /// Account directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the index back to disk
    pub fn save(&self) -> Result<()> {
        let index = self.read_index()?;
        let data = serde_json::to_vec_pretty(&*index)?;

        // Replace atomically so a crash never leaves a truncated index.
        let tmp_path = self.dir.join(format!("{}.tmp", INDEX_FILE));
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, self.dir.join(INDEX_FILE))?;
        Ok(())
    }

    /// Create a mailbox
    pub fn create_mailbox(&self, name: &str) -> Result<Mailbox> {
        if name.is_empty() || name.starts_with('/') || name.ends_with('/') {
            return Err(ExportError::Store(format!("invalid mailbox name {:?}", name)));
        }

        let mut index = self.write_index()?;
        if index.mailboxes.iter().any(|mb| mb.name == name && !mb.expunged) {
            return Err(ExportError::Store(format!("mailbox {} already exists", name)));
        }

        let mailbox = Mailbox {
            id: index.next_mailbox_id,
            name: name.to_string(),
            expunged: false,
        };
        index.next_mailbox_id += 1;
        index.mailboxes.push(mailbox.clone());

        debug!("Created mailbox {} with id {}", name, mailbox.id);
        Ok(mailbox)
    }

    /// Add a message to a mailbox
    pub fn deliver(&self, mailbox_id: i64, new: NewMessage) -> Result<Message> {
        let mut index = self.write_index()?;
        if !index
            .mailboxes
            .iter()
            .any(|mb| mb.id == mailbox_id && !mb.expunged)
        {
            return Err(ExportError::Store(format!("no mailbox with id {}", mailbox_id)));
        }

        let id = index.next_message_id;
        if !new.body.is_empty() {
            let path = self.message_file(id);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &new.body)?;
        }

        let message = Message {
            id,
            mailbox_id,
            expunged: false,
            size: (new.prefix.len() + new.body.len()) as u64,
            msg_prefix: new.prefix,
            received: new.received,
            mail_from: new.mail_from,
            flags: new.flags,
            keywords: new.keywords,
        };
        index.next_message_id += 1;
        index.messages.insert(id, message.clone());

        debug!("Delivered message {} to mailbox {}", id, mailbox_id);
        Ok(message)
    }

    /// Mark a mailbox and its messages expunged
    pub fn expunge_mailbox(&self, mailbox_id: i64) -> Result<()> {
        let mut index = self.write_index()?;
        let mailbox = index
            .mailboxes
            .iter_mut()
            .find(|mb| mb.id == mailbox_id)
            .ok_or_else(|| ExportError::Store(format!("no mailbox with id {}", mailbox_id)))?;
        mailbox.expunged = true;

        for message in index.messages.values_mut() {
            if message.mailbox_id == mailbox_id {
                message.expunged = true;
            }
        }
        Ok(())
    }

    /// Mark a message expunged
    pub fn expunge_message(&self, message_id: i64) -> Result<()> {
        let mut index = self.write_index()?;
        let message = index
            .messages
            .get_mut(&message_id)
            .ok_or_else(|| ExportError::Store(format!("no message with id {}", message_id)))?;
        message.expunged = true;
        Ok(())
    }

    fn read_index(&self) -> Result<std::sync::RwLockReadGuard<'_, AccountIndex>> {
        self.index
            .read()
            .map_err(|_| ExportError::Store("account index lock poisoned".to_string()))
    }

    fn write_index(&self) -> Result<std::sync::RwLockWriteGuard<'_, AccountIndex>> {
        self.index
            .write()
            .map_err(|_| ExportError::Store("account index lock poisoned".to_string()))
    }
}

impl MessageStore for AccountStore {
    fn begin_read(&self) -> Result<Box<dyn ReadSnapshot + '_>> {
        let index = self.read_index()?.clone();
        Ok(Box::new(AccountSnapshot { index }))
    }

    fn message_file(&self, message_id: i64) -> PathBuf {
        self.dir.join("msg").join(message_path(message_id))
    }
}

/// Point-in-time copy of the account index
struct AccountSnapshot {
    index: AccountIndex,
}

impl ReadSnapshot for AccountSnapshot {
    fn mailboxes(&self) -> Result<Vec<Mailbox>> {
        Ok(self.index.mailboxes.clone())
    }

    fn mailbox_messages(&self, mailbox_id: i64) -> Result<Vec<Message>> {
        Ok(self
            .index
            .messages
            .values()
            .filter(|m| m.mailbox_id == mailbox_id)
            .cloned()
            .collect())
    }

    fn message(&self, message_id: i64) -> Result<Option<Message>> {
        Ok(self.index.messages.get(&message_id).cloned())
    }

    fn rollback(&mut self) -> Result<()> {
        Ok(())
    }
}
