//! Message store
//!
//! The export engine reads mailboxes and messages through these traits:
//! - [`MessageStore`]: opens read snapshots and maps message IDs to files
//! - [`ReadSnapshot`]: a consistent, read-only view of one account
//! - [`account`]: JSON-indexed on-disk store implementing both

pub mod account;
pub mod path;
pub mod types;

use crate::error::Result;
use std::path::PathBuf;

pub use account::{AccountStore, NewMessage};
pub use path::message_path;
pub use types::*;

/// Source of mailboxes and message data for an export.
pub trait MessageStore {
    /// Open a read-only snapshot. It must stay consistent until rolled back.
    fn begin_read(&self) -> Result<Box<dyn ReadSnapshot + '_>>;

    /// Full path of the overflow file holding the rest of a message.
    fn message_file(&self, message_id: i64) -> PathBuf;
}

/// Read-only view of an account's mailboxes and messages.
pub trait ReadSnapshot {
    /// All mailboxes, expunged ones included, in no particular order.
    fn mailboxes(&self) -> Result<Vec<Mailbox>>;

    /// All messages of a mailbox, expunged ones included, in no particular order.
    fn mailbox_messages(&self, mailbox_id: i64) -> Result<Vec<Message>>;

    /// Look up a single message.
    fn message(&self, message_id: i64) -> Result<Option<Message>>;

    /// Release the snapshot. Nothing was written, so this never loses data.
    fn rollback(&mut self) -> Result<()>;
}
