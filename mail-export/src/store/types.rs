//! Store types
//!
//! Mailboxes and messages as the export engine sees them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A mailbox in an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    /// Mailbox ID
    pub id: i64,
    /// Hierarchical name, levels separated by '/'
    pub name: String,
    /// Soft-deleted
    #[serde(default)]
    pub expunged: bool,
}

/// Parent of a hierarchical mailbox name.
pub fn parent_mailbox_name(name: &str) -> Option<&str> {
    name.rsplit_once('/').map(|(parent, _)| parent)
}

/// System and well-known flags of a message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flags {
    pub seen: bool,
    pub answered: bool,
    pub flagged: bool,
    pub forwarded: bool,
    pub junk: bool,
    pub notjunk: bool,
    pub deleted: bool,
    pub draft: bool,
    pub phishing: bool,
    pub mdnsent: bool,
}

/// A stored message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message ID
    pub id: i64,
    /// Owning mailbox
    pub mailbox_id: i64,
    /// Soft-deleted
    #[serde(default)]
    pub expunged: bool,
    /// Recorded total size: inline prefix plus overflow file
    pub size: u64,
    /// First bytes of the message, kept inline
    #[serde(default)]
    pub msg_prefix: Vec<u8>,
    /// When the message was delivered
    pub received: DateTime<Utc>,
    /// SMTP MAIL FROM, if known
    #[serde(default)]
    pub mail_from: Option<String>,
    #[serde(default)]
    pub flags: Flags,
    /// Free-form keywords beyond the well-known flags
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Message {
    /// Whether the whole message is held in the inline prefix
    pub fn is_inline(&self) -> bool {
        self.msg_prefix.len() as u64 == self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_mailbox_name() {
        assert_eq!(parent_mailbox_name("Inbox"), None);
        assert_eq!(parent_mailbox_name("Archive/2024"), Some("Archive"));
        assert_eq!(parent_mailbox_name("Archive/2024/Jan"), Some("Archive/2024"));
    }

    #[test]
    fn test_flags_deserialize_partial() {
        let flags: Flags = serde_json::from_str(r#"{"seen": true, "junk": true}"#).unwrap();

        assert!(flags.seen);
        assert!(flags.junk);
        assert!(!flags.draft);
    }
}
