//! mail-export: mailbox export engine
//!
//! Turns the mailboxes and messages of a mail account into portable archives,
//! encoded as Maildir or mbox.
//!
//! # Features
//!
//! - **Containers**: tar (PAX), zip (Deflate), plain directory tree or a
//!   single mbox stream
//! - **Maildir**: flag letters in filenames, `dovecot-keywords` index
//! - **Mbox**: mboxrd framing with Status, X-Status and X-Keywords headers
//! - **Partial failures**: unreadable messages are skipped and listed in
//!   `errors.txt` inside the archive
//!
//! # Example
//!
//! ```no_run
//! use mail_export::export::{export_messages, ExportFormat, ExportRequest, TarArchiver};
//! use mail_export::store::AccountStore;
//! use std::fs::File;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = AccountStore::open("/var/lib/mail/account")?;
//!     let mut archiver = TarArchiver::new(File::create("mail.tar")?);
//!
//!     let request = ExportRequest {
//!         format: ExportFormat::Mbox,
//!         ..Default::default()
//!     };
//!     let summary = export_messages(&store, &mut archiver, &request)?;
//!     println!("exported {} messages", summary.messages);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`export`]: Archivers, encoders and the export orchestrator
//! - [`store`]: Message store interface and on-disk account store

pub mod config;
pub mod error;
pub mod export;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{ExportError, Result};
