//! Maildir encoding
//!
//! Messages are stored with CRLF line endings, maildir files use LF. Message
//! flags go into the filename after ":2,".

use super::flags::MaildirFlags;
use crate::store::Message;
use std::io::{self, BufRead};

/// Where a message goes inside a maildir
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaildirName {
    /// "cur" for seen messages, "new" otherwise
    pub subdir: &'static str,
    pub filename: String,
    /// Keywords that did not get a letter
    pub dropped: Vec<String>,
}

impl MaildirName {
    /// Archive path below the mailbox directory
    pub fn path(&self, mailbox: &str) -> String {
        format!("{}/{}/{}", mailbox, self.subdir, self.filename)
    }
}

/// Whether a custom keyword can be written out. Keywords end up in a
/// comma-separated header line and in a line-based index file.
pub fn is_valid_keyword(keyword: &str) -> bool {
    !keyword.is_empty()
        && !keyword
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == ',')
}

/// Custom keywords of a message that are left out of the export
pub(crate) fn invalid_keywords(m: &Message) -> Vec<&str> {
    m.keywords
        .iter()
        .map(String::as_str)
        .filter(|k| !is_valid_keyword(k))
        .collect()
}

/// Non-standard flags of a message in filename order, valid custom keywords
/// last
pub(crate) fn message_keywords(m: &Message) -> Vec<&str> {
    let flags = &m.flags;
    let system = [
        (flags.forwarded, "$Forwarded"),
        (flags.junk, "$Junk"),
        (flags.notjunk, "$NotJunk"),
        (flags.phishing, "$Phishing"),
        (flags.mdnsent, "$MDNSent"),
    ];

    let mut keywords: Vec<&str> = system
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, name)| *name)
        .collect();
    for keyword in m.keywords.iter().filter(|k| is_valid_keyword(k)) {
        if !keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword)) {
            keywords.push(keyword);
        }
    }
    keywords
}

/// Compute the maildir subdirectory and filename of a message
pub fn maildir_name(m: &Message, flags: &mut MaildirFlags) -> MaildirName {
    let mut filename = format!("{}.{}.mox:2,", m.received.timestamp(), m.id);

    // Standard flags, in the order maildir readers expect.
    let f = &m.flags;
    for (set, letter) in [
        (f.draft, 'D'),
        (f.flagged, 'F'),
        (f.answered, 'R'),
        (f.seen, 'S'),
        (f.deleted, 'T'),
    ] {
        if set {
            filename.push(letter);
        }
    }

    let mut dropped = Vec::new();
    for keyword in message_keywords(m) {
        match flags.flag(keyword) {
            Some(letter) => filename.push(letter),
            None => dropped.push(keyword.to_string()),
        }
    }

    MaildirName {
        subdir: if m.flags.seen { "cur" } else { "new" },
        filename,
        dropped,
    }
}

/// Read a whole message, turning CRLF line endings into LF
pub fn read_lf<R: BufRead>(mut reader: R) -> io::Result<Vec<u8>> {
    let mut dst = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        crlf_to_lf(&mut line);
        dst.extend_from_slice(&line);
    }
    Ok(dst)
}

/// Replace a trailing "\r\n" with "\n"
pub(crate) fn crlf_to_lf(line: &mut Vec<u8>) {
    if line.ends_with(b"\r\n") {
        line.truncate(line.len() - 2);
        line.push(b'\n');
    }
}
