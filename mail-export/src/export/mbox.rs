//! MBOX format writing
//!
//! Messages are framed the mboxrd way (RFC 4155): a "From " separator line,
//! LF line endings, ">"-escaping of lines that would look like a separator and
//! a blank line after each message. Flags are carried in the Status, X-Status
//! and X-Keywords headers.

use super::maildir::{crlf_to_lf, message_keywords};
use crate::store::Message;
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Sender used in the separator line when the envelope sender is unknown
pub const DEFAULT_SENDER: &str = "mox";

// Flag headers regenerated from the stored flags, plus Content-Length, which
// is wrong after line ending conversion.
const DROPPED_HEADERS: [&str; 4] = ["status", "x-status", "x-keywords", "content-length"];

/// Failure while encoding a single message
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Reading the stored message failed. Nothing was written.
    #[error("reading message: {0}")]
    Read(#[source] io::Error),
    /// Writing to the destination failed.
    #[error("writing message: {0}")]
    Write(#[source] io::Error),
}

/// MBOX writer for exporting messages
pub struct MboxWriter<W: Write> {
    writer: W,
}

impl<W: Write> MboxWriter<W> {
    /// Create a new MBOX writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a message to the MBOX file
    ///
    /// The message is encoded in memory first, so a read error leaves the
    /// destination untouched.
    pub fn write_message<R: BufRead>(&mut self, m: &Message, content: R) -> Result<(), EncodeError> {
        let mut buf = Vec::new();
        write_separator(&mut buf, m);
        write_flag_headers(&mut buf, m);
        write_content(&mut buf, content).map_err(EncodeError::Read)?;

        self.writer.write_all(&buf).map_err(EncodeError::Write)
    }

    /// Finish writing and return the inner writer
    pub fn finish(self) -> W {
        self.writer
    }
}

/// The "From " line starting a message
pub fn separator_line(m: &Message) -> String {
    let sender = m
        .mail_from
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SENDER);
    // asctime layout, day of month padded with a space
    format!("From {} {}\n", sender, m.received.format("%a %b %e %H:%M:%S %Y"))
}

fn write_separator(buf: &mut Vec<u8>, m: &Message) {
    buf.extend_from_slice(separator_line(m).as_bytes());
}

fn write_flag_headers(buf: &mut Vec<u8>, m: &Message) {
    let f = &m.flags;
    if f.seen {
        buf.extend_from_slice(b"Status: R\n");
    }

    let xstatus: String = [
        (f.answered, 'A'),
        (f.flagged, 'F'),
        (f.draft, 'T'),
        (f.deleted, 'D'),
    ]
    .iter()
    .filter(|(set, _)| *set)
    .map(|(_, code)| *code)
    .collect();
    if !xstatus.is_empty() {
        buf.extend_from_slice(format!("X-Status: {}\n", xstatus).as_bytes());
    }

    // Junk and NotJunk together say nothing, leave both out.
    let keywords: Vec<&str> = message_keywords(m)
        .into_iter()
        .filter(|k| !(f.junk && f.notjunk && (*k == "$Junk" || *k == "$NotJunk")))
        .collect();
    if !keywords.is_empty() {
        buf.extend_from_slice(format!("X-Keywords: {}\n", keywords.join(",")).as_bytes());
    }
}

/// Whether a header line is one we regenerate
fn is_dropped_header(line: &[u8]) -> bool {
    let name = line.split(|&b| b == b':').next().unwrap_or_default();
    DROPPED_HEADERS
        .iter()
        .any(|h| name.eq_ignore_ascii_case(h.as_bytes()))
}

/// Copy the message with LF line endings and escaped "From " lines
fn write_content<R: BufRead>(buf: &mut Vec<u8>, mut content: R) -> io::Result<()> {
    let mut header = true;
    let mut line = Vec::new();
    loop {
        line.clear();
        if content.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        crlf_to_lf(&mut line);

        if header && line == b"\n" {
            header = false;
        }
        // Assumes these headers are never folded over multiple lines.
        if header && is_dropped_header(&line) {
            continue;
        }

        let unquoted = line.iter().position(|&b| b != b'>').map_or(&[][..], |i| &line[i..]);
        if unquoted.starts_with(b"From ") {
            buf.push(b'>');
        }
        buf.extend_from_slice(&line);
    }

    if buf.last().is_some_and(|&b| b != b'\n') {
        buf.push(b'\n');
    }
    // Blank line ending the message.
    buf.push(b'\n');
    Ok(())
}
