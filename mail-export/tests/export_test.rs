//! Integration tests for mailbox export

use chrono::{DateTime, Duration, TimeZone, Utc};
use mail_export::export::{
    DirArchiver, ExportFormat, ExportRequest, Exporter, MboxArchiver, TarArchiver, ZipArchiver,
    ERRORS_FILE,
};
use mail_export::ExportError;
use mail_export::store::{AccountStore, Flags, Mailbox, Message, MessageStore, NewMessage};
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use tempfile::TempDir;

fn received(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minute)
}

struct Account {
    _dir: TempDir,
    scratch: TempDir,
    store: AccountStore,
}

impl Account {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = AccountStore::open(dir.path()).unwrap();
        Self {
            _dir: dir,
            scratch: TempDir::new().unwrap(),
            store,
        }
    }

    fn mailbox(&self, name: &str) -> Mailbox {
        self.store.create_mailbox(name).unwrap()
    }

    /// Deliver a message, keeping the first bytes inline and the rest in the
    /// overflow file
    fn deliver(&self, mailbox: &Mailbox, raw: &str, minute: i64, flags: Flags) -> Message {
        let split = raw.len().min(16);
        self.store
            .deliver(
                mailbox.id,
                NewMessage {
                    prefix: raw.as_bytes()[..split].to_vec(),
                    body: raw.as_bytes()[split..].to_vec(),
                    received: received(minute),
                    flags,
                    ..Default::default()
                },
            )
            .unwrap()
    }

    fn exporter(&self) -> Exporter<'_> {
        Exporter::new(&self.store).with_scratch_dir(self.scratch.path())
    }

    fn scratch_is_empty(&self) -> bool {
        fs::read_dir(self.scratch.path()).unwrap().next().is_none()
    }
}

fn seen() -> Flags {
    Flags {
        seen: true,
        ..Default::default()
    }
}

fn tar_files(data: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = tar::Archive::new(data);
    let mut files = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path().unwrap().to_string_lossy().into_owned();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        files.push((name, content));
    }
    files
}

fn export_tar(account: &Account, request: &ExportRequest) -> Vec<(String, Vec<u8>)> {
    let mut archiver = TarArchiver::new(Vec::new());
    account.exporter().export(&mut archiver, request).unwrap();
    tar_files(&archiver.into_inner().unwrap())
}

fn file_names(files: &[(String, Vec<u8>)]) -> Vec<&str> {
    files.iter().map(|(name, _)| name.as_str()).collect()
}

fn read_string(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn test_maildir_export_to_directory() {
    let account = Account::new();
    let inbox = account.mailbox("Inbox");
    let sent = account.mailbox("Sent");
    account.deliver(&inbox, "Subject: first\r\n\r\nHello there\r\n", 0, seen());
    account.deliver(&inbox, "Subject: second\r\n\r\nAgain\r\n", 1, Flags::default());
    account.deliver(&sent, "Subject: reply\r\n\r\nThanks\r\n", 2, seen());

    let out = TempDir::new().unwrap();
    let mut archiver = DirArchiver::new(out.path().join("export"));
    let summary = account
        .exporter()
        .export(&mut archiver, &ExportRequest::default())
        .unwrap();

    assert_eq!(summary.mailboxes, 2);
    assert_eq!(summary.messages, 3);
    assert!(summary.incidents.is_empty());

    let root = out.path().join("export");
    assert_eq!(
        read_string(&root.join("Inbox/cur/1714564800.1.mox:2,S")),
        "Subject: first\n\nHello there\n"
    );
    assert_eq!(
        read_string(&root.join("Inbox/new/1714564860.2.mox:2,")),
        "Subject: second\n\nAgain\n"
    );
    assert!(root.join("Sent/cur/1714564920.3.mox:2,S").exists());
    assert!(root.join("Sent/tmp").is_dir());
    assert!(!root.join(ERRORS_FILE).exists());
}

#[test]
fn test_directory_export_never_overwrites() {
    let account = Account::new();
    let inbox = account.mailbox("Inbox");
    account.deliver(&inbox, "Subject: a\r\n\r\nbody\r\n", 0, Flags::default());

    let out = TempDir::new().unwrap();
    let mut archiver = DirArchiver::new(out.path());
    account
        .exporter()
        .export(&mut archiver, &ExportRequest::default())
        .unwrap();

    let mut again = DirArchiver::new(out.path());
    let err = account
        .exporter()
        .export(&mut again, &ExportRequest::default())
        .unwrap_err();
    assert!(err.to_string().starts_with("adding maildir new directory"));
}

#[test]
fn test_recursive_selection() {
    let account = Account::new();
    let a = account.mailbox("A");
    let ab = account.mailbox("A/B");
    let other = account.mailbox("AB");
    account.deliver(&a, "Subject: in a\r\n\r\n", 0, Flags::default());
    account.deliver(&ab, "Subject: in a/b\r\n\r\n", 0, Flags::default());
    account.deliver(&other, "Subject: in ab\r\n\r\n", 0, Flags::default());

    let recursive = ExportRequest {
        format: ExportFormat::Mbox,
        mailbox: Some("A".to_string()),
        recursive: true,
        ..Default::default()
    };
    assert_eq!(file_names(&export_tar(&account, &recursive)), vec!["A.mbox", "A/B.mbox"]);

    let single = ExportRequest {
        recursive: false,
        ..recursive
    };
    assert_eq!(file_names(&export_tar(&account, &single)), vec!["A.mbox"]);
}

#[test]
fn test_single_mailbox_starts_at_archive_root() {
    let account = Account::new();
    account.mailbox("Lists");
    let rust = account.mailbox("Lists/rust");
    account.deliver(&rust, "Subject: release\r\n\r\n", 0, seen());

    let request = ExportRequest {
        mailbox: Some("Lists/rust".to_string()),
        ..Default::default()
    };
    let files = export_tar(&account, &request);

    assert_eq!(file_names(&files), vec!["rust/cur/1714564800.1.mox:2,S"]);
}

#[test]
fn test_expunged_items_left_out() {
    let account = Account::new();
    let inbox = account.mailbox("Inbox");
    let trash = account.mailbox("Trash");
    account.deliver(&inbox, "Subject: keep\r\n\r\n", 0, Flags::default());
    let gone = account.deliver(&inbox, "Subject: gone\r\n\r\n", 1, Flags::default());
    account.deliver(&trash, "Subject: trash\r\n\r\n", 2, Flags::default());
    account.store.expunge_message(gone.id).unwrap();
    account.store.expunge_mailbox(trash.id).unwrap();

    let files = export_tar(&account, &ExportRequest::default());

    assert_eq!(file_names(&files), vec!["Inbox/new/1714564800.1.mox:2,"]);
}

#[test]
fn test_export_by_message_id() {
    let account = Account::new();
    let inbox = account.mailbox("Inbox");
    let m1 = account.deliver(&inbox, "Subject: one\r\n\r\n", 5, Flags::default());
    let m2 = account.deliver(&inbox, "Subject: two\r\n\r\n", 0, seen());
    account.store.expunge_message(m1.id).unwrap();

    let request = ExportRequest {
        message_ids: Some(vec![m1.id, 99, m2.id]),
        ..Default::default()
    };
    let files = export_tar(&account, &request);

    assert_eq!(
        file_names(&files),
        vec!["Export/cur/1714564800.2.mox:2,S", ERRORS_FILE]
    );
    let errors = String::from_utf8(files[1].1.clone()).unwrap();
    assert_eq!(
        errors,
        "message with id 1 is expunged\nget message with id 99: not found\n"
    );
}

#[test]
fn test_size_mismatch_exported_with_actual_size() {
    let account = Account::new();
    let inbox = account.mailbox("Inbox");
    let m = account.deliver(&inbox, "Subject: grown\r\n\r\nshort\r\n", 0, Flags::default());
    // The overflow file changed after delivery.
    fs::write(account.store.message_file(m.id), "\r\nlonger body\r\n").unwrap();

    let files = export_tar(&account, &ExportRequest::default());

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].1, b"Subject: grown\n\nlonger body\n".to_vec());
    let errors = String::from_utf8(files[1].1.clone()).unwrap();
    assert_eq!(errors.lines().count(), 1);
    assert!(errors.contains("size mismatch for message id 1"));
}

#[test]
fn test_missing_overflow_file_skipped() {
    let account = Account::new();
    let inbox = account.mailbox("Inbox");
    let lost = account.deliver(&inbox, "Subject: lost\r\n\r\nbody\r\n", 0, Flags::default());
    account.deliver(&inbox, "Subject: fine\r\n\r\nbody\r\n", 1, Flags::default());
    fs::remove_file(account.store.message_file(lost.id)).unwrap();

    let mut archiver = TarArchiver::new(Vec::new());
    let summary = account
        .exporter()
        .export(&mut archiver, &ExportRequest::default())
        .unwrap();

    assert_eq!(summary.messages, 1);
    assert_eq!(summary.skipped(), 1);
    let files = tar_files(&archiver.into_inner().unwrap());
    assert_eq!(
        file_names(&files),
        vec!["Inbox/new/1714564860.2.mox:2,", ERRORS_FILE]
    );
}

#[test]
fn test_mbox_to_single_stream() {
    let account = Account::new();
    let inbox = account.mailbox("Inbox");
    account.deliver(
        &inbox,
        "Status: O\r\nSubject: one\r\n\r\nFrom evil\r\n>From x\r\n",
        1,
        seen(),
    );
    account.deliver(&inbox, "Subject: two\r\n\r\nbody\r\n", 0, Flags::default());

    let mut archiver = MboxArchiver::new(Vec::new());
    let request = ExportRequest {
        format: ExportFormat::Mbox,
        mailbox: Some("Inbox".to_string()),
        ..Default::default()
    };
    account.exporter().export(&mut archiver, &request).unwrap();

    let out = String::from_utf8(archiver.into_inner()).unwrap();
    assert_eq!(
        out,
        "From mox Wed May  1 12:00:00 2024\nSubject: two\n\nbody\n\n\
         From mox Wed May  1 12:01:00 2024\nStatus: R\nSubject: one\n\n>From evil\n>>From x\n\n"
    );
    assert!(account.scratch_is_empty());
}

#[test]
fn test_second_mailbox_on_single_stream_fails() {
    let account = Account::new();
    let inbox = account.mailbox("Inbox");
    let sent = account.mailbox("Sent");
    account.deliver(&inbox, "Subject: one\r\n\r\n", 0, Flags::default());
    account.deliver(&sent, "Subject: two\r\n\r\n", 0, Flags::default());

    let mut archiver = MboxArchiver::new(Vec::new());
    let request = ExportRequest {
        format: ExportFormat::Mbox,
        ..Default::default()
    };
    let err = account.exporter().export(&mut archiver, &request).unwrap_err();

    assert!(matches!(err.root(), ExportError::MultipleEntries));
    assert!(account.scratch_is_empty());
    let out = String::from_utf8(archiver.into_inner()).unwrap();
    assert_eq!(out, "From mox Wed May  1 12:00:00 2024\nSubject: one\n\n\n");
}

#[test]
fn test_mbox_in_zip() {
    let account = Account::new();
    let inbox = account.mailbox("Inbox");
    let sent = account.mailbox("Sent");
    account.deliver(&inbox, "Subject: one\r\n\r\nbody\r\n", 0, Flags::default());
    account.deliver(&sent, "Subject: two\r\n\r\nbody\r\n", 0, Flags::default());

    let mut archiver = ZipArchiver::new(Cursor::new(Vec::new()));
    let request = ExportRequest {
        format: ExportFormat::Mbox,
        ..Default::default()
    };
    account.exporter().export(&mut archiver, &request).unwrap();

    let data = archiver.into_inner().unwrap().into_inner();
    let mut zip = zip::ZipArchive::new(Cursor::new(data)).unwrap();
    assert_eq!(zip.len(), 2);

    let mut content = String::new();
    zip.by_name("Sent.mbox")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "From mox Wed May  1 12:00:00 2024\nSubject: two\n\nbody\n\n");
    assert!(account.scratch_is_empty());
}

#[test]
fn test_conflicting_selection_writes_nothing() {
    let account = Account::new();
    let inbox = account.mailbox("Inbox");
    let m = account.deliver(&inbox, "Subject: one\r\n\r\n", 0, Flags::default());

    let mut archiver = MboxArchiver::new(Vec::new());
    let request = ExportRequest {
        mailbox: Some("Inbox".to_string()),
        message_ids: Some(vec![m.id]),
        ..Default::default()
    };
    let err = account.exporter().export(&mut archiver, &request).unwrap_err();

    assert_eq!(err.to_string(), "cannot have both mailbox and message ids");
    assert!(archiver.into_inner().is_empty());
}

#[test]
fn test_every_message_exported_once() {
    let account = Account::new();
    let mut expected = Vec::new();
    for name in ["Archive", "Archive/2023", "Inbox"] {
        let mailbox = account.mailbox(name);
        for i in 0..4 {
            let raw = format!("Subject: {} {}\r\n\r\nbody {} {}\r\n", name, i, name, i);
            account.deliver(&mailbox, &raw, i, Flags::default());
            expected.push(format!("body {} {}\n", name, i));
        }
    }

    let files = export_tar(&account, &ExportRequest::default());

    assert_eq!(files.len(), expected.len());
    for body in &expected {
        let count = files
            .iter()
            .filter(|(_, content)| content.ends_with(body.as_bytes()))
            .count();
        assert_eq!(count, 1, "{}", body);
    }
}

#[test]
fn test_keyword_letters_capped() {
    let account = Account::new();
    let inbox = account.mailbox("Inbox");
    let keywords: Vec<String> = (0..27).map(|i| format!("kw{:02}", i)).collect();
    account
        .store
        .deliver(
            inbox.id,
            NewMessage {
                prefix: b"Subject: tagged\r\n\r\n".to_vec(),
                received: received(0),
                keywords,
                ..Default::default()
            },
        )
        .unwrap();

    let files = export_tar(&account, &ExportRequest::default());

    assert_eq!(
        file_names(&files),
        vec![
            "Inbox/new/1714564800.1.mox:2,abcdefghijklmnopqrstuvwxyz",
            "Inbox/dovecot-keywords",
            ERRORS_FILE
        ]
    );
    let index = String::from_utf8(files[1].1.clone()).unwrap();
    assert_eq!(index.lines().count(), 26);
    assert!(index.starts_with("0 kw00\n"));
    assert!(index.ends_with("25 kw25\n"));
    assert!(!index.contains("kw26"));
    let errors = String::from_utf8(files[2].1.clone()).unwrap();
    assert!(errors.starts_with("keyword kw26 of message id 1 not exported"));
}
