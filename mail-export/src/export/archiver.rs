//! Archive destinations
//!
//! An [`Archiver`] receives named, sized, timestamped entries one at a time.
//! Entries must be written completely and finished before the next one is
//! created; the borrow on the archiver enforces this.

use crate::error::{ExportError, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use tar::{EntryType, Header};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const FILE_MODE: u32 = 0o660;
const DIR_MODE: u32 = 0o770;
const BLOCK_SIZE: u64 = 512;
// Largest size an octal ustar size field holds.
const USTAR_MAX_SIZE: u64 = 0o77777777777;
const USTAR_NAME_LEN: usize = 100;

/// Writable sink for a single archive entry
pub trait EntryWriter: Write {
    /// Complete the entry. Must be called once all content is written.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// Destination for exported mailboxes
pub trait Archiver {
    /// Add an entry. A name ending in '/' is a directory; its writer can be
    /// dropped without use.
    fn create(&mut self, name: &str, size: u64, mtime: DateTime<Utc>)
        -> Result<Box<dyn EntryWriter + '_>>;

    /// Finalize the container
    fn close(&mut self) -> Result<()>;
}

impl EntryWriter for io::Sink {
    fn finish(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

/// Archiver writing a tar stream with PAX extensions where ustar falls short
pub struct TarArchiver<W: Write> {
    builder: tar::Builder<W>,
    closed: bool,
}

impl<W: Write> TarArchiver<W> {
    pub fn new(writer: W) -> Self {
        Self {
            builder: tar::Builder::new(writer),
            closed: false,
        }
    }

    /// Finish the archive if needed and return the underlying writer
    pub fn into_inner(self) -> io::Result<W> {
        self.builder.into_inner()
    }
}

impl<W: Write> Archiver for TarArchiver<W> {
    fn create(
        &mut self,
        name: &str,
        size: u64,
        mtime: DateTime<Utc>,
    ) -> Result<Box<dyn EntryWriter + '_>> {
        if self.closed {
            return Err(ExportError::ArchiveClosed);
        }

        let is_dir = name.ends_with('/');
        let size = if is_dir { 0 } else { size };

        let mut header = Header::new_ustar();
        header.set_entry_type(if is_dir {
            EntryType::Directory
        } else {
            EntryType::Regular
        });
        header.set_mode(FILE_MODE);

        let mut pax = Vec::new();
        // The ustar mtime field is unsigned.
        let timestamp = mtime.timestamp();
        header.set_mtime(timestamp.max(0) as u64);
        if timestamp < 0 {
            pax.push(("mtime", timestamp.to_string()));
        }
        // A failed set_path can leave the prefix field half written.
        let mut named = header.clone();
        if named.set_path(name).is_ok() {
            header = named;
        } else {
            pax.push(("path", name.to_string()));
            header.set_path(truncate_name(name))?;
        }
        if size > USTAR_MAX_SIZE {
            pax.push(("size", size.to_string()));
        }
        if !pax.is_empty() {
            self.builder
                .append_pax_extensions(pax.iter().map(|(key, value)| (*key, value.as_bytes())))?;
        }

        header.set_size(size);
        header.set_cksum();
        self.builder.get_mut().write_all(header.as_bytes())?;

        Ok(Box::new(TarEntry {
            inner: self.builder.get_mut(),
            size,
            remaining: size,
        }))
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(ExportError::ArchiveClosed);
        }
        self.closed = true;
        self.builder.finish()?;
        Ok(())
    }
}

/// Shortened name for the ustar header when the full one is in a PAX record
fn truncate_name(name: &str) -> &str {
    let mut end = name.len().min(USTAR_NAME_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

struct TarEntry<'a, W: Write> {
    inner: &'a mut W,
    size: u64,
    remaining: u64,
}

impl<W: Write> Write for TarEntry<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.len() as u64 > self.remaining {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "write exceeds declared entry size",
            ));
        }
        let n = self.inner.write(buf)?;
        self.remaining -= n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> EntryWriter for TarEntry<'_, W> {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        if self.remaining != 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("entry is {} bytes short of its declared size", self.remaining),
            ));
        }
        let padding = (BLOCK_SIZE - self.size % BLOCK_SIZE) % BLOCK_SIZE;
        self.inner.write_all(&[0; BLOCK_SIZE as usize][..padding as usize])
    }
}

/// Archiver writing a zip file with deflated entries
pub struct ZipArchiver<W: Write + Seek> {
    zip: Option<ZipWriter<W>>,
    inner: Option<W>,
}

impl<W: Write + Seek> ZipArchiver<W> {
    pub fn new(writer: W) -> Self {
        Self {
            zip: Some(ZipWriter::new(writer)),
            inner: None,
        }
    }

    /// Finish the archive if needed and return the underlying writer
    pub fn into_inner(mut self) -> Result<W> {
        if self.zip.is_some() {
            self.close()?;
        }
        self.inner.take().ok_or(ExportError::ArchiveClosed)
    }
}

fn zip_time(mtime: DateTime<Utc>) -> zip::DateTime {
    let t = mtime.naive_utc();
    u16::try_from(t.year())
        .ok()
        .and_then(|year| {
            zip::DateTime::from_date_and_time(
                year,
                t.month() as u8,
                t.day() as u8,
                t.hour() as u8,
                t.minute() as u8,
                t.second() as u8,
            )
            .ok()
        })
        .unwrap_or_default()
}

impl<W: Write + Seek> Archiver for ZipArchiver<W> {
    fn create(
        &mut self,
        name: &str,
        size: u64,
        mtime: DateTime<Utc>,
    ) -> Result<Box<dyn EntryWriter + '_>> {
        let zip = self.zip.as_mut().ok_or(ExportError::ArchiveClosed)?;
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip_time(mtime))
            .large_file(size >= u32::MAX as u64);

        if name.ends_with('/') {
            zip.add_directory(name.to_string(), options)?;
            return Ok(Box::new(io::sink()));
        }

        zip.start_file(name.to_string(), options)?;
        Ok(Box::new(ZipEntry { zip }))
    }

    fn close(&mut self) -> Result<()> {
        let zip = self.zip.take().ok_or(ExportError::ArchiveClosed)?;
        self.inner = Some(zip.finish()?);
        Ok(())
    }
}

struct ZipEntry<'a, W: Write + Seek> {
    zip: &'a mut ZipWriter<W>,
}

impl<W: Write + Seek> Write for ZipEntry<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.zip.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.zip.flush()
    }
}

impl<W: Write + Seek> EntryWriter for ZipEntry<'_, W> {
    fn finish(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

/// Archiver writing into a directory on the local file system
///
/// Files are created exclusively, so an export never overwrites anything.
pub struct DirArchiver {
    dir: PathBuf,
}

impl DirArchiver {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Map a '/'-separated archive name to a path below the root
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let mut path = self.dir.clone();
        for component in name.trim_end_matches('/').split('/') {
            if component.is_empty() || component == "." || component == ".." {
                return Err(ExportError::InvalidPath(name.to_string()));
            }
            path.push(component);
        }
        Ok(path)
    }
}

fn dir_builder(recursive: bool) -> fs::DirBuilder {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(recursive);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder
}

impl Archiver for DirArchiver {
    fn create(
        &mut self,
        name: &str,
        _size: u64,
        _mtime: DateTime<Utc>,
    ) -> Result<Box<dyn EntryWriter + '_>> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            dir_builder(true).create(parent)?;
        }

        if name.ends_with('/') {
            dir_builder(false).create(&path)?;
            return Ok(Box::new(io::sink()));
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(FILE_MODE);
        }
        let file = options.open(&path)?;
        Ok(Box::new(FileEntry(BufWriter::new(file))))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct FileEntry(BufWriter<File>);

impl Write for FileEntry {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl EntryWriter for FileEntry {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.0.flush()
    }
}

/// Archiver for destinations that are a single mbox stream
///
/// The first entry gets the underlying writer, whatever its name. Any further
/// entry fails.
pub struct MboxArchiver<W: Write> {
    writer: W,
    have: bool,
}

impl<W: Write> MboxArchiver<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            have: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Archiver for MboxArchiver<W> {
    fn create(
        &mut self,
        _name: &str,
        _size: u64,
        _mtime: DateTime<Utc>,
    ) -> Result<Box<dyn EntryWriter + '_>> {
        if self.have {
            return Err(ExportError::MultipleEntries);
        }
        self.have = true;
        Ok(Box::new(StreamEntry(&mut self.writer)))
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

struct StreamEntry<'a, W: Write>(&'a mut W);

impl<W: Write> Write for StreamEntry<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write> EntryWriter for StreamEntry<'_, W> {
    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.0.flush()
    }
}
