//! Filesystem abstraction the core depends on instead of `std::fs` directly.
//!
//! An injectable file interface, so tests can swap in an in-memory
//! filesystem, scoped down to exactly the operations `tickfile` needs.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use memmap2::Mmap;

/// A file-like resource `tickfile` can create, open, and flush a block
/// against, without depending on `std::fs` directly.
pub trait FileHandle: Read + Write + Seek + Send {
  fn truncate(&mut self, len: u64) -> io::Result<()>;
  fn sync(&mut self) -> io::Result<()>;

  /// A read-only memory map of the whole file, when the platform and
  /// underlying resource support it. `tickfile::TickFile::open_read` uses
  /// this to skip the `read_to_end` copy; callers that return `Ok(None)`
  /// force the `Read`-based fallback path.
  fn mmap_ro(&self) -> io::Result<Option<Mmap>>;
}

/// The default [`FileHandle`], backed by `std::fs::File`.
pub struct StdFileHandle {
  file: File,
}

impl StdFileHandle {
  pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(true)
      .open(path)?;
    Ok(StdFileHandle { file })
  }

  pub fn open_read<P: AsRef<Path>>(path: P) -> io::Result<Self> {
    let file = OpenOptions::new().read(true).open(path)?;
    Ok(StdFileHandle { file })
  }

  pub fn open_write<P: AsRef<Path>>(path: P) -> io::Result<Self> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    Ok(StdFileHandle { file })
  }

  pub fn from_file(file: File) -> Self {
    StdFileHandle { file }
  }
}

impl Read for StdFileHandle {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.file.read(buf)
  }
}

impl Write for StdFileHandle {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.file.write(buf)
  }

  fn flush(&mut self) -> io::Result<()> {
    self.file.flush()
  }
}

impl Seek for StdFileHandle {
  fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
    self.file.seek(pos)
  }
}

impl FileHandle for StdFileHandle {
  fn truncate(&mut self, len: u64) -> io::Result<()> {
    self.file.set_len(len)
  }

  fn sync(&mut self) -> io::Result<()> {
    self.file.sync_all()
  }

  fn mmap_ro(&self) -> io::Result<Option<Mmap>> {
    // Safety: the mapped file may be concurrently modified by another
    // process, which is technically unsound per `memmap2`'s contract; we
    // accept that risk the same way the rest of this ecosystem's
    // `memmap2`-backed readers do, and never mutate through the mapping.
    let mmap = unsafe { Mmap::map(&self.file)? };
    Ok(Some(mmap))
  }
}
