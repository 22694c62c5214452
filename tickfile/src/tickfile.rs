//! Binds a [`FileHandle`] and a record schema to the stream writer/reader:
//! header and section I/O, block loading on open, flush-to-disk discipline,
//! and the concurrency primitives a writer and its readers share.
//!
//! This is the one type most callers interact with directly; everything
//! else in this crate is a building block it composes.

use std::io::{Seek, SeekFrom, Write};

use log::{debug, trace};
use tickfile_io::FileHandle;

use crate::bit_buffer::{shared, BitBuffer, SharedBitBuffer};
use crate::chunk::ChunkReader;
use crate::config::TickFileConfig;
use crate::errors::{TickError, TickResult};
use crate::schema::{ItemSection, TickRecord};
use crate::sections::{ContentDescriptionSection, Header, NameValueSection, Sections, TagsSection};
use crate::signal::PublishSignal;
use crate::stream_reader::TickStreamReader;
use crate::stream_writer::TickStreamWriter;

/// How a [`TickFile`] was opened, and what it is therefore allowed to do.
enum Mode {
  /// Opened via [`TickFile::open_header`]: sections are known, but the body
  /// was never loaded. Useful for metadata-only inspection.
  HeaderOnly,
  /// Opened for read: the body is loaded and `last_tick` is known, but
  /// there is no writer to append through.
  Read { last_tick: u64 },
  /// Created or opened for append: carries the live writer.
  Write(TickStreamWriter),
}

/// An open tickfile: a file handle, its schema, and (depending on how it was
/// opened) a writer or read-only access to its decoded body.
pub struct TickFile<H> {
  file: H,
  item_start: i64,
  section: ItemSection,
  sections: Sections,
  buffer: SharedBitBuffer,
  signal: PublishSignal,
  /// Byte length of `buffer`'s prefix that is known to already match what's
  /// on disk. The next flush only needs to seek back to this offset and
  /// rewrite the (short) remainder, rather than rewrite the whole block.
  stable_prefix_len: usize,
  mode: Mode,
}

impl<H: FileHandle> TickFile<H> {
  /// Creates a new file: writes the header and the configured sections,
  /// pads to `item_start`, and returns a handle ready to accept `write`s.
  pub fn create<R: TickRecord>(mut file: H, mut config: TickFileConfig) -> TickResult<Self> {
    if config.item_section().is_none() {
      config = config.with_item_section(R::item_section());
    }
    let section = config.item_section().expect("just set above").clone();
    section.validate()?;

    let sections = Sections {
      item: Some(section.clone()),
      content_description: config.content_description.clone(),
      name_values: config.name_values.clone(),
      tags: config.tags.clone(),
    };

    let mut body = Vec::new();
    sections.write(&mut body)?;
    let raw_end = Header::SIZE as i64 + body.len() as i64;
    let item_start = Header::align(raw_end);

    let header = Header {
      magic: crate::constants::MAGIC,
      item_start,
      section_count: sections.section_count(),
    };
    file.seek(SeekFrom::Start(0))?;
    header.write(&mut file)?;
    file.write_all(&body)?;
    let padding = (item_start - raw_end) as usize;
    file.write_all(&vec![0u8; padding])?;
    file.sync()?;

    trace!(
      "created tickfile with item_start={} section_count={}",
      item_start, header.section_count
    );

    Ok(TickFile {
      file,
      item_start,
      section,
      sections,
      buffer: shared(BitBuffer::new()),
      signal: PublishSignal::new(),
      stable_prefix_len: 0,
      mode: Mode::Write(TickStreamWriter::new_empty()),
    })
  }

  /// Opens an existing file for append. The file's stored schema must
  /// layout-match `R::item_section()`.
  pub fn open_write<R: TickRecord>(mut file: H) -> TickResult<Self> {
    let (item_start, sections) = read_header_and_sections(&mut file)?;
    let section = require_matching_schema::<R>(&sections)?;

    let (buffer, bit_count) = load_body(&mut file, item_start)?;
    let mut buffer = BitBuffer::from_raw(buffer, bit_count);
    let shared_buf = shared(buffer.clone());
    let (mut writer, last_tick) = TickStreamWriter::from_block(&section, &shared_buf)?;
    writer.open(&mut buffer)?;
    let stable_prefix_len = buffer.len_bytes();

    debug!("opened tickfile for append, last_tick={}", last_tick);

    Ok(TickFile {
      file,
      item_start,
      section,
      sections,
      buffer: shared(buffer),
      signal: PublishSignal::new(),
      stable_prefix_len,
      mode: Mode::Write(writer),
    })
  }

  /// Opens an existing file for read. Replays the whole stream once up
  /// front to confirm it ends cleanly with the EOF marker and to record
  /// `last_tick`.
  pub fn open_read<R: TickRecord>(mut file: H) -> TickResult<Self> {
    let (item_start, sections) = read_header_and_sections(&mut file)?;
    let section = require_matching_schema::<R>(&sections)?;
    Self::open_read_with_schema(file, item_start, sections, section)
  }

  /// Opens an existing file for read against a schema read from its own
  /// header rather than a compile-time `TickRecord`. Tools like
  /// `tickfile-cli` that inspect arbitrary files without knowing their
  /// record type at compile time open the header first (see
  /// [`TickFile::open_header`]) and pass its [`ItemSection`] straight back
  /// in here.
  pub fn open_read_dyn(file: H, section: ItemSection) -> TickResult<Self> {
    let mut file = file;
    let (item_start, sections) = read_header_and_sections(&mut file)?;
    let stored = sections
      .item
      .clone()
      .ok_or_else(|| TickError::corruption("file has no item section"))?;
    if !stored.layout_matches(&section) {
      return Err(TickError::schema_mismatch(
        "requested schema does not match the file's stored item section",
      ));
    }
    Self::open_read_with_schema(file, item_start, sections, stored)
  }

  fn open_read_with_schema(
    mut file: H,
    item_start: i64,
    sections: Sections,
    section: ItemSection,
  ) -> TickResult<Self> {
    let (bytes, bit_count) = load_body(&mut file, item_start)?;
    let buffer = shared(BitBuffer::from_raw(bytes, bit_count));

    let mut probe = TickStreamReader::new(buffer.clone(), section.clone());
    let mut last_tick = 0u64;
    let mut saw_any = false;
    while let Some((tick, _run)) = probe.next()? {
      last_tick = tick;
      saw_any = true;
    }
    if !saw_any {
      trace!("opened empty tickfile for read");
    }

    let signal = PublishSignal::new();
    signal.close();

    Ok(TickFile {
      file,
      item_start,
      section,
      sections,
      buffer,
      signal,
      stable_prefix_len: 0,
      mode: Mode::Read { last_tick },
    })
  }

  /// Opens only the header and sections, without loading the body. Used by
  /// callers that want metadata (schema, tags, name-values) without paying
  /// for a full decode pass.
  pub fn open_header(mut file: H) -> TickResult<Self> {
    let (item_start, sections) = read_header_and_sections(&mut file)?;
    let section = sections
      .item
      .clone()
      .ok_or_else(|| TickError::corruption("file has no item section"))?;

    Ok(TickFile {
      file,
      item_start,
      section,
      sections,
      buffer: shared(BitBuffer::new()),
      signal: PublishSignal::new(),
      stable_prefix_len: 0,
      mode: Mode::HeaderOnly,
    })
  }

  /// A fresh streaming reader over this file's currently-published bytes.
  /// Multiple readers may be live at once, each with independent position.
  pub fn get_tick_reader(&self) -> TickResult<TickStreamReader> {
    if matches!(self.mode, Mode::HeaderOnly) {
      return Err(TickError::invalid_argument(
        "cannot read records from a header-only handle; use open_read or open_write",
      ));
    }
    Ok(TickStreamReader::new(self.buffer.clone(), self.section.clone()).with_signal(self.signal.clone()))
  }

  /// A chunked reader suitable for shipping this file's live buffer to a
  /// remote peer byte range at a time.
  pub fn get_chunk_reader(&self, chunk_size: usize) -> TickResult<ChunkReader> {
    if matches!(self.mode, Mode::HeaderOnly) {
      return Err(TickError::invalid_argument(
        "cannot chunk-read a header-only handle; use open_read or open_write",
      ));
    }
    Ok(ChunkReader::new(self.buffer.clone(), chunk_size))
  }

  /// Appends one record at `tick`. `record` must be exactly
  /// `item_section().item_size` bytes.
  pub fn write(&mut self, tick: u64, record: &[u8]) -> TickResult<()> {
    let writer = match &mut self.mode {
      Mode::Write(w) => w,
      _ => return Err(TickError::read_only("write called on a non-writable tickfile")),
    };
    if record.len() != self.section.item_size as usize {
      return Err(TickError::invalid_argument(format!(
        "record is {} bytes, schema item_size is {}",
        record.len(),
        self.section.item_size
      )));
    }
    let mut buffer = self.buffer.write().unwrap();
    writer.write(&self.section, tick, record, &mut buffer)
  }

  /// Flushes buffered writes to disk: appends the EOF marker, seeks back to
  /// the last stable offset and rewrites the (short) tail, then rewinds the
  /// marker again so further writes continue in place.
  pub fn flush(&mut self) -> TickResult<()> {
    let writer = match &mut self.mode {
      Mode::Write(w) => w,
      _ => return Err(TickError::read_only("flush called on a non-writable tickfile")),
    };
    if !writer.is_initialized() {
      // Nothing has ever been written; there's no tick stream to frame with
      // an EOF marker yet, so there's nothing new to persist.
      return Ok(());
    }
    let mut buffer = self.buffer.write().unwrap();
    writer.close(&mut buffer);

    self
      .file
      .seek(SeekFrom::Start(self.item_start as u64 + self.stable_prefix_len as u64))?;
    self.file.write_all(&buffer.bytes()[self.stable_prefix_len..])?;
    self.file.sync()?;

    writer.open(&mut buffer)?;
    // The reopened tail byte is partial (further writes fill its unused low
    // bits), so it isn't stable yet: exclude it or the next flush will skip
    // rewriting it and leave this flush's marker bits on disk underneath
    // whatever gets written into that byte later.
    self.stable_prefix_len = buffer.len_bytes() - (buffer.count() != 0) as usize;
    drop(buffer);

    self.signal.publish();
    Ok(())
  }

  /// Flushes a final time and marks the stream closed for any reader
  /// currently blocked in `next_timeout`.
  pub fn close(mut self) -> TickResult<()> {
    if matches!(self.mode, Mode::Write(_)) {
      self.flush()?;
    }
    self.signal.close();
    Ok(())
  }

  pub fn last_tick(&self) -> u64 {
    match &self.mode {
      Mode::Write(w) => w.last_tick(),
      Mode::Read { last_tick } => *last_tick,
      Mode::HeaderOnly => 0,
    }
  }

  pub fn item_section(&self) -> &ItemSection {
    &self.section
  }

  pub fn name_values(&self) -> Option<&NameValueSection> {
    self.sections.name_values.as_ref()
  }

  pub fn tags(&self) -> Option<&TagsSection> {
    self.sections.tags.as_ref()
  }

  pub fn content_description(&self) -> Option<&str> {
    self
      .sections
      .content_description
      .as_ref()
      .map(|cd: &ContentDescriptionSection| cd.content_description.as_str())
  }
}

fn read_header_and_sections<H: FileHandle>(file: &mut H) -> TickResult<(i64, Sections)> {
  file.seek(SeekFrom::Start(0))?;
  let header = Header::read(file)?;
  let sections = Sections::read(file, header.section_count)?;
  Ok((header.item_start, sections))
}

fn require_matching_schema<R: TickRecord>(sections: &Sections) -> TickResult<ItemSection> {
  let stored = sections
    .item
    .clone()
    .ok_or_else(|| TickError::corruption("file has no item section"))?;
  let expected = R::item_section();
  if !stored.layout_matches(&expected) {
    return Err(TickError::schema_mismatch(format!(
      "stored schema '{}' does not match requested type '{}'",
      stored.type_name, expected.type_name
    )));
  }
  Ok(stored)
}

/// Reads the whole block from `item_start` to EOF and locates the
/// `11111` EOF marker in the last up-to-two bytes, which also yields the
/// buffer's bit count (how many bits of the last byte are unused padding).
fn load_body<H: FileHandle>(file: &mut H, item_start: i64) -> TickResult<(Vec<u8>, u8)> {
  let bytes = if let Some(mmap) = file.mmap_ro()? {
    let start = item_start as usize;
    if start > mmap.len() {
      return Err(TickError::corruption(
        "item_start lies past the end of the file",
      ));
    }
    mmap[start..].to_vec()
  } else {
    file.seek(SeekFrom::Start(item_start as u64))?;
    let mut bytes = Vec::new();
    std::io::Read::read_to_end(file, &mut bytes)?;
    bytes
  };
  let bit_count = locate_eof_marker(&bytes)?;
  Ok((bytes, bit_count))
}

/// Scans the last up to two bytes of `bytes` for the `11111` EOF marker,
/// returning the number of trailing padding bits once it's found (i.e. the
/// `BitBuffer::count` the reconstructed buffer should carry).
fn locate_eof_marker(bytes: &[u8]) -> TickResult<u8> {
  const MARKER: u16 = 0b11111;
  if bytes.is_empty() {
    return Err(TickError::missing_eof_marker("block is empty"));
  }
  let last = *bytes.last().unwrap() as u16;
  let prev = if bytes.len() >= 2 {
    bytes[bytes.len() - 2] as u16
  } else {
    0
  };
  let window = (prev << 8) | last;
  // Try every padding length 0..=7 bits after the marker, MSB-first within
  // the trailing 13 bits we have available (prev's low 5 bits + all of last).
  // The `pad` low bits below the marker must themselves be the mandatory
  // zero padding, not part of the marker or earlier content.
  for pad in 0u32..8 {
    let zero_pad = pad == 0 || (window & ((1u16 << pad) - 1)) == 0;
    if zero_pad && (window >> pad) & MARKER == MARKER {
      // `pad` trailing padding bits after the marker in the last byte means
      // the buffer has `pad` unused bit slots remaining in its tail byte.
      return Ok(pad as u8);
    }
  }
  Err(TickError::missing_eof_marker(
    "could not locate 11111 EOF marker in final bytes",
  ))
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::config::TickFileConfig;
  use crate::schema::{CompressionKind, FieldSpec, FieldType, ItemSection};

  #[derive(Clone, Copy)]
  struct U64Rec;

  impl TickRecord for U64Rec {
    fn item_section() -> ItemSection {
      ItemSection {
        item_size: 8,
        type_name: "U64Rec".to_string(),
        fields: vec![FieldSpec {
          index: 0,
          ty: FieldType::U64,
          offset: 0,
          name: "v".to_string(),
          compression: CompressionKind::Gorilla64,
        }],
      }
    }
  }

  /// An in-memory `FileHandle` for tests, avoiding real filesystem I/O.
  #[derive(Clone)]
  struct MemHandle(Arc<Mutex<Cursor<Vec<u8>>>>);

  impl MemHandle {
    fn new() -> Self {
      env_logger::try_init().ok();
      MemHandle(Arc::new(Mutex::new(Cursor::new(Vec::new()))))
    }
  }

  impl std::io::Read for MemHandle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
      self.0.lock().unwrap().read(buf)
    }
  }
  impl Write for MemHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
      self.0.lock().unwrap().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
      self.0.lock().unwrap().flush()
    }
  }
  impl Seek for MemHandle {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
      self.0.lock().unwrap().seek(pos)
    }
  }
  impl FileHandle for MemHandle {
    fn truncate(&mut self, len: u64) -> std::io::Result<()> {
      self.0.lock().unwrap().get_mut().truncate(len as usize);
      Ok(())
    }
    fn sync(&mut self) -> std::io::Result<()> {
      Ok(())
    }
    fn mmap_ro(&self) -> std::io::Result<Option<tickfile_io::Mmap>> {
      Ok(None)
    }
  }

  #[test]
  fn test_create_write_flush_read_round_trip() {
    let handle = MemHandle::new();
    let config = TickFileConfig::new().with_item_section(U64Rec::item_section());
    let mut file = TickFile::create::<U64Rec>(handle.clone(), config).unwrap();
    for i in 0..10u64 {
      file.write(i, &(i * 10).to_ne_bytes()).unwrap();
    }
    file.close().unwrap();

    let mut reader_file = TickFile::open_read::<U64Rec>(handle).unwrap();
    assert_eq!(reader_file.last_tick(), 9);
    let mut reader = reader_file.get_tick_reader().unwrap();
    for i in 0..10u64 {
      let (tick, run) = reader.next().unwrap().unwrap();
      assert_eq!(tick, i);
      assert_eq!(run.record(0), &(i * 10).to_ne_bytes());
    }
    assert!(reader.next().unwrap().is_none());
    let _ = &mut reader_file;
  }

  #[test]
  fn test_append_across_reopen() {
    let handle = MemHandle::new();
    let config = TickFileConfig::new().with_item_section(U64Rec::item_section());
    let mut file = TickFile::create::<U64Rec>(handle.clone(), config).unwrap();
    for i in 0..100u64 {
      file.write(i, &1u64.to_ne_bytes()).unwrap();
    }
    file.close().unwrap();

    let mut file = TickFile::open_write::<U64Rec>(handle.clone()).unwrap();
    assert_eq!(file.last_tick(), 99);
    for i in 100..200u64 {
      file.write(i, &2u64.to_ne_bytes()).unwrap();
    }
    file.close().unwrap();

    let mut file = TickFile::open_write::<U64Rec>(handle.clone()).unwrap();
    assert_eq!(file.last_tick(), 199);
    for i in 200..300u64 {
      file.write(i, &1u64.to_ne_bytes()).unwrap();
    }
    file.close().unwrap();

    let mut reader_file = TickFile::open_read::<U64Rec>(handle).unwrap();
    let mut reader = reader_file.get_tick_reader().unwrap();
    let mut count = 0;
    while let Some((tick, run)) = reader.next().unwrap() {
      assert_eq!(tick, count);
      let expected = if count < 100 {
        1u64
      } else if count < 200 {
        2u64
      } else {
        1u64
      };
      assert_eq!(run.record(0), &expected.to_ne_bytes());
      count += 1;
    }
    assert_eq!(count, 300);
  }

  #[test]
  fn test_tick_out_of_order_rejected_and_file_unchanged() {
    let handle = MemHandle::new();
    let config = TickFileConfig::new().with_item_section(U64Rec::item_section());
    let mut file = TickFile::create::<U64Rec>(handle.clone(), config).unwrap();
    file.write(10, &1u64.to_ne_bytes()).unwrap();
    let err = file.write(9, &1u64.to_ne_bytes()).unwrap_err();
    assert_eq!(err.kind, crate::errors::ErrorKind::TickOutOfOrder);
    file.close().unwrap();

    let mut reader_file = TickFile::open_read::<U64Rec>(handle).unwrap();
    let mut reader = reader_file.get_tick_reader().unwrap();
    let (tick, run) = reader.next().unwrap().unwrap();
    assert_eq!(tick, 10);
    assert_eq!(run.run_length(), 1);
    assert!(reader.next().unwrap().is_none());
  }

  #[test]
  fn test_schema_mismatch_rejected_on_open() {
    #[derive(Clone, Copy)]
    struct OtherRec;
    impl TickRecord for OtherRec {
      fn item_section() -> ItemSection {
        ItemSection {
          item_size: 4,
          type_name: "OtherRec".to_string(),
          fields: vec![FieldSpec {
            index: 0,
            ty: FieldType::U32,
            offset: 0,
            name: "v".to_string(),
            compression: CompressionKind::Gorilla32,
          }],
        }
      }
    }

    let handle = MemHandle::new();
    let config = TickFileConfig::new().with_item_section(U64Rec::item_section());
    let file = TickFile::create::<U64Rec>(handle.clone(), config).unwrap();
    file.close().unwrap();

    let err = TickFile::open_read::<OtherRec>(handle).unwrap_err();
    assert_eq!(err.kind, crate::errors::ErrorKind::SchemaMismatch);
  }

  #[test]
  fn test_open_read_dyn_matches_schema_read_from_header() {
    let handle = MemHandle::new();
    let config = TickFileConfig::new().with_item_section(U64Rec::item_section());
    let mut file = TickFile::create::<U64Rec>(handle.clone(), config).unwrap();
    for i in 0..5u64 {
      file.write(i, &i.to_ne_bytes()).unwrap();
    }
    file.close().unwrap();

    let header_file = TickFile::open_header(handle.clone()).unwrap();
    let section = header_file.item_section().clone();
    let mut reader_file = TickFile::open_read_dyn(handle, section).unwrap();
    assert_eq!(reader_file.last_tick(), 4);
    let mut reader = reader_file.get_tick_reader().unwrap();
    for i in 0..5u64 {
      let (tick, run) = reader.next().unwrap().unwrap();
      assert_eq!(tick, i);
      assert_eq!(run.record(0), &i.to_ne_bytes());
    }
  }

  #[test]
  fn test_open_header_reads_metadata_without_body() {
    let handle = MemHandle::new();
    let config = TickFileConfig::new()
      .with_item_section(U64Rec::item_section())
      .with_content_description("test file");
    let file = TickFile::create::<U64Rec>(handle.clone(), config).unwrap();
    file.close().unwrap();

    let header_file = TickFile::open_header(handle).unwrap();
    assert_eq!(header_file.content_description(), Some("test file"));
    assert_eq!(header_file.item_section().type_name, "U64Rec");
    assert!(header_file.get_tick_reader().is_err());
  }

  #[test]
  fn test_concurrent_write_and_read() {
    use std::thread;
    use std::time::Duration;

    let handle = MemHandle::new();
    let config = TickFileConfig::new().with_item_section(U64Rec::item_section());
    let mut file = TickFile::create::<U64Rec>(handle, config).unwrap();

    const N: u64 = 200;
    let mut readers: Vec<_> = (0..3).map(|_| file.get_tick_reader().unwrap()).collect();

    let writer = thread::spawn(move || {
      for i in 0..N {
        file.write(i, &i.to_ne_bytes()).unwrap();
        if i % 10 == 0 {
          file.flush().unwrap();
        }
      }
      file.close().unwrap();
    });

    for reader in &mut readers {
      let mut seen = Vec::new();
      loop {
        match reader.next_timeout(Duration::from_millis(100)) {
          Ok((tick, run)) => {
            assert_eq!(run.record(0), &tick.to_ne_bytes());
            seen.push(tick);
          }
          Err(e) if e.kind == crate::errors::ErrorKind::StreamClosed => break,
          Err(e) if e.kind == crate::errors::ErrorKind::ReadTimeout => continue,
          Err(e) => panic!("unexpected error: {:?}", e),
        }
      }
      assert_eq!(seen, (0..N).collect::<Vec<_>>());
    }

    writer.join().unwrap();
  }
}
