//! Crate-level integration tests.
//!
//! Per-module unit tests exercise individual codecs in isolation; the tests
//! here drive the full `TickFile` stack end to end, the way a real caller
//! would, against an in-memory `FileHandle` so no real filesystem is
//! touched.

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};

use tickfile_io::FileHandle;

use crate::config::TickFileConfig;
use crate::schema::{CompressionKind, FieldSpec, FieldType, ItemSection, TickRecord};
use crate::tickfile::TickFile;

/// An in-memory `FileHandle`, shared with `tickfile::tests`'s `MemHandle`
/// only in spirit — kept local so this module has no dependency on another
/// module's `#[cfg(test)]` items.
#[derive(Clone)]
struct MemHandle(Arc<Mutex<std::io::Cursor<Vec<u8>>>>);

impl MemHandle {
  fn new() -> Self {
    env_logger::try_init().ok();
    MemHandle(Arc::new(Mutex::new(std::io::Cursor::new(Vec::new()))))
  }
}

impl Read for MemHandle {
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

/// A small multi-field record: one tick-aligned price, a quantity, and a
/// fixed venue code — exercises Gorilla64, Gorilla32, and the run-length
/// array codec together in one struct, the way a real market-data record
/// would mix field kinds.
#[derive(Clone, Copy)]
#[repr(C)]
struct Trade {
  price: u64,
  qty: u32,
  venue: [u8; 32],
}

impl Trade {
  fn to_bytes(self) -> [u8; 44] {
    let mut buf = [0u8; 44];
    buf[0..8].copy_from_slice(&self.price.to_ne_bytes());
    buf[8..12].copy_from_slice(&self.qty.to_ne_bytes());
    buf[12..44].copy_from_slice(&self.venue);
    buf
  }
}

impl TickRecord for Trade {
  fn item_section() -> ItemSection {
    ItemSection {
      item_size: 44,
      type_name: "Trade".to_string(),
      fields: vec![
        FieldSpec {
          index: 0,
          ty: FieldType::U64,
          offset: 0,
          name: "price".to_string(),
          compression: CompressionKind::Gorilla64,
        },
        FieldSpec {
          index: 1,
          ty: FieldType::U32,
          offset: 8,
          name: "qty".to_string(),
          compression: CompressionKind::Gorilla32,
        },
        FieldSpec {
          index: 2,
          ty: FieldType::Array32,
          offset: 12,
          name: "venue".to_string(),
          compression: CompressionKind::RunLengthBytes32,
        },
      ],
    }
  }
}

fn venue(tag: u8) -> [u8; 32] {
  let mut v = [0u8; 32];
  v[0] = tag;
  v
}

#[test]
fn test_multi_field_schema_round_trip() {
  let handle = MemHandle::new();
  let config = TickFileConfig::new().with_item_section(Trade::item_section());
  let mut file = TickFile::create::<Trade>(handle.clone(), config).unwrap();

  let records: Vec<Trade> = (0..50u64)
    .map(|i| Trade {
      price: 1_000_000 + i,
      qty: 100 + (i % 5) as u32,
      venue: venue(if i < 25 { 1 } else { 2 }),
    })
    .collect();
  for (i, rec) in records.iter().enumerate() {
    file.write(i as u64, &rec.to_bytes()).unwrap();
  }
  file.close().unwrap();

  let mut reader_file = TickFile::open_read::<Trade>(handle).unwrap();
  assert_eq!(reader_file.last_tick(), 49);
  let mut reader = reader_file.get_tick_reader().unwrap();
  for (i, rec) in records.iter().enumerate() {
    let (tick, run) = reader.next().unwrap().unwrap();
    assert_eq!(tick, i as u64);
    assert_eq!(run.record(0), &rec.to_bytes());
  }
  assert!(reader.next().unwrap().is_none());
}

/// Mirrors the fuzz scenario: repeatedly write one record, then randomly
/// either flush in place or close and reopen for append, checking after
/// every step that a fresh reader sees exactly the records written so far,
/// in order, with no duplicates or gaps.
#[test]
fn test_fuzz_flush_close_reopen_yields_contiguous_prefix() {
  use rand::{Rng, SeedableRng};
  use rand_xoshiro::Xoshiro256PlusPlus;

  let mut rng = Xoshiro256PlusPlus::seed_from_u64(0xFEED_F00D);
  let handle = MemHandle::new();
  let config = TickFileConfig::new().with_item_section(U64Rec::item_section());
  let mut file = TickFile::create::<U64Rec>(handle.clone(), config).unwrap();

  const ITERS: u64 = 1000;
  for i in 0..ITERS {
    file.write(i, &i.to_ne_bytes()).unwrap();
    match rng.gen_range(0..3) {
      0 => file.flush().unwrap(),
      1 => {
        file.close().unwrap();
        file = TickFile::open_write::<U64Rec>(handle.clone()).unwrap();
      }
      _ => {}
    }

    // Every handful of iterations, confirm a fresh reader sees exactly the
    // contiguous prefix 0..=i, regardless of whether the last step flushed.
    if i % 37 == 0 {
      file.flush().unwrap();
      let mut reader_file = TickFile::open_read::<U64Rec>(handle.clone()).unwrap();
      assert_eq!(reader_file.last_tick(), i);
      let mut reader = reader_file.get_tick_reader().unwrap();
      let mut expected = 0u64;
      while let Some((tick, run)) = reader.next().unwrap() {
        assert_eq!(tick, expected);
        assert_eq!(run.record(0), &expected.to_ne_bytes());
        expected += 1;
      }
      assert_eq!(expected, i + 1);
    }
  }
  file.close().unwrap();

  let mut reader_file = TickFile::open_read::<U64Rec>(handle).unwrap();
  assert_eq!(reader_file.last_tick(), ITERS - 1);
  let mut reader = reader_file.get_tick_reader().unwrap();
  let mut count = 0u64;
  while let Some((tick, run)) = reader.next().unwrap() {
    assert_eq!(tick, count);
    assert_eq!(run.record(0), &count.to_ne_bytes());
    count += 1;
  }
  assert_eq!(count, ITERS);
}

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

/// A file created and closed without a single `write` has no tick stream
/// and therefore no EOF marker to rewind on reopen. Confirms this documented
/// limitation: `open_write` rejects it, but `open_read` / `open_header` see
/// a well-formed, empty file.
#[test]
fn test_never_written_file_cannot_be_reopened_for_append() {
  let handle = MemHandle::new();
  let config = TickFileConfig::new().with_item_section(U64Rec::item_section());
  let file = TickFile::create::<U64Rec>(handle.clone(), config).unwrap();
  file.close().unwrap();

  let err = TickFile::open_write::<U64Rec>(handle.clone()).unwrap_err();
  assert_eq!(err.kind, crate::errors::ErrorKind::MissingEofMarker);

  let header_file = TickFile::open_header(handle).unwrap();
  assert_eq!(header_file.item_section().type_name, "U64Rec");
}

/// One writer appends `0..N` on its own thread, flushing periodically;
/// three readers each poll `next_timeout` in a loop from the moment the
/// file is created. Every reader must eventually observe all `N` ticks, in
/// order, with no gaps or duplicates, regardless of how its polling
/// happens to interleave with the writer's flushes.
#[test]
fn test_concurrent_append_and_read() {
  use std::thread;
  use std::time::Duration;

  const N: u64 = 500;

  let handle = MemHandle::new();
  let config = TickFileConfig::new().with_item_section(U64Rec::item_section());
  let mut file = TickFile::create::<U64Rec>(handle, config).unwrap();

  let readers: Vec<_> = (0..3).map(|_| file.get_tick_reader().unwrap()).collect();

  let writer = thread::spawn(move || {
    for i in 0..N {
      file.write(i, &i.to_ne_bytes()).unwrap();
      if i % 17 == 0 {
        file.flush().unwrap();
      }
    }
    file.close().unwrap();
  });

  let reader_threads: Vec<_> = readers
    .into_iter()
    .map(|mut reader| {
      thread::spawn(move || {
        let mut seen = Vec::with_capacity(N as usize);
        loop {
          match reader.next_timeout(Duration::from_millis(100)) {
            Ok((tick, run)) => {
              assert_eq!(run.run_length(), 1);
              seen.push(tick);
            }
            Err(e) if e.is_clean_eof() => {
              if e.kind == crate::errors::ErrorKind::StreamClosed {
                break;
              }
              // ReadTimeout: writer hasn't published since our last poll yet.
            }
            Err(e) => panic!("unexpected reader error: {:?}", e),
          }
        }
        seen
      })
    })
    .collect();

  writer.join().unwrap();
  for handle in reader_threads {
    let seen = handle.join().unwrap();
    assert_eq!(seen, (0..N).collect::<Vec<_>>());
  }
}
