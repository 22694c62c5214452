//! Streaming iterator over `(tick, record)` pairs, grouping consecutive
//! records that share the same tick into one [`RecordRun`].
//!
//! Each step reads one tick ahead of the run it returns, so it knows to
//! stop a run exactly when the tick changes.

use std::time::Duration;

use log::debug;

use crate::bit_buffer::SharedBitBuffer;
use crate::bit_reader::{BitReader, BitReaderState};
use crate::errors::{TickError, TickResult};
use crate::record_run::RecordRun;
use crate::schema::ItemSection;
use crate::signal::PublishSignal;
use crate::struct_codec::StructDecompressor;
use crate::tick_codec::TickDecompressor;

enum State {
  NotStarted,
  /// Holds the tick read past the end of the run just returned, to be
  /// consumed as the start of the next run.
  LookedAhead(u64),
  /// A run for `tick` stopped accumulating because the reader caught up
  /// with every byte the writer has published so far — not because the
  /// tick changed or the stream closed. More records for the same tick may
  /// still be on the way, so the run is held here rather than handed to
  /// the caller; `next()` keeps returning `None` until the tick changes or
  /// the EOF marker is seen, at which point this run is finally returned.
  PendingRun { tick: u64, run: RecordRun },
}

pub struct TickStreamReader {
  reader: BitReader,
  section: ItemSection,
  tick_codec: Option<TickDecompressor>,
  struct_codec: Option<StructDecompressor>,
  state: State,
  signal: Option<PublishSignal>,
}

impl TickStreamReader {
  pub fn new(buffer: SharedBitBuffer, section: ItemSection) -> Self {
    TickStreamReader {
      reader: BitReader::new(buffer),
      section,
      tick_codec: None,
      struct_codec: None,
      state: State::NotStarted,
      signal: None,
    }
  }

  pub fn with_signal(mut self, signal: PublishSignal) -> Self {
    self.signal = Some(signal);
    self
  }

  pub fn state(&self) -> BitReaderState {
    self.reader.state()
  }

  pub fn reset(&mut self, state: BitReaderState) {
    self.reader.reset(state);
  }

  /// Returns the next `(tick, RecordRun)`, or `Ok(None)` once the reader
  /// has caught up with everything currently published (including when a
  /// run is being held open, waiting to see whether the writer adds more
  /// records for the same tick).
  pub fn next(&mut self) -> TickResult<Option<(u64, RecordRun)>> {
    if self.reader.end() {
      return Ok(None);
    }

    match std::mem::replace(&mut self.state, State::NotStarted) {
      State::NotStarted => {
        let (tick_dec, first_tick) = TickDecompressor::new(&mut self.reader)?;
        let (struct_dec, first_record) = StructDecompressor::new(&self.section, &mut self.reader)?;
        self.tick_codec = Some(tick_dec);
        self.struct_codec = Some(struct_dec);
        let mut run = RecordRun::new(self.section.item_size as usize);
        run.push(&first_record);
        self.fill_run(first_tick, run)
      }
      State::LookedAhead(tick) => {
        let first_record = self.struct_codec.as_mut().unwrap().decompress(&mut self.reader)?;
        let mut run = RecordRun::new(self.section.item_size as usize);
        run.push(&first_record);
        self.fill_run(tick, run)
      }
      State::PendingRun { tick, run } => self.fill_run(tick, run),
    }
  }

  /// Pulls in every further record that shares `current_tick` into `run`,
  /// by peeking one tick ahead at a time. Stops and returns the run once
  /// the tick changes or the EOF marker is seen; if the reader instead
  /// catches up with the writer mid-run, stashes the run as `PendingRun`
  /// and returns `None` rather than handing back a run that might still
  /// be missing same-tick records the writer hasn't published yet.
  fn fill_run(
    &mut self,
    current_tick: u64,
    mut run: RecordRun,
  ) -> TickResult<Option<(u64, RecordRun)>> {
    loop {
      if self.reader.end() {
        self.state = State::PendingRun { tick: current_tick, run };
        return Ok(None);
      }
      match self.tick_codec.as_mut().unwrap().decompress(&mut self.reader)? {
        None => {
          return Ok(Some((current_tick, run)));
        }
        Some(next_tick) if next_tick == current_tick => {
          let record = self.struct_codec.as_mut().unwrap().decompress(&mut self.reader)?;
          run.push(&record);
        }
        Some(next_tick) => {
          self.state = State::LookedAhead(next_tick);
          return Ok(Some((current_tick, run)));
        }
      }
    }
  }

  /// Blocking variant: retries on a clean end-of-stream until `timeout`
  /// elapses or the writer publishes new data / closes.
  pub fn next_timeout(&mut self, timeout: Duration) -> TickResult<(u64, RecordRun)> {
    loop {
      if let Some(result) = self.next()? {
        return Ok(result);
      }
      let signal = self
        .signal
        .as_ref()
        .ok_or_else(|| TickError::stream_closed())?;
      if signal.is_closed() && self.reader.end() {
        debug!("stream reader reached end-of-stream after writer closed");
        return Err(TickError::stream_closed());
      }
      if !signal.wait(timeout) {
        return Err(TickError::read_timeout());
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bit_buffer::{shared, BitBuffer};
  use crate::schema::{CompressionKind, FieldSpec, FieldType};
  use crate::stream_writer::TickStreamWriter;

  fn section() -> ItemSection {
    ItemSection {
      item_size: 8,
      type_name: "U64".to_string(),
      fields: vec![FieldSpec {
        index: 0,
        ty: FieldType::U64,
        offset: 0,
        name: "v".to_string(),
        compression: CompressionKind::Gorilla64,
      }],
    }
  }

  #[test]
  fn test_groups_same_tick_records() {
    let section = section();
    let mut bw = BitBuffer::new();
    let mut writer = TickStreamWriter::new_empty();
    writer.write(&section, 1, &1u64.to_ne_bytes(), &mut bw).unwrap();
    writer.write(&section, 1, &2u64.to_ne_bytes(), &mut bw).unwrap();
    writer.write(&section, 2, &3u64.to_ne_bytes(), &mut bw).unwrap();
    writer.write(&section, 2, &4u64.to_ne_bytes(), &mut bw).unwrap();
    writer.write(&section, 2, &5u64.to_ne_bytes(), &mut bw).unwrap();
    writer.write(&section, 3, &6u64.to_ne_bytes(), &mut bw).unwrap();
    writer.close(&mut bw);

    let buffer = shared(bw);
    let mut reader = TickStreamReader::new(buffer, section);

    let (tick, run) = reader.next().unwrap().unwrap();
    assert_eq!(tick, 1);
    assert_eq!(run.run_length(), 2);

    let (tick, run) = reader.next().unwrap().unwrap();
    assert_eq!(tick, 2);
    assert_eq!(run.run_length(), 3);

    let (tick, run) = reader.next().unwrap().unwrap();
    assert_eq!(tick, 3);
    assert_eq!(run.run_length(), 1);

    assert!(reader.next().unwrap().is_none());
  }

  #[test]
  fn test_same_tick_run_resumes_after_live_pause() {
    let section = section();
    let mut bw = BitBuffer::new();
    let mut writer = TickStreamWriter::new_empty();
    writer.write(&section, 1, &1u64.to_ne_bytes(), &mut bw).unwrap();

    let buffer = shared(bw);
    let mut reader = TickStreamReader::new(buffer.clone(), section.clone());

    // The writer might still add more tick-1 records; nothing conclusive yet.
    assert!(reader.next().unwrap().is_none());

    {
      let mut bw = buffer.write().unwrap();
      writer.write(&section, 1, &2u64.to_ne_bytes(), &mut bw).unwrap();
      writer.write(&section, 2, &3u64.to_ne_bytes(), &mut bw).unwrap();
      writer.close(&mut bw);
    }

    let (tick, run) = reader.next().unwrap().unwrap();
    assert_eq!(tick, 1);
    assert_eq!(run.run_length(), 2);
    assert_eq!(run.record(0), &1u64.to_ne_bytes());
    assert_eq!(run.record(1), &2u64.to_ne_bytes());

    let (tick, run) = reader.next().unwrap().unwrap();
    assert_eq!(tick, 2);
    assert_eq!(run.run_length(), 1);

    assert!(reader.next().unwrap().is_none());
  }

  #[test]
  fn test_single_tick_stream() {
    let section = section();
    let mut bw = BitBuffer::new();
    let mut writer = TickStreamWriter::new_empty();
    writer.write(&section, 42, &7u64.to_ne_bytes(), &mut bw).unwrap();
    writer.close(&mut bw);

    let buffer = shared(bw);
    let mut reader = TickStreamReader::new(buffer, section);
    let (tick, run) = reader.next().unwrap().unwrap();
    assert_eq!(tick, 42);
    assert_eq!(run.record(0), &7u64.to_ne_bytes());
    assert!(reader.next().unwrap().is_none());
  }
}
