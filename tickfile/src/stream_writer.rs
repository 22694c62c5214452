//! Orchestrates tick + record encoding into a shared [`BitBuffer`], and
//! the open/close framing that lets a block be closed and reopened for
//! append without losing codec state.

use log::trace;

use crate::bit_buffer::{BitBuffer, SharedBitBuffer};
use crate::bit_reader::BitReader;
use crate::errors::{TickError, TickResult};
use crate::schema::ItemSection;
use crate::struct_codec::{StructCompressor, StructDecompressor};
use crate::tick_codec::{TickCompressor, TickDecompressor};

pub struct TickStreamWriter {
  tick_codec: Option<TickCompressor>,
  struct_codec: Option<StructCompressor>,
  last_tick: u64,
}

impl TickStreamWriter {
  /// A writer with no codecs yet; the first call to [`Self::write`]
  /// constructs them, seeding from that call's record.
  pub fn new_empty() -> Self {
    TickStreamWriter {
      tick_codec: None,
      struct_codec: None,
      last_tick: 0,
    }
  }

  /// Rebuilds writer state by replaying an existing block's stream to its
  /// end, then converting the resulting decoders back into encoders.
  pub fn from_block(
    section: &ItemSection,
    buffer: &SharedBitBuffer,
  ) -> TickResult<(Self, u64)> {
    let mut br = BitReader::new(buffer.clone());
    let (tick_dec, first_tick) = TickDecompressor::new(&mut br)?;
    let (struct_dec, _) = StructDecompressor::new(section, &mut br)?;

    let mut tick_dec = tick_dec;
    let mut struct_dec = struct_dec;
    let mut last_tick = first_tick;
    loop {
      match tick_dec.decompress(&mut br)? {
        None => break,
        Some(tick) => {
          struct_dec.decompress(&mut br)?;
          last_tick = tick;
        }
      }
    }
    trace!("replayed block up to last_tick={}", last_tick);

    let writer = TickStreamWriter {
      tick_codec: Some(tick_dec.into_compressor()),
      struct_codec: Some(struct_dec.into_compressor()),
      last_tick,
    };
    Ok((writer, last_tick))
  }

  pub fn last_tick(&self) -> u64 {
    self.last_tick
  }

  pub fn is_initialized(&self) -> bool {
    self.tick_codec.is_some()
  }

  /// Writes one record at `tick`. Same-tick duplicates are permitted; only
  /// a strictly decreasing tick is rejected.
  pub fn write(
    &mut self,
    section: &ItemSection,
    tick: u64,
    record: &[u8],
    buffer: &mut BitBuffer,
  ) -> TickResult<()> {
    if let Some(tick_codec) = &mut self.tick_codec {
      if tick < self.last_tick {
        return Err(TickError::tick_out_of_order(tick, self.last_tick));
      }
      tick_codec.compress(tick, buffer);
      self
        .struct_codec
        .as_mut()
        .expect("struct_codec initialized alongside tick_codec")
        .compress(record, buffer);
    } else {
      self.tick_codec = Some(TickCompressor::new(tick, buffer));
      self.struct_codec = Some(StructCompressor::new(section, record, buffer)?);
    }
    self.last_tick = tick;
    Ok(())
  }

  /// Rewinds past a previously-written EOF marker so the next `write`
  /// continues the stream in place.
  pub fn open(&self, buffer: &mut BitBuffer) -> TickResult<()> {
    TickCompressor::reopen(buffer)
  }

  pub fn close(&self, buffer: &mut BitBuffer) {
    TickCompressor::close(buffer);
  }
}
