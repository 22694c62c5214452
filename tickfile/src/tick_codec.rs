//! Delta-of-delta codec for the monotonic tick sequence that prefixes every
//! record in a block.
//!
//! Each tick after the first is stored as the delta of the delta from the
//! previous two ticks, using a variable-length prefix code so that steady
//! (fixed-interval) streams cost a single bit per tick:
//!
//! | prefix   | dod range         | payload bits |
//! |----------|--------------------|--------------|
//! | `0`      | `0`                | 0            |
//! | `10`     | `[-63, 64]`        | 7            |
//! | `110`    | `[-255, 256]`      | 9            |
//! | `1110`   | `[-2047, 2048]`    | 12           |
//! | `11110`  | any `i32`          | 32           |
//! | `11111`  | (reserved)         | EOF marker   |

use crate::bit_buffer::BitBuffer;
use crate::bit_reader::BitReader;
use crate::bits::sign_extend;
use crate::errors::{TickError, TickResult};

pub struct TickCompressor {
  last_val: u64,
  last_delta: i64,
}

impl TickCompressor {
  /// Writes the block's first tick verbatim (64 bits) and returns a
  /// compressor primed to delta-encode everything after it.
  pub fn new(start: u64, bw: &mut BitBuffer) -> Self {
    bw.write_bits(start, 64);
    TickCompressor {
      last_val: start,
      last_delta: 0,
    }
  }

  pub fn compress(&mut self, tick: u64, bw: &mut BitBuffer) {
    let delta = tick.wrapping_sub(self.last_val) as i64;
    let dod = delta - self.last_delta;
    match dod {
      0 => bw.write_bit(false),
      -63..=64 => {
        bw.write_bits(0x02, 2);
        bw.write_bits(dod as u64 & 0x7F, 7);
      }
      -255..=256 => {
        bw.write_bits(0x06, 3);
        bw.write_bits(dod as u64 & 0x1FF, 9);
      }
      -2047..=2048 => {
        bw.write_bits(0x0e, 4);
        bw.write_bits(dod as u64 & 0xFFF, 12);
      }
      _ => {
        bw.write_bits(0x1e, 5);
        bw.write_bits(dod as u64 & 0xFFFF_FFFF, 32);
      }
    }
    self.last_val = tick;
    self.last_delta = delta;
  }

  /// Rewinds past a previously-written EOF marker so the block can resume
  /// accepting ticks after reopening for append.
  pub fn reopen(bw: &mut BitBuffer) -> TickResult<()> {
    bw.rewind(5)
  }

  pub fn close(bw: &mut BitBuffer) {
    bw.write_bits(0x1f, 5);
  }
}

pub struct TickDecompressor {
  last_val: u64,
  last_delta: i64,
}

impl TickDecompressor {
  /// Reads the block's leading 64-bit tick and returns a decompressor
  /// primed to expand every delta-of-delta after it.
  pub fn new(br: &mut BitReader) -> TickResult<(Self, u64)> {
    let t = br.read_bits(64)?;
    Ok((
      TickDecompressor {
        last_val: t,
        last_delta: 0,
      },
      t,
    ))
  }

  /// Decodes the next tick, or `Ok(None)` on a clean EOF marker.
  pub fn decompress(&mut self, br: &mut BitReader) -> TickResult<Option<u64>> {
    let mut prefix: u8 = 0;
    let mut size: u32 = 0;
    for _ in 0..5 {
      prefix <<= 1;
      if !br.read_bit()? {
        break;
      }
      prefix |= 1;
    }

    let dod: i64 = match prefix {
      0x00 => 0,
      0x1f => return Ok(None),
      0x02 => {
        size = 7;
        0
      }
      0x06 => {
        size = 9;
        0
      }
      0x0e => {
        size = 12;
        0
      }
      0x1e => {
        size = 32;
        0
      }
      other => {
        return Err(TickError::corruption(format!(
          "unknown delta-of-delta prefix: {:#x}",
          other
        )))
      }
    };
    let dod = if size != 0 {
      sign_extend(br.read_bits(size)?, size)
    } else {
      dod
    };

    self.last_delta += dod;
    self.last_val = self.last_val.wrapping_add(self.last_delta as u64);
    Ok(Some(self.last_val))
  }

  pub fn last_tick(&self) -> u64 {
    self.last_val
  }

  pub fn into_compressor(self) -> TickCompressor {
    TickCompressor {
      last_val: self.last_val,
      last_delta: self.last_delta,
    }
  }
}
