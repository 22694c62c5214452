//! Gorilla-XOR codec for fixed-width scalar fields.
//!
//! Adapted from the Facebook Gorilla time-series paper's float codec and
//! generalized to every width a [`crate::schema::FieldType`] scalar can
//! have (8/16/32/64 bits), rather than hardcoding 64-bit-only.
//! Each value is XORed against the previous one; a zero XOR costs a single
//! bit, and a nonzero XOR either reuses the previous leading/trailing-zero
//! "window" (1 extra bit) or pays to redeclare a new window.

use crate::bit_buffer::BitBuffer;
use crate::bit_reader::BitReader;
use crate::errors::TickResult;

/// Scalar width a [`GorillaCompressor`]/[`GorillaDecompressor`] pair codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
  W8,
  W16,
  W32,
  W64,
}

impl Width {
  fn bits(self) -> u32 {
    match self {
      Width::W8 => 8,
      Width::W16 => 16,
      Width::W32 => 32,
      Width::W64 => 64,
    }
  }

  /// Bit width of the encoded leading-zero-count field, and the clamp
  /// applied to a raw leading-zero count before it's written. Each
  /// narrower width halves the clamp and costs one fewer field bit than
  /// the 64-bit case's `leading >= 32 => 31`.
  fn leading_field(self) -> (u32, u32) {
    match self {
      Width::W8 => (2, 3),
      Width::W16 => (3, 7),
      Width::W32 => (4, 15),
      Width::W64 => (5, 31),
    }
  }

  /// Bit width of the encoded significant-bits field. `0` in that field
  /// means "all `bits()` bits are significant" (leading == trailing == 0).
  fn sigbits_field(self) -> u32 {
    self.leading_field().0 + 1
  }
}

pub struct GorillaCompressor {
  width: Width,
  last_val: u64,
  leading: Option<u32>,
  trailing: u32,
}

impl GorillaCompressor {
  pub fn new(width: Width, val: u64, bw: &mut BitBuffer) -> Self {
    bw.write_bits(val, width.bits());
    GorillaCompressor {
      width,
      last_val: val,
      leading: None,
      trailing: 0,
    }
  }

  pub fn compress(&mut self, val: u64, bw: &mut BitBuffer) {
    let xor = val ^ self.last_val;
    if xor == 0 {
      bw.write_bit(false);
      return;
    }
    bw.write_bit(true);

    let width_bits = self.width.bits();
    let (leading_field_bits, leading_clamp) = self.width.leading_field();
    let mut leading = xor.leading_zeros() - (64 - width_bits);
    let trailing = xor.trailing_zeros();
    if leading >= leading_clamp {
      leading = leading_clamp;
    }

    let reuse_window = match self.leading {
      Some(prev_leading) if leading >= prev_leading && trailing >= self.trailing => true,
      _ => false,
    };

    if reuse_window {
      bw.write_bit(false);
      let prev_leading = self.leading.unwrap();
      bw.write_bits(xor >> self.trailing, width_bits - prev_leading - self.trailing);
    } else {
      self.leading = Some(leading);
      self.trailing = trailing;

      bw.write_bit(true);
      bw.write_bits(leading as u64, leading_field_bits);

      let sigbits = width_bits - leading - trailing;
      let encoded_sigbits = if sigbits == width_bits { 0 } else { sigbits };
      bw.write_bits(encoded_sigbits as u64, self.width.sigbits_field());
      bw.write_bits(xor >> trailing, sigbits);
    }
    self.last_val = val;
  }
}

pub struct GorillaDecompressor {
  width: Width,
  last_val: u64,
  leading: u32,
  trailing: u32,
  has_window: bool,
}

impl GorillaDecompressor {
  pub fn new(width: Width, br: &mut BitReader) -> TickResult<(Self, u64)> {
    let val = br.read_bits(width.bits())?;
    Ok((
      GorillaDecompressor {
        width,
        last_val: val,
        leading: 0,
        trailing: 0,
        has_window: false,
      },
      val,
    ))
  }

  pub fn decompress(&mut self, br: &mut BitReader) -> TickResult<u64> {
    if !br.read_bit()? {
      return Ok(self.last_val);
    }

    let width_bits = self.width.bits();
    if br.read_bit()? {
      let leading_field_bits = self.width.leading_field().0;
      self.leading = br.read_bits(leading_field_bits)? as u32;

      let mut sigbits = br.read_bits(self.width.sigbits_field())? as u32;
      if sigbits == 0 {
        sigbits = width_bits;
      }
      self.trailing = width_bits - self.leading - sigbits;
      self.has_window = true;
    }

    let mbits = width_bits - self.leading - self.trailing;
    let bits = br.read_bits(mbits)?;
    let val = self.last_val ^ (bits << self.trailing);
    self.last_val = val;
    Ok(val)
  }

  pub fn last_val(&self) -> u64 {
    self.last_val
  }

  /// Converts a decoder into an encoder carrying identical internal state,
  /// with no further bits written. Used to resume writing after a replay
  /// reconstructs decoder state from an existing block.
  pub fn into_compressor(self) -> GorillaCompressor {
    GorillaCompressor {
      width: self.width,
      last_val: self.last_val,
      leading: if self.has_window { Some(self.leading) } else { None },
      trailing: self.trailing,
    }
  }
}
