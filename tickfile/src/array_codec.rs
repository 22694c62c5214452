//! Run-length XOR codec for fixed-size byte arrays (`FieldType::Array32`
//! and `FieldType::Array256`).
//!
//! An unchanged array costs one bit. A changed array is XORed against the
//! previous value and the XOR is run-length encoded: `(byte, run_length)`
//! pairs replayed until every array slot has been produced. The run-length
//! field is wide enough to name every position in the array in one run (5
//! bits for 32 bytes, 8 bits for 256), with `0` meaning "the full array
//! width" so a single run spanning the whole array still fits.

use crate::bit_buffer::BitBuffer;
use crate::bit_reader::BitReader;
use crate::errors::TickResult;

fn run_length_field_bits(n: usize) -> u32 {
  debug_assert!(n.is_power_of_two());
  n.trailing_zeros()
}

pub struct ArrayCompressor<const N: usize> {
  last_val: [u8; N],
}

impl<const N: usize> ArrayCompressor<N> {
  pub fn new(val: [u8; N], bw: &mut BitBuffer) -> Self {
    bw.write_bytes(&val);
    ArrayCompressor { last_val: val }
  }

  pub fn compress(&mut self, val: &[u8; N], bw: &mut BitBuffer) {
    let mut xor = [0u8; N];
    for i in 0..N {
      xor[i] = val[i] ^ self.last_val[i];
    }
    if xor == [0u8; N] {
      bw.write_bit(false);
      self.last_val = *val;
      return;
    }
    bw.write_bit(true);

    let run_bits = run_length_field_bits(N);
    let mut count: u32 = 1;
    for i in 1..N {
      if xor[i] == xor[i - 1] {
        count += 1;
      } else {
        bw.write_byte(xor[i - 1]);
        bw.write_bits(count as u64, run_bits);
        count = 1;
      }
    }
    bw.write_byte(xor[N - 1]);
    let encoded = if count as usize == N { 0 } else { count };
    bw.write_bits(encoded as u64, run_bits);
    self.last_val = *val;
  }
}

pub struct ArrayDecompressor<const N: usize> {
  last_val: [u8; N],
}

impl<const N: usize> ArrayDecompressor<N> {
  pub fn new(br: &mut BitReader) -> TickResult<(Self, [u8; N])> {
    let mut val = [0u8; N];
    br.read_bytes_into(&mut val)?;
    Ok((ArrayDecompressor { last_val: val }, val))
  }

  pub fn decompress(&mut self, br: &mut BitReader) -> TickResult<[u8; N]> {
    if !br.read_bit()? {
      return Ok(self.last_val);
    }
    let run_bits = run_length_field_bits(N);
    let mut val = [0u8; N];
    let mut idx = 0usize;
    while idx != N {
      let byte = br.read_byte()?;
      let mut count = br.read_bits(run_bits)? as usize;
      if count == 0 {
        count = N;
      }
      for _ in 0..count {
        val[idx] = byte ^ self.last_val[idx];
        idx += 1;
      }
    }
    self.last_val = val;
    Ok(val)
  }

  pub fn last_val(&self) -> &[u8; N] {
    &self.last_val
  }

  /// Converts a decoder into an encoder carrying identical internal state.
  pub fn into_compressor(self) -> ArrayCompressor<N> {
    ArrayCompressor {
      last_val: self.last_val,
    }
  }
}

pub type Array32Compressor = ArrayCompressor<32>;
pub type Array32Decompressor = ArrayDecompressor<32>;
pub type Array256Compressor = ArrayCompressor<256>;
pub type Array256Decompressor = ArrayDecompressor<256>;

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bit_buffer::shared;

  fn round_trip<const N: usize>(values: &[[u8; N]]) -> Vec<[u8; N]> {
    let mut bw = BitBuffer::new();
    let mut compressor = ArrayCompressor::<N>::new(values[0], &mut bw);
    for v in &values[1..] {
      compressor.compress(v, &mut bw);
    }
    let mut br = BitReader::new(shared(bw));
    let (mut decompressor, first) = ArrayDecompressor::<N>::new(&mut br).unwrap();
    let mut out = vec![first];
    for _ in 1..values.len() {
      out.push(decompressor.decompress(&mut br).unwrap());
    }
    out
  }

  #[test]
  fn test_array32_unchanged_and_full_run() {
    let a = [1u8; 32];
    let mut b = [0u8; 32];
    b.copy_from_slice(&(0u8..32).collect::<Vec<_>>());
    let values = vec![a, a, b, b, a];
    assert_eq!(round_trip(&values), values);
  }

  #[test]
  fn test_array32_all_bits_flip_single_run() {
    let a = [0u8; 32];
    let b = [0xFFu8; 32];
    let values = vec![a, b, a];
    assert_eq!(round_trip(&values), values);
  }

  #[test]
  fn test_array256_mixed_runs() {
    let mut a = [0u8; 256];
    for (i, b) in a.iter_mut().enumerate() {
      *b = (i % 251) as u8;
    }
    let b = [0xAAu8; 256];
    let values = vec![a, b, a, [0u8; 256]];
    assert_eq!(round_trip(&values), values);
  }
}
