//! Passthrough codec: writes and reads `size` raw bytes with no
//! transformation. Used for fields whose [`crate::schema::CompressionKind`]
//! is `None`, and as the fallback for blob/opaque payloads.

use crate::bit_buffer::BitBuffer;
use crate::bit_reader::BitReader;
use crate::errors::TickResult;

pub struct NoneCompressor {
  size: usize,
}

impl NoneCompressor {
  pub fn new(val: &[u8], bw: &mut BitBuffer) -> Self {
    let c = NoneCompressor { size: val.len() };
    c.compress(val, bw);
    c
  }

  pub fn compress(&self, val: &[u8], bw: &mut BitBuffer) {
    debug_assert_eq!(val.len(), self.size);
    bw.write_bytes(val);
  }
}

pub struct NoneDecompressor {
  size: usize,
}

impl NoneDecompressor {
  pub fn new(size: usize, br: &mut BitReader) -> TickResult<(Self, Vec<u8>)> {
    let d = NoneDecompressor { size };
    let val = d.decompress(br)?;
    Ok((d, val))
  }

  pub fn decompress(&self, br: &mut BitReader) -> TickResult<Vec<u8>> {
    br.read_bytes(self.size)
  }

  pub fn size(&self) -> usize {
    self.size
  }

  /// Converts a decoder into an encoder; the passthrough codec carries no
  /// value state beyond `size`, so this is a plain reconstruction.
  pub fn into_compressor(self) -> NoneCompressor {
    NoneCompressor { size: self.size }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bit_buffer::shared;

  #[test]
  fn test_passthrough_round_trip() {
    let mut bw = BitBuffer::new();
    let payload = b"hello tick".to_vec();
    let c = NoneCompressor::new(&payload, &mut bw);
    c.compress(&payload, &mut bw);

    let mut br = BitReader::new(shared(bw));
    let (d, first) = NoneDecompressor::new(payload.len(), &mut br).unwrap();
    assert_eq!(first, payload);
    assert_eq!(d.decompress(&mut br).unwrap(), payload);
  }
}
