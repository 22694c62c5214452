//! Chunked transport of a [`SharedBitBuffer`] over a byte-oriented channel
//! (a socket, a pipe — anything that only moves whole bytes).
//!
//! Each chunk is `[count_byte, payload...]`, where `count_byte` is the
//! source buffer's bit `count` *as of the last byte in this chunk* — 0 for
//! every chunk except (possibly) the final one, which lets
//! [`ChunkWriter`] reassemble a buffer with the exact same partial tail
//! byte the source had.

use crate::bit_buffer::{BitBuffer, SharedBitBuffer};

pub struct ChunkReader {
  buffer: SharedBitBuffer,
  count: u8,
  idx: usize,
  chunk_size: usize,
}

impl ChunkReader {
  pub fn new(buffer: SharedBitBuffer, chunk_size: usize) -> Self {
    ChunkReader {
      buffer,
      count: 8,
      idx: 0,
      chunk_size,
    }
  }

  /// Returns the next chunk, or `None` once the reader has caught up to
  /// everything the writer has published.
  pub fn read_chunk(&mut self) -> Option<Vec<u8>> {
    let buf = self.buffer.read().unwrap();
    let n = buf.len_bytes();
    let buf_count = buf.count();

    if self.idx == n.saturating_sub(1) && self.count == buf_count && n > 0 {
      return None;
    }
    if n == 0 {
      return None;
    }
    if self.count == 0 {
      self.idx += 1;
    }
    let m = (n - self.idx).min(self.chunk_size);
    if m == 0 {
      return None;
    }
    let mut chunk = vec![0u8; m + 1];
    chunk[1..].copy_from_slice(&buf.bytes()[self.idx..self.idx + m]);
    self.idx += m - 1;
    self.count = if self.idx == n - 1 { buf_count } else { 0 };
    chunk[0] = self.count;
    Some(chunk)
  }
}

pub struct ChunkWriter {
  buffer: SharedBitBuffer,
}

impl ChunkWriter {
  pub fn new(buffer: SharedBitBuffer) -> Self {
    ChunkWriter { buffer }
  }

  pub fn write_chunk(&mut self, chunk: &[u8]) {
    let mut buf = self.buffer.write().unwrap();
    for &byte in &chunk[1..] {
      append_or_overwrite_tail(&mut buf, byte);
    }
    set_count(&mut buf, chunk[0]);
  }
}

fn append_or_overwrite_tail(buf: &mut BitBuffer, byte: u8) {
  if buf.count() == 0 {
    buf.write_raw_push(byte);
  } else {
    buf.write_raw_overwrite_last(byte);
  }
}

fn set_count(buf: &mut BitBuffer, count: u8) {
  buf.set_count_raw(count);
}
