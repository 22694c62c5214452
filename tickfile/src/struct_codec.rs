//! Composes the per-field value codecs over an [`ItemSection`] to
//! compress/decompress one record at a time.
//!
//! Dispatches each field to its codec over the full `(FieldType,
//! CompressionKind)` matrix, rather than hardcoding a single width.

use crate::array_codec::{ArrayCompressor, ArrayDecompressor};
use crate::bit_buffer::BitBuffer;
use crate::bit_reader::BitReader;
use crate::errors::{TickError, TickResult};
use crate::none_codec::{NoneCompressor, NoneDecompressor};
use crate::schema::{CompressionKind, FieldSpec, ItemSection};
use crate::value_codec::{GorillaCompressor, GorillaDecompressor, Width};

fn read_scalar(record: &[u8], field: &FieldSpec) -> u64 {
  let width = field.ty.byte_width();
  let bytes = &record[field.offset as usize..field.offset as usize + width];
  let mut buf = [0u8; 8];
  buf[..width].copy_from_slice(bytes);
  u64::from_ne_bytes(buf)
}

fn write_scalar(record: &mut [u8], field: &FieldSpec, val: u64) {
  let width = field.ty.byte_width();
  let buf = val.to_ne_bytes();
  record[field.offset as usize..field.offset as usize + width].copy_from_slice(&buf[..width]);
}

enum FieldCompressor {
  None(NoneCompressor, usize),
  Gorilla(GorillaCompressor),
  Array32(ArrayCompressor<32>),
  Array256(ArrayCompressor<256>),
}

enum FieldDecompressor {
  None(NoneDecompressor, usize),
  Gorilla(GorillaDecompressor),
  Array32(ArrayDecompressor<32>),
  Array256(ArrayDecompressor<256>),
}

fn gorilla_width(field: &FieldSpec) -> TickResult<Width> {
  Ok(match field.compression {
    CompressionKind::Gorilla8 => Width::W8,
    CompressionKind::Gorilla16 => Width::W16,
    CompressionKind::Gorilla32 => Width::W32,
    CompressionKind::Gorilla64 => Width::W64,
    other => {
      return Err(TickError::schema_mismatch(format!(
        "field '{}' has non-Gorilla compression {:?}",
        field.name, other
      )))
    }
  })
}

pub struct StructCompressor {
  fields: Vec<FieldSpec>,
  codecs: Vec<FieldCompressor>,
}

impl StructCompressor {
  pub fn new(section: &ItemSection, record: &[u8], bw: &mut BitBuffer) -> TickResult<Self> {
    let mut codecs = Vec::with_capacity(section.fields.len());
    for field in &section.fields {
      let codec = match field.compression {
        CompressionKind::None => {
          let width = field.ty.byte_width();
          let slice = &record[field.offset as usize..field.offset as usize + width];
          FieldCompressor::None(NoneCompressor::new(slice, bw), width)
        }
        CompressionKind::RunLengthBytes32 => {
          let mut val = [0u8; 32];
          val.copy_from_slice(&record[field.offset as usize..field.offset as usize + 32]);
          FieldCompressor::Array32(ArrayCompressor::new(val, bw))
        }
        CompressionKind::RunLengthBytes256 => {
          let mut val = [0u8; 256];
          val.copy_from_slice(&record[field.offset as usize..field.offset as usize + 256]);
          FieldCompressor::Array256(ArrayCompressor::new(val, bw))
        }
        _ => {
          let width = gorilla_width(field)?;
          let val = read_scalar(record, field);
          FieldCompressor::Gorilla(GorillaCompressor::new(width, val, bw))
        }
      };
      codecs.push(codec);
    }
    Ok(StructCompressor {
      fields: section.fields.clone(),
      codecs,
    })
  }

  pub fn compress(&mut self, record: &[u8], bw: &mut BitBuffer) {
    for (field, codec) in self.fields.iter().zip(self.codecs.iter_mut()) {
      match codec {
        FieldCompressor::None(c, width) => {
          let slice = &record[field.offset as usize..field.offset as usize + *width];
          c.compress(slice, bw);
        }
        FieldCompressor::Gorilla(c) => {
          c.compress(read_scalar(record, field), bw);
        }
        FieldCompressor::Array32(c) => {
          let mut val = [0u8; 32];
          val.copy_from_slice(&record[field.offset as usize..field.offset as usize + 32]);
          c.compress(&val, bw);
        }
        FieldCompressor::Array256(c) => {
          let mut val = [0u8; 256];
          val.copy_from_slice(&record[field.offset as usize..field.offset as usize + 256]);
          c.compress(&val, bw);
        }
      }
    }
  }
}

pub struct StructDecompressor {
  fields: Vec<FieldSpec>,
  codecs: Vec<FieldDecompressor>,
  item_size: usize,
}

impl StructDecompressor {
  /// Builds decoders from a buffer's seed values and returns the first
  /// decoded record.
  pub fn new(section: &ItemSection, br: &mut BitReader) -> TickResult<(Self, Vec<u8>)> {
    let mut codecs = Vec::with_capacity(section.fields.len());
    let mut record = vec![0u8; section.item_size as usize];
    for field in &section.fields {
      let codec = match field.compression {
        CompressionKind::None => {
          let width = field.ty.byte_width();
          let (d, val) = NoneDecompressor::new(width, br)?;
          record[field.offset as usize..field.offset as usize + width].copy_from_slice(&val);
          FieldDecompressor::None(d, width)
        }
        CompressionKind::RunLengthBytes32 => {
          let (d, val) = ArrayDecompressor::<32>::new(br)?;
          record[field.offset as usize..field.offset as usize + 32].copy_from_slice(&val);
          FieldDecompressor::Array32(d)
        }
        CompressionKind::RunLengthBytes256 => {
          let (d, val) = ArrayDecompressor::<256>::new(br)?;
          record[field.offset as usize..field.offset as usize + 256].copy_from_slice(&val);
          FieldDecompressor::Array256(d)
        }
        _ => {
          let width = gorilla_width(field)?;
          let (d, val) = GorillaDecompressor::new(width, br)?;
          write_scalar(&mut record, field, val);
          FieldDecompressor::Gorilla(d)
        }
      };
      codecs.push(codec);
    }
    Ok((
      StructDecompressor {
        fields: section.fields.clone(),
        codecs,
        item_size: section.item_size as usize,
      },
      record,
    ))
  }

  /// Decodes the next record into a freshly allocated buffer.
  pub fn decompress(&mut self, br: &mut BitReader) -> TickResult<Vec<u8>> {
    let mut record = vec![0u8; self.item_size];
    for (field, codec) in self.fields.iter().zip(self.codecs.iter_mut()) {
      match codec {
        FieldDecompressor::None(d, width) => {
          let val = d.decompress(br)?;
          record[field.offset as usize..field.offset as usize + *width].copy_from_slice(&val);
        }
        FieldDecompressor::Gorilla(d) => {
          let val = d.decompress(br)?;
          write_scalar(&mut record, field, val);
        }
        FieldDecompressor::Array32(d) => {
          let val = d.decompress(br)?;
          record[field.offset as usize..field.offset as usize + 32].copy_from_slice(&val);
        }
        FieldDecompressor::Array256(d) => {
          let val = d.decompress(br)?;
          record[field.offset as usize..field.offset as usize + 256].copy_from_slice(&val);
        }
      }
    }
    Ok(record)
  }

  /// Converts each decoder into its encoder counterpart, consuming `self`,
  /// so a writer that reopened for append can resume from exactly the
  /// state the last decoded record left behind.
  pub fn into_compressor(self) -> StructCompressor {
    let codecs = self
      .codecs
      .into_iter()
      .map(|c| match c {
        FieldDecompressor::None(d, width) => FieldCompressor::None(d.into_compressor(), width),
        FieldDecompressor::Gorilla(d) => FieldCompressor::Gorilla(d.into_compressor()),
        FieldDecompressor::Array32(d) => FieldCompressor::Array32(d.into_compressor()),
        FieldDecompressor::Array256(d) => FieldCompressor::Array256(d.into_compressor()),
      })
      .collect();
    StructCompressor {
      fields: self.fields,
      codecs,
    }
  }
}
