//! Record schema types: the field/type/compression description stored in a
//! file's item section and used to dispatch per-field codecs.
//!
//! Built by hand or generated at compile time by `#[derive(TickRecord)]`
//! (see the `tickfile-derive` crate).

use crate::errors::{TickError, TickResult};

/// The on-disk type of one record field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldType {
  I8 = 1,
  I16 = 2,
  I32 = 3,
  I64 = 4,
  U8 = 5,
  U16 = 6,
  U32 = 7,
  U64 = 8,
  F32 = 9,
  F64 = 10,
  Array32 = 11,
  Array256 = 12,
}

impl FieldType {
  pub fn from_u8(tag: u8) -> TickResult<Self> {
    Ok(match tag {
      1 => FieldType::I8,
      2 => FieldType::I16,
      3 => FieldType::I32,
      4 => FieldType::I64,
      5 => FieldType::U8,
      6 => FieldType::U16,
      7 => FieldType::U32,
      8 => FieldType::U64,
      9 => FieldType::F32,
      10 => FieldType::F64,
      11 => FieldType::Array32,
      12 => FieldType::Array256,
      other => {
        return Err(TickError::corruption(format!(
          "unknown field type tag: {}",
          other
        )))
      }
    })
  }

  /// Width of this field in bytes, within the record blob.
  pub fn byte_width(self) -> usize {
    match self {
      FieldType::I8 | FieldType::U8 => 1,
      FieldType::I16 | FieldType::U16 => 2,
      FieldType::I32 | FieldType::U32 | FieldType::F32 => 4,
      FieldType::I64 | FieldType::U64 | FieldType::F64 => 8,
      FieldType::Array32 => 32,
      FieldType::Array256 => 256,
    }
  }

  /// The compression kind this type's natural Gorilla width maps to, or
  /// `None` for array types (which only support run-length compression or
  /// no compression at all).
  pub fn default_compression(self) -> CompressionKind {
    match self {
      FieldType::I8 | FieldType::U8 => CompressionKind::Gorilla8,
      FieldType::I16 | FieldType::U16 => CompressionKind::Gorilla16,
      FieldType::I32 | FieldType::U32 | FieldType::F32 => CompressionKind::Gorilla32,
      FieldType::I64 | FieldType::U64 | FieldType::F64 => CompressionKind::Gorilla64,
      FieldType::Array32 => CompressionKind::RunLengthBytes32,
      FieldType::Array256 => CompressionKind::RunLengthBytes256,
    }
  }
}

/// The codec used for one field's values across the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionKind {
  None = 0,
  Gorilla8 = 1,
  Gorilla16 = 2,
  Gorilla32 = 3,
  Gorilla64 = 4,
  RunLengthBytes32 = 5,
  RunLengthBytes256 = 6,
}

impl CompressionKind {
  pub fn from_u8(tag: u8) -> TickResult<Self> {
    Ok(match tag {
      0 => CompressionKind::None,
      1 => CompressionKind::Gorilla8,
      2 => CompressionKind::Gorilla16,
      3 => CompressionKind::Gorilla32,
      4 => CompressionKind::Gorilla64,
      5 => CompressionKind::RunLengthBytes32,
      6 => CompressionKind::RunLengthBytes256,
      other => {
        return Err(TickError::corruption(format!(
          "unknown compression kind tag: {}",
          other
        )))
      }
    })
  }
}

/// One field in a record's layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
  pub index: u32,
  pub ty: FieldType,
  pub offset: u32,
  pub name: String,
  pub compression: CompressionKind,
}

/// The schema stored in a file's item section: record size, type name, and
/// ordered field list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemSection {
  pub item_size: u32,
  pub type_name: String,
  pub fields: Vec<FieldSpec>,
}

impl ItemSection {
  pub fn field_count(&self) -> u32 {
    self.fields.len() as u32
  }

  /// Checks that `self` describes the same layout as `other`: same field
  /// count, types, offsets, and compression choices, in order. Field
  /// *names* are allowed to differ — only the numeric layout is checked
  /// on reopen.
  pub fn layout_matches(&self, other: &ItemSection) -> bool {
    self.item_size == other.item_size
      && self.fields.len() == other.fields.len()
      && self
        .fields
        .iter()
        .zip(other.fields.iter())
        .all(|(a, b)| a.ty == b.ty && a.offset == b.offset && a.compression == b.compression)
  }

  pub fn validate(&self) -> TickResult<()> {
    if self.fields.len() as u32 != self.field_count() {
      return Err(TickError::schema_mismatch(
        "field count does not match fields length",
      ));
    }
    let mut last_end = 0u32;
    for field in &self.fields {
      if field.offset < last_end {
        return Err(TickError::schema_mismatch(format!(
          "field '{}' offset {} overlaps previous field ending at {}",
          field.name, field.offset, last_end
        )));
      }
      last_end = field.offset + field.ty.byte_width() as u32;
    }
    if last_end > self.item_size {
      return Err(TickError::schema_mismatch(format!(
        "fields span {} bytes but item_size is {}",
        last_end, self.item_size
      )));
    }
    Ok(())
  }
}

/// Implemented by any Rust type that can describe itself as an
/// [`ItemSection`], generally via `#[derive(TickRecord)]` from the
/// `tickfile-derive` crate.
pub trait TickRecord: Sized {
  fn item_section() -> ItemSection;
}
