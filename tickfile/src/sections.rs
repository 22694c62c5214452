//! Header and section (de)serialization: the self-describing metadata that
//! precedes the bit-packed tick stream in every file.
//!
//! Integers are written in host-native byte order, so files are not
//! portable across machines of differing endianness; strings and byte
//! blobs are simple length-prefixed blocks.

use std::collections::HashMap;
use std::io::{Read, Write};

use crate::constants::{
  CONTENT_DESCRIPTION_SECTION_ID, ITEM_SECTION_ID, ITEM_START_ALIGNMENT, MAGIC, MAGIC_V1,
  NAME_VALUE_KIND_BYTES, NAME_VALUE_KIND_F64, NAME_VALUE_KIND_I32, NAME_VALUE_KIND_TEXT,
  NAME_VALUE_KIND_U64, NAME_VALUE_KIND_UUID, NAME_VALUE_SECTION_ID, TAGS_SECTION_ID,
};
use crate::errors::{TickError, TickResult};
use crate::schema::{CompressionKind, FieldSpec, FieldType, ItemSection};

fn write_bytes_field<W: Write>(w: &mut W, bytes: &[u8]) -> TickResult<()> {
  w.write_all(&(bytes.len() as i32).to_ne_bytes())?;
  w.write_all(bytes)?;
  Ok(())
}

fn read_bytes_field<R: Read>(r: &mut R) -> TickResult<Vec<u8>> {
  let mut len_buf = [0u8; 4];
  r.read_exact(&mut len_buf)?;
  let len = i32::from_ne_bytes(len_buf);
  if len < 0 {
    return Err(TickError::corruption("negative length-prefixed field"));
  }
  let mut buf = vec![0u8; len as usize];
  r.read_exact(&mut buf)?;
  Ok(buf)
}

fn write_text<W: Write>(w: &mut W, text: &str) -> TickResult<()> {
  write_bytes_field(w, text.as_bytes())
}

fn read_text<R: Read>(r: &mut R) -> TickResult<String> {
  let bytes = read_bytes_field(r)?;
  String::from_utf8(bytes).map_err(|e| TickError::corruption(format!("invalid utf-8: {}", e)))
}

fn text_size(text: &str) -> i64 {
  4 + text.len() as i64
}

/// The fixed-size leading part of the file: magic value, file offset the
/// bit stream begins at, and how many sections follow.
#[derive(Clone, Copy, Debug)]
pub struct Header {
  pub magic: i64,
  pub item_start: i64,
  pub section_count: i64,
}

impl Header {
  pub const SIZE: usize = 24;

  pub fn read<R: Read>(r: &mut R) -> TickResult<Self> {
    let mut magic_buf = [0u8; 8];
    r.read_exact(&mut magic_buf)?;
    let magic = i64::from_ne_bytes(magic_buf);
    if magic == MAGIC_V1 {
      return Err(TickError::v1_file());
    }
    if magic != MAGIC {
      return Err(TickError::magic_mismatch(format!(
        "expected magic {:#x}, found {:#x}",
        MAGIC, magic
      )));
    }
    let mut item_start_buf = [0u8; 8];
    r.read_exact(&mut item_start_buf)?;
    let mut section_count_buf = [0u8; 8];
    r.read_exact(&mut section_count_buf)?;
    Ok(Header {
      magic,
      item_start: i64::from_ne_bytes(item_start_buf),
      section_count: i64::from_ne_bytes(section_count_buf),
    })
  }

  pub fn write<W: Write>(&self, w: &mut W) -> TickResult<()> {
    w.write_all(&self.magic.to_ne_bytes())?;
    w.write_all(&self.item_start.to_ne_bytes())?;
    w.write_all(&self.section_count.to_ne_bytes())?;
    Ok(())
  }

  /// Rounds `raw_end` up to the next multiple of [`ITEM_START_ALIGNMENT`].
  pub fn align(raw_end: i64) -> i64 {
    let rem = raw_end % ITEM_START_ALIGNMENT;
    if rem == 0 {
      raw_end
    } else {
      raw_end + (ITEM_START_ALIGNMENT - rem)
    }
  }
}

/// A section table entry: id plus payload byte length, read before the
/// section body so a reader can skip sections it doesn't recognize.
struct SectionEntry {
  id: i32,
  size: i32,
}

impl SectionEntry {
  fn write<W: Write>(&self, w: &mut W) -> TickResult<()> {
    w.write_all(&self.id.to_ne_bytes())?;
    w.write_all(&self.size.to_ne_bytes())?;
    Ok(())
  }

  fn read<R: Read>(r: &mut R) -> TickResult<Self> {
    let mut id_buf = [0u8; 4];
    r.read_exact(&mut id_buf)?;
    let mut size_buf = [0u8; 4];
    r.read_exact(&mut size_buf)?;
    Ok(SectionEntry {
      id: i32::from_ne_bytes(id_buf),
      size: i32::from_ne_bytes(size_buf),
    })
  }
}

pub fn write_item_section<W: Write>(w: &mut W, section: &ItemSection) -> TickResult<()> {
  w.write_all(&section.item_size.to_ne_bytes())?;
  write_text(w, &section.type_name)?;
  w.write_all(&section.field_count().to_ne_bytes())?;
  for field in &section.fields {
    w.write_all(&[field.ty as u8])?;
    w.write_all(&field.offset.to_ne_bytes())?;
    write_text(w, &field.name)?;
    w.write_all(&[field.compression as u8])?;
  }
  Ok(())
}

pub fn read_item_section<R: Read>(r: &mut R) -> TickResult<ItemSection> {
  let mut item_size_buf = [0u8; 4];
  r.read_exact(&mut item_size_buf)?;
  let item_size = u32::from_ne_bytes(item_size_buf);
  let type_name = read_text(r)?;
  let mut field_count_buf = [0u8; 4];
  r.read_exact(&mut field_count_buf)?;
  let field_count = u32::from_ne_bytes(field_count_buf);

  let mut fields = Vec::with_capacity(field_count as usize);
  for index in 0..field_count {
    let mut ty_buf = [0u8; 1];
    r.read_exact(&mut ty_buf)?;
    let ty = FieldType::from_u8(ty_buf[0])?;
    let mut offset_buf = [0u8; 4];
    r.read_exact(&mut offset_buf)?;
    let offset = u32::from_ne_bytes(offset_buf);
    let name = read_text(r)?;
    let mut compression_buf = [0u8; 1];
    r.read_exact(&mut compression_buf)?;
    let compression = CompressionKind::from_u8(compression_buf[0])?;
    fields.push(FieldSpec {
      index,
      ty,
      offset,
      name,
      compression,
    });
  }

  let section = ItemSection {
    item_size,
    type_name,
    fields,
  };
  section.validate()?;
  Ok(section)
}

pub fn item_section_size(section: &ItemSection) -> i64 {
  let mut size = 4 + text_size(&section.type_name) + 4;
  for field in &section.fields {
    size += 1 + 1 + 4 + text_size(&field.name);
  }
  size
}

/// A name-value pair's value, covering the wire kinds the format supports.
#[derive(Clone, Debug, PartialEq)]
pub enum NameValue {
  I32(i32),
  U64(u64),
  F64(f64),
  Bytes(Vec<u8>),
  Text(String),
  Uuid([u8; 16]),
}

fn name_value_kind(val: &NameValue) -> i32 {
  match val {
    NameValue::I32(_) => NAME_VALUE_KIND_I32,
    NameValue::U64(_) => NAME_VALUE_KIND_U64,
    NameValue::F64(_) => NAME_VALUE_KIND_F64,
    NameValue::Bytes(_) => NAME_VALUE_KIND_BYTES,
    NameValue::Text(_) => NAME_VALUE_KIND_TEXT,
    NameValue::Uuid(_) => NAME_VALUE_KIND_UUID,
  }
}

fn name_value_size(val: &NameValue) -> i64 {
  4 + match val {
    NameValue::I32(_) => 4,
    NameValue::U64(_) => 8,
    NameValue::F64(_) => 8,
    NameValue::Bytes(b) => 4 + b.len() as i64,
    NameValue::Text(s) => text_size(s),
    NameValue::Uuid(_) => 16,
  }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NameValueSection {
  pub name_values: HashMap<String, NameValue>,
}

impl NameValueSection {
  pub fn write<W: Write>(&self, w: &mut W) -> TickResult<()> {
    w.write_all(&(self.name_values.len() as i32).to_ne_bytes())?;
    for (name, val) in &self.name_values {
      write_text(w, name)?;
      w.write_all(&name_value_kind(val).to_ne_bytes())?;
      match val {
        NameValue::I32(v) => w.write_all(&v.to_ne_bytes())?,
        NameValue::U64(v) => w.write_all(&v.to_ne_bytes())?,
        NameValue::F64(v) => w.write_all(&v.to_ne_bytes())?,
        NameValue::Bytes(b) => write_bytes_field(w, b)?,
        NameValue::Text(s) => write_text(w, s)?,
        NameValue::Uuid(u) => w.write_all(u)?,
      }
    }
    Ok(())
  }

  pub fn read<R: Read>(r: &mut R) -> TickResult<Self> {
    let mut count_buf = [0u8; 4];
    r.read_exact(&mut count_buf)?;
    let count = i32::from_ne_bytes(count_buf);
    let mut name_values = HashMap::with_capacity(count.max(0) as usize);
    for _ in 0..count {
      let name = read_text(r)?;
      let mut kind_buf = [0u8; 4];
      r.read_exact(&mut kind_buf)?;
      let kind = i32::from_ne_bytes(kind_buf);
      let val = match kind {
        k if k == NAME_VALUE_KIND_I32 => {
          let mut buf = [0u8; 4];
          r.read_exact(&mut buf)?;
          NameValue::I32(i32::from_ne_bytes(buf))
        }
        k if k == NAME_VALUE_KIND_U64 => {
          let mut buf = [0u8; 8];
          r.read_exact(&mut buf)?;
          NameValue::U64(u64::from_ne_bytes(buf))
        }
        k if k == NAME_VALUE_KIND_F64 => {
          let mut buf = [0u8; 8];
          r.read_exact(&mut buf)?;
          NameValue::F64(f64::from_ne_bytes(buf))
        }
        k if k == NAME_VALUE_KIND_BYTES => NameValue::Bytes(read_bytes_field(r)?),
        k if k == NAME_VALUE_KIND_TEXT => NameValue::Text(read_text(r)?),
        k if k == NAME_VALUE_KIND_UUID => {
          let mut buf = [0u8; 16];
          r.read_exact(&mut buf)?;
          NameValue::Uuid(buf)
        }
        other => {
          return Err(TickError::corruption(format!(
            "unknown name-value kind {}",
            other
          )))
        }
      };
      name_values.insert(name, val);
    }
    Ok(NameValueSection { name_values })
  }

  pub fn size(&self) -> i64 {
    4 + self
      .name_values
      .iter()
      .map(|(name, val)| text_size(name) + name_value_size(val))
      .sum::<i64>()
  }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TagsSection {
  pub tags: HashMap<String, String>,
}

impl TagsSection {
  pub fn write<W: Write>(&self, w: &mut W) -> TickResult<()> {
    w.write_all(&(self.tags.len() as i32).to_ne_bytes())?;
    for (key, val) in &self.tags {
      write_text(w, key)?;
      write_text(w, val)?;
    }
    Ok(())
  }

  pub fn read<R: Read>(r: &mut R) -> TickResult<Self> {
    let mut count_buf = [0u8; 4];
    r.read_exact(&mut count_buf)?;
    let count = i32::from_ne_bytes(count_buf);
    let mut tags = HashMap::with_capacity(count.max(0) as usize);
    for _ in 0..count {
      let key = read_text(r)?;
      let val = read_text(r)?;
      tags.insert(key, val);
    }
    Ok(TagsSection { tags })
  }

  pub fn size(&self) -> i64 {
    4 + self
      .tags
      .iter()
      .map(|(k, v)| text_size(k) + text_size(v))
      .sum::<i64>()
  }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentDescriptionSection {
  pub content_description: String,
}

impl ContentDescriptionSection {
  pub fn write<W: Write>(&self, w: &mut W) -> TickResult<()> {
    write_text(w, &self.content_description)
  }

  pub fn read<R: Read>(r: &mut R) -> TickResult<Self> {
    Ok(ContentDescriptionSection {
      content_description: read_text(r)?,
    })
  }

  pub fn size(&self) -> i64 {
    text_size(&self.content_description)
  }
}

/// Every optional section a file may carry, keyed by section id.
#[derive(Clone, Debug, Default)]
pub struct Sections {
  pub item: Option<ItemSection>,
  pub content_description: Option<ContentDescriptionSection>,
  pub name_values: Option<NameValueSection>,
  pub tags: Option<TagsSection>,
}

impl Sections {
  /// Writes each present section as `{ id, size, body }`, back to back, in
  /// a fixed order.
  pub fn write<W: Write>(&self, w: &mut W) -> TickResult<()> {
    if let Some(item) = &self.item {
      SectionEntry {
        id: ITEM_SECTION_ID,
        size: item_section_size(item) as i32,
      }
      .write(w)?;
      write_item_section(w, item)?;
    }
    if let Some(cd) = &self.content_description {
      SectionEntry {
        id: CONTENT_DESCRIPTION_SECTION_ID,
        size: cd.size() as i32,
      }
      .write(w)?;
      cd.write(w)?;
    }
    if let Some(nv) = &self.name_values {
      SectionEntry {
        id: NAME_VALUE_SECTION_ID,
        size: nv.size() as i32,
      }
      .write(w)?;
      nv.write(w)?;
    }
    if let Some(tags) = &self.tags {
      SectionEntry {
        id: TAGS_SECTION_ID,
        size: tags.size() as i32,
      }
      .write(w)?;
      tags.write(w)?;
    }
    Ok(())
  }

  pub fn section_count(&self) -> i64 {
    [
      self.item.is_some(),
      self.content_description.is_some(),
      self.name_values.is_some(),
      self.tags.is_some(),
    ]
    .iter()
    .filter(|present| **present)
    .count() as i64
  }

  pub fn read<R: Read>(r: &mut R, section_count: i64) -> TickResult<Self> {
    let mut sections = Sections::default();
    for _ in 0..section_count {
      let entry = SectionEntry::read(r)?;
      match entry.id {
        id if id == ITEM_SECTION_ID => sections.item = Some(read_item_section(r)?),
        id if id == CONTENT_DESCRIPTION_SECTION_ID => {
          sections.content_description = Some(ContentDescriptionSection::read(r)?)
        }
        id if id == NAME_VALUE_SECTION_ID => sections.name_values = Some(NameValueSection::read(r)?),
        id if id == TAGS_SECTION_ID => sections.tags = Some(TagsSection::read(r)?),
        other => {
          return Err(TickError::corruption(format!(
            "unknown section id {}",
            other
          )))
        }
      }
    }
    Ok(sections)
  }
}
