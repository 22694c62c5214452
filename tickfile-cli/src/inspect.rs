//! `inspect <path>`: prints the header, item section (field table), and any
//! name-value/tags/content-description sections this ecosystem's
//! inspection tools use a tabular layout for.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use tickfile::sections::NameValue;
use tickfile::tickfile::TickFile;
use tickfile_io::StdFileHandle;

/// Print metadata about a `.tck` file: schema, tags, and name-values.
#[derive(Clone, Debug, Parser)]
pub struct InspectOpt {
  pub path: PathBuf,
}

#[derive(Tabled)]
struct FieldRow {
  index: u32,
  name: String,
  #[tabled(rename = "type")]
  ty: String,
  offset: u32,
  compression: String,
}

pub fn inspect(opt: InspectOpt) -> Result<()> {
  let handle = StdFileHandle::open_read(&opt.path)?;
  let file = TickFile::open_header(handle)?;

  let section = file.item_section();
  println!("type: {}", section.type_name);
  println!("item_size: {} bytes", section.item_size);
  if let Some(description) = file.content_description() {
    println!("content_description: {}", description);
  }

  let rows: Vec<FieldRow> = section
    .fields
    .iter()
    .map(|field| FieldRow {
      index: field.index,
      name: field.name.clone(),
      ty: format!("{:?}", field.ty),
      offset: field.offset,
      compression: format!("{:?}", field.compression),
    })
    .collect();
  println!("{}", Table::new(rows).with(Style::rounded()));

  if let Some(tags) = file.tags() {
    if !tags.tags.is_empty() {
      println!("\ntags:");
      let mut keys: Vec<_> = tags.tags.keys().collect();
      keys.sort();
      for key in keys {
        println!("  {} = {}", key, tags.tags[key]);
      }
    }
  }

  if let Some(name_values) = file.name_values() {
    if !name_values.name_values.is_empty() {
      println!("\nname-values:");
      let mut keys: Vec<_> = name_values.name_values.keys().collect();
      keys.sort();
      for key in keys {
        println!("  {} = {}", key, display_name_value(&name_values.name_values[key]));
      }
    }
  }

  Ok(())
}

fn display_name_value(val: &NameValue) -> String {
  match val {
    NameValue::I32(v) => v.to_string(),
    NameValue::U64(v) => v.to_string(),
    NameValue::F64(v) => v.to_string(),
    NameValue::Bytes(b) => format!("<{} bytes>", b.len()),
    NameValue::Text(s) => s.clone(),
    NameValue::Uuid(u) => u.iter().map(|b| format!("{:02x}", b)).collect::<String>(),
  }
}
