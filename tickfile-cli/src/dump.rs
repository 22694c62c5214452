//! `dump <path> [--limit N]`: opens a file for read and streams ticks to
//! stdout as CSV, one row per record in a run.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use tickfile::record_run::RecordRun;
use tickfile::schema::{FieldSpec, FieldType, ItemSection};
use tickfile::tickfile::TickFile;
use tickfile_io::StdFileHandle;

/// Stream a `.tck` file's records to stdout as CSV.
#[derive(Clone, Debug, Parser)]
pub struct DumpOpt {
  pub path: PathBuf,
  /// Stop after this many records (default: no limit).
  #[arg(long)]
  pub limit: Option<u64>,
}

pub fn dump(opt: DumpOpt) -> Result<()> {
  let header_handle = StdFileHandle::open_read(&opt.path)?;
  let header_file = TickFile::open_header(header_handle)?;
  let section = header_file.item_section().clone();

  print_csv_header(&section);

  let handle = StdFileHandle::open_read(&opt.path)?;
  let mut file = TickFile::open_read_dyn(handle, section.clone())?;
  let mut reader = file.get_tick_reader()?;

  let mut emitted = 0u64;
  'outer: while let Some((tick, run)) = reader.next()? {
    for i in 0..run.run_length() {
      if let Some(limit) = opt.limit {
        if emitted >= limit {
          break 'outer;
        }
      }
      print_csv_row(tick, &section, &run, i);
      emitted += 1;
    }
  }
  Ok(())
}

fn print_csv_header(section: &ItemSection) {
  let mut names: Vec<&str> = vec!["tick"];
  names.extend(section.fields.iter().map(|f| f.name.as_str()));
  println!("{}", names.join(","));
}

fn print_csv_row(tick: u64, section: &ItemSection, run: &RecordRun, index: usize) {
  let record = run.record(index);
  let mut cells = vec![tick.to_string()];
  for field in &section.fields {
    cells.push(format_field(field, record));
  }
  println!("{}", cells.join(","));
}

fn format_field(field: &FieldSpec, record: &[u8]) -> String {
  let start = field.offset as usize;
  let width = field.ty.byte_width();
  let bytes = &record[start..start + width];
  match field.ty {
    FieldType::I8 => (bytes[0] as i8).to_string(),
    FieldType::U8 => bytes[0].to_string(),
    FieldType::I16 => i16::from_ne_bytes(bytes.try_into().unwrap()).to_string(),
    FieldType::U16 => u16::from_ne_bytes(bytes.try_into().unwrap()).to_string(),
    FieldType::I32 => i32::from_ne_bytes(bytes.try_into().unwrap()).to_string(),
    FieldType::U32 => u32::from_ne_bytes(bytes.try_into().unwrap()).to_string(),
    FieldType::F32 => f32::from_ne_bytes(bytes.try_into().unwrap()).to_string(),
    FieldType::I64 => i64::from_ne_bytes(bytes.try_into().unwrap()).to_string(),
    FieldType::U64 => u64::from_ne_bytes(bytes.try_into().unwrap()).to_string(),
    FieldType::F64 => f64::from_ne_bytes(bytes.try_into().unwrap()).to_string(),
    FieldType::Array32 | FieldType::Array256 => format!("\"{}\"", hex_encode(bytes)),
  }
}

fn hex_encode(bytes: &[u8]) -> String {
  bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
