//! `create --schema-demo <kind> <path>`: writes a small synthetic `.tck`
//! file, for manual smoke testing without a second program to produce one.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::info;

use tickfile::config::TickFileConfig;
use tickfile::schema::TickRecord;
use tickfile::tickfile::TickFile;
use tickfile_derive::TickRecord;
use tickfile_io::StdFileHandle;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SchemaDemoKind {
  /// A single `u64` field, Gorilla64-compressed.
  Scalar,
  /// A price/quantity/venue record mixing Gorilla64, Gorilla32, and a
  /// run-length-compressed fixed byte array.
  Trade,
}

/// Write a small synthetic `.tck` file for manual testing.
#[derive(Clone, Debug, Parser)]
pub struct CreateOpt {
  #[arg(long = "schema-demo", value_enum)]
  pub schema_demo: SchemaDemoKind,
  pub path: PathBuf,
  /// Number of synthetic records to write.
  #[arg(long, default_value_t = 100)]
  pub count: u64,
}

pub fn create(opt: CreateOpt) -> Result<()> {
  let handle = StdFileHandle::create(&opt.path)?;
  match opt.schema_demo {
    SchemaDemoKind::Scalar => write_scalar_demo(handle, opt.count)?,
    SchemaDemoKind::Trade => write_trade_demo(handle, opt.count)?,
  }
  info!("wrote {} demo records to {}", opt.count, opt.path.display());
  Ok(())
}

#[derive(TickRecord, Clone, Copy)]
#[repr(C)]
struct ScalarDemo {
  value: u64,
}

fn write_scalar_demo(handle: StdFileHandle, count: u64) -> Result<()> {
  let config = TickFileConfig::new()
    .with_item_section(ScalarDemo::item_section())
    .with_content_description("tickfile-cli schema-demo scalar file");
  let mut file = TickFile::create::<ScalarDemo>(handle, config)?;
  for tick in 0..count {
    let record = ScalarDemo { value: tick * tick };
    file.write(tick, bytes_of(&record))?;
  }
  file.close()?;
  Ok(())
}

#[derive(TickRecord, Clone, Copy)]
#[repr(C)]
struct TradeDemo {
  price: u64,
  qty: u32,
  #[tick(compression = "run_length")]
  venue: [u8; 32],
}

fn write_trade_demo(handle: StdFileHandle, count: u64) -> Result<()> {
  let config = TickFileConfig::new()
    .with_item_section(TradeDemo::item_section())
    .with_content_description("tickfile-cli schema-demo trade file");
  let mut file = TickFile::create::<TradeDemo>(handle, config)?;
  for tick in 0..count {
    let mut venue = [0u8; 32];
    venue[0] = b'A' + (tick % 4) as u8;
    let record = TradeDemo {
      price: 1_000_000 + tick,
      qty: 100 + (tick % 7) as u32,
      venue,
    };
    file.write(tick, bytes_of(&record))?;
  }
  file.close()?;
  Ok(())
}

/// Views a `#[repr(C)]`, `Copy` demo record as its raw on-disk bytes. Safe
/// because every field type these demo structs use is itself plain data
/// with no padding-sensitive invariants, and `item_size` from the same
/// derive already equals `size_of::<T>()`.
fn bytes_of<T: Copy>(record: &T) -> &[u8] {
  unsafe { std::slice::from_raw_parts(record as *const T as *const u8, std::mem::size_of::<T>()) }
}
