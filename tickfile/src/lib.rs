#![doc = include_str!("../README.md")]
//! # API notes
//!
//! * `tickfile` never touches `std::fs` directly — every entry point that
//!   opens a file is generic over [`tickfile_io::FileHandle`].
//! * Record layout is described by a [`schema::ItemSection`], usually
//!   produced by `#[derive(TickRecord)]` from the `tickfile-derive` crate
//!   rather than built by hand.
//! * All multi-byte integers on disk are host-native endian; files are not
//!   portable across machines of differing endianness.

#![deny(clippy::unused_unit)]
#![deny(dead_code)]

#[doc = include_str!("../README.md")]
#[cfg(doctest)]
struct ReadmeDoctest;

pub use errors::{ErrorKind, TickError, TickResult};
pub use schema::TickRecord;
pub use tickfile::TickFile;

pub mod array_codec;
pub mod bit_buffer;
pub mod bit_reader;
pub mod chunk;
pub mod config;
pub mod constants;
pub mod errors;
pub mod none_codec;
pub mod record_run;
pub mod schema;
pub mod sections;
pub mod signal;
pub mod stream_reader;
pub mod stream_writer;
pub mod tickfile;
pub mod value_codec;

mod bits;
mod struct_codec;
mod tick_codec;

#[cfg(test)]
mod tests;
