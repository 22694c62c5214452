//! Filesystem abstraction layer for `tickfile`.

mod file_handle;

pub use file_handle::{FileHandle, StdFileHandle};
pub use memmap2::Mmap;
