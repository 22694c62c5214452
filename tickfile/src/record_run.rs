//! Owned handle to one or more consecutive records sharing the same tick.
//!
//! A raw pointer into a growable arena would be unsound here: the arena can
//! reallocate between the pointer being handed out and read. `RecordRun`
//! sidesteps the validity question by owning its bytes outright, so there
//! is no arena growth for a live reference to outlive.

use std::ops::Deref;

/// One or more records of the same `item_size`, all sharing a single tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordRun {
  data: Vec<u8>,
  item_size: usize,
}

impl RecordRun {
  pub fn new(item_size: usize) -> Self {
    RecordRun {
      data: Vec::with_capacity(item_size),
      item_size,
    }
  }

  pub(crate) fn push(&mut self, record: &[u8]) {
    debug_assert_eq!(record.len(), self.item_size);
    self.data.extend_from_slice(record);
  }

  pub fn run_length(&self) -> usize {
    if self.item_size == 0 {
      0
    } else {
      self.data.len() / self.item_size
    }
  }

  pub fn record(&self, i: usize) -> &[u8] {
    &self.data[i * self.item_size..(i + 1) * self.item_size]
  }

  pub fn item_size(&self) -> usize {
    self.item_size
  }
}

impl Deref for RecordRun {
  type Target = [u8];

  fn deref(&self) -> &[u8] {
    &self.data
  }
}
