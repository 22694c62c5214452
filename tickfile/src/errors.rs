use std::error::Error;
use std::fmt::{Display, Formatter};
use std::{fmt, io};

/// The different kinds of errors the library can return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
  /// The schema the caller supplied disagrees with the item section stored
  /// in the file (field count, field types, or field offsets).
  SchemaMismatch,
  /// `write` was called with a tick lower than the last tick written.
  TickOutOfOrder,
  /// `write` or `flush` was called on a file opened for reading.
  ReadOnly,
  /// A codec requested bits past the end of the buffer without first
  /// observing the tick codec's EOF marker.
  UnexpectedEof,
  /// Open-for-append/open-for-read could not locate the `11111` EOF
  /// marker in the last two bytes of the block.
  MissingEofMarker,
  /// The header's magic value did not match the v2 magic (and wasn't the
  /// v1 magic either).
  MagicMismatch,
  /// The header's magic value matched the legacy v1 format.
  V1File,
  /// `next_timeout` expired before new data or a close signal arrived.
  ReadTimeout,
  /// `next_timeout` was called on a reader whose writer has closed.
  StreamClosed,
  /// The block or header bytes are structurally invalid in some other way.
  Corruption,
  /// A caller supplied invalid arguments.
  InvalidArgument,
  /// Propagated from the underlying `FileHandle`.
  Io(io::ErrorKind),
}

/// The error type used in results for all `tickfile` functionality.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickError {
  pub kind: ErrorKind,
  pub message: String,
}

impl TickError {
  pub(crate) fn new<S: AsRef<str>>(kind: ErrorKind, message: S) -> Self {
    TickError {
      kind,
      message: message.as_ref().to_string(),
    }
  }

  pub(crate) fn schema_mismatch<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::SchemaMismatch, message)
  }

  pub(crate) fn tick_out_of_order(tick: u64, last_tick: u64) -> Self {
    Self::new(
      ErrorKind::TickOutOfOrder,
      format!("tick {} is before last written tick {}", tick, last_tick),
    )
  }

  pub(crate) fn read_only<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::ReadOnly, message)
  }

  pub(crate) fn unexpected_eof<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::UnexpectedEof, message)
  }

  pub(crate) fn missing_eof_marker<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::MissingEofMarker, message)
  }

  pub(crate) fn magic_mismatch<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::MagicMismatch, message)
  }

  pub(crate) fn v1_file() -> Self {
    Self::new(
      ErrorKind::V1File,
      "file uses the legacy v1 magic value; use an external migration tool",
    )
  }

  pub(crate) fn read_timeout() -> Self {
    Self::new(ErrorKind::ReadTimeout, "timed out waiting for new data")
  }

  pub(crate) fn stream_closed() -> Self {
    Self::new(
      ErrorKind::StreamClosed,
      "writer has closed and no more data will arrive",
    )
  }

  pub(crate) fn corruption<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::Corruption, message)
  }

  pub(crate) fn invalid_argument<S: AsRef<str>>(message: S) -> Self {
    Self::new(ErrorKind::InvalidArgument, message)
  }

  /// True for errors that only reflect "no more data is available right now",
  /// as opposed to a structural corruption of the block.
  pub fn is_clean_eof(&self) -> bool {
    matches!(self.kind, ErrorKind::ReadTimeout | ErrorKind::StreamClosed)
  }
}

impl Display for TickError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "tickfile {:?} error: {}", self.kind, &self.message)
  }
}

impl From<io::Error> for TickError {
  fn from(err: io::Error) -> Self {
    TickError {
      kind: ErrorKind::Io(err.kind()),
      message: format!("{}", err),
    }
  }
}

impl Error for TickError {}

pub type TickResult<T> = Result<T, TickError>;
