//! The "new data is available" wakeup a writer posts to and a blocked
//! reader waits on, built from a `std::sync::Condvar` plus a generation
//! counter so a publish that races a waiter's subscribe is never missed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Inner {
  generation: Mutex<u64>,
  condvar: Condvar,
  closed: AtomicBool,
}

/// Cloneable handle shared between a `TickFile`'s writer and every reader
/// it hands out.
#[derive(Clone, Default)]
pub struct PublishSignal {
  inner: Arc<Inner>,
}

impl PublishSignal {
  pub fn new() -> Self {
    PublishSignal::default()
  }

  /// Called by the writer after `write`/`flush` publishes new bytes.
  pub fn publish(&self) {
    let mut generation = self.inner.generation.lock().unwrap();
    *generation += 1;
    self.inner.condvar.notify_all();
  }

  /// Called once the writer is done and will never publish again.
  pub fn close(&self) {
    self.inner.closed.store(true, Ordering::SeqCst);
    let _generation = self.inner.generation.lock().unwrap();
    self.inner.condvar.notify_all();
  }

  pub fn is_closed(&self) -> bool {
    self.inner.closed.load(Ordering::SeqCst)
  }

  /// Blocks until either a new generation is published or `timeout`
  /// elapses. Returns `true` if woken by a publish/close, `false` on
  /// timeout.
  pub fn wait(&self, timeout: Duration) -> bool {
    let generation = self.inner.generation.lock().unwrap();
    let start = *generation;
    let (guard, result) = self
      .inner
      .condvar
      .wait_timeout_while(generation, timeout, |g| {
        *g == start && !self.inner.closed.load(Ordering::SeqCst)
      })
      .unwrap();
    drop(guard);
    !result.timed_out()
  }
}
