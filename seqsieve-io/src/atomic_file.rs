use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::errors::IoError;
use crate::filestack::FileStack;

/// A filesystem-locked integer supporting `fetch_add` and a polling barrier.
///
/// The value lives on a [`FileStack`] whose only stored line is the current count, so
/// any worker process sharing the working directory can take the next work item or
/// report completion. `await_value` spins with one-second sleeps until the counter
/// reaches the requested value; a dead worker wedges the barrier by design, the user
/// restarts the job.
pub struct AtomicFile {
    stack: FileStack,
}

impl AtomicFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<AtomicFile, IoError> {
        Ok(AtomicFile {
            stack: FileStack::new(path)?,
        })
    }

    /// Adds `n` to the counter and returns the previous value.
    pub fn fetch_add(&mut self, n: i64) -> Result<i64, IoError> {
        self.stack.with_lock(|stack| {
            let current = stack.pop_locked::<i64>()?.unwrap_or(0);
            stack.push_locked(&(current + n).to_string())?;
            Ok(current)
        })
    }

    /// Current value of the counter.
    pub fn get(&mut self) -> Result<i64, IoError> {
        Ok(self.stack.top::<i64>()?.unwrap_or(0))
    }

    /// Blocks until the counter reaches at least `n`.
    pub fn await_value(&mut self, n: i64) -> Result<(), IoError> {
        loop {
            if self.get()? >= n {
                return Ok(());
            }
            thread::sleep(Duration::from_secs(1));
        }
    }
}
