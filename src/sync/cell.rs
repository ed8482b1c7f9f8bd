use crate::core::errors::{HandoffError, Result};
use crate::sync::wait::{block_until, WaitOptions};
use parking_lot::{Condvar, Mutex};

/// Single-assignment cell: written once, read any number of times.
///
/// Reads before the write block. If the writer never writes, [`get`](Self::get)
/// blocks forever; use [`get_with`](Self::get_with) with a timeout or cancel
/// token when the producer may die.
#[derive(Debug)]
pub struct ResultCell<T> {
    slot: &'static str,
    value: Mutex<Option<T>>,
    cv: Condvar,
}

impl<T> Default for ResultCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResultCell<T> {
    pub fn new() -> Self {
        Self::named("cell")
    }

    /// Create a cell whose errors name it `slot`
    pub fn named(slot: &'static str) -> Self {
        Self {
            slot,
            value: Mutex::new(None),
            cv: Condvar::new(),
        }
    }

    pub fn slot(&self) -> &'static str {
        self.slot
    }

    /// Store the value and release all readers.
    /// A second write fails and keeps the first value.
    pub fn set(&self, value: T) -> Result<()> {
        {
            let mut guard = self.value.lock();
            if guard.is_some() {
                return Err(HandoffError::double_write(self.slot));
            }
            *guard = Some(value);
        }
        self.cv.notify_all();
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.value.lock().is_some()
    }
}

impl<T: Clone> ResultCell<T> {
    /// Block until the value is set and return a clone of it
    pub fn get(&self) -> T {
        let mut guard = self.value.lock();
        loop {
            if let Some(value) = guard.as_ref() {
                return value.clone();
            }
            self.cv.wait(&mut guard);
        }
    }

    pub fn get_with(&self, opts: &WaitOptions) -> Result<T> {
        let mut guard = self.value.lock();
        block_until(&self.cv, &mut guard, opts, self.slot, |value| value.is_some())?;
        guard
            .as_ref()
            .cloned()
            .ok_or_else(|| HandoffError::internal(format!("{} emptied while locked", self.slot)))
    }

    pub fn try_get(&self) -> Option<T> {
        self.value.lock().clone()
    }
}
