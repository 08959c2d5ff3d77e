//! A level-triggered, one-shot flag shared between the worker thread and
//! the facade. The standard-library analogue of Python's `threading.Event`
//! used throughout `worker_thread.py`.

use std::sync::{Condvar, Mutex, PoisonError};

/// A level-triggered, one-shot flag.
#[derive(Default)]
pub struct Event {
    flag: Mutex<bool>,
    condvar: Condvar,
}

impl Event {
    /// A fresh, unset event.
    #[must_use]
    pub fn new() -> Self {
        Self { flag: Mutex::new(false), condvar: Condvar::new() }
    }

    /// Raise the flag and wake every waiter. Stays set until [`Self::clear`]
    /// is called — this is level-triggered, not edge-triggered.
    pub fn set(&self) {
        let mut guard = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = true;
        self.condvar.notify_all();
    }

    /// Lower the flag.
    pub fn clear(&self) {
        let mut guard = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = false;
    }

    /// Whether the flag is currently set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block the calling thread until the flag is set.
    pub fn wait(&self) {
        let guard = self.flag.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self
            .condvar
            .wait_while(guard, |set| !*set)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

#[cfg(test)]
mod tests {
    use super::Event;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_returns_immediately_once_already_set() {
        let event = Event::new();
        event.set();
        event.wait();
    }

    #[test]
    fn wait_blocks_until_another_thread_sets_it() {
        let event = Arc::new(Event::new());
        let waiter = Arc::clone(&event);
        let handle = thread::spawn(move || waiter.wait());
        thread::sleep(Duration::from_millis(10));
        event.set();
        handle.join().unwrap_or_else(|_| ());
    }

    #[test]
    fn clear_resets_is_set() {
        let event = Event::new();
        event.set();
        assert!(event.is_set());
        event.clear();
        assert!(!event.is_set());
    }
}
