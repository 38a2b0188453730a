use std::collections::HashSet;
use std::sync::{Condvar, Mutex};

/// Per-key mutual exclusion for `(database, fixture)` pairs.
///
/// Load and unload of the same fixture in the same database run one at a
/// time; different pairs never wait on each other. Entries exist only while
/// held.
#[derive(Debug, Default)]
pub struct KeyLocks {
    held: Mutex<HashSet<(String, String)>>,
    released: Condvar,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the key is free, then hold it until the guard drops.
    pub fn acquire(&self, database: &str, fixture: &str) -> KeyGuard<'_> {
        let key = (database.to_owned(), fixture.to_owned());
        let mut held = self.held.lock().expect("key lock table poisoned");
        while held.contains(&key) {
            held = self.released.wait(held).expect("key lock table poisoned");
        }
        held.insert(key.clone());
        KeyGuard { locks: self, key }
    }

    #[cfg(test)]
    fn held_count(&self) -> usize {
        self.held.lock().expect("key lock table poisoned").len()
    }
}

pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: (String, String),
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut held) = self.locks.held.lock() {
            held.remove(&self.key);
        }
        self.locks.released.notify_all();
    }
}
