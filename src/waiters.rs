use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tokio::sync::mpsc;

/// Wakes blocked `XREAD BLOCK` callers when `XADD` appends to a stream they
/// are waiting on. One-shot notification: each waiter registers a sender,
/// `XADD` drains and fires every sender registered for its key, and the
/// woken caller re-reads the stream itself rather than receiving the entry
/// over the channel.
#[derive(Default)]
pub struct Waiters {
    room: Mutex<HashMap<Vec<u8>, VecDeque<mpsc::Sender<()>>>>,
}

impl Waiters {
    pub fn new() -> Self {
        Self { room: Mutex::new(HashMap::new()) }
    }

    /// Registers interest in `keys`, returning a receiver that fires once
    /// any of them gets a new entry.
    pub fn register(&self, keys: &[Vec<u8>]) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel(1);
        let mut room = self.room.lock().unwrap();
        for key in keys {
            room.entry(key.clone()).or_default().push_back(tx.clone());
        }
        rx
    }

    /// Wakes every waiter registered on `key`. Dead receivers are simply
    /// dropped; a failed `try_send` means the waiter already gave up.
    pub fn notify(&self, key: &[u8]) {
        let mut room = self.room.lock().unwrap();
        if let Some(queue) = room.get_mut(key) {
            while let Some(tx) = queue.pop_front() {
                let _ = tx.try_send(());
            }
        }
    }
}
