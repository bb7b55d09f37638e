use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use crate::models::ReplicationInfo;
use crate::resp::encode_command;

/// One connected replica's write half plus the offset it last acknowledged
/// via `REPLCONF ACK`. Starts at 0 — a replica is considered caught up to
/// whatever offset the master had at the moment it completed its resync.
struct ReplicaHandle {
    writer: Arc<AsyncMutex<OwnedWriteHalf>>,
    acked_offset: AtomicU64,
}

/// Shared across every connection task on a server acting as a master.
/// Holds the set of registered replica writers and drives `WAIT`.
#[derive(Default)]
pub struct MasterState {
    replicas: AsyncMutex<HashMap<u64, ReplicaHandle>>,
    next_id: AtomicU64,
}

impl MasterState {
    pub fn new() -> Self {
        Self { replicas: AsyncMutex::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }

    /// Registers a freshly resynced replica connection, returning an id
    /// stable for the lifetime of that connection (not tied to the socket's
    /// address, which a NAT or proxy could reuse).
    pub async fn register(&self, writer: OwnedWriteHalf) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = ReplicaHandle { writer: Arc::new(AsyncMutex::new(writer)), acked_offset: AtomicU64::new(0) };
        self.replicas.lock().await.insert(id, handle);
        id
    }

    pub async fn unregister(&self, id: u64) {
        self.replicas.lock().await.remove(&id);
    }

    pub async fn replica_count(&self) -> usize {
        self.replicas.lock().await.len()
    }

    /// Re-encodes `argv` and writes it to every registered replica. A
    /// replica whose write fails is dropped — its connection task will
    /// notice the broken pipe on its own next read and unregister itself.
    pub async fn propagate(&self, argv: &[Vec<u8>]) {
        let bytes = encode_command(argv);
        let replicas = self.replicas.lock().await;
        for handle in replicas.values() {
            let mut writer = handle.writer.lock().await;
            let _ = writer.write_all(&bytes).await;
        }
    }

    pub async fn record_ack(&self, id: u64, offset: u64) {
        if let Some(handle) = self.replicas.lock().await.get(&id) {
            handle.acked_offset.store(offset, Ordering::SeqCst);
        }
    }

    async fn count_acked_at_least(&self, target: u64) -> usize {
        self.replicas.lock().await.values().filter(|h| h.acked_offset.load(Ordering::SeqCst) >= target).count()
    }

    async fn send_getack_to_all(&self) {
        let bytes = encode_command(&[b"REPLCONF".to_vec(), b"GETACK".to_vec(), b"*".to_vec()]);
        let replicas = self.replicas.lock().await;
        for handle in replicas.values() {
            let mut writer = handle.writer.lock().await;
            let _ = writer.write_all(&bytes).await;
        }
    }

    /// Drives `WAIT numreplicas timeout_ms`: polls every 100ms, prodding
    /// replicas with `REPLCONF GETACK *`, until `numreplicas` have
    /// acknowledged an offset at least as large as the master's offset at
    /// the moment `WAIT` was called, or `timeout_ms` elapses. `timeout_ms ==
    /// 0` waits indefinitely, matching the reference command's semantics.
    /// Returns the number of replicas caught up when it stops waiting.
    pub async fn wait(&self, info: &ReplicationInfo, numreplicas: usize, timeout_ms: u64) -> usize {
        let target = info.master_repl_offset();

        let count = self.count_acked_at_least(target).await;
        if count >= numreplicas {
            return count;
        }

        let deadline = if timeout_ms == 0 { None } else { Some(Instant::now() + Duration::from_millis(timeout_ms)) };

        loop {
            self.send_getack_to_all().await;
            tokio::time::sleep(Duration::from_millis(100)).await;

            let count = self.count_acked_at_least(target).await;
            if count >= numreplicas {
                return count;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return count;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_with_zero_target_offset_returns_immediately() {
        let master = MasterState::new();
        let info = ReplicationInfo::new(crate::models::Role::Master);
        let count = master.wait(&info, 0, 50).await;
        assert_eq!(count, 0);
    }
}
