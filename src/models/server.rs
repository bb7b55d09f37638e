use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Slave,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Slave => "slave",
        }
    }
}

/// `INFO replication` state. `master_repl_offset` is shared via `Arc` so the
/// dispatcher can bump it on every propagated write while `INFO` reads a
/// live snapshot rather than a value frozen at startup.
#[derive(Debug, Clone)]
pub struct ReplicationInfo {
    pub role: Role,
    pub master_replid: String,
    offset: Arc<AtomicU64>,
}

impl ReplicationInfo {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            master_replid: generate_replid(),
            offset: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn master_repl_offset(&self) -> u64 {
        self.offset.load(Ordering::SeqCst)
    }

    pub fn add_offset(&self, delta: u64) -> u64 {
        self.offset.fetch_add(delta, Ordering::SeqCst) + delta
    }

    pub fn to_info_string(&self) -> String {
        format!(
            "# Replication\r\nrole:{}\r\nmaster_replid:{}\r\nmaster_repl_offset:{}\r\n",
            self.role.as_str(),
            self.master_replid,
            self.master_repl_offset(),
        )
    }
}

fn generate_replid() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..40).map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char).collect()
}
