//! Master- and replica-side replication plumbing, split the way the rest of
//! this crate splits concerns: `master` owns the replica registry and `WAIT`
//! bookkeeping a master process needs; `replica` owns the handshake and
//! replay loop a server runs when started with `--replicaof`.

pub mod master;
pub mod replica;

pub use master::MasterState;
