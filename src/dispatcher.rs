use std::sync::Arc;

use async_recursion::async_recursion;

use crate::commands::{self, is_write_command, CommandResult, TransactionState};
use crate::config::Config;
use crate::error::CommandError;
use crate::keyspace::Keyspace;
use crate::models::{ReplicationInfo, Role};
use crate::replication::MasterState;
use crate::resp::{encode_command, Frame};
use crate::waiters::Waiters;

/// Everything a connection task needs to run a command, shared across every
/// connection via `Arc`. `master` is present regardless of this server's own
/// role — a plain client connection on a replica still goes through the
/// same dispatch path, it simply never accumulates any replicas to
/// propagate to.
pub struct SharedState {
    pub keyspace: Arc<Keyspace>,
    pub config: Arc<Config>,
    pub replication_info: ReplicationInfo,
    pub master: Arc<MasterState>,
    pub waiters: Arc<Waiters>,
}

impl SharedState {
    pub fn new(config: Arc<Config>, replication_info: ReplicationInfo) -> Self {
        Self {
            keyspace: Arc::new(Keyspace::new()),
            config,
            replication_info,
            master: Arc::new(MasterState::new()),
            waiters: Arc::new(Waiters::new()),
        }
    }
}

/// Runs one command to completion: looks up its handler, executes it, and —
/// on success, for a write command, while acting as a master — propagates
/// it to every registered replica and advances `master_repl_offset`.
///
/// `#[async_recursion]` lets `EXEC` call back into this function once per
/// queued command without a separate execution path.
#[async_recursion]
pub async fn execute_command(argv: Vec<Vec<u8>>, state: &SharedState) -> CommandResult {
    if argv.is_empty() {
        return Err(CommandError::Other("empty command".to_string()));
    }
    let name = String::from_utf8_lossy(&argv[0]).to_uppercase();

    let result = match name.as_str() {
        "PING" => commands::process_ping(&argv),
        "ECHO" => commands::process_echo(&argv),
        "GET" => commands::process_get(&argv, &state.keyspace),
        "SET" => commands::process_set(&argv, &state.keyspace),
        "INCR" => commands::process_incr(&argv, &state.keyspace),
        "TYPE" => commands::process_type(&argv, &state.keyspace),
        "KEYS" => commands::process_keys(&argv, &state.keyspace),
        "CONFIG" => commands::process_config(&argv, &state.config),
        "INFO" => commands::process_info(&argv, &state.replication_info),
        "XADD" => commands::process_xadd(&argv, &state.keyspace, &state.waiters),
        "XRANGE" => commands::process_xrange(&argv, &state.keyspace),
        "XREAD" => commands::process_xread(&argv, &state.keyspace, &state.waiters).await,
        "REPLCONF" => commands::process_replconf(&argv),
        "WAIT" => commands::process_wait(&argv, &state.master, &state.replication_info).await,
        other => Err(CommandError::UnknownCommand(other.to_string())),
    };

    if result.is_ok() && is_write_command(&name) && state.replication_info.role == Role::Master {
        propagate(&argv, state).await;
    }

    result
}

async fn propagate(argv: &[Vec<u8>], state: &SharedState) {
    state.master.propagate(argv).await;
    state.replication_info.add_offset(encode_command(argv).len() as u64);
}

/// The `MULTI`/`EXEC`/`DISCARD` layer sitting in front of [`execute_command`].
/// Intercepts those three commands itself; everything else is either queued
/// (while a transaction is open) or dispatched immediately.
pub async fn dispatch(argv: Vec<Vec<u8>>, state: &SharedState, txn: &mut TransactionState) -> Frame {
    if argv.is_empty() {
        return Frame::error(CommandError::Other("empty command".to_string()).resp_message());
    }
    let name = String::from_utf8_lossy(&argv[0]).to_uppercase();

    match name.as_str() {
        "MULTI" => reply(commands::process_multi(txn)),
        "DISCARD" => reply(commands::process_discard(txn)),
        "EXEC" => exec(txn, state).await,
        _ if txn.is_queuing() => {
            txn.queue(argv);
            Frame::simple("QUEUED")
        }
        _ => reply(execute_command(argv, state).await),
    }
}

async fn exec(txn: &mut TransactionState, state: &SharedState) -> Frame {
    if !txn.is_queuing() {
        return reply(Err(CommandError::ExecWithoutMulti));
    }
    let queued = txn.take();
    let mut replies = Vec::with_capacity(queued.len());
    for argv in queued {
        replies.push(match execute_command(argv, state).await {
            Ok(frame) => frame,
            Err(err) => Frame::error(err.resp_message()),
        });
    }
    Frame::Array(replies)
}

fn reply(result: CommandResult) -> Frame {
    match result {
        Ok(frame) => frame,
        Err(err) => Frame::error(err.resp_message()),
    }
}
