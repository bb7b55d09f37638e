use crate::error::CommandError;
use crate::resp::Frame;

use super::CommandResult;

/// Per-connection `MULTI`/`EXEC` state. Lives on the connection task, not in
/// any shared state — transactions are never visible across connections.
#[derive(Default)]
pub struct TransactionState {
    queued: bool,
    commands: Vec<Vec<Vec<u8>>>,
}

impl TransactionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_queuing(&self) -> bool {
        self.queued
    }

    pub fn queue(&mut self, argv: Vec<Vec<u8>>) {
        self.commands.push(argv);
    }

    /// Clears the queue and returns the drained commands, in order.
    pub fn take(&mut self) -> Vec<Vec<Vec<u8>>> {
        self.queued = false;
        std::mem::take(&mut self.commands)
    }
}

pub fn process_multi(state: &mut TransactionState) -> CommandResult {
    if state.queued {
        return Err(CommandError::Other("MULTI calls can not be nested".to_string()));
    }
    state.queued = true;
    Ok(Frame::simple("OK"))
}

pub fn process_discard(state: &mut TransactionState) -> CommandResult {
    if !state.queued {
        return Err(CommandError::DiscardWithoutMulti);
    }
    state.take();
    Ok(Frame::simple("OK"))
}
