//! One module per command family, mirroring the RESP command groups the
//! dispatcher routes to. Every handler takes the already-uppercased argv
//! (command name included, at `argv[0]`) and returns the reply frame or the
//! `CommandError` the dispatcher turns into a RESP error.

pub mod generic;
pub mod info;
pub mod replication;
pub mod stream;
pub mod string;
pub mod transaction;

pub use generic::*;
pub use info::*;
pub use replication::*;
pub use stream::*;
pub use string::*;
pub use transaction::*;

use crate::error::CommandError;
use crate::resp::Frame;

pub type CommandResult = Result<Frame, CommandError>;

/// Names of commands whose successful execution a master must forward to
/// its replicas and count against `master_repl_offset`.
pub fn is_write_command(name: &str) -> bool {
    matches!(name, "SET" | "INCR" | "XADD")
}
