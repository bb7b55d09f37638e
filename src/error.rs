use thiserror::Error;

/// Errors raised while decoding bytes off the wire into a [`crate::resp::Frame`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown RESP type byte: {0:#x}")]
    UnknownType(u8),
    #[error("malformed length header")]
    BadLength,
    #[error("command frame must be an array of bulk strings")]
    NotACommand,
    #[error("unexpected end of stream")]
    Eof,
}

impl ProtocolError {
    /// The exact text that follows the `-` in the RESP error reply sent
    /// before the connection is closed.
    pub fn resp_message(&self) -> String {
        format!("ERR Protocol error: {self}")
    }
}

/// Errors produced by a command handler. The dispatcher turns every variant
/// into a RESP error reply; none of them should end the connection on their own.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(String),
    #[error("Command not found: {0}")]
    UnknownCommand(String),
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("EXEC without MULTI")]
    ExecWithoutMulti,
    #[error("DISCARD without MULTI")]
    DiscardWithoutMulti,
    #[error("The ID specified in XADD must be greater than 0-0")]
    StreamIdTooSmallZero,
    #[error("The ID specified in XADD is equal or smaller than the target stream top item")]
    StreamIdNotIncreasing,
    #[error("{0}")]
    Other(String),
}

impl CommandError {
    /// The exact text that follows the `-` in the RESP error reply.
    pub fn resp_message(&self) -> String {
        match self {
            CommandError::WrongType => "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
            other => format!("ERR {other}"),
        }
    }
}
