//! RESP2 codec: an incremental, byte-oriented decoder and a set of pure
//! encoding helpers, shared by client connections, the master's replica
//! writers, and the replica's upstream connection to its master.

mod decoder;
mod encoder;

pub use decoder::Decoder;
pub use encoder::*;

/// A fully decoded RESP value.
///
/// `Bulk`/`Null` distinguish an empty string from a nil bulk reply;
/// `Array`/`NullArray` do the same for arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Vec<u8>),
    Null,
    Array(Vec<Frame>),
    NullArray,
}

impl Frame {
    pub fn bulk(s: impl Into<Vec<u8>>) -> Self {
        Frame::Bulk(s.into())
    }

    pub fn simple(s: impl Into<String>) -> Self {
        Frame::Simple(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        Frame::Error(s.into())
    }

    /// Interprets this frame as an inbound command: an array of bulk strings.
    /// This is the only shape a client, master, or replica ever sends as a
    /// command frame.
    pub fn into_command(self) -> Result<Vec<Vec<u8>>, crate::error::ProtocolError> {
        match self {
            Frame::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Frame::Bulk(bytes) => Ok(bytes),
                    Frame::Simple(s) => Ok(s.into_bytes()),
                    _ => Err(crate::error::ProtocolError::NotACommand),
                })
                .collect(),
            _ => Err(crate::error::ProtocolError::NotACommand),
        }
    }
}
