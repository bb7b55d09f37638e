use crate::error::CommandError;
use crate::keyspace::{now_ms, Keyspace};
use crate::resp::Frame;

use super::CommandResult;

/// `SET key value [EX seconds | PX milliseconds]`.
pub fn process_set(argv: &[Vec<u8>], keyspace: &Keyspace) -> CommandResult {
    if argv.len() < 3 {
        return Err(CommandError::WrongArity("set".to_string()));
    }

    let expires_at_ms = match argv.get(3) {
        Some(flag) => {
            let raw = argv.get(4).ok_or_else(|| CommandError::WrongArity("set".to_string()))?;
            let amount: u64 = std::str::from_utf8(raw)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or(CommandError::NotAnInteger)?;
            match flag.to_ascii_uppercase().as_slice() {
                b"EX" => Some(now_ms() + amount * 1000),
                b"PX" => Some(now_ms() + amount),
                _ => return Err(CommandError::Other("syntax error".to_string())),
            }
        }
        None => None,
    };

    keyspace.set(argv[1].clone(), argv[2].clone(), expires_at_ms);
    Ok(Frame::simple("OK"))
}

pub fn process_get(argv: &[Vec<u8>], keyspace: &Keyspace) -> CommandResult {
    let key = argv.get(1).ok_or_else(|| CommandError::WrongArity("get".to_string()))?;
    match keyspace.get_string(key)? {
        Some(value) => Ok(Frame::bulk(value)),
        None => Ok(Frame::Null),
    }
}

pub fn process_incr(argv: &[Vec<u8>], keyspace: &Keyspace) -> CommandResult {
    let key = argv.get(1).ok_or_else(|| CommandError::WrongArity("incr".to_string()))?;
    Ok(Frame::Integer(keyspace.incr(key)?))
}
