use crate::config::Config;
use crate::error::CommandError;
use crate::keyspace::Keyspace;
use crate::resp::Frame;

use super::CommandResult;

pub fn process_ping(_argv: &[Vec<u8>]) -> CommandResult {
    Ok(Frame::simple("PONG"))
}

pub fn process_echo(argv: &[Vec<u8>]) -> CommandResult {
    match argv.get(1) {
        Some(message) => Ok(Frame::bulk(message.clone())),
        None => Err(CommandError::WrongArity("echo".to_string())),
    }
}

pub fn process_type(argv: &[Vec<u8>], keyspace: &Keyspace) -> CommandResult {
    let key = argv.get(1).ok_or_else(|| CommandError::WrongArity("type".to_string()))?;
    Ok(Frame::simple(keyspace.type_of(key)))
}

/// Only the `KEYS *` form is meaningful here; streams don't carry field
/// names worth globbing, so any other pattern is treated the same way.
pub fn process_keys(argv: &[Vec<u8>], keyspace: &Keyspace) -> CommandResult {
    if argv.len() != 2 {
        return Err(CommandError::WrongArity("keys".to_string()));
    }
    let items = keyspace.keys().into_iter().map(Frame::Bulk).collect();
    Ok(Frame::Array(items))
}

/// `CONFIG GET <param>`: the only parameters a client can ask about are
/// `dir`, `dbfilename`, and `port`, echoed back as a two-element array.
pub fn process_config(argv: &[Vec<u8>], config: &Config) -> CommandResult {
    if argv.len() != 3 || !argv[1].eq_ignore_ascii_case(b"GET") {
        return Err(CommandError::Other("CONFIG only supports GET <dir|dbfilename|port>".to_string()));
    }

    let param = String::from_utf8_lossy(&argv[2]).to_lowercase();
    let value = match param.as_str() {
        "dir" => config.dir.as_ref().map(|p| p.to_string_lossy().into_owned()),
        "dbfilename" => config.dbfilename.clone(),
        "port" => Some(config.port.to_string()),
        _ => None,
    };

    match value {
        Some(value) => Ok(Frame::Array(vec![Frame::bulk(param.into_bytes()), Frame::bulk(value.into_bytes())])),
        None => Ok(Frame::Array(vec![])),
    }
}
