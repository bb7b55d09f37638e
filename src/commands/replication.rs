use crate::error::CommandError;
use crate::models::ReplicationInfo;
use crate::replication::MasterState;
use crate::resp::Frame;

use super::CommandResult;

/// Pre-`PSYNC` handshake steps a would-be replica announces. Both forms
/// just need acknowledging; the listening port and capabilities aren't
/// otherwise consulted since this server never needs to dial the replica
/// back.
pub fn process_replconf(argv: &[Vec<u8>]) -> CommandResult {
    match argv.get(1).map(|s| s.to_ascii_uppercase()) {
        Some(sub) if sub == b"LISTENING-PORT" || sub == b"CAPA" => Ok(Frame::simple("OK")),
        _ => Err(CommandError::Other("unsupported REPLCONF option".to_string())),
    }
}

/// `WAIT numreplicas timeout`.
pub async fn process_wait(argv: &[Vec<u8>], master: &MasterState, info: &ReplicationInfo) -> CommandResult {
    if argv.len() != 3 {
        return Err(CommandError::WrongArity("wait".to_string()));
    }
    let numreplicas: usize = parse_arg(&argv[1])?;
    let timeout_ms: u64 = parse_arg(&argv[2])?;

    let count = master.wait(info, numreplicas, timeout_ms).await;
    Ok(Frame::Integer(count as i64))
}

fn parse_arg<T: std::str::FromStr>(raw: &[u8]) -> Result<T, CommandError> {
    std::str::from_utf8(raw).ok().and_then(|s| s.parse().ok()).ok_or(CommandError::NotAnInteger)
}
