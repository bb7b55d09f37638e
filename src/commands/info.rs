use crate::models::ReplicationInfo;
use crate::resp::Frame;

use super::CommandResult;

/// `INFO` (optionally `INFO replication`). Only the replication section is
/// modeled; every other section a real server exposes is out of scope.
pub fn process_info(_argv: &[Vec<u8>], replication_info: &ReplicationInfo) -> CommandResult {
    Ok(Frame::bulk(replication_info.to_info_string().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn info_replication_reports_role() {
        let info = ReplicationInfo::new(Role::Master);
        let reply = process_info(&[b"INFO".to_vec()], &info).unwrap();
        match reply {
            Frame::Bulk(bytes) => assert!(String::from_utf8(bytes).unwrap().contains("role:master")),
            other => panic!("expected a bulk reply, got {other:?}"),
        }
    }
}
