use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;

use crate::commands::TransactionState;
use crate::dispatcher::{self, SharedState};
use crate::rdb;
use crate::resp::{Decoder, Frame};

/// Drives one client connection until it disconnects or asks to become a
/// replica, in which case it hands its write half to the replica registry
/// and keeps reading nothing but `REPLCONF ACK` from then on.
pub async fn handle(stream: TcpStream, state: Arc<SharedState>) {
    let peer = stream.peer_addr().ok();
    if let Err(err) = run(stream, state).await {
        log::warn!("connection {peer:?} ended: {err}");
    }
}

async fn run(stream: TcpStream, state: Arc<SharedState>) -> anyhow::Result<()> {
    let (mut read_half, write_half) = stream.into_split();
    // `None` once this connection has handed its write half to the replica
    // registry after `PSYNC` — there is nothing left here to write through.
    let mut write_half: Option<OwnedWriteHalf> = Some(write_half);
    let mut decoder = Decoder::new();
    let mut txn = TransactionState::new();
    let mut buf = [0u8; 4096];
    let mut replica_id: Option<u64> = None;

    loop {
        loop {
            let frame = match decoder.try_decode() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    // Malformed framing at a frame boundary: tell the peer
                    // why, then close — there is no way to resynchronize
                    // with a decoder that doesn't know where the bad frame
                    // ends.
                    if let Some(writer) = write_half.as_mut() {
                        let _ = writer.write_all(&Frame::error(err.resp_message()).to_bytes()).await;
                    }
                    return Ok(());
                }
            };
            let argv = match frame.into_command() {
                Ok(argv) => argv,
                Err(_) => continue,
            };
            if argv.is_empty() {
                continue;
            }
            let name = String::from_utf8_lossy(&argv[0]).to_uppercase();

            if let Some(id) = replica_id {
                // Post-PSYNC, the only frame expected from this connection
                // is a REPLCONF ACK reply to our own GETACK pings.
                if name == "REPLCONF" && argv.get(1).is_some_and(|a| a.eq_ignore_ascii_case(b"ACK")) {
                    if let Some(offset) =
                        argv.get(2).and_then(|o| std::str::from_utf8(o).ok()).and_then(|s| s.parse().ok())
                    {
                        state.master.record_ack(id, offset).await;
                    }
                }
                continue;
            }

            if name == "PSYNC" {
                let mut writer = write_half.take().expect("write half only taken once, when becoming a replica");
                begin_full_resync(&mut writer, &state).await?;
                replica_id = Some(state.master.register(writer).await);
                continue;
            }

            let reply = dispatcher::dispatch(argv, &state, &mut txn).await;
            let writer = write_half.as_mut().expect("not yet registered as a replica");
            writer.write_all(&reply.to_bytes()).await?;
        }

        let n = read_half.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        decoder.feed(&buf[..n]);
    }

    if let Some(id) = replica_id {
        state.master.unregister(id).await;
    }
    Ok(())
}

async fn begin_full_resync(write_half: &mut OwnedWriteHalf, state: &SharedState) -> anyhow::Result<()> {
    let replid = state.replication_info.master_replid.clone();
    let offset = state.replication_info.master_repl_offset();
    let header = Frame::simple(format!("FULLRESYNC {replid} {offset}"));
    write_half.write_all(&header.to_bytes()).await?;

    let rdb_bytes = rdb::empty_rdb_bytes();
    write_half.write_all(format!("${}\r\n", rdb_bytes.len()).as_bytes()).await?;
    write_half.write_all(&rdb_bytes).await?;
    Ok(())
}
