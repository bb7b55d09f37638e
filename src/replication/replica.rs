use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::Config;
use crate::keyspace::Keyspace;
use crate::models::ReplicationInfo;
use crate::resp::{encode_command, Decoder, Frame};

/// Runs for the lifetime of the process on a server started with
/// `--replicaof`. Performs the handshake, discards the bootstrap RDB, then
/// silently replays every command the master forwards.
///
/// Errors here are logged and swallowed by the caller (see `main.rs`): a
/// master that is unreachable at startup should not stop this server from
/// serving its own clients.
pub async fn run(config: Arc<Config>, keyspace: Arc<Keyspace>, info: ReplicationInfo) -> anyhow::Result<()> {
    let (host, port) = config.replicaof.clone().expect("run() only called when --replicaof is set");
    let mut stream = TcpStream::connect((host.as_str(), port)).await?;

    handshake(&mut stream, config.port).await?;
    skip_rdb_payload(&mut stream).await?;

    log::info!("replica handshake complete, replaying from {host}:{port}");
    replay_loop(stream, keyspace, info).await
}

async fn handshake(stream: &mut TcpStream, listening_port: u16) -> anyhow::Result<()> {
    send_command(stream, &[b"PING".to_vec()]).await?;
    expect_simple_reply(stream).await?;

    send_command(stream, &[b"REPLCONF".to_vec(), b"listening-port".to_vec(), listening_port.to_string().into_bytes()])
        .await?;
    expect_simple_reply(stream).await?;

    send_command(stream, &[b"REPLCONF".to_vec(), b"capa".to_vec(), b"psync2".to_vec()]).await?;
    expect_simple_reply(stream).await?;

    send_command(stream, &[b"PSYNC".to_vec(), b"?".to_vec(), b"-1".to_vec()]).await?;
    let reply = expect_simple_reply(stream).await?;
    if !reply.starts_with("FULLRESYNC") {
        anyhow::bail!("expected +FULLRESYNC reply to PSYNC, got {reply:?}");
    }
    Ok(())
}

async fn send_command(stream: &mut TcpStream, argv: &[Vec<u8>]) -> anyhow::Result<()> {
    stream.write_all(&encode_command(argv)).await?;
    Ok(())
}

/// Reads exactly one reply off `stream`, a byte at a time, via a tiny
/// private decoder. A full `Decoder` would work too, but the handshake only
/// ever needs one reply at a time and never needs to buffer ahead.
async fn expect_simple_reply(stream: &mut TcpStream) -> anyhow::Result<String> {
    let mut dec = Decoder::new();
    loop {
        if let Some(frame) = dec.try_decode()? {
            return match frame {
                Frame::Simple(s) => Ok(s),
                Frame::Error(e) => anyhow::bail!("master replied with an error: {e}"),
                other => anyhow::bail!("expected a simple string reply, got {other:?}"),
            };
        }
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).await?;
        dec.feed(&byte);
    }
}

/// Consumes the `$<len>\r\n<raw bytes>` bootstrap RDB blob. Unlike every
/// other bulk string, this one carries no trailing CRLF, so it can't go
/// through the ordinary frame decoder.
async fn skip_rdb_payload(stream: &mut TcpStream) -> anyhow::Result<()> {
    let mut header = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).await?;
        header.push(byte[0]);
        if header.ends_with(b"\r\n") {
            break;
        }
    }
    if header.first() != Some(&b'$') {
        anyhow::bail!("expected '$' RDB bulk header, got {header:?}");
    }
    let len: usize = std::str::from_utf8(&header[1..header.len() - 2])?.parse()?;

    let mut remaining = len;
    let mut buf = [0u8; 4096];
    while remaining > 0 {
        let n = stream.read(&mut buf[..remaining.min(buf.len())]).await?;
        if n == 0 {
            anyhow::bail!("master closed the connection mid-RDB-transfer");
        }
        remaining -= n;
    }
    Ok(())
}

async fn replay_loop(mut stream: TcpStream, keyspace: Arc<Keyspace>, info: ReplicationInfo) -> anyhow::Result<()> {
    let mut dec = Decoder::new();
    let mut buf = [0u8; 4096];

    loop {
        while let Some((frame, consumed)) = dec.try_decode_with_len()? {
            info.add_offset(consumed as u64);

            let argv = match frame.into_command() {
                Ok(argv) if !argv.is_empty() => argv,
                _ => continue,
            };
            let name = String::from_utf8_lossy(&argv[0]).to_uppercase();

            if name == "REPLCONF" && argv.get(1).is_some_and(|a| a.eq_ignore_ascii_case(b"GETACK")) {
                let reply = [b"REPLCONF".to_vec(), b"ACK".to_vec(), info.master_repl_offset().to_string().into_bytes()];
                stream.write_all(&encode_command(&reply)).await?;
                continue;
            }

            apply(&name, &argv, &keyspace);
        }

        let n = stream.read(&mut buf).await?;
        if n == 0 {
            anyhow::bail!("master closed the replication stream");
        }
        dec.feed(&buf[..n]);
    }
}

/// Applies a replicated write directly to the keyspace. Unlike the ordinary
/// client dispatch path this never produces a reply and never propagates
/// further — a replica has no sub-replicas of its own in this design.
fn apply(name: &str, argv: &[Vec<u8>], keyspace: &Keyspace) {
    let result = match name {
        "SET" => apply_set(argv, keyspace),
        "INCR" => argv.get(1).map(|key| keyspace.incr(key).map(|_| ())).unwrap_or(Ok(())),
        "XADD" => apply_xadd(argv, keyspace),
        _ => Ok(()),
    };
    if let Err(err) = result {
        log::warn!("failed to apply replicated command {name}: {err}");
    }
}

fn apply_set(argv: &[Vec<u8>], keyspace: &Keyspace) -> Result<(), crate::error::CommandError> {
    if argv.len() < 3 {
        return Ok(());
    }
    let expires_at_ms = match (argv.get(3), argv.get(4)) {
        (Some(flag), Some(value)) => {
            let millis: u64 = std::str::from_utf8(value).ok().and_then(|s| s.parse().ok()).unwrap_or(0);
            match flag.to_ascii_uppercase().as_slice() {
                b"EX" => Some(crate::keyspace::now_ms() + millis * 1000),
                b"PX" => Some(crate::keyspace::now_ms() + millis),
                _ => None,
            }
        }
        _ => None,
    };
    keyspace.set(argv[1].clone(), argv[2].clone(), expires_at_ms);
    Ok(())
}

fn apply_xadd(argv: &[Vec<u8>], keyspace: &Keyspace) -> Result<(), crate::error::CommandError> {
    if argv.len() < 5 || argv.len() % 2 != 1 {
        return Ok(());
    }
    let key = &argv[1];
    let id_raw = String::from_utf8_lossy(&argv[2]);
    let spec = crate::models::parse_id_spec(&id_raw)?;
    let fields: Vec<(Vec<u8>, Vec<u8>)> = argv[3..].chunks_exact(2).map(|c| (c[0].clone(), c[1].clone())).collect();
    let now = crate::keyspace::now_ms();
    keyspace.with_stream_mut(key, |stream| stream.add(spec, fields, now))?;
    Ok(())
}
