use std::time::Duration;

use crate::error::CommandError;
use crate::keyspace::{now_ms, Keyspace};
use crate::models::{parse_explicit_id, parse_id_spec, StreamEntry, StreamId};
use crate::resp::Frame;
use crate::waiters::Waiters;

use super::CommandResult;

fn encode_entry(entry: &StreamEntry) -> Frame {
    let mut fields = Vec::with_capacity(entry.fields.len() * 2);
    for (k, v) in &entry.fields {
        fields.push(Frame::bulk(k.clone()));
        fields.push(Frame::bulk(v.clone()));
    }
    Frame::Array(vec![Frame::bulk(entry.id.to_string().into_bytes()), Frame::Array(fields)])
}

/// `XADD key <id> field value [field value ...]`.
pub fn process_xadd(argv: &[Vec<u8>], keyspace: &Keyspace, waiters: &Waiters) -> CommandResult {
    if argv.len() < 5 || argv.len() % 2 != 1 {
        return Err(CommandError::WrongArity("xadd".to_string()));
    }
    let key = &argv[1];
    let spec = parse_id_spec(&String::from_utf8_lossy(&argv[2]))?;
    let fields: Vec<(Vec<u8>, Vec<u8>)> = argv[3..].chunks_exact(2).map(|c| (c[0].clone(), c[1].clone())).collect();

    let id = keyspace.with_stream_mut(key, |stream| stream.add(spec, fields, now_ms()))?;
    waiters.notify(key);
    Ok(Frame::bulk(id.to_string().into_bytes()))
}

fn parse_range_bound(raw: &[u8], at_start: bool) -> StreamId {
    let raw = String::from_utf8_lossy(raw);
    if raw == "-" {
        return StreamId::ZERO;
    }
    if raw == "+" {
        return StreamId::MAX;
    }
    if let Some(id) = parse_explicit_id(&raw) {
        return id;
    }
    // A bare ms with no `-seq` ranges from seq 0 at the start, seq MAX at the end.
    match raw.parse::<u64>() {
        Ok(ms) if at_start => StreamId::new(ms, 0),
        Ok(ms) => StreamId::new(ms, u64::MAX),
        Err(_) if at_start => StreamId::ZERO,
        Err(_) => StreamId::MAX,
    }
}

/// `XRANGE key start end`.
pub fn process_xrange(argv: &[Vec<u8>], keyspace: &Keyspace) -> CommandResult {
    if argv.len() != 4 {
        return Err(CommandError::WrongArity("xrange".to_string()));
    }
    let key = &argv[1];
    let start = parse_range_bound(&argv[2], true);
    let end = parse_range_bound(&argv[3], false);

    let items = keyspace.with_stream(key, |stream| match stream {
        Some(stream) => stream.range(start, end).into_iter().map(encode_entry).collect(),
        None => Vec::new(),
    })?;
    Ok(Frame::Array(items))
}

/// `XREAD [BLOCK ms] STREAMS key [key ...] id [id ...]`.
pub async fn process_xread(argv: &[Vec<u8>], keyspace: &Keyspace, waiters: &Waiters) -> CommandResult {
    let streams_idx = argv
        .iter()
        .position(|a| a.eq_ignore_ascii_case(b"STREAMS"))
        .ok_or_else(|| CommandError::Other("syntax error".to_string()))?;

    let block_ms: Option<u64> = argv
        .iter()
        .position(|a| a.eq_ignore_ascii_case(b"BLOCK"))
        .and_then(|idx| argv.get(idx + 1))
        .and_then(|raw| std::str::from_utf8(raw).ok())
        .and_then(|s| s.parse().ok());

    let rest = &argv[streams_idx + 1..];
    if rest.is_empty() || rest.len() % 2 != 0 {
        return Err(CommandError::Other(
            "Unbalanced XREAD list of streams: for each stream key an ID or '$' must be specified.".to_string(),
        ));
    }
    let num_streams = rest.len() / 2;
    let keys = &rest[..num_streams];
    let ids = &rest[num_streams..];

    let after_ids = resolve_after_ids(keys, ids, keyspace)?;

    let Some(block_ms) = block_ms else {
        let reply = read_streams(keys, &after_ids, keyspace)?;
        return if reply.is_empty() { Ok(Frame::NullArray) } else { Ok(Frame::Array(reply)) };
    };

    // Register before the first read so an `XADD` landing between "we found
    // nothing" and "we started waiting" still reaches us — otherwise a write
    // in that window would notify a waiter that doesn't exist yet and a
    // `BLOCK 0` caller would hang forever despite a matching entry existing.
    let mut rx = waiters.register(keys);

    let reply = read_streams(keys, &after_ids, keyspace)?;
    if !reply.is_empty() {
        return Ok(Frame::Array(reply));
    }

    if block_ms == 0 {
        rx.recv().await;
    } else {
        let _ = tokio::time::timeout(Duration::from_millis(block_ms), rx.recv()).await;
    }

    let reply = read_streams(keys, &after_ids, keyspace)?;
    if reply.is_empty() {
        Ok(Frame::NullArray)
    } else {
        Ok(Frame::Array(reply))
    }
}

/// Resolves each `$` id argument to the stream's current last id, captured
/// once before any blocking so later `XADD`s during the block are seen.
fn resolve_after_ids(keys: &[Vec<u8>], ids: &[Vec<u8>], keyspace: &Keyspace) -> Result<Vec<StreamId>, CommandError> {
    let mut resolved = Vec::with_capacity(keys.len());
    for (key, id) in keys.iter().zip(ids) {
        if id.as_slice() == b"$" {
            let last = keyspace.with_stream(key, |stream| stream.map(|s| s.last_id).unwrap_or(StreamId::ZERO))?;
            resolved.push(last);
        } else {
            let raw = String::from_utf8_lossy(id);
            let id = parse_explicit_id(&raw)
                .ok_or_else(|| CommandError::Other("Invalid stream ID specified as stream command argument".to_string()))?;
            resolved.push(id);
        }
    }
    Ok(resolved)
}

fn read_streams(keys: &[Vec<u8>], after_ids: &[StreamId], keyspace: &Keyspace) -> Result<Vec<Frame>, CommandError> {
    let mut out = Vec::new();
    for (key, after) in keys.iter().zip(after_ids) {
        let entries: Vec<Frame> = keyspace.with_stream(key, |stream| match stream {
            Some(stream) => stream.after(*after).into_iter().map(encode_entry).collect(),
            None => Vec::new(),
        })?;
        if !entries.is_empty() {
            out.push(Frame::Array(vec![Frame::bulk(key.clone()), Frame::Array(entries)]));
        }
    }
    Ok(out)
}
