use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::CommandError;
use crate::models::{RedisData, RedisValue, Stream};

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}

/// The shared key → value map. Guarded by a plain `std::sync::Mutex`: every
/// operation here is synchronous and short-lived, so there is never a reason
/// to hold the lock across an `.await`.
#[derive(Default)]
pub struct Keyspace {
    map: Mutex<HashMap<Vec<u8>, RedisValue>>,
}

impl Keyspace {
    pub fn new() -> Self {
        Self { map: Mutex::new(HashMap::new()) }
    }

    /// Seeds the keyspace from RDB-loaded tuples at startup. Does not check
    /// expiry again; the RDB reader already dropped already-expired entries.
    pub fn load(&self, key: Vec<u8>, value: Vec<u8>, expires_at_ms: Option<u64>) {
        let mut map = self.map.lock().unwrap();
        map.insert(key, RedisValue::new(RedisData::String(value), expires_at_ms));
    }

    pub fn set(&self, key: Vec<u8>, value: Vec<u8>, expires_at_ms: Option<u64>) {
        let mut map = self.map.lock().unwrap();
        map.insert(key, RedisValue::new(RedisData::String(value), expires_at_ms));
    }

    /// Lazily expires `key` before returning it. Matches spec §4.2: a read
    /// never observes an expired value, and deletes it on the same path.
    pub fn get_string(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CommandError> {
        let mut map = self.map.lock().unwrap();
        self.expire_if_needed(&mut map, key);
        match map.get(key) {
            None => Ok(None),
            Some(entry) => match &entry.data {
                RedisData::String(s) => Ok(Some(s.clone())),
                RedisData::Stream(_) => Err(CommandError::WrongType),
            },
        }
    }

    pub fn incr(&self, key: &[u8]) -> Result<i64, CommandError> {
        let mut map = self.map.lock().unwrap();
        self.expire_if_needed(&mut map, key);

        match map.get_mut(key) {
            Some(entry) => match &mut entry.data {
                RedisData::String(s) => {
                    let text = std::str::from_utf8(s).map_err(|_| CommandError::NotAnInteger)?;
                    let current: i64 = text.parse().map_err(|_| CommandError::NotAnInteger)?;
                    let next = current.checked_add(1).ok_or(CommandError::NotAnInteger)?;
                    *s = next.to_string().into_bytes();
                    Ok(next)
                }
                RedisData::Stream(_) => Err(CommandError::WrongType),
            },
            None => {
                map.insert(key.to_vec(), RedisValue::new(RedisData::String(b"1".to_vec()), None));
                Ok(1)
            }
        }
    }

    pub fn type_of(&self, key: &[u8]) -> &'static str {
        let mut map = self.map.lock().unwrap();
        self.expire_if_needed(&mut map, key);
        map.get(key).map(|e| e.data.type_name()).unwrap_or("none")
    }

    /// Every live (non-expired) key. Expired entries encountered along the
    /// way are dropped, same as any other lazy expiry.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        let mut map = self.map.lock().unwrap();
        let now = now_ms();
        let expired: Vec<Vec<u8>> = map
            .iter()
            .filter(|(_, v)| v.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            map.remove(&key);
        }
        map.keys().cloned().collect()
    }

    /// Runs `f` against the stream at `key`, creating an empty one on first
    /// use (matches `XADD`'s implicit stream creation). Fails if `key`
    /// already holds a non-stream value.
    pub fn with_stream_mut<T>(
        &self,
        key: &[u8],
        f: impl FnOnce(&mut Stream) -> Result<T, CommandError>,
    ) -> Result<T, CommandError> {
        let mut map = self.map.lock().unwrap();
        self.expire_if_needed(&mut map, key);

        let entry = map
            .entry(key.to_vec())
            .or_insert_with(|| RedisValue::new(RedisData::Stream(Stream::new()), None));

        match &mut entry.data {
            RedisData::Stream(stream) => f(stream),
            RedisData::String(_) => Err(CommandError::WrongType),
        }
    }

    /// Read-only access to an existing stream. Absent keys are treated as an
    /// empty stream (`XRANGE`/`XREAD` against a missing key return nothing
    /// rather than erroring).
    pub fn with_stream<T>(&self, key: &[u8], f: impl FnOnce(Option<&Stream>) -> T) -> Result<T, CommandError> {
        let mut map = self.map.lock().unwrap();
        self.expire_if_needed(&mut map, key);

        match map.get(key) {
            None => Ok(f(None)),
            Some(entry) => match &entry.data {
                RedisData::Stream(stream) => Ok(f(Some(stream))),
                RedisData::String(_) => Err(CommandError::WrongType),
            },
        }
    }

    fn expire_if_needed(&self, map: &mut HashMap<Vec<u8>, RedisValue>, key: &[u8]) {
        let now = now_ms();
        if matches!(map.get(key), Some(entry) if entry.is_expired(now)) {
            map.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let ks = Keyspace::new();
        ks.set(b"k".to_vec(), b"v".to_vec(), None);
        assert_eq!(ks.get_string(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn get_missing_key_is_none() {
        let ks = Keyspace::new();
        assert_eq!(ks.get_string(b"missing").unwrap(), None);
    }

    #[test]
    fn expired_key_reads_as_absent_and_is_removed() {
        let ks = Keyspace::new();
        ks.set(b"k".to_vec(), b"v".to_vec(), Some(now_ms() - 1));
        assert_eq!(ks.get_string(b"k").unwrap(), None);
        assert_eq!(ks.keys(), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn incr_starts_at_one_for_missing_key() {
        let ks = Keyspace::new();
        assert_eq!(ks.incr(b"counter").unwrap(), 1);
        assert_eq!(ks.incr(b"counter").unwrap(), 2);
    }

    #[test]
    fn incr_rejects_non_integer() {
        let ks = Keyspace::new();
        ks.set(b"k".to_vec(), b"not a number".to_vec(), None);
        assert!(matches!(ks.incr(b"k").unwrap_err(), CommandError::NotAnInteger));
    }

    #[test]
    fn type_of_reports_none_string_stream() {
        let ks = Keyspace::new();
        assert_eq!(ks.type_of(b"missing"), "none");
        ks.set(b"s".to_vec(), b"v".to_vec(), None);
        assert_eq!(ks.type_of(b"s"), "string");
        ks.with_stream_mut(b"strm", |_s| Ok(())).unwrap();
        assert_eq!(ks.type_of(b"strm"), "stream");
    }

    #[test]
    fn get_against_stream_is_wrongtype() {
        let ks = Keyspace::new();
        ks.with_stream_mut(b"strm", |_s| Ok(())).unwrap();
        assert!(matches!(ks.get_string(b"strm").unwrap_err(), CommandError::WrongType));
    }
}
