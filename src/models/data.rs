use super::stream::Stream;

/// The tagged kind a keyspace entry can hold. `List`/`Set`/`Hash` are out of
/// scope (see spec Non-goals); only strings and streams are modeled.
pub enum RedisData {
    String(Vec<u8>),
    Stream(Stream),
}

impl RedisData {
    pub fn type_name(&self) -> &'static str {
        match self {
            RedisData::String(_) => "string",
            RedisData::Stream(_) => "stream",
        }
    }
}

/// One keyspace entry: a typed value plus an optional absolute expiry,
/// in milliseconds since the Unix epoch.
pub struct RedisValue {
    pub data: RedisData,
    pub expires_at_ms: Option<u64>,
}

impl RedisValue {
    pub fn new(data: RedisData, expires_at_ms: Option<u64>) -> Self {
        Self { data, expires_at_ms }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        matches!(self.expires_at_ms, Some(at) if now_ms >= at)
    }
}
