use crate::error::CommandError;

/// A stream entry identifier: two non-negative integers rendered `ms-seq`,
/// strictly increasing within a stream. `0-0` is never a valid id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const ZERO: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId { ms: u64::MAX, seq: u64::MAX };

    pub fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }

    pub fn is_zero(&self) -> bool {
        self.ms == 0 && self.seq == 0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// Parses a fully explicit `ms-seq` id. Returns `None` if either half fails
/// to parse as a non-negative integer.
pub fn parse_explicit_id(raw: &str) -> Option<StreamId> {
    let (ms_part, seq_part) = raw.split_once('-')?;
    let ms = ms_part.parse().ok()?;
    let seq = seq_part.parse().ok()?;
    Some(StreamId::new(ms, seq))
}

/// The three shapes an `XADD` id argument can take.
pub enum IdSpec {
    /// `*`
    Auto,
    /// `<ms>-*`
    AutoSeq(u64),
    /// `<ms>-<seq>`
    Explicit(StreamId),
}

pub fn parse_id_spec(raw: &str) -> Result<IdSpec, CommandError> {
    if raw == "*" {
        return Ok(IdSpec::Auto);
    }
    if let Some(ms_part) = raw.strip_suffix("-*") {
        let ms = ms_part
            .parse()
            .map_err(|_| CommandError::Other("Invalid stream ID specified as stream command argument".to_string()))?;
        return Ok(IdSpec::AutoSeq(ms));
    }
    let id = parse_explicit_id(raw)
        .ok_or_else(|| CommandError::Other("Invalid stream ID specified as stream command argument".to_string()))?;
    Ok(IdSpec::Explicit(id))
}

/// A single append-only entry: an id plus an ordered, order-preserving list
/// of field/value pairs (not a map — field order must round-trip).
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<(Vec<u8>, Vec<u8>)>,
}

/// An ordered append-only stream. Remembers the last assigned id so new
/// entries can be validated in O(1) without scanning `entries`.
#[derive(Debug, Default)]
pub struct Stream {
    pub entries: Vec<StreamEntry>,
    pub last_id: StreamId,
}

impl Stream {
    pub fn new() -> Self {
        Self { entries: Vec::new(), last_id: StreamId::ZERO }
    }

    /// Resolves an `XADD` id argument against this stream's current state,
    /// per spec §4.3, then appends the entry if the resolved id is valid.
    pub fn add(&mut self, spec: IdSpec, fields: Vec<(Vec<u8>, Vec<u8>)>, now_ms: u64) -> Result<StreamId, CommandError> {
        let resolved = match spec {
            IdSpec::Auto => {
                if now_ms == self.last_id.ms {
                    StreamId::new(now_ms, self.last_id.seq + 1)
                } else {
                    StreamId::new(now_ms, 0)
                }
            }
            IdSpec::AutoSeq(ms) => {
                if ms == self.last_id.ms {
                    StreamId::new(ms, self.last_id.seq + 1)
                } else if ms == 0 && self.entries.is_empty() {
                    StreamId::new(0, 1)
                } else if ms > self.last_id.ms {
                    StreamId::new(ms, 0)
                } else {
                    // ms < last_id.ms: not specified in the reference; treated
                    // as an ordinary id-too-small error (see SPEC_FULL §9).
                    return Err(CommandError::StreamIdNotIncreasing);
                }
            }
            IdSpec::Explicit(id) => id,
        };

        if resolved.is_zero() {
            return Err(CommandError::StreamIdTooSmallZero);
        }
        // last_id is 0-0 for an empty stream, so this also covers "any id is
        // valid against an empty stream" without a separate special case.
        if resolved <= self.last_id {
            return Err(CommandError::StreamIdNotIncreasing);
        }

        self.entries.push(StreamEntry { id: resolved, fields });
        self.last_id = resolved;
        Ok(resolved)
    }

    /// Inclusive range query, in insertion (== id) order.
    pub fn range(&self, start: StreamId, end: StreamId) -> Vec<&StreamEntry> {
        self.entries.iter().filter(|e| e.id >= start && e.id <= end).collect()
    }

    /// Entries with id strictly greater than `after`.
    pub fn after(&self, after: StreamId) -> Vec<&StreamEntry> {
        self.entries.iter().filter(|e| e.id > after).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(Vec<u8>, Vec<u8>)> {
        pairs.iter().map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec())).collect()
    }

    #[test]
    fn rejects_zero_zero() {
        let mut s = Stream::new();
        let err = s.add(IdSpec::Explicit(StreamId::ZERO), fields(&[("a", "1")]), 0).unwrap_err();
        assert!(matches!(err, CommandError::StreamIdTooSmallZero));
    }

    #[test]
    fn accepts_strictly_increasing_explicit_ids() {
        let mut s = Stream::new();
        let id1 = s.add(IdSpec::Explicit(StreamId::new(5, 0)), fields(&[("a", "1")]), 0).unwrap();
        assert_eq!(id1, StreamId::new(5, 0));
        let id2 = s.add(IdSpec::Explicit(StreamId::new(5, 1)), fields(&[("a", "2")]), 0).unwrap();
        assert_eq!(id2, StreamId::new(5, 1));
    }

    #[test]
    fn rejects_non_increasing_explicit_id() {
        let mut s = Stream::new();
        s.add(IdSpec::Explicit(StreamId::new(5, 0)), fields(&[("a", "1")]), 0).unwrap();
        let err = s.add(IdSpec::Explicit(StreamId::new(5, 0)), fields(&[("a", "2")]), 0).unwrap_err();
        assert!(matches!(err, CommandError::StreamIdNotIncreasing));
    }

    #[test]
    fn auto_seq_increments_within_same_ms() {
        let mut s = Stream::new();
        s.add(IdSpec::Explicit(StreamId::new(5, 0)), fields(&[("a", "1")]), 0).unwrap();
        let id = s.add(IdSpec::AutoSeq(5), fields(&[("a", "2")]), 0).unwrap();
        assert_eq!(id, StreamId::new(5, 1));
    }

    #[test]
    fn auto_seq_zero_on_empty_nonzero_ms() {
        let mut s = Stream::new();
        let id = s.add(IdSpec::AutoSeq(7), fields(&[("a", "1")]), 0).unwrap();
        assert_eq!(id, StreamId::new(7, 0));
    }

    #[test]
    fn auto_seq_zero_ms_on_empty_stream_yields_0_1() {
        let mut s = Stream::new();
        let id = s.add(IdSpec::AutoSeq(0), fields(&[("a", "1")]), 0).unwrap();
        assert_eq!(id, StreamId::new(0, 1));
    }

    #[test]
    fn fully_automatic_id_uses_wall_clock() {
        let mut s = Stream::new();
        let id = s.add(IdSpec::Auto, fields(&[("a", "1")]), 1_700_000_000_000).unwrap();
        assert_eq!(id, StreamId::new(1_700_000_000_000, 0));
    }

    #[test]
    fn range_is_inclusive_and_ordered() {
        let mut s = Stream::new();
        s.add(IdSpec::Explicit(StreamId::new(1, 0)), fields(&[("a", "1")]), 0).unwrap();
        s.add(IdSpec::Explicit(StreamId::new(2, 0)), fields(&[("a", "2")]), 0).unwrap();
        s.add(IdSpec::Explicit(StreamId::new(3, 0)), fields(&[("a", "3")]), 0).unwrap();

        let got: Vec<StreamId> = s.range(StreamId::new(1, 0), StreamId::new(2, 0)).iter().map(|e| e.id).collect();
        assert_eq!(got, vec![StreamId::new(1, 0), StreamId::new(2, 0)]);
    }

    #[test]
    fn after_excludes_the_given_id() {
        let mut s = Stream::new();
        s.add(IdSpec::Explicit(StreamId::new(1, 0)), fields(&[("a", "1")]), 0).unwrap();
        s.add(IdSpec::Explicit(StreamId::new(2, 0)), fields(&[("a", "2")]), 0).unwrap();

        let got: Vec<StreamId> = s.after(StreamId::new(1, 0)).iter().map(|e| e.id).collect();
        assert_eq!(got, vec![StreamId::new(2, 0)]);
    }
}
