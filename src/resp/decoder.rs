use bytes::{Buf, BytesMut};

use crate::error::ProtocolError;

use super::Frame;

/// Incremental RESP decoder.
///
/// Bytes arrive via [`feed`](Decoder::feed) as they are read off the socket.
/// [`try_decode`](Decoder::try_decode) pulls at most one complete top-level
/// frame out of the internal buffer, leaving a partial frame untouched for
/// the next call — a connection task calls it in a loop after every read.
#[derive(Debug, Default)]
pub struct Decoder {
    buf: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Attempts to decode one frame. `Ok(None)` means the buffer holds a
    /// partial frame (or nothing at all) and the caller should read more.
    pub fn try_decode(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Ok(self.try_decode_with_len()?.map(|(frame, _)| frame))
    }

    /// Same as [`try_decode`](Decoder::try_decode), but also returns the
    /// exact number of bytes the frame occupied on the wire. A replica
    /// replay loop needs this to keep its applied-offset counter in lockstep
    /// with the master's, independent of how it later re-encodes the frame.
    pub fn try_decode_with_len(&mut self) -> Result<Option<(Frame, usize)>, ProtocolError> {
        match parse(&self.buf)? {
            Some((frame, consumed)) => {
                self.buf.advance(consumed);
                Ok(Some((frame, consumed)))
            }
            None => Ok(None),
        }
    }
}

/// Finds the `\r\n` terminating the header line starting at `buf[0]`,
/// returning the index of the `\r`.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parses one frame from `buf`. Returns `Ok(None)` when `buf` holds a prefix
/// of a valid frame rather than a complete one — never an error, since more
/// bytes may still be on their way.
fn parse(buf: &[u8]) -> Result<Option<(Frame, usize)>, ProtocolError> {
    let Some(&tag) = buf.first() else {
        return Ok(None);
    };

    match tag {
        b'+' => parse_line(buf, 1).map(|opt| opt.map(|(s, n)| (Frame::Simple(s), n))),
        b'-' => parse_line(buf, 1).map(|opt| opt.map(|(s, n)| (Frame::Error(s), n))),
        b':' => parse_integer(buf),
        b'$' => parse_bulk(buf),
        b'*' => parse_array(buf),
        other => Err(ProtocolError::UnknownType(other)),
    }
}

/// Parses a `<tag><text>\r\n` line, returning the text after `tag` bytes and
/// the total number of bytes consumed.
fn parse_line(buf: &[u8], skip: usize) -> Result<Option<(String, usize)>, ProtocolError> {
    let Some(crlf) = find_crlf(buf) else {
        return Ok(None);
    };
    let text = String::from_utf8_lossy(&buf[skip..crlf]).into_owned();
    Ok(Some((text, crlf + 2)))
}

fn parse_decimal_line(buf: &[u8], skip: usize) -> Result<Option<(i64, usize)>, ProtocolError> {
    match parse_line(buf, skip)? {
        Some((text, consumed)) => {
            let value = text.trim().parse::<i64>().map_err(|_| ProtocolError::BadLength)?;
            Ok(Some((value, consumed)))
        }
        None => Ok(None),
    }
}

fn parse_integer(buf: &[u8]) -> Result<Option<(Frame, usize)>, ProtocolError> {
    Ok(parse_decimal_line(buf, 1)?.map(|(n, consumed)| (Frame::Integer(n), consumed)))
}

fn parse_bulk(buf: &[u8]) -> Result<Option<(Frame, usize)>, ProtocolError> {
    let Some((len, header_len)) = parse_decimal_line(buf, 1)? else {
        return Ok(None);
    };

    if len < 0 {
        // `$-1\r\n`: nil bulk string, no payload follows.
        return Ok(Some((Frame::Null, header_len)));
    }
    let len = len as usize;

    let body_start = header_len;
    let body_end = body_start + len;
    let total = body_end + 2; // trailing CRLF
    if buf.len() < total {
        return Ok(None);
    }
    if &buf[body_end..total] != b"\r\n" {
        return Err(ProtocolError::BadLength);
    }

    let payload = buf[body_start..body_end].to_vec();
    Ok(Some((Frame::Bulk(payload), total)))
}

fn parse_array(buf: &[u8]) -> Result<Option<(Frame, usize)>, ProtocolError> {
    let Some((count, header_len)) = parse_decimal_line(buf, 1)? else {
        return Ok(None);
    };

    if count < 0 {
        // `*-1\r\n`: nil array.
        return Ok(Some((Frame::NullArray, header_len)));
    }

    let mut offset = header_len;
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        match parse(&buf[offset..])? {
            Some((frame, consumed)) => {
                offset += consumed;
                items.push(frame);
            }
            None => return Ok(None),
        }
    }
    Ok(Some((Frame::Array(items), offset)))
}
