use super::Frame;

impl Frame {
    /// Encodes this frame to its exact wire representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Frame::Simple(s) => encode_simple_string(s),
            Frame::Error(s) => encode_error(s),
            Frame::Integer(n) => encode_integer(*n),
            Frame::Bulk(b) => encode_bulk_string(b),
            Frame::Null => encode_null_bulk_string(),
            Frame::NullArray => encode_null_array(),
            Frame::Array(items) => {
                let mut bytes = format!("*{}\r\n", items.len()).into_bytes();
                for item in items {
                    bytes.extend(item.to_bytes());
                }
                bytes
            }
        }
    }
}

pub fn encode_simple_string(s: &str) -> Vec<u8> {
    format!("+{s}\r\n").into_bytes()
}

pub fn encode_error(s: &str) -> Vec<u8> {
    format!("-{s}\r\n").into_bytes()
}

pub fn encode_integer(n: i64) -> Vec<u8> {
    format!(":{n}\r\n").into_bytes()
}

pub fn encode_bulk_string(s: &[u8]) -> Vec<u8> {
    let mut bytes = format!("${}\r\n", s.len()).into_bytes();
    bytes.extend_from_slice(s);
    bytes.extend_from_slice(b"\r\n");
    bytes
}

pub fn encode_null_bulk_string() -> Vec<u8> {
    b"$-1\r\n".to_vec()
}

pub fn encode_null_array() -> Vec<u8> {
    b"*-1\r\n".to_vec()
}

/// Encodes a command's argv as the RESP array-of-bulk-strings every inbound
/// command and every propagated write is shaped as.
pub fn encode_command(argv: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = format!("*{}\r\n", argv.len()).into_bytes();
    for arg in argv {
        bytes.extend(encode_bulk_string(arg));
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_simple_string() {
        assert_eq!(encode_simple_string("OK"), b"+OK\r\n");
    }

    #[test]
    fn encodes_error() {
        assert_eq!(encode_error("ERR boom"), b"-ERR boom\r\n");
    }

    #[test]
    fn encodes_integer() {
        assert_eq!(encode_integer(42), b":42\r\n");
        assert_eq!(encode_integer(-1), b":-1\r\n");
    }

    #[test]
    fn encodes_bulk_string() {
        assert_eq!(encode_bulk_string(b"hello"), b"$5\r\nhello\r\n");
    }

    #[test]
    fn encodes_null_bulk_string() {
        assert_eq!(encode_null_bulk_string(), b"$-1\r\n");
    }

    #[test]
    fn encodes_command_array() {
        let argv = vec![b"SET".to_vec(), b"k".to_vec(), b"v".to_vec()];
        assert_eq!(encode_command(&argv), b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n");
    }

    #[test]
    fn round_trips_through_decoder() {
        use crate::resp::Decoder;

        let argv = vec![b"XADD".to_vec(), b"s".to_vec(), b"1-1".to_vec(), b"f".to_vec(), b"v".to_vec()];
        let bytes = encode_command(&argv);

        let mut dec = Decoder::new();
        dec.feed(&bytes);
        let frame = dec.try_decode().unwrap().unwrap();
        assert_eq!(frame.into_command().unwrap(), argv);
    }
}
