//! RESP (REdis Serialization Protocol) wire codec.
//!
//! Five type tags: `+` simple string, `-` error, `:` integer, `$` bulk
//! string, `*` array. Every frame is CRLF-terminated. The parser is
//! non-streaming: it reads at most one complete frame from the front of a
//! contiguous byte buffer and reports "incomplete" (`Ok(None)`) distinctly
//! from "malformed" (`Err`), so the reactor can keep waiting for more bytes
//! on `Ok(None)` without tearing down the connection.

use crate::error::ServerError;

#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(Option<String>),
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    pub fn serialize(&self) -> String {
        match self {
            RespValue::SimpleString(s) => format!("+{}\r\n", s),
            RespValue::Error(msg) => format!("-{}\r\n", msg),
            RespValue::Integer(i) => format!(":{}\r\n", i),
            RespValue::BulkString(val) => match val {
                Some(s) => format!("${}\r\n{}\r\n", s.len(), s),
                None => "$-1\r\n".to_string(),
            },
            RespValue::Array(val) => match val {
                Some(arr) => {
                    let mut res = format!("*{}\r\n", arr.len());
                    for v in arr {
                        res.push_str(&v.serialize());
                    }
                    res
                }
                None => "*-1\r\n".to_string(),
            },
        }
    }

    /// Convenience constructor for an empty array reply.
    pub fn empty_array() -> RespValue {
        RespValue::Array(Some(Vec::new()))
    }

    /// Convenience constructor for a nil bulk string reply.
    pub fn nil() -> RespValue {
        RespValue::BulkString(None)
    }
}

pub struct RespHandler {}

impl Default for RespHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RespHandler {
    pub fn new() -> Self {
        RespHandler {}
    }

    /// Read a line ending with CRLF. Returns the line content and the
    /// number of bytes consumed (including the terminator).
    fn read_line(buffer: &[u8]) -> Option<(String, usize)> {
        if buffer.len() < 2 {
            return None;
        }
        for i in 0..buffer.len() - 1 {
            if buffer[i] == b'\r' && buffer[i + 1] == b'\n' {
                let line = String::from_utf8_lossy(&buffer[0..i]).to_string();
                return Some((line, i + 2));
            }
        }
        None
    }

    fn parse_int(buffer: &[u8]) -> Result<Option<(i64, usize)>, ServerError> {
        match Self::read_line(buffer) {
            None => Ok(None),
            Some((line, len)) => line
                .parse::<i64>()
                .map(|val| Some((val, len)))
                .map_err(|_| ServerError::ArgumentError(format!("invalid integer: {line}"))),
        }
    }

    /// Parse one complete RESP frame from the front of `buffer`.
    ///
    /// `Ok(Some((value, consumed)))` on a complete frame, `Ok(None)` when the
    /// buffer doesn't yet hold a complete frame, `Err` when the bytes present
    /// are not a valid frame prefix at all.
    pub fn parse_request(buffer: &[u8]) -> Result<Option<(RespValue, usize)>, ServerError> {
        if buffer.is_empty() {
            return Ok(None);
        }

        match buffer[0] {
            b'+' => Ok(Self::read_line(&buffer[1..])
                .map(|(line, len)| (RespValue::SimpleString(line), len + 1))),
            b'-' => {
                Ok(Self::read_line(&buffer[1..]).map(|(line, len)| (RespValue::Error(line), len + 1)))
            }
            b':' => Ok(Self::parse_int(&buffer[1..])?.map(|(val, len)| (RespValue::Integer(val), len + 1))),
            b'$' => {
                let Some((len_val, len_bytes)) = Self::parse_int(&buffer[1..])? else {
                    return Ok(None);
                };
                let start = 1 + len_bytes;
                if len_val == -1 {
                    return Ok(Some((RespValue::BulkString(None), start)));
                }
                if len_val < 0 {
                    return Err(ServerError::ArgumentError("negative bulk length".into()));
                }
                let str_len = len_val as usize;
                if buffer.len() >= start + str_len + 2 {
                    let str_val =
                        String::from_utf8_lossy(&buffer[start..start + str_len]).to_string();
                    Ok(Some((
                        RespValue::BulkString(Some(str_val)),
                        start + str_len + 2,
                    )))
                } else {
                    Ok(None)
                }
            }
            b'*' => {
                let Some((count, len_bytes)) = Self::parse_int(&buffer[1..])? else {
                    return Ok(None);
                };
                let mut current_pos = 1 + len_bytes;
                if count == -1 {
                    return Ok(Some((RespValue::Array(None), current_pos)));
                }
                if count < 0 {
                    return Err(ServerError::ArgumentError("negative array length".into()));
                }

                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    match Self::parse_request(&buffer[current_pos..])? {
                        Some((item, len)) => {
                            items.push(item);
                            current_pos += len;
                        }
                        None => return Ok(None),
                    }
                }
                Ok(Some((RespValue::Array(Some(items)), current_pos)))
            }
            _ => {
                // Inline command (simple space-separated like "GET key"), kept
                // for telnet-style interactive use.
                match Self::read_line(buffer) {
                    Some((line, len)) => {
                        let args: Vec<RespValue> = line
                            .split_whitespace()
                            .map(|s| RespValue::BulkString(Some(s.to_string())))
                            .collect();
                        Ok(Some((RespValue::Array(Some(args)), len)))
                    }
                    None => Ok(None),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_simple_string() {
        let val = RespValue::SimpleString("OK".to_string());
        assert_eq!(val.serialize(), "+OK\r\n");
    }

    #[test]
    fn test_serialize_error() {
        let val = RespValue::Error("Error message".to_string());
        assert_eq!(val.serialize(), "-Error message\r\n");
    }

    #[test]
    fn test_serialize_integer() {
        let val = RespValue::Integer(1000);
        assert_eq!(val.serialize(), ":1000\r\n");
    }

    #[test]
    fn test_serialize_bulk_string() {
        let val = RespValue::BulkString(Some("hello".to_string()));
        assert_eq!(val.serialize(), "$5\r\nhello\r\n");

        let null_val = RespValue::BulkString(None);
        assert_eq!(null_val.serialize(), "$-1\r\n");
    }

    #[test]
    fn test_serialize_array() {
        let val = RespValue::Array(Some(vec![
            RespValue::BulkString(Some("hello".to_string())),
            RespValue::BulkString(Some("world".to_string())),
        ]));
        assert_eq!(val.serialize(), "*2\r\n$5\r\nhello\r\n$5\r\nworld\r\n");

        let null_arr = RespValue::Array(None);
        assert_eq!(null_arr.serialize(), "*-1\r\n");
    }

    #[test]
    fn test_parse_array() {
        let data = b"*2\r\n$5\r\nhello\r\n$5\r\nworld\r\n";
        let (val, len) = RespHandler::parse_request(data).unwrap().unwrap();

        assert_eq!(len, data.len());
        match val {
            RespValue::Array(Some(items)) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0], RespValue::BulkString(Some("hello".to_string())));
                assert_eq!(items[1], RespValue::BulkString(Some("world".to_string())));
            }
            _ => panic!("Expected Array"),
        }
    }

    #[test]
    fn test_parse_inline() {
        let data = b"SET key value\r\n";
        let (val, len) = RespHandler::parse_request(data).unwrap().unwrap();

        assert_eq!(len, data.len());
        match val {
            RespValue::Array(Some(items)) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0], RespValue::BulkString(Some("SET".to_string())));
                assert_eq!(items[1], RespValue::BulkString(Some("key".to_string())));
                assert_eq!(items[2], RespValue::BulkString(Some("value".to_string())));
            }
            _ => panic!("Expected Array"),
        }
    }

    #[test]
    fn test_parse_incomplete_bulk_string() {
        let data = b"$5\r\nhel";
        let result = RespHandler::parse_request(data).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_parse_incomplete_array() {
        let data = b"*2\r\n$5\r\nhello\r\n";
        let result = RespHandler::parse_request(data).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_parse_nil_bulk_string() {
        let data = b"$-1\r\n";
        let (val, len) = RespHandler::parse_request(data).unwrap().unwrap();
        assert_eq!(len, data.len());
        assert_eq!(val, RespValue::BulkString(None));
    }

    #[test]
    fn test_parse_malformed_integer() {
        let data = b":notanumber\r\n";
        let result = RespHandler::parse_request(data);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_empty_buffer() {
        let result = RespHandler::parse_request(b"").unwrap();
        assert!(result.is_none());
    }
}
