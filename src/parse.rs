//! Cursor over an already-decoded command's arguments.

use crate::frame::Frame;
use bytes::Bytes;
use std::fmt;
use std::vec;

/// Walks the elements of a `Frame::Array`, yielding typed fields one at a
/// time the way the teacher's command handlers expect.
pub struct Parse {
    parts: vec::IntoIter<Frame>,
}

#[derive(Debug)]
pub enum ParseError {
    /// Attempted to extract a field past the end of the array.
    EndOfStream,
    Other(String),
}

impl Parse {
    pub fn new(frame: Frame) -> Result<Parse, ParseError> {
        let array = match frame {
            Frame::Array(array) => array,
            frame => return Err(format!("protocol error; expected array, got {:?}", frame).into()),
        };
        Ok(Parse {
            parts: array.into_iter(),
        })
    }

    fn next(&mut self) -> Result<Frame, ParseError> {
        self.parts.next().ok_or(ParseError::EndOfStream)
    }

    pub fn next_string(&mut self) -> Result<String, ParseError> {
        match self.next()? {
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(data) => std::str::from_utf8(&data[..])
                .map(|s| s.to_string())
                .map_err(|_| "protocol error; invalid string".into()),
            frame => Err(format!(
                "protocol error; expected simple or bulk frame, got {:?}",
                frame
            )
            .into()),
        }
    }

    /// Like `next_string`, but never rejects invalid UTF-8: used for keys,
    /// which (like in real Redis) are opaque byte strings, not text.
    /// Invalid byte sequences are replaced with U+FFFD rather than erroring.
    pub fn next_key(&mut self) -> Result<String, ParseError> {
        match self.next()? {
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            frame => Err(format!(
                "protocol error; expected simple or bulk frame, got {:?}",
                frame
            )
            .into()),
        }
    }

    pub fn next_bytes(&mut self) -> Result<Bytes, ParseError> {
        match self.next()? {
            Frame::Simple(s) => Ok(Bytes::from(s.into_bytes())),
            Frame::Bulk(data) => Ok(data),
            frame => Err(format!(
                "protocol error; expected simple or bulk frame, got {:?}",
                frame
            )
            .into()),
        }
    }

    pub fn next_int(&mut self) -> Result<i64, ParseError> {
        const MSG: &str = "protocol error; invalid number";
        match self.next()? {
            Frame::Integer(n) => Ok(n),
            Frame::Simple(s) => atoi::atoi::<i64>(s.as_bytes()).ok_or_else(|| MSG.into()),
            Frame::Bulk(data) => atoi::atoi::<i64>(&data).ok_or_else(|| MSG.into()),
            frame => Err(format!("protocol error; expected int frame, got {:?}", frame).into()),
        }
    }

    /// Errors if there are any fields left unconsumed.
    pub fn finish(&mut self) -> Result<(), ParseError> {
        if self.parts.next().is_none() {
            Ok(())
        } else {
            Err("protocol error; expected end of frame, but more was present".into())
        }
    }

    /// Same as `finish`, named to match call sites that only want the check.
    pub fn check_finish(&mut self) -> bool {
        self.parts.next().is_none()
    }
}

impl From<String> for ParseError {
    fn from(src: String) -> ParseError {
        ParseError::Other(src)
    }
}

impl From<&str> for ParseError {
    fn from(src: &str) -> ParseError {
        src.to_string().into()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::EndOfStream => "protocol error; unexpected end of stream".fmt(f),
            ParseError::Other(msg) => msg.fmt(f),
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_of(frames: Vec<Frame>) -> Parse {
        Parse::new(Frame::Array(frames)).unwrap()
    }

    #[test]
    fn next_string_reads_bulk_and_simple_frames() {
        let mut p = parse_of(vec![
            Frame::Bulk(Bytes::from_static(b"hello")),
            Frame::Simple("world".to_string()),
        ]);
        assert_eq!(p.next_string().unwrap(), "hello");
        assert_eq!(p.next_string().unwrap(), "world");
    }

    #[test]
    fn next_string_rejects_invalid_utf8() {
        let mut p = parse_of(vec![Frame::Bulk(Bytes::from_static(&[0xff, 0xfe]))]);
        assert!(matches!(p.next_string(), Err(ParseError::Other(_))));
    }

    #[test]
    fn next_key_accepts_invalid_utf8_lossily() {
        let mut p = parse_of(vec![Frame::Bulk(Bytes::from_static(&[0xff, 0xfe]))]);
        let key = p.next_key().unwrap();
        assert_eq!(key, "\u{fffd}\u{fffd}");
    }

    #[test]
    fn next_bytes_preserves_raw_bytes() {
        let mut p = parse_of(vec![Frame::Bulk(Bytes::from_static(&[0, 1, 2, 255]))]);
        assert_eq!(p.next_bytes().unwrap(), Bytes::from_static(&[0, 1, 2, 255]));
    }

    #[test]
    fn next_int_parses_bulk_and_integer_frames() {
        let mut p = parse_of(vec![Frame::Integer(42), Frame::Bulk(Bytes::from_static(b"-7"))]);
        assert_eq!(p.next_int().unwrap(), 42);
        assert_eq!(p.next_int().unwrap(), -7);
    }

    #[test]
    fn next_int_rejects_non_numeric_bulk() {
        let mut p = parse_of(vec![Frame::Bulk(Bytes::from_static(b"nope"))]);
        assert!(matches!(p.next_int(), Err(ParseError::Other(_))));
    }

    #[test]
    fn running_past_the_end_yields_end_of_stream() {
        let mut p = parse_of(vec![]);
        assert!(matches!(p.next_string(), Err(ParseError::EndOfStream)));
    }

    #[test]
    fn finish_errors_when_fields_remain() {
        let mut p = parse_of(vec![Frame::Bulk(Bytes::from_static(b"extra"))]);
        assert!(p.finish().is_err());
    }

    #[test]
    fn finish_succeeds_when_fully_consumed() {
        let mut p = parse_of(vec![Frame::Bulk(Bytes::from_static(b"only"))]);
        let _ = p.next_bytes().unwrap();
        assert!(p.finish().is_ok());
    }
}
