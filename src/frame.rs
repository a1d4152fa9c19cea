//! RESP2 frame representation, decoding and encoding.

use bytes::{Buf, Bytes};
use std::convert::TryInto;
use std::fmt;
use std::io::Cursor;
use std::num::TryFromIntError;
use std::string::FromUtf8Error;

/// A single RESP2 value, either a parsed client command or a server reply.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    NullArray,
    Array(Vec<Frame>),
}

impl Frame {
    /// Returns an empty array frame, to be filled with `push_bulk`/`push_int`.
    pub fn array() -> Frame {
        Frame::Array(vec![])
    }

    pub fn push_bulk(&mut self, bytes: Bytes) {
        match self {
            Frame::Array(vec) => vec.push(Frame::Bulk(bytes)),
            _ => panic!("not an array frame"),
        }
    }

    pub fn push_int(&mut self, value: i64) {
        match self {
            Frame::Array(vec) => vec.push(Frame::Integer(value)),
            _ => panic!("not an array frame"),
        }
    }

    pub fn push_frame(&mut self, frame: Frame) {
        match self {
            Frame::Array(vec) => vec.push(frame),
            _ => panic!("not an array frame"),
        }
    }

    /// Checks whether a complete frame can be decoded from `src` without
    /// advancing it. Used by the connection buffer to know when to read more.
    pub fn check(src: &mut Cursor<&[u8]>) -> Result<(), FrameError> {
        match get_u8(src)? {
            b'+' | b'-' => {
                get_line(src)?;
                Ok(())
            }
            b':' => {
                let _ = get_decimal(src)?;
                Ok(())
            }
            b'$' => {
                if peek_u8(src)? == b'-' {
                    skip(src, 4)
                } else {
                    let len: usize = get_decimal(src)?
                        .try_into()
                        .map_err(|e: TryFromIntError| FrameError::Invalid(e.to_string()))?;
                    skip(src, len + 2)
                }
            }
            b'*' => {
                if peek_u8(src)? == b'-' {
                    return skip(src, 4);
                }
                let len = get_decimal(src)?;
                for _ in 0..len {
                    Frame::check(src)?;
                }
                Ok(())
            }
            actual => Err(FrameError::InvalidType(actual)),
        }
    }

    /// Decodes one frame from `src`, assuming `check` has already succeeded.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, FrameError> {
        match get_u8(src)? {
            b'+' => {
                let line = get_line(src)?.to_vec();
                let string = String::from_utf8(line)?;
                Ok(Frame::Simple(string))
            }
            b'-' => {
                let line = get_line(src)?.to_vec();
                let string = String::from_utf8(line)?;
                Ok(Frame::Error(string))
            }
            b':' => Ok(Frame::Integer(get_decimal(src)?)),
            b'$' => {
                if peek_u8(src)? == b'-' {
                    skip(src, 4)?;
                    Ok(Frame::Null)
                } else {
                    let len = get_decimal(src)?
                        .try_into()
                        .map_err(|e: TryFromIntError| FrameError::Invalid(e.to_string()))?;
                    let n = len + 2;
                    if src.remaining() < n {
                        return Err(FrameError::Incomplete);
                    }
                    let data = Bytes::copy_from_slice(&src.chunk()[..len]);
                    skip(src, n)?;
                    Ok(Frame::Bulk(data))
                }
            }
            b'*' => {
                if peek_u8(src)? == b'-' {
                    skip(src, 4)?;
                    return Ok(Frame::NullArray);
                }
                let len: usize = get_decimal(src)?
                    .try_into()
                    .map_err(|e: TryFromIntError| FrameError::Invalid(e.to_string()))?;
                let mut out = Vec::with_capacity(len);
                for _ in 0..len {
                    out.push(Frame::parse(src)?);
                }
                Ok(Frame::Array(out))
            }
            actual => Err(FrameError::InvalidType(actual)),
        }
    }

    /// Serializes this frame to its RESP2 wire form.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => {
                out.push(b'+');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Frame::Error(s) => {
                out.push(b'-');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Frame::Integer(n) => {
                out.push(b':');
                out.extend_from_slice(n.to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Frame::Bulk(bytes) => {
                out.push(b'$');
                out.extend_from_slice(bytes.len().to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
                out.extend_from_slice(bytes);
                out.extend_from_slice(b"\r\n");
            }
            Frame::Null => out.extend_from_slice(b"$-1\r\n"),
            Frame::NullArray => out.extend_from_slice(b"*-1\r\n"),
            Frame::Array(items) => {
                out.push(b'*');
                out.extend_from_slice(items.len().to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
                for item in items {
                    item.write_into(out);
                }
            }
        }
    }

    /// Extracts `(name, args)` from a decoded command array.
    pub fn parse_command(self) -> Result<(String, Vec<Bytes>), FrameError> {
        let items = match self {
            Frame::Array(items) => items,
            _ => return Err(FrameError::NotAnArray),
        };
        let mut iter = items.into_iter();
        let name = match iter.next() {
            Some(Frame::Bulk(bytes)) => String::from_utf8(bytes.to_vec())?,
            Some(Frame::Simple(s)) => s,
            _ => return Err(FrameError::EmptyCommand),
        };
        let mut args = Vec::new();
        for item in iter {
            match item {
                Frame::Bulk(bytes) => args.push(bytes),
                Frame::Simple(s) => args.push(Bytes::from(s.into_bytes())),
                Frame::Integer(n) => args.push(Bytes::from(n.to_string().into_bytes())),
                _ => return Err(FrameError::Invalid("command argument must be a bulk string".into())),
            }
        }
        Ok((name, args))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Frame::Simple(s) => s.fmt(f),
            Frame::Error(s) => write!(f, "error: {}", s),
            Frame::Integer(n) => n.fmt(f),
            Frame::Bulk(b) => match std::str::from_utf8(b) {
                Ok(s) => s.fmt(f),
                Err(_) => write!(f, "{:?}", b),
            },
            Frame::Null | Frame::NullArray => "(nil)".fmt(f),
            Frame::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    item.fmt(f)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("stream ended early")]
    Incomplete,
    #[error("invalid frame type byte `{0}`")]
    InvalidType(u8),
    #[error("invalid frame: {0}")]
    Invalid(String),
    #[error("protocol error; expected array frame")]
    NotAnArray,
    #[error("protocol error; empty command array")]
    EmptyCommand,
    #[error("protocol error; invalid frame encoding: {0}")]
    Utf8(#[from] FromUtf8Error),
}

fn peek_u8(src: &mut Cursor<&[u8]>) -> Result<u8, FrameError> {
    if !src.has_remaining() {
        return Err(FrameError::Incomplete);
    }
    Ok(src.chunk()[0])
}

fn get_u8(src: &mut Cursor<&[u8]>) -> Result<u8, FrameError> {
    if !src.has_remaining() {
        return Err(FrameError::Incomplete);
    }
    Ok(src.get_u8())
}

fn skip(src: &mut Cursor<&[u8]>, n: usize) -> Result<(), FrameError> {
    if src.remaining() < n {
        return Err(FrameError::Incomplete);
    }
    src.advance(n);
    Ok(())
}

fn get_decimal(src: &mut Cursor<&[u8]>) -> Result<i64, FrameError> {
    let line = get_line(src)?;
    atoi::atoi::<i64>(line).ok_or_else(|| FrameError::Invalid("invalid number".into()))
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], FrameError> {
    let start = src.position() as usize;
    let buf = src.get_ref();
    let end = buf.len() - 1;

    for i in start..end {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            let line = &buf[start..i];
            src.set_position((i + 2) as u64);
            return Ok(line);
        }
    }

    Err(FrameError::Incomplete)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(frame: &Frame) -> Frame {
        let bytes = frame.serialize();
        let mut cursor = Cursor::new(&bytes[..]);
        Frame::check(&mut cursor).unwrap();
        cursor.set_position(0);
        Frame::parse(&mut cursor).unwrap()
    }

    #[test]
    fn simple_string_roundtrips() {
        let frame = Frame::Simple("OK".to_string());
        assert_eq!(frame.serialize(), b"+OK\r\n");
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn error_roundtrips() {
        let frame = Frame::Error("ERR boom".to_string());
        assert_eq!(frame.serialize(), b"-ERR boom\r\n");
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn bulk_string_roundtrips() {
        let frame = Frame::Bulk(Bytes::from_static(b"hello"));
        assert_eq!(frame.serialize(), b"$5\r\nhello\r\n");
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn null_bulk_serializes_and_parses() {
        assert_eq!(Frame::Null.serialize(), b"$-1\r\n");
        assert_eq!(roundtrip(&Frame::Null), Frame::Null);
    }

    #[test]
    fn null_array_serializes_and_parses() {
        assert_eq!(Frame::NullArray.serialize(), b"*-1\r\n");
        assert_eq!(roundtrip(&Frame::NullArray), Frame::NullArray);
    }

    #[test]
    fn array_of_bulk_strings_roundtrips() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from_static(b"SET")),
            Frame::Bulk(Bytes::from_static(b"k")),
            Frame::Bulk(Bytes::from_static(b"v")),
        ]);
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn check_reports_incomplete_on_a_truncated_bulk_string() {
        let mut cursor = Cursor::new(&b"$5\r\nhel"[..]);
        assert!(matches!(Frame::check(&mut cursor), Err(FrameError::Incomplete)));
    }

    #[test]
    fn check_rejects_an_unknown_type_byte() {
        let mut cursor = Cursor::new(&b"!weird\r\n"[..]);
        assert!(matches!(Frame::check(&mut cursor), Err(FrameError::InvalidType(b'!'))));
    }

    #[test]
    fn parse_command_splits_name_and_args() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from_static(b"GET")),
            Frame::Bulk(Bytes::from_static(b"mykey")),
        ]);
        let (name, args) = frame.parse_command().unwrap();
        assert_eq!(name, "GET");
        assert_eq!(args, vec![Bytes::from_static(b"mykey")]);
    }

    #[test]
    fn parse_command_rejects_a_non_array_frame() {
        let err = Frame::Simple("PING".to_string()).parse_command().unwrap_err();
        assert!(matches!(err, FrameError::NotAnArray));
    }

    #[test]
    fn parse_command_rejects_an_empty_array() {
        let err = Frame::Array(vec![]).parse_command().unwrap_err();
        assert!(matches!(err, FrameError::EmptyCommand));
    }
}
