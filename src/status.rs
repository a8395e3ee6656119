//! Just enough HTTP/1.1 response parsing to walk a stream of pipelined responses.
//!
//! Each call consumes exactly one response: the status line, the header block, and as many body
//! bytes as the first `Content-Length` header declares. Nothing more is interpreted. In
//! particular, there is no support for chunked transfer coding or for bodies delimited by the
//! connection closing; a response without `Content-Length` is taken to have an empty body.

use std::{error, fmt, io};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Longest status or header line accepted, terminator included.
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// A single response as it appeared on the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Response {
    /// The status code from the status line.
    pub status: u16,

    /// Number of bytes the response occupied: status line, headers, and body.
    pub len: u64,
}

/// An error that occurred while reading a response off the stream.
#[derive(Debug)]
#[non_exhaustive]
pub enum ParseError {
    /// The stream ended before the first byte of the response.
    ///
    /// This is how a server that hangs up between responses looks, and is usually not a protocol
    /// error.
    Closed,

    /// The stream ended part way through the response.
    UnexpectedEof,

    /// The status line was not of the form `HTTP/1.1 <code> [reason]`.
    InvalidStatusLine,

    /// The value of the `Content-Length` header was not a decimal length.
    InvalidContentLength,

    /// A status or header line exceeded [`MAX_LINE_LEN`].
    LineTooLong,

    /// Reading from the underlying stream failed.
    Io(io::Error),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ParseError::Closed => f.pad("connection closed before the response"),
            ParseError::UnexpectedEof => f.pad("connection closed in the middle of a response"),
            ParseError::InvalidStatusLine => f.pad("malformed status line"),
            ParseError::InvalidContentLength => f.pad("malformed Content-Length header"),
            ParseError::LineTooLong => f.pad("response line too long"),
            ParseError::Io(ref e) => write!(f, "failed to read response: {}", e),
        }
    }
}

impl error::Error for ParseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            ParseError::Io(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ParseError {
    fn from(e: io::Error) -> Self {
        ParseError::Io(e)
    }
}

/// Read one response from `r` and return its status code.
///
/// See [`read_response`].
pub async fn read_status<R>(r: &mut R) -> Result<u16, ParseError>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    read_response(r).await.map(|res| res.status)
}

/// Read one response from `r`.
///
/// On success the reader is left at the first byte after the response body, which is where the
/// next pipelined response starts. If `r` is already at end-of-stream, this returns
/// [`ParseError::Closed`].
pub async fn read_response<R>(r: &mut R) -> Result<Response, ParseError>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut line = Vec::with_capacity(128);

    let mut len = read_line(r, &mut line).await?;
    if len == 0 {
        return Err(ParseError::Closed);
    }
    let status = parse_status_line(&line)?;

    let mut content_length = None;
    loop {
        let n = read_line(r, &mut line).await?;
        if n == 0 {
            return Err(ParseError::UnexpectedEof);
        }
        len += n;

        if line == b"\r\n" || line == b"\n" {
            break;
        }
        // only the first Content-Length counts
        if content_length.is_none() {
            content_length = parse_content_length(&line)?;
        }
    }

    let body = content_length.unwrap_or(0);
    let discarded = tokio::io::copy_buf(&mut (&mut *r).take(body), &mut tokio::io::sink()).await?;
    if discarded < body {
        return Err(ParseError::UnexpectedEof);
    }
    len += body;

    tracing::trace!(status, len, "parsed response");
    Ok(Response { status, len })
}

/// Read up to and including the next `\n` into `line`, replacing its contents.
///
/// Returns the number of bytes read, which is zero only at end-of-stream.
async fn read_line<R>(r: &mut R, line: &mut Vec<u8>) -> Result<u64, ParseError>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    line.clear();
    let n = (&mut *r)
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', line)
        .await?;

    if n != 0 && line.last() != Some(&b'\n') {
        if n == MAX_LINE_LEN {
            return Err(ParseError::LineTooLong);
        }
        return Err(ParseError::UnexpectedEof);
    }
    Ok(n as u64)
}

fn parse_status_line(line: &[u8]) -> Result<u16, ParseError> {
    let rest = line
        .strip_prefix(b"HTTP/1.1 ")
        .ok_or(ParseError::InvalidStatusLine)?;

    let (code, tail) = match rest {
        [a, b, c, tail @ ..] if [a, b, c].iter().all(|d| d.is_ascii_digit()) => {
            (u16::from(a - b'0') * 100 + u16::from(b - b'0') * 10 + u16::from(c - b'0'), tail)
        }
        _ => return Err(ParseError::InvalidStatusLine),
    };

    match tail.first() {
        Some(b' ') | Some(b'\r') | Some(b'\n') => Ok(code),
        _ => Err(ParseError::InvalidStatusLine),
    }
}

/// Returns `Ok(None)` if `line` is some other header.
fn parse_content_length(line: &[u8]) -> Result<Option<u64>, ParseError> {
    const NAME: &[u8] = b"content-length:";

    if line.len() < NAME.len() || !line[..NAME.len()].eq_ignore_ascii_case(NAME) {
        return Ok(None);
    }

    let value = line[NAME.len()..].trim_ascii();
    if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
        return Err(ParseError::InvalidContentLength);
    }

    // all ASCII digits, so this is valid UTF-8; only overflow can fail
    std::str::from_utf8(value)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Some)
        .ok_or(ParseError::InvalidContentLength)
}
