use crate::status::ParseError;
use std::{error, fmt, io};

/// An error that prevented a pipelining check from reaching a verdict.
///
/// This is distinct from a verdict of `false`: a server that does not support pipelining
/// produces `Ok(false)`, whereas an `Error` means support could not be determined at all.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The URL to check could not be parsed.
    InvalidUrl(url::ParseError),

    /// The URL scheme is neither `http` nor `https`.
    UnsupportedScheme(String),

    /// No host name was given, so no `Host` header can be sent.
    MissingHost,

    /// The TCP connection to the server could not be established.
    Connect(io::Error),

    /// TLS setup or the TLS handshake failed.
    Tls(String),

    /// The check did not finish within the configured deadline.
    Timeout,

    /// The request with the given id could not be written to the stream.
    ///
    /// Requests are flushed together after the last one is written, so a failed flush is
    /// attributed to the last request.
    Write {
        /// Id of the request that failed.
        id: usize,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The response to the request with the given id could not be read.
    ///
    /// The server sent something that is not a well-formed response.
    MalformedResponse {
        /// Id of the request whose response was malformed.
        id: usize,
        /// What was wrong with it.
        source: ParseError,
    },

    /// A prober was asked about a request id it never issues.
    UnknownRequest(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::InvalidUrl(ref e) => write!(f, "invalid URL: {}", e),
            Error::UnsupportedScheme(ref s) => write!(f, "unsupported scheme: {}", s),
            Error::MissingHost => f.pad("no host to check"),
            Error::Connect(ref e) => write!(f, "failed to connect: {}", e),
            Error::Tls(ref e) => write!(f, "TLS error: {}", e),
            Error::Timeout => f.pad("pipelining check timed out"),
            Error::Write { id, ref source } => {
                write!(f, "failed to write request {}: {}", id, source)
            }
            Error::MalformedResponse { id, ref source } => {
                write!(f, "malformed response to request {}: {}", id, source)
            }
            Error::UnknownRequest(id) => write!(f, "no probe request with id {}", id),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::InvalidUrl(ref e) => Some(e),
            Error::Connect(ref e) => Some(e),
            Error::Write { ref source, .. } => Some(source),
            Error::MalformedResponse { ref source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Error {
    pub(crate) fn write(id: usize, e: io::Error) -> Self {
        Error::Write { id, source: e }
    }

    pub(crate) fn malformed(id: usize, e: ParseError) -> Self {
        Error::MalformedResponse { id, source: e }
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::InvalidUrl(e)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}
