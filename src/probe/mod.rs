//! Probing a connection for HTTP/1.1 pipelining support.
//!
//! A probe writes every one of its requests to the connection, flushes them out together, and
//! only then starts reading responses. A server that supports pipelining answers each request in
//! turn, in the order the requests were sent. A server that does not will typically either hang
//! up after the first response, or answer out of order, or answer something else entirely.
//!
//! What the requests look like and which responses count as correct is up to a [`Prober`].
//! [`OptionsProber`] is the one used by [`supported`]; implement [`Prober`] yourself to probe
//! with different requests.

use crate::status::{self, ParseError};
use crate::wrappers::WriteOutcome;
use crate::Error;
use futures_util::future::{self, BoxFuture};
use std::io;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

mod options;
pub use self::options::OptionsProber;

/// A strategy for probing a connection for pipelining support.
///
/// A probe consists of [`num_requests`](Prober::num_requests) requests, identified by `0..n`.
/// [`write_request`](Prober::write_request) is called once for each id in ascending order, with
/// no responses read in between. After all requests have been flushed,
/// [`read_response`](Prober::read_response) is called once for each id, again in ascending
/// order.
pub trait Prober: Send + Sync {
    /// The number of requests used in the probe.
    fn num_requests(&self) -> usize;

    /// Write the request with the given id.
    ///
    /// This must write the same bytes every time it is called with the same `id`, and must not
    /// wait for anything to be read. There is no need to flush `w`.
    fn write_request<'a>(
        &'a self,
        id: usize,
        w: &'a mut (dyn AsyncWrite + Unpin + Send),
    ) -> BoxFuture<'a, io::Result<()>>;

    /// Read the response to the request with the given id, and report whether it is the response
    /// a server that correctly supports pipelining would send.
    ///
    /// Exactly one response must be consumed from `r`. If the connection was closed before or
    /// during the response, this should return `Ok(false)`; [`expect_status`] does all of this
    /// for the common case.
    fn read_response<'a>(
        &'a self,
        id: usize,
        r: &'a mut (dyn AsyncBufRead + Unpin + Send),
    ) -> BoxFuture<'a, Result<bool, Error>>;
}

/// Read one response from `r` and check that it has status `want`.
///
/// A connection that was closed before or part way through the response is reported as
/// `Ok(false)`, since that is what servers that do not support pipelining often do. Anything else
/// that prevents reading the response is an [`Error::MalformedResponse`].
pub async fn expect_status<R>(id: usize, r: &mut R, want: u16) -> Result<bool, Error>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    match status::read_status(r).await {
        Ok(got) => {
            if got != want {
                tracing::debug!(id, got, want, "unexpected status");
            }
            Ok(got == want)
        }
        Err(ParseError::Closed) => {
            tracing::debug!(id, "connection closed before response");
            Ok(false)
        }
        Err(ParseError::UnexpectedEof) => {
            tracing::debug!(id, "connection closed during response");
            Ok(false)
        }
        Err(e) => Err(Error::malformed(id, e)),
    }
}

/// Check whether the server at the other end of `stream` supports HTTP pipelining, using
/// [`OptionsProber`].
///
/// `host` is sent in the `Host` header and must not be empty.
pub async fn supported<S>(stream: &mut S, host: &str) -> Result<bool, Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    if host.is_empty() {
        return Err(Error::MissingHost);
    }
    probe(stream, &OptionsProber::new(host)).await
}

/// Probe `stream` for HTTP pipelining support using `prober`.
///
/// Returns `Ok(true)` if every response arrived in order and was the one `prober` expected. The
/// stream is not closed, but its state after the probe is unspecified.
pub async fn probe<S, P>(stream: &mut S, prober: &P) -> Result<bool, Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    P: Prober + ?Sized,
{
    let n = prober.num_requests();
    if n == 0 {
        return Ok(true);
    }

    let (r, w) = tokio::io::split(stream);
    let mut r = BufReader::new(r);
    let mut w = BufWriter::new(w);

    let (outcomes_tx, mut outcomes) = mpsc::channel(n);
    let (flushed_tx, flushed) = oneshot::channel();

    let writer = async {
        let written = write_requests(prober, n, &mut w, outcomes_tx).await;
        let _ = flushed_tx.send(written);
    };

    let reader = async {
        flushed
            .await
            .expect("request writer always reports whether it flushed")?;

        let mut available = true;
        for id in 0..n {
            let WriteOutcome { id: written, span } = outcomes
                .recv()
                .await
                .expect("every request was written before the flush");
            debug_assert_eq!(written, id);

            let expected = prober
                .read_response(id, &mut r)
                .instrument(span.clone())
                .await?;
            tracing::trace!(parent: &span, expected, "response read");
            available &= expected;
        }
        Ok::<_, Error>(available)
    };

    let ((), available) = future::join(writer, reader).await;
    tracing::debug!(requests = n, ?available, "probe finished");
    available
}

async fn write_requests<P, W>(
    prober: &P,
    n: usize,
    w: &mut W,
    outcomes: mpsc::Sender<WriteOutcome>,
) -> Result<(), Error>
where
    P: Prober + ?Sized,
    W: AsyncWrite + Unpin + Send,
{
    for id in 0..n {
        let span = tracing::trace_span!("request", id);
        prober
            .write_request(id, w)
            .instrument(span.clone())
            .await
            .map_err(|e| Error::write(id, e))?;
        tracing::trace!(parent: &span, "request written");

        if outcomes.send(WriteOutcome { id, span }).await.is_err() {
            break;
        }
    }

    w.flush().await.map_err(|e| Error::write(n - 1, e))?;
    tracing::trace!(requests = n, "requests flushed");
    Ok(())
}
