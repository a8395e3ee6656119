use super::{expect_status, Prober};
use crate::Error;
use futures_util::future::{BoxFuture, FutureExt};
use std::io;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

/// Request targets, and the status a compliant server answers each with.
const REQUESTS: [(&str, u16); 2] = [
    // asks about the server as a whole
    ("*", 200),
    // neither "*" nor a valid origin or absolute form
    (".", 400),
];

/// A [`Prober`] that sends one valid and one invalid `OPTIONS` request.
///
/// The first request, `OPTIONS *`, should be answered with `200 OK`. The second has a request
/// target that is not valid for any method, and should be answered with `400 Bad Request`. Since
/// the two expected statuses differ, responses that come back in the wrong order are detected,
/// as is a server that hangs up after the first response.
#[derive(Clone, Debug)]
pub struct OptionsProber {
    host: String,
}

impl OptionsProber {
    /// Make a prober that sends `host` in the `Host` header of each request.
    pub fn new(host: impl Into<String>) -> Self {
        OptionsProber { host: host.into() }
    }

    /// The value sent in the `Host` header.
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Prober for OptionsProber {
    fn num_requests(&self) -> usize {
        REQUESTS.len()
    }

    fn write_request<'a>(
        &'a self,
        id: usize,
        w: &'a mut (dyn AsyncWrite + Unpin + Send),
    ) -> BoxFuture<'a, io::Result<()>> {
        async move {
            let (target, _) = REQUESTS.get(id).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("no OPTIONS probe request with id {}", id),
                )
            })?;
            let req = format!("OPTIONS {} HTTP/1.1\r\nHost: {}\r\n\r\n", target, self.host);
            w.write_all(req.as_bytes()).await
        }
        .boxed()
    }

    fn read_response<'a>(
        &'a self,
        id: usize,
        r: &'a mut (dyn AsyncBufRead + Unpin + Send),
    ) -> BoxFuture<'a, Result<bool, Error>> {
        async move {
            let &(_, want) = REQUESTS.get(id).ok_or(Error::UnknownRequest(id))?;
            expect_status(id, r, want).await
        }
        .boxed()
    }
}
