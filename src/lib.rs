//! This crate checks whether an HTTP/1.1 server supports request pipelining.
//!
//! # Pipelining
//!
//! HTTP/1.1 lets a client send several requests on a connection without waiting for the response
//! to each one first. The server must then answer the requests in the order they were sent, since
//! nothing else in the responses says which request they belong to. Many servers and proxies get
//! this wrong, or refuse it by closing the connection after the first response, so a client
//! that wants to pipeline has to find out first whether the server it talks to can cope.
//!
//! # Probing
//!
//! The check writes a burst of requests and flushes them together before reading anything, then
//! reads the responses back one at a time, in order, and compares each against what a compliant
//! server would have answered. The default probe, [`OptionsProber`], sends a valid `OPTIONS *`
//! request (which should get a `200`) followed by a deliberately malformed one (which should get
//! a `400`). Other probes can be plugged in by implementing [`Prober`] and calling [`probe()`].
//!
//! Only as much of each response is parsed as is needed to find its status code and skip past
//! it; see the [`status`] module.
//!
//! # Checking a URL
//!
//! ```no_run
//! # async fn run() -> Result<(), http_pipelining::Error> {
//! match http_pipelining::available("https://www.example.com").await {
//!     Ok(true) => println!("supports HTTP pipelining"),
//!     Ok(false) => println!("does not support HTTP pipelining"),
//!     Err(e) => println!("could not check for HTTP pipelining: {}", e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! To probe an existing connection instead, use [`supported`] or [`probe()`] directly. For
//! timeouts or a custom TLS configuration, use a [`Checker`].
#![deny(missing_docs)]

mod dial;
mod error;
pub mod probe;
pub mod status;
mod wrappers;

pub use crate::dial::{available, dial, Checker, Connection};
pub use crate::error::Error;
pub use crate::probe::{expect_status, probe, supported, OptionsProber, Prober};
