/// Handed from the request writer to the response reader once a request has been written.
pub(crate) struct WriteOutcome {
    pub(crate) id: usize,
    pub(crate) span: tracing::Span,
}
