//! A byte stream wrapper that reports request-written and first-byte events.
//!
//! hyper's HTTP/1.1 client has no hooks of its own, so the events are
//! derived from I/O on the connection: the request counts as written once a
//! flush succeeds after bytes were written, and the first response byte is
//! the first read that yields data.

use crate::trace::{ClientTrace, WroteRequestInfo};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

pub struct TracedStream<S, T: ?Sized> {
    inner: S,
    trace: Arc<T>,
    written: bool,
    got_first_byte: bool,
}

impl<S, T: ClientTrace + ?Sized> TracedStream<S, T> {
    pub fn new(inner: S, trace: Arc<T>) -> Self {
        Self {
            inner,
            trace,
            written: false,
            got_first_byte: false,
        }
    }

    fn write_failed(&self, err: &io::Error) {
        self.trace.wrote_request(WroteRequestInfo {
            err: Some(Box::new(io::Error::new(err.kind(), err.to_string()))),
        });
    }
}

impl<S, T> AsyncRead for TracedStream<S, T>
where
    S: AsyncRead + Unpin,
    T: ClientTrace + ?Sized,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let result = Pin::new(&mut this.inner).poll_read(cx, buf);

        if let Poll::Ready(Ok(())) = result {
            if !this.got_first_byte && buf.filled().len() > before {
                this.got_first_byte = true;
                this.trace.got_first_response_byte();
            }
        }
        result
    }
}

impl<S, T> AsyncWrite for TracedStream<S, T>
where
    S: AsyncWrite + Unpin,
    T: ClientTrace + ?Sized,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.inner).poll_write(cx, buf);

        match &result {
            Poll::Ready(Ok(n)) if *n > 0 => this.written = true,
            Poll::Ready(Err(e)) => this.write_failed(e),
            _ => {}
        }
        result
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.inner).poll_flush(cx);

        match &result {
            Poll::Ready(Ok(())) if this.written => {
                this.written = false;
                this.trace.wrote_request(WroteRequestInfo::default());
            }
            Poll::Ready(Err(e)) => this.write_failed(e),
            _ => {}
        }
        result
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
