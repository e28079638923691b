//! Stream wrapper that reports traffic.
//!
//! `ObservedStream` forwards every `AsyncRead`/`AsyncWrite` call to the inner
//! stream and invokes a callback whenever bytes actually moved. Sessions use
//! it to push their idle deadline forward.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// A non-empty transfer on an observed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Read(usize),
    Written(usize),
}

#[derive(Debug)]
pub struct ObservedStream<S, F> {
    inner: S,
    on_transfer: F,
}

impl<S, F> ObservedStream<S, F>
where
    F: Fn(Transfer),
{
    pub fn new(inner: S, on_transfer: F) -> Self {
        Self { inner, on_transfer }
    }
}

impl<S, F> AsyncRead for ObservedStream<S, F>
where
    S: AsyncRead + Unpin,
    F: Fn(Transfer) + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            let n = buf.filled().len() - before;
            if n > 0 {
                (this.on_transfer)(Transfer::Read(n));
            }
        }
        poll
    }
}

impl<S, F> AsyncWrite for ObservedStream<S, F>
where
    S: AsyncWrite + Unpin,
    F: Fn(Transfer) + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = poll {
            if n > 0 {
                (this.on_transfer)(Transfer::Written(n));
            }
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
