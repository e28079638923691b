//! Unidirectional byte pump.
//!
//! Copies `source` into `destination` through one fixed buffer. A read is
//! only issued once the previous chunk has been fully written, so a slow
//! destination throttles the source socket instead of buffering ahead.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Size of the per-pump copy buffer.
pub const BUFFER_SIZE: usize = 16 * 1024;

/// How a pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// Source returned EOF; every byte read was written.
    Eof { bytes: u64 },
    /// The cancellation token fired first.
    Cancelled { bytes: u64 },
}

/// An I/O error that stopped the pump, with the bytes already delivered.
#[derive(Debug, Error)]
#[error("pump failed after {bytes} bytes: {source}")]
pub struct PumpError {
    pub bytes: u64,
    #[source]
    pub source: std::io::Error,
}

/// Copy until EOF, cancellation, or an I/O error.
pub async fn pipe<R, W>(
    source: &mut R,
    destination: &mut W,
    cancel: &CancellationToken,
) -> Result<PumpOutcome, PumpError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; BUFFER_SIZE].into_boxed_slice();
    let mut total = 0u64;

    loop {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(PumpOutcome::Cancelled { bytes: total }),
            res = source.read(&mut buf) => res.map_err(|source| PumpError { bytes: total, source })?,
        };
        if n == 0 {
            return Ok(PumpOutcome::Eof { bytes: total });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(PumpOutcome::Cancelled { bytes: total }),
            res = destination.write_all(&buf[..n]) => res.map_err(|source| PumpError { bytes: total, source })?,
        }
        total += n as u64;
    }
}
