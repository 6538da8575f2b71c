use crate::bitrate::Bitrate;
use crate::error::ThrottleError;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{Instant, Sleep, sleep_until};
use tracing::trace;

/// Upper bound on the time one chunk takes at the target rate.
///
/// Keeps a trickle of bytes flowing when the caller hands over a huge buffer
/// at a very low bitrate. Best effort only: at rates below 40 bps a single
/// byte already takes longer than this.
pub const CHUNK_WINDOW: Duration = Duration::from_millis(200);

/// An [`AsyncRead`] adapter that delivers bytes no faster than a bitrate.
///
/// Every read is capped at the number of bytes the rate allows within
/// [`CHUNK_WINDOW`]. Once the inner read returns `n` bytes, the bytes are held
/// back until the time `n` bytes take at the target rate has passed since the
/// read started. A read that was already slower than that is not delayed, and
/// idle time between reads is never turned into a burst.
///
/// Reads, end of stream and errors of the inner stream pass through unchanged.
pub struct ThrottledReader<R> {
    inner: R,
    bitrate: Bitrate,
    max_chunk_size: usize,
    staging: Vec<u8>,
    staged_start: usize,
    staged_end: usize,
    read_started: Option<Instant>,
    pacing: Option<Pin<Box<Sleep>>>,
}

impl<R> ThrottledReader<R> {
    pub fn new(inner: R, bitrate: Bitrate) -> Result<Self, ThrottleError> {
        if bitrate.is_zero() {
            return Err(ThrottleError::ZeroBitrate);
        }

        let chunk = bitrate.duration_to_bytes(CHUNK_WINDOW).max(1);
        let max_chunk_size =
            usize::try_from(chunk).map_err(|_| ThrottleError::ChunkTooLarge(chunk))?;

        trace!(%bitrate, max_chunk_size, "throttled reader created");

        Ok(Self {
            inner,
            bitrate,
            max_chunk_size,
            staging: Vec::new(),
            staged_start: 0,
            staged_end: 0,
            read_started: None,
            pacing: None,
        })
    }

    pub fn bitrate(&self) -> Bitrate {
        self.bitrate
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwraps the inner stream. Bytes read but not yet delivered are lost.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn has_staged(&self) -> bool {
        self.staged_start < self.staged_end
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ThrottledReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;

        loop {
            if let Some(pacing) = this.pacing.as_mut() {
                ready!(pacing.as_mut().poll(cx));
                this.pacing = None;
            }

            if this.has_staged() {
                let n = buf.remaining().min(this.staged_end - this.staged_start);
                buf.put_slice(&this.staging[this.staged_start..this.staged_start + n]);
                this.staged_start += n;
                return Poll::Ready(Ok(()));
            }

            let len = buf.remaining().min(this.max_chunk_size);
            if len == 0 {
                return Pin::new(&mut this.inner).poll_read(cx, buf);
            }

            let started = *this.read_started.get_or_insert_with(Instant::now);
            if this.staging.len() < len {
                this.staging.resize(len, 0);
            }

            let mut chunk = ReadBuf::new(&mut this.staging[..len]);
            let polled = Pin::new(&mut this.inner).poll_read(cx, &mut chunk);
            let n = chunk.filled().len();

            match polled {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(result) => {
                    this.read_started = None;
                    result?;
                }
            }

            if n == 0 {
                return Poll::Ready(Ok(()));
            }

            this.staged_start = 0;
            this.staged_end = n;

            let planned = this
                .bitrate
                .transfer_bytes(n as u64)
                .map_err(io::Error::other)?;
            let deadline = started + planned;
            if deadline > Instant::now() {
                trace!(bytes = n, ?planned, "pacing read");
                this.pacing = Some(Box::pin(sleep_until(deadline)));
            }
        }
    }
}
