use bytes::Buf;
use hyper::body::Body;
use pin_project_lite::pin_project;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Bodies larger than this are rejected unless a caller picks its own limit.
pub const DEFAULT_BODY_LIMIT: usize = 1 << 20;

pin_project! {
    /// Reads every data frame of a body into one contiguous buffer.
    pub struct DrainBodyFuture<B: Body> {
        #[pin]
        body: B,
        buf: Vec<u8>,
        limit: usize,
    }
}

impl<B> DrainBodyFuture<B>
where
    B: Body,
{
    /// `size_hint` only pre-sizes the buffer, usually taken from `Content-Length`.
    #[inline]
    #[must_use]
    pub fn new(body: B, size_hint: usize) -> Self {
        Self::with_limit(body, size_hint, DEFAULT_BODY_LIMIT)
    }

    #[inline]
    #[must_use]
    pub fn with_limit(body: B, size_hint: usize, limit: usize) -> Self {
        Self {
            body,
            buf: Vec::with_capacity(size_hint.min(limit)),
            limit,
        }
    }
}

impl<B> Future for DrainBodyFuture<B>
where
    B: Body,
    B::Error: Display,
{
    type Output = Result<Vec<u8>, anyhow::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slf = self.project();
        loop {
            let Some(next_res) = ready!(slf.body.as_mut().poll_frame(cx)) else {
                return Poll::Ready(Ok(std::mem::take(slf.buf)));
            };
            let next_frame = match next_res {
                Ok(frame) => frame,
                Err(e) => {
                    return Poll::Ready(Err(anyhow::anyhow!("Failed to poll next frame: {e}")));
                }
            };
            // Trailers carry nothing we keep.
            if let Ok(mut data) = next_frame.into_data() {
                if slf.buf.len() + data.remaining() > *slf.limit {
                    return Poll::Ready(Err(anyhow::anyhow!(
                        "Body exceeds limit of {} bytes",
                        slf.limit
                    )));
                }
                while data.has_remaining() {
                    let chunk = data.chunk();
                    let len = chunk.len();
                    slf.buf.extend_from_slice(chunk);
                    data.advance(len);
                }
            }
            if slf.body.is_end_stream() {
                return Poll::Ready(Ok(std::mem::take(slf.buf)));
            }
        }
    }
}
