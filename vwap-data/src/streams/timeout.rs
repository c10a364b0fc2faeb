//! Read-idle timeout wrapper for WebSocket streams.
//!
//! Ends the wrapped stream if no item is received for a configurable period. This detects
//! silent WebSocket disconnections that never surface an explicit error, letting the read loop
//! terminate and signal completion like any other end of stream.

use futures::Stream;
use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::Instant;

/// Stream wrapper that monitors idle time and ends the stream once no item has been received
/// for `timeout_duration`.
#[derive(Debug)]
pub struct TimeoutStream<S> {
    inner: S,
    timeout_duration: Duration,
    deadline: Pin<Box<tokio::time::Sleep>>,
    expired: bool,
}

impl<S> TimeoutStream<S> {
    /// Create a new timeout stream wrapper with the specified timeout duration.
    pub fn new(inner: S, timeout_duration: Duration) -> Self {
        Self {
            inner,
            timeout_duration,
            deadline: Box::pin(tokio::time::sleep(timeout_duration)),
            expired: false,
        }
    }
}

impl<S> Stream for TimeoutStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.expired {
            return Poll::Ready(None);
        }

        let timeout_duration = self.timeout_duration;

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                self.deadline.as_mut().reset(Instant::now() + timeout_duration);
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => match self.deadline.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    tracing::warn!(
                        timeout_secs = timeout_duration.as_secs(),
                        "WebSocket read timeout - no data received, ending stream"
                    );
                    self.expired = true;
                    Poll::Ready(None)
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl<S: Unpin> Unpin for TimeoutStream<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt, stream};

    #[tokio::test(start_paused = true)]
    async fn test_timeout_stream_ends_when_idle() {
        let mut stream = TimeoutStream::new(stream::pending::<u8>(), Duration::from_secs(5));

        let start = Instant::now();
        assert_eq!(stream.next().await, None);
        assert!(start.elapsed() >= Duration::from_secs(5));

        // Stays terminated once expired
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_stream_passes_items_through() {
        let inner = stream::iter(vec![1u8, 2, 3]).chain(stream::pending());
        let mut stream = TimeoutStream::new(inner, Duration::from_secs(5));

        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.next().await, Some(2));
        assert_eq!(stream.next().await, Some(3));
        assert_eq!(stream.next().await, None);
    }
}
