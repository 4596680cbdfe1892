//! Deadlines for provider calls and streams.

use crate::error::LoraixError;
use crate::provider::TextStream;
use futures::Stream;
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep};
use tokio_util::sync::CancellationToken;

/// Race `future` against `timeout`.
///
/// When the timer wins, `cancel` is triggered before the timeout error is
/// returned, so the provider can abort its transport. Without a timeout the
/// future runs to completion.
pub async fn with_deadline<T, F>(
    future: F,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<T, LoraixError>
where
    F: Future<Output = Result<T, LoraixError>>,
{
    let Some(timeout) = timeout.filter(|t| !t.is_zero()) else {
        return future.await;
    };

    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => {
            cancel.cancel();
            Err(LoraixError::timeout(timeout.as_millis() as u64))
        }
    }
}

/// Apply a per-chunk deadline to a text stream.
///
/// Returns the stream untouched when no timeout is configured.
pub fn with_stream_deadline(
    stream: TextStream,
    timeout: Option<Duration>,
    cancel: CancellationToken,
) -> TextStream {
    match timeout.filter(|t| !t.is_zero()) {
        Some(timeout) => Box::pin(DeadlineStream::new(stream, timeout, cancel)),
        None => stream,
    }
}

/// Stream wrapper with a deadline per requested chunk.
///
/// The timer starts on the first poll after each yielded chunk, so time the
/// consumer spends between chunks does not count against the stream. If the
/// inner stream stays silent for longer than the timeout, the
/// cancellation token fires, the inner stream is dropped to release its
/// transport, and a single timeout error is yielded. Chunks already handed
/// out are not replayed.
#[pin_project]
pub struct DeadlineStream {
    inner: Option<TextStream>,
    #[pin]
    sleep: Sleep,
    armed: bool,
    timeout: Duration,
    cancel: CancellationToken,
}

impl DeadlineStream {
    /// Wrap `inner`; the first deadline starts at the first poll
    pub fn new(inner: TextStream, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            inner: Some(inner),
            sleep: tokio::time::sleep(timeout),
            armed: false,
            timeout,
            cancel,
        }
    }
}

impl Stream for DeadlineStream {
    type Item = Result<String, LoraixError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        if !*this.armed {
            this.sleep.as_mut().reset(Instant::now() + *this.timeout);
            *this.armed = true;
        }

        match inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(item)) => {
                *this.armed = false;
                return Poll::Ready(Some(item));
            }
            Poll::Ready(None) => {
                *this.inner = None;
                return Poll::Ready(None);
            }
            Poll::Pending => {}
        }

        match this.sleep.as_mut().poll(cx) {
            Poll::Ready(()) => {
                this.cancel.cancel();
                // Dropping the inner stream runs its cleanup.
                *this.inner = None;
                Poll::Ready(Some(Err(LoraixError::timeout(
                    this.timeout.as_millis() as u64,
                ))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
