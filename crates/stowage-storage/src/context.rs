//! Per-call cancellation and deadlines.

use crate::traits::{ByteStream, StorageError, StorageResult};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus optional deadline carried by every storage call.
///
/// Cloning shares the token: cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Use an existing token, e.g. a child of the caller's shutdown token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Keeps the earlier of the existing and the new deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails fast if the context is already done.
    pub fn check(&self) -> StorageResult<()> {
        if self.token.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        if matches!(self.deadline, Some(deadline) if Instant::now() >= deadline) {
            return Err(StorageError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` until it completes, the token is cancelled or the deadline
    /// passes. The losing future is dropped, which aborts its I/O.
    pub async fn run<T, F>(&self, fut: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        self.check()?;

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(StorageError::Cancelled),
            _ = expired => Err(StorageError::DeadlineExceeded),
            result = fut => result,
        }
    }

    /// Bind a body stream to this context. Once the context is done the stream
    /// yields one `Cancelled`/`DeadlineExceeded` error and then ends.
    pub fn guard_stream<S>(&self, stream: S) -> ByteStream
    where
        S: Stream<Item = StorageResult<Bytes>> + Send + Unpin + 'static,
    {
        let ctx = self.clone();
        Box::pin(futures::stream::unfold(
            Some((stream, ctx)),
            |state| async move {
                let (mut stream, ctx) = state?;
                match ctx.run(async { Ok(stream.next().await) }).await {
                    Ok(Some(item)) => Some((item, Some((stream, ctx)))),
                    Ok(None) => None,
                    Err(err) => Some((Err(err), None)),
                }
            },
        ))
    }
}
