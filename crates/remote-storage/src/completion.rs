//! Completion handle for background storage operations.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::task::JoinHandle;

use crate::error::StorageError;

/// Eventual result of an operation running on a background task.
///
/// Awaiting yields the operation's result. Dropping the handle detaches
/// the task: in-flight requests run to completion (or failure) under the
/// transport's own timeouts.
#[must_use = "a Completion does nothing observable unless awaited"]
pub struct Completion<T> {
    handle: JoinHandle<Result<T, StorageError>>,
}

impl<T: Send + 'static> Completion<T> {
    /// Spawns `future` on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, StorageError>> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }
}

impl<T> Completion<T> {
    /// Returns `true` once the background task has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, StorageError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match ready!(Pin::new(&mut self.handle).poll(cx)) {
            Ok(result) => Poll::Ready(result),
            Err(join_err) => Poll::Ready(Err(StorageError::Task(join_err))),
        }
    }
}
