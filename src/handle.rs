//! Deferred operation results.
//!
//! Every mapping operation returns a [`Pending`] handle immediately; the
//! statement itself runs on the runtime in the background. The handle can be
//! awaited, polled without blocking, or waited on from synchronous code.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};

use crate::error::{MapperError, Result};

/// A handle to an operation completing in the background.
///
/// `Pending` implements [`Future`], so `.await` is the usual way to consume
/// it. [`Pending::try_take`] checks for completion without blocking, and
/// [`Pending::wait`] blocks a synchronous caller until the result is ready.
#[derive(Debug)]
pub struct Pending<T> {
    handle: JoinHandle<Result<T>>,
}

impl<T> Pending<T>
where
    T: Send + 'static,
{
    /// Spawns `future` onto the current runtime and returns its handle.
    ///
    /// Must be called from within a Tokio runtime context.
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    /// Returns the result if the operation has finished, or hands the
    /// handle back if it is still running.
    ///
    /// Never blocks.
    pub fn try_take(mut self) -> std::result::Result<Result<T>, Self> {
        if !self.handle.is_finished() {
            return Err(self);
        }
        match (&mut self.handle).now_or_never() {
            Some(joined) => Ok(flatten_join(joined)),
            None => Err(self),
        }
    }

    /// Blocks the calling thread until the result is ready.
    ///
    /// On a multi-threaded runtime worker the thread yields its slot while
    /// blocked; from a plain thread the handle is driven directly.
    ///
    /// # Panics
    ///
    /// Panics when called from a single-threaded runtime worker, where
    /// blocking would starve the operation itself. Use `.await` there.
    pub fn wait(self) -> Result<T> {
        match Handle::try_current() {
            Ok(handle) => tokio::task::block_in_place(|| handle.block_on(self)),
            Err(_) => futures::executor::block_on(self),
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(flatten_join)
    }
}

/// Collapses task-level failures into the operation's error type.
fn flatten_join<T>(joined: std::result::Result<Result<T>, JoinError>) -> Result<T> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(MapperError::execution(format!(
            "background task panicked: {e}"
        ))),
        Err(e) => Err(MapperError::execution(format!(
            "background task was cancelled: {e}"
        ))),
    }
}
