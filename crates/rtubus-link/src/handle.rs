//! Pollable or awaitable completion for master requests.

use crate::transaction::Outcome;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// State of a [`ResponseHandle`].
#[derive(Debug, PartialEq, Eq)]
pub enum Response<C> {
    Pending,
    Complete(Outcome, C),
    /// The request was never registered, so no outcome will arrive.
    Abandoned,
}

/// Receives the outcome of one request sent with the callback from
/// [`response_channel`].
#[derive(Debug)]
pub struct ResponseHandle<C> {
    rx: oneshot::Receiver<(Outcome, C)>,
}

/// Creates a callback for [`RtuMaster::send`](crate::RtuMaster::send) paired
/// with a handle the caller can check between polls or await.
pub fn response_channel<C: 'static>() -> (impl FnOnce(Outcome, C) + 'static, ResponseHandle<C>) {
    let (tx, rx) = oneshot::channel();
    let callback = move |outcome: Outcome, context: C| {
        // The caller may have stopped caring about the result.
        let _ = tx.send((outcome, context));
    };
    (callback, ResponseHandle { rx })
}

impl<C> ResponseHandle<C> {
    pub fn try_take(&mut self) -> Response<C> {
        match self.rx.try_recv() {
            Ok((outcome, context)) => Response::Complete(outcome, context),
            Err(TryRecvError::Empty) => Response::Pending,
            Err(TryRecvError::Closed) => Response::Abandoned,
        }
    }

    /// Resolves once the link delivers the outcome; `None` if it never will.
    /// Something else has to keep polling the link meanwhile.
    pub async fn wait(self) -> Option<(Outcome, C)> {
        self.rx.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::{response_channel, Response};
    use crate::transaction::Outcome;

    #[test]
    fn reports_pending_then_complete() {
        let (callback, mut handle) = response_channel::<u8>();
        assert_eq!(handle.try_take(), Response::Pending);
        callback(Outcome::Success, 7);
        assert_eq!(handle.try_take(), Response::Complete(Outcome::Success, 7));
    }

    #[test]
    fn dropped_callback_abandons_handle() {
        let (callback, mut handle) = response_channel::<u8>();
        drop(callback);
        assert_eq!(handle.try_take(), Response::Abandoned);
    }

    #[tokio::test]
    async fn wait_yields_outcome() {
        let (callback, handle) = response_channel::<&'static str>();
        callback(Outcome::Timeout, "ctx");
        assert_eq!(handle.wait().await, Some((Outcome::Timeout, "ctx")));
    }
}
