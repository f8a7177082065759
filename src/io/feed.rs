//! Cancellable push-based streams
//!
//! Every live registration in the crate (platform location callbacks, backend
//! listeners) is handed to its caller as a `LiveFeed`. The feed owns the
//! registration's teardown and runs it exactly once: on `cancel()` or on drop,
//! whichever comes first. Nothing is yielded after cancellation, even if items
//! were already buffered.

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Teardown action that runs at most once
pub struct Detach(Option<Box<dyn FnOnce() + Send>>);

impl Detach {
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// Nothing to tear down
    pub fn noop() -> Self {
        Self(None)
    }

    /// Run the action if it has not run yet
    pub fn run(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }

    pub fn is_done(&self) -> bool {
        self.0.is_none()
    }
}

impl Drop for Detach {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for Detach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detach").field("done", &self.is_done()).finish()
    }
}

/// Producer side of a feed, handed to callbacks
///
/// Sends never block; once the feed is cancelled or dropped they are
/// silently discarded.
#[derive(Debug)]
pub struct FeedSender<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for FeedSender<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> FeedSender<T> {
    /// Push an item; returns false if the feed is gone
    pub fn send(&self, item: T) -> bool {
        self.tx.send(item).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create the sender/receiver pair that backs a `LiveFeed`
pub fn feed_channel<T>() -> (FeedSender<T>, mpsc::UnboundedReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FeedSender { tx }, rx)
}

/// Infinite stream of pushed items, bounded only by cancellation
pub struct LiveFeed<T> {
    rx: mpsc::UnboundedReceiver<T>,
    detach: Detach,
    cancelled: bool,
}

// No field is structurally pinned.
impl<T> Unpin for LiveFeed<T> {}

impl<T> LiveFeed<T> {
    pub fn new(rx: mpsc::UnboundedReceiver<T>, detach: Detach) -> Self {
        Self { rx, detach, cancelled: false }
    }

    /// Detach the underlying registration and stop yielding items
    ///
    /// Safe to call any number of times.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.detach.run();
        self.rx.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Wait for the next item; `None` once cancelled
    pub async fn recv(&mut self) -> Option<T> {
        if self.cancelled {
            return None;
        }
        self.rx.recv().await
    }

    /// Take an already-delivered item without waiting
    pub fn try_recv(&mut self) -> Option<T> {
        if self.cancelled {
            return None;
        }
        self.rx.try_recv().ok()
    }
}

impl<T> Stream for LiveFeed<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if this.cancelled {
            return Poll::Ready(None);
        }
        this.rx.poll_recv(cx)
    }
}

impl<T> std::fmt::Debug for LiveFeed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveFeed").field("cancelled", &self.cancelled).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_feed() -> (FeedSender<u32>, LiveFeed<u32>, Arc<AtomicUsize>) {
        let detached = Arc::new(AtomicUsize::new(0));
        let counter = detached.clone();
        let (tx, rx) = feed_channel();
        let feed = LiveFeed::new(
            rx,
            Detach::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (tx, feed, detached)
    }

    #[tokio::test]
    async fn test_items_in_order() {
        let (tx, mut feed, _) = counting_feed();
        tx.send(1);
        tx.send(2);
        assert_eq!(feed.next().await, Some(1));
        assert_eq!(feed.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_cancel_detaches_once() {
        let (_tx, mut feed, detached) = counting_feed();
        feed.cancel();
        feed.cancel();
        drop(feed);
        assert_eq!(detached.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_detaches() {
        let (_tx, feed, detached) = counting_feed();
        drop(feed);
        assert_eq!(detached.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nothing_after_cancel() {
        let (tx, mut feed, _) = counting_feed();
        tx.send(1);
        feed.cancel();
        assert!(!tx.send(2));
        assert!(tx.is_closed());
        assert_eq!(feed.next().await, None);
        assert_eq!(feed.try_recv(), None);
    }
}
