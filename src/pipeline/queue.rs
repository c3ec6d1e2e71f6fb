//! Bounded multi-consumer work queues with stop sentinels.
//!
//! Every consumer exits after receiving one stop sentinel, so a producer
//! drains a pool by sending one sentinel per worker and then joining them.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::anyhow;

use crate::error::{FetcherError, Result};

enum Job<T> {
    Item(T),
    Stop,
}

/// Producer half of a work queue.
pub struct JobSender<T> {
    inner: SyncSender<Job<T>>,
}

/// Consumer half of a work queue, shared by every worker of a pool.
pub struct JobReceiver<T> {
    inner: Arc<Mutex<Receiver<Job<T>>>>,
}

/// Create a queue holding at most `capacity` pending jobs.
pub fn bounded<T>(capacity: usize) -> (JobSender<T>, JobReceiver<T>) {
    let (tx, rx) = sync_channel(capacity.max(1));
    (
        JobSender { inner: tx },
        JobReceiver {
            inner: Arc::new(Mutex::new(rx)),
        },
    )
}

impl<T> JobSender<T> {
    /// Enqueue an item, blocking while the queue is full.
    ///
    /// Fails when every receiver has been dropped.
    pub fn push(&self, item: T) -> Result<()> {
        self.inner
            .send(Job::Item(item))
            .map_err(|_| FetcherError::Other(anyhow!("work queue has no consumers left")))
    }

    /// Send one stop sentinel per consumer.
    pub fn stop(&self, consumers: usize) {
        for _ in 0..consumers {
            if self.inner.send(Job::Stop).is_err() {
                break;
            }
        }
    }
}

impl<T> Clone for JobSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> JobReceiver<T> {
    /// Block until the next item arrives.
    ///
    /// Returns `None` on a stop sentinel or once every sender is gone.
    pub fn recv(&self) -> Option<T> {
        let job = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv()
            .ok()?;
        match job {
            Job::Item(item) => Some(item),
            Job::Stop => None,
        }
    }
}

impl<T> Clone for JobReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn items_then_stop() {
        let (tx, rx) = bounded(4);
        tx.push(1).unwrap();
        tx.push(2).unwrap();
        tx.stop(1);

        assert_eq!(rx.recv(), Some(1));
        assert_eq!(rx.recv(), Some(2));
        assert_eq!(rx.recv(), None);
    }

    #[test]
    fn closed_queue_ends_iteration() {
        let (tx, rx) = bounded::<u32>(1);
        drop(tx);
        assert_eq!(rx.recv(), None);
    }

    #[test]
    fn push_fails_without_consumers() {
        let (tx, rx) = bounded(1);
        drop(rx);
        assert!(tx.push(1).is_err());
    }

    #[test]
    fn one_sentinel_per_worker_drains_every_item() {
        let (tx, rx) = bounded(2);
        let workers: Vec<_> = (0..3)
            .map(|_| {
                let rx = rx.clone();
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(item) = rx.recv() {
                        seen.push(item);
                    }
                    seen
                })
            })
            .collect();
        drop(rx);

        for i in 0..50 {
            tx.push(i).unwrap();
        }
        tx.stop(3);

        let mut all: Vec<i32> = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect();
        all.sort();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }
}
