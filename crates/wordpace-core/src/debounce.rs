//! Keyed trailing-edge debouncing
//!
//! Each key owns a single pending slot. Pushing a value replaces whatever is
//! pending for that key and restarts its quiet period; the latest value is
//! yielded once the key has been quiet long enough. Superseded values are
//! dropped, never delivered.

use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

/// Sending half of a debouncer
#[derive(Debug)]
pub struct DebounceHandle<K, T> {
    tx: mpsc::UnboundedSender<(K, T)>,
}

impl<K, T> Clone for DebounceHandle<K, T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<K, T> DebounceHandle<K, T> {
    /// Queue a value for `key`. Returns false once the debouncer is gone.
    pub fn push(&self, key: K, value: T) -> bool {
        self.tx.send((key, value)).is_ok()
    }
}

struct Pending<T> {
    value: T,
    deadline: Instant,
}

/// Receiving half of a debouncer
pub struct Debouncer<K, T> {
    rx: mpsc::UnboundedReceiver<(K, T)>,
    quiet: Duration,
    pending: BTreeMap<K, Pending<T>>,
    closed: bool,
}

/// Create a debouncer with the given quiet period
pub fn debounce<K: Ord + Clone, T>(quiet: Duration) -> (DebounceHandle<K, T>, Debouncer<K, T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        DebounceHandle { tx },
        Debouncer {
            rx,
            quiet,
            pending: BTreeMap::new(),
            closed: false,
        },
    )
}

impl<K: Ord + Clone, T> Debouncer<K, T> {
    /// Wait for the next settled value.
    ///
    /// Cancel safe: pending values live in the debouncer, not in the future.
    /// Once every handle is dropped, remaining values are flushed without
    /// waiting and then `None` is returned.
    pub async fn next(&mut self) -> Option<(K, T)> {
        loop {
            if self.closed {
                return self.pop_earliest();
            }

            let deadline = self.pending.values().map(|p| p.deadline).min();
            let expired = async {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some((key, value)) => {
                        let deadline = Instant::now() + self.quiet;
                        self.pending.insert(key, Pending { value, deadline });
                    }
                    None => self.closed = true,
                },
                _ = expired => {
                    if let Some(settled) = self.pop_earliest() {
                        return Some(settled);
                    }
                }
            }
        }
    }

    /// Number of keys with a value waiting
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn pop_earliest(&mut self) -> Option<(K, T)> {
        let key = self
            .pending
            .iter()
            .min_by_key(|(_, p)| p.deadline)
            .map(|(k, _)| k.clone())?;
        self.pending.remove(&key).map(|p| (key, p.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_last_value() {
        let (handle, mut debouncer) = debounce::<(), u32>(Duration::from_millis(500));
        handle.push((), 1);
        handle.push((), 2);
        handle.push((), 3);

        let started = Instant::now();
        assert_eq!(debouncer.next().await, Some(((), 3)));
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(debouncer.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_restarts_quiet_period() {
        let (handle, mut debouncer) = debounce::<(), &str>(Duration::from_secs(1));
        let pusher = handle.clone();
        tokio::spawn(async move {
            pusher.push((), "first");
            tokio::time::sleep(Duration::from_millis(800)).await;
            pusher.push((), "second");
        });

        let started = Instant::now();
        assert_eq!(debouncer.next().await, Some(((), "second")));
        assert!(started.elapsed() >= Duration::from_millis(1800));
        drop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_do_not_supersede_each_other() {
        let (handle, mut debouncer) = debounce::<&str, u32>(Duration::from_millis(100));
        handle.push("counts", 1);
        handle.push("plugins", 10);
        handle.push("counts", 2);

        let mut got = vec![debouncer.next().await, debouncer.next().await];
        got.sort();
        assert_eq!(got, vec![Some(("counts", 2)), Some(("plugins", 10))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_pending() {
        let (handle, mut debouncer) = debounce::<(), u32>(Duration::from_secs(60));
        handle.push((), 7);
        drop(handle);

        let started = Instant::now();
        assert_eq!(debouncer.next().await, Some(((), 7)));
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(debouncer.next().await, None);
    }
}
