//! Fan-out/fan-in over a fixed set of endpoints.
//!
//! [`dispatch`] runs one task per endpoint on its own scoped thread and
//! returns once every task has finished. All completion state lives in a
//! `DispatchRound` created for that call alone, so overlapping calls on the
//! same endpoint set never observe each other's results.

use armada_schema::EndpointId;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;
use std::time::Instant;
use tracing::debug;

/// Per-call completion channel, sized to the number of tasks in the round.
struct DispatchRound<T> {
    expected: usize,
    tx: SyncSender<T>,
    rx: Receiver<T>,
}

impl<T> DispatchRound<T> {
    fn new(expected: usize) -> Self {
        let (tx, rx) = mpsc::sync_channel(expected);
        Self { expected, tx, rx }
    }

    fn sender(&self) -> SyncSender<T> {
        self.tx.clone()
    }

    /// Drain every published result. Only called after all tasks joined,
    /// so the channel already holds exactly `expected` values.
    fn collect(self) -> Vec<T> {
        drop(self.tx);
        let results: Vec<T> = self.rx.try_iter().collect();
        debug_assert_eq!(results.len(), self.expected);
        results
    }
}

/// Invoke `task` once per entry of `clients`, concurrently, and return every
/// result in completion order.
///
/// The returned `Vec` always has `clients.len()` entries. The task receives
/// the endpoint identity so it can tag its result; nothing else maps a result
/// back to its endpoint. Failures must be encoded in `T`. A task that panics
/// re-raises on the caller once all sibling tasks have finished.
pub fn dispatch<C, T, F>(clients: &BTreeMap<EndpointId, C>, task: F) -> Vec<T>
where
    C: Sync,
    T: Send,
    F: Fn(&EndpointId, &C) -> T + Sync,
{
    let count = clients.len();
    if count == 0 {
        return Vec::new();
    }

    let started = Instant::now();
    let round = DispatchRound::new(count);
    thread::scope(|scope| {
        for (endpoint, client) in clients {
            let tx = round.sender();
            let task = &task;
            scope.spawn(move || {
                // Capacity matches the task count and the receiver outlives
                // the scope, so this send neither blocks nor fails.
                let _ = tx.send(task(endpoint, client));
            });
        }
    });

    let results = round.collect();
    debug!(
        "collected {} results from {count} endpoints in {:?}",
        results.len(),
        started.elapsed()
    );
    results
}
