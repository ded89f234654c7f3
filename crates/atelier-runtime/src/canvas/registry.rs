//! Bookkeeping of in-flight executions and batches.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::engine::RunStatus;

/// Why a run could not be looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lookup {
    Missing,
    Taken,
}

struct RunEntry<E> {
    cancel: CancellationToken,
    status: watch::Receiver<RunStatus>,
    events: Option<UnboundedReceiver<E>>,
    ended_at: Option<Instant>,
}

impl<E> RunEntry<E> {
    /// Stamps the first time the run is seen in a terminal status.
    fn observe(&mut self, now: Instant) {
        if self.ended_at.is_none() && self.status.borrow().is_terminal() {
            self.ended_at = Some(now);
        }
    }

    fn is_expired(&self, now: Instant, retention: Duration) -> bool {
        self.ended_at
            .is_some_and(|ended_at| now.saturating_duration_since(ended_at) >= retention)
    }
}

/// Runs keyed by id, each with its cancellation token, status and
/// not-yet-subscribed event receiver.
///
/// A finished run stays queryable for the retention period whether or not
/// its events were ever taken. Expired entries are dropped on every access,
/// so unread event buffers do not outlive the retention either.
pub(crate) struct RunRegistry<K, E> {
    runs: Mutex<HashMap<K, RunEntry<E>>>,
    retention: Duration,
}

impl<K, E> RunRegistry<K, E>
where
    K: Copy + Eq + Hash,
{
    pub fn new(retention: Duration) -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
            retention,
        }
    }

    /// Locks the runs after dropping the expired ones.
    fn runs(&self) -> MutexGuard<'_, HashMap<K, RunEntry<E>>> {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        runs.retain(|_, entry| {
            entry.observe(now);
            !entry.is_expired(now, self.retention)
        });
        runs
    }

    pub fn insert(
        &self,
        id: K,
        cancel: CancellationToken,
        status: watch::Receiver<RunStatus>,
        events: UnboundedReceiver<E>,
    ) {
        self.runs().insert(
            id,
            RunEntry {
                cancel,
                status,
                events: Some(events),
                ended_at: None,
            },
        );
    }

    /// Hands out the event receiver of a run exactly once.
    pub fn take_events(&self, id: K) -> Result<UnboundedReceiver<E>, Lookup> {
        let mut runs = self.runs();
        let entry = runs.get_mut(&id).ok_or(Lookup::Missing)?;
        entry.events.take().ok_or(Lookup::Taken)
    }

    /// Requests cancellation; returns whether the run is known.
    pub fn cancel(&self, id: K) -> bool {
        self.runs()
            .get(&id)
            .map(|entry| entry.cancel.cancel())
            .is_some()
    }

    pub fn status(&self, id: K) -> Option<RunStatus> {
        self.runs().get(&id).map(|entry| *entry.status.borrow())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.runs().len()
    }
}
