//! Per-record stability gate.
//!
//! Permission rules that read a record must not observe a value older than
//! the write they are gating. The gate keeps one FIFO queue per record name:
//! a queue entry being present means a request is in flight for that name,
//! and queued waiters are released one at a time as reads complete and as
//! each committed write's cache ack arrives.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;

/// Handle returned by [`StabilityGate::run_when_record_stable`].
///
/// Resolves immediately when the record was idle, otherwise when a preceding
/// request releases this waiter.
pub struct StabilityPermit {
    waiter: Option<oneshot::Receiver<()>>,
}

impl StabilityPermit {
    /// Wait until the record is stable for this caller.
    pub async fn acquired(self) {
        if let Some(waiter) = self.waiter {
            // A dropped sender means the queue was torn down; proceeding is
            // the only sensible recovery.
            let _ = waiter.await;
        }
    }

    /// Whether the permit was granted without queueing.
    pub fn is_immediate(&self) -> bool {
        self.waiter.is_none()
    }
}

/// Per-record FIFO barrier over in-flight requests.
#[derive(Default)]
pub struct StabilityGate {
    queues: Mutex<HashMap<String, VecDeque<oneshot::Sender<()>>>>,
}

impl StabilityGate {
    /// Create an empty gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run when the record is stable.
    ///
    /// If no request is in flight for `name`, an empty queue is installed
    /// (marking the record busy) and the permit resolves immediately.
    /// Otherwise the caller joins the queue and resolves in enqueue order.
    pub fn run_when_record_stable(&self, name: &str) -> StabilityPermit {
        let mut queues = self.queues.lock();
        match queues.get_mut(name) {
            None => {
                queues.insert(name.to_string(), VecDeque::new());
                StabilityPermit { waiter: None }
            }
            Some(queue) => {
                let (release, waiter) = oneshot::channel();
                queue.push_back(release);
                StabilityPermit {
                    waiter: Some(waiter),
                }
            }
        }
    }

    /// Release one waiter for `name`, or mark the record idle.
    ///
    /// Called by reads on completion and by writers after each cache ack.
    /// Pops and releases the queue head; an empty queue is removed, returning
    /// the record to idle. Unknown names are a no-op.
    pub fn remove_record_request(&self, name: &str) {
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(name) else {
            return;
        };
        match queue.pop_front() {
            Some(release) => {
                let _ = release.send(());
            }
            None => {
                queues.remove(name);
            }
        }
    }

    /// Whether no request is in flight for `name`.
    pub fn is_idle(&self, name: &str) -> bool {
        !self.queues.lock().contains_key(name)
    }

    /// Number of queued waiters for `name`.
    pub fn waiter_count(&self, name: &str) -> usize {
        self.queues.lock().get(name).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_record_grants_immediately() {
        let gate = StabilityGate::new();
        assert!(gate.is_idle("a/1"));

        let permit = gate.run_when_record_stable("a/1");
        assert!(permit.is_immediate());
        permit.acquired().await;

        // The record is now marked busy until released.
        assert!(!gate.is_idle("a/1"));
        gate.remove_record_request("a/1");
        assert!(gate.is_idle("a/1"));
    }

    #[tokio::test]
    async fn waiters_release_in_fifo_order() {
        let gate = StabilityGate::new();

        let first = gate.run_when_record_stable("a/1");
        assert!(first.is_immediate());

        let second = gate.run_when_record_stable("a/1");
        let third = gate.run_when_record_stable("a/1");
        assert!(!second.is_immediate());
        assert_eq!(gate.waiter_count("a/1"), 2);

        gate.remove_record_request("a/1");
        second.acquired().await;
        assert_eq!(gate.waiter_count("a/1"), 1);

        gate.remove_record_request("a/1");
        third.acquired().await;

        gate.remove_record_request("a/1");
        assert!(gate.is_idle("a/1"));
    }

    #[test]
    fn remove_on_unknown_name_is_noop() {
        let gate = StabilityGate::new();
        gate.remove_record_request("missing");
        assert!(gate.is_idle("missing"));
    }

    #[test]
    fn names_are_independent() {
        let gate = StabilityGate::new();
        let _a = gate.run_when_record_stable("a");
        let b = gate.run_when_record_stable("b");
        assert!(b.is_immediate());
    }
}
