//! Pure queue state transitions.

use std::collections::{BTreeSet, HashSet, VecDeque};

/// Input to [`QueueState::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// Move queued ids into free active slots
    Dispatch,
    /// An active task finished
    Settled { id: String, ok: bool },
}

/// Snapshot of the scheduler.
///
/// Every id lives in exactly one of queued, active, completed; failed ids are
/// also completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueState {
    queued: VecDeque<String>,
    active: Vec<String>,
    completed: BTreeSet<String>,
    failed: BTreeSet<String>,
    limit: usize,
    just_dispatched: Vec<String>,
}

impl QueueState {
    /// Queue ids in order; repeated ids are kept once
    pub fn new<I>(ids: I, limit: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = HashSet::new();
        let queued = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        Self {
            queued,
            active: Vec::new(),
            completed: BTreeSet::new(),
            failed: BTreeSet::new(),
            limit: limit.max(1),
            just_dispatched: Vec::new(),
        }
    }

    /// Apply one event, producing the next snapshot
    pub fn apply(mut self, event: QueueEvent) -> Self {
        self.just_dispatched.clear();
        match event {
            QueueEvent::Dispatch => {
                while self.active.len() < self.limit {
                    let Some(id) = self.queued.pop_front() else {
                        break;
                    };
                    self.active.push(id.clone());
                    self.just_dispatched.push(id);
                }
            }
            QueueEvent::Settled { id, ok } => {
                // Unknown or already settled ids leave the state untouched
                if let Some(pos) = self.active.iter().position(|a| *a == id) {
                    self.active.remove(pos);
                    if !ok {
                        self.failed.insert(id.clone());
                    }
                    self.completed.insert(id);
                }
            }
        }
        self
    }

    /// Ids moved to active by the last `Dispatch`, in start order
    pub fn just_dispatched(&self) -> &[String] {
        &self.just_dispatched
    }

    pub fn queued(&self) -> impl Iterator<Item = &str> {
        self.queued.iter().map(String::as_str)
    }

    pub fn active(&self) -> &[String] {
        &self.active
    }

    pub fn completed(&self) -> &BTreeSet<String> {
        &self.completed
    }

    pub fn failed(&self) -> &BTreeSet<String> {
        &self.failed
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn total(&self) -> usize {
        self.queued.len() + self.active.len() + self.completed.len()
    }

    /// Nothing queued and nothing running
    pub fn is_complete(&self) -> bool {
        self.queued.is_empty() && self.active.is_empty()
    }

    /// Completed fraction in `[0, 1]`; an empty queue is fully done
    pub fn progress(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            1.0
        } else {
            self.completed.len() as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("page-{}", i)).collect()
    }

    fn settle(state: QueueState, id: &str, ok: bool) -> QueueState {
        state.apply(QueueEvent::Settled {
            id: id.to_string(),
            ok,
        })
    }

    #[test]
    fn test_dispatch_fills_free_slots_in_order() {
        let state = QueueState::new(ids(6), 3).apply(QueueEvent::Dispatch);
        assert_eq!(state.active(), &["page-1", "page-2", "page-3"]);
        assert_eq!(state.just_dispatched(), &["page-1", "page-2", "page-3"]);
        assert_eq!(state.queued().count(), 3);
    }

    #[test]
    fn test_settlement_frees_slot_for_next() {
        let state = QueueState::new(ids(6), 3).apply(QueueEvent::Dispatch);
        let state = settle(state, "page-2", true).apply(QueueEvent::Dispatch);
        assert_eq!(state.just_dispatched(), &["page-4"]);
        assert_eq!(state.active(), &["page-1", "page-3", "page-4"]);
        assert!(state.completed().contains("page-2"));
    }

    #[test]
    fn test_failure_is_recorded_as_completed() {
        let state = QueueState::new(ids(2), 2).apply(QueueEvent::Dispatch);
        let state = settle(settle(state, "page-1", false), "page-2", true);
        assert!(state.is_complete());
        assert_eq!(state.completed().len(), 2);
        assert_eq!(state.failed().iter().collect::<Vec<_>>(), vec!["page-1"]);
    }

    #[test]
    fn test_zero_limit_means_one() {
        let state = QueueState::new(ids(3), 0).apply(QueueEvent::Dispatch);
        assert_eq!(state.limit(), 1);
        assert_eq!(state.active(), &["page-1"]);
    }

    #[test]
    fn test_duplicate_ids_dispatched_once() {
        let state = QueueState::new(
            vec!["a".to_string(), "b".to_string(), "a".to_string()],
            5,
        )
        .apply(QueueEvent::Dispatch);
        assert_eq!(state.active(), &["a", "b"]);
        assert_eq!(state.total(), 2);
    }

    #[test]
    fn test_unknown_settlement_is_ignored() {
        let state = QueueState::new(ids(2), 1).apply(QueueEvent::Dispatch);
        let next = settle(state.clone(), "page-2", true);
        assert_eq!(next.active(), state.active());
        assert!(next.completed().is_empty());

        let done = settle(settle(state, "page-1", true), "page-1", false);
        assert!(done.failed().is_empty());
    }

    #[test]
    fn test_empty_queue_is_complete() {
        let state = QueueState::new(Vec::new(), 3).apply(QueueEvent::Dispatch);
        assert!(state.is_complete());
        assert_eq!(state.progress(), 1.0);
    }

    proptest! {
        #[test]
        fn test_invariants_hold_for_any_settlement_order(
            n in 0usize..20,
            limit in 0usize..6,
            picks in proptest::collection::vec(any::<usize>(), 0..64),
        ) {
            let mut state = QueueState::new(ids(n), limit).apply(QueueEvent::Dispatch);
            let mut picks = picks.into_iter();
            let mut completions = 0;

            loop {
                prop_assert!(state.active().len() <= state.limit());
                prop_assert_eq!(state.total(), n);
                if state.is_complete() {
                    completions += 1;
                    break;
                }
                let pick = picks.next().unwrap_or(0) % state.active().len();
                let id = state.active()[pick].clone();
                state = settle(state, &id, pick % 2 == 0).apply(QueueEvent::Dispatch);
            }

            prop_assert_eq!(completions, 1);
            prop_assert_eq!(state.completed().len(), n);
            prop_assert!(state.failed().is_subset(state.completed()));
        }
    }
}
