//! Async driver for the queue.

use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tracing::debug;

use super::state::{QueueEvent, QueueState};

/// What observers hear about while the queue runs
#[derive(Debug, Clone, Copy)]
pub enum QueueProgress<'a> {
    Started(&'a str),
    Settled {
        id: &'a str,
        ok: bool,
        state: &'a QueueState,
    },
    /// Emitted exactly once per run
    Complete(&'a QueueState),
}

#[derive(Debug, Clone, Copy)]
pub struct BoundedTaskQueue {
    limit: usize,
}

impl BoundedTaskQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run every task and return the final state.
    ///
    /// `execute` is called once per unique id, at dispatch time, and resolves
    /// to whether the task succeeded. All active futures are polled from the
    /// calling task, so state updates never interleave.
    pub async fn run<F, Fut, O>(&self, ids: Vec<String>, execute: F, mut observe: O) -> QueueState
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = bool>,
        O: FnMut(QueueProgress<'_>),
    {
        let start = |id: String| {
            let task = execute(id.clone());
            async move { (id, task.await) }
        };

        let mut state = QueueState::new(ids, self.limit).apply(QueueEvent::Dispatch);
        debug!(
            "Queue started: {} tasks, limit {}",
            state.total(),
            self.limit
        );

        let mut running = FuturesUnordered::new();
        for id in state.just_dispatched() {
            observe(QueueProgress::Started(id));
            running.push(start(id.clone()));
        }

        while !state.is_complete() {
            let Some((id, ok)) = running.next().await else {
                break;
            };
            state = state.apply(QueueEvent::Settled { id: id.clone(), ok });
            observe(QueueProgress::Settled {
                id: &id,
                ok,
                state: &state,
            });

            state = state.apply(QueueEvent::Dispatch);
            for next in state.just_dispatched() {
                observe(QueueProgress::Started(next));
                running.push(start(next.clone()));
            }
        }

        debug!(
            "Queue complete: {} done, {} failed",
            state.completed().len(),
            state.failed().len()
        );
        observe(QueueProgress::Complete(&state));
        state
    }
}
