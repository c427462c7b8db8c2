//! Bounded Task Queue
//!
//! Schedules page-generation tasks under a fixed concurrency cap.
//!
//! The scheduling rules live in [`QueueState::apply`], a pure transition
//! function over immutable snapshots, so they can be checked without timers
//! or network. [`BoundedTaskQueue`] drives real futures through those
//! transitions from a single task.
//!
//! ## Rules
//!
//! - At most `limit` tasks are active at any time (`limit = 0` means 1)
//! - Tasks start in list order and may finish in any order
//! - A settled task immediately frees its slot for the next queued id
//! - Failures are recorded and never cancel siblings; nothing is retried
//! - Completion is signalled exactly once, when nothing is queued or active

mod driver;
mod state;

pub use driver::{BoundedTaskQueue, QueueProgress};
pub use state::{QueueEvent, QueueState};
