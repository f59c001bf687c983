//! Job orchestration: the per-job runner and the bounded worker pool.

mod pool;
mod runner;

pub use pool::{JobHandle, WorkerPool};
pub use runner::{JobRunner, NOTE_ANALYZING, NOTE_CANCELLED, NOTE_INITIALIZING};
