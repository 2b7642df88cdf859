//! Runtime integration layer.
//!
//! Keeps thread and async-runtime ownership in one place: the cooperative tick scheduler
//! that drives periodic synchronization, and the helper that hosts a single-threaded tokio
//! runtime on a dedicated named thread.

pub mod task_scheduler;
pub(crate) mod worker_runtime;
