//! Structured observability vocabulary.
//!
//! Library code emits `tracing` events tagged with `event` and `component` fields and never
//! installs a global subscriber; binaries and tests do that once at process boundaries.

pub mod events;
