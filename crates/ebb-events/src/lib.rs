//! Structured events and the sink they are delivered to.
//!
//! The ledger and the orchestrator never write diagnostics to a global
//! channel. Both receive an `Arc<dyn EventSink>` at construction and report
//! every noteworthy occurrence (conservation violations, failed systems,
//! extinctions, physics lifecycle changes) as a typed [`LawEvent`].
//!
//! # Sinks
//!
//! | Sink | Use |
//! |------|-----|
//! | [`TracingSink`] | Default. Forwards each event to `tracing` at its [`Severity`]. |
//! | [`MemorySink`] | Records events in memory so tests can assert on them. |
//! | [`NullSink`] | Discards everything. |

pub mod event;
pub mod sink;

pub use event::{LawEvent, Severity};
pub use sink::{EventSink, MemorySink, NullSink, TracingSink};
