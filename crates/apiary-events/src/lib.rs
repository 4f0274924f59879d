#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The in-process event bus for the Apiary swarm engine.
//!
//! Every component emits through a [`LogStream`], a cheap-clone handle that
//! stamps entries with the current [`ExecutionContext`](apiary_core::ExecutionContext)
//! and forwards them to a shared [`LogCollector`]. Subscribers attach filters
//! and receive entries synchronously, in emit order; a panicking subscriber is
//! isolated and does not break the others.

mod collector;
mod entry;
mod filter;
mod stream;

pub use collector::{LogCollector, Subscription, SubscriptionId};
pub use entry::LogEntry;
pub use filter::{FieldMatcher, LogFilter};
pub use stream::LogStream;
