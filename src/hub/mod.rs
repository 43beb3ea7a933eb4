//! Event hub for real-time job events
//!
//! This module fans lifecycle events out to live connections:
//! - A single hub task owns the subscriber registry
//! - Owner-scoped publishes reach only that owner's subscribers
//! - Broadcasts reach every subscriber
//! - Slow subscribers are dropped instead of slowing publishers down

mod core;
mod event;
mod sink;

pub use self::core::{EventHub, SubscriberId};
pub use event::{CrawlEvent, EventPayload};
pub use sink::{MessageSink, SinkError, WriterSink};

use thiserror::Error;

/// Errors returned by hub handles
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Event hub is no longer running")]
    Closed,
}
