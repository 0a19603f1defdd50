//! Offset-addressed event log decoupling the engine from the services
//! that react to it. Readers poll from an offset with an optional
//! blocking timeout; writers append and wake them.

mod in_memory;

pub use self::in_memory::*;

use crate::event::Event;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

pub type Offset = u64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEvent {
    pub offset: Offset,
    pub details: Event,
}

/// A batch of events plus the offset to resume from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithOffset {
    pub offset: Offset,
    pub data: Vec<LogEvent>,
}

pub trait Reader: Send + Sync {
    /// Read up to `limit` events starting at `offset`. When the log
    /// has nothing past `offset`, blocks up to `timeout` (forever if
    /// `None`) for a write before returning what is there.
    fn read(&self, offset: Offset, limit: usize, timeout: Option<Duration>) -> Result<WithOffset>;

    fn get_start_offset(&self) -> Result<Offset>;
}

pub trait Writer: Send + Sync {
    /// Append events atomically; returns the offset past the batch.
    fn write(&self, events: &[Event]) -> Result<Offset>;
}

pub type SharedReader = Arc<dyn Reader + 'static>;
pub type SharedWriter = Arc<dyn Writer + 'static>;
