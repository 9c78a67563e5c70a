use crate::error::SinkError;
use tokio::sync::mpsc;

/// Notifications emitted by the scheduler, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// A slice was accepted by the backend without item failures.
    Flushed { records: usize, written_records: u64 },
    /// Validation, transport or aggregate item failure.
    Error(SinkError),
    /// The queue is drained after close and no flush is outstanding.
    Finished { written_records: u64 },
}

/// Receiving half of the event channel. Unbounded so a slow or dropped
/// consumer never stalls the scheduler.
pub type SinkEvents = mpsc::UnboundedReceiver<SinkEvent>;
