//! Bulk write sink with hybrid batching.
//!
//! One scheduler task owns the queue and the single in-flight flush slot.
//! Producers talk to it through [`BulkSink`]; flushes are triggered when the
//! queue reaches the high-water mark, when the idle timer fires, and on close.

use super::client::BulkClient;
use super::events::{SinkEvent, SinkEvents};
use super::response::check_bulk_response;
use super::validate::validate_record;
use crate::config::SinkOptions;
use crate::error::{Result, SinkError};
use crate::types::IndexRecord;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep_until, Instant};

type Ack = oneshot::Sender<Result<()>>;

enum SinkCommand {
    Write {
        record: IndexRecord,
        ack: Ack,
    },
    Close {
        last: Option<IndexRecord>,
        done: oneshot::Sender<Result<SinkSummary>>,
    },
}

/// Resolves once the sink no longer needs to hold the caller back for the
/// record it was issued for.
pub struct AckToken {
    rx: oneshot::Receiver<Result<()>>,
}

impl Future for AckToken {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(SinkError::Closed)))
    }
}

/// Point-in-time view of the scheduler counters. Observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SinkStats {
    pub queued: usize,
    pub written_records: u64,
    pub flushes: u64,
    pub in_flight: bool,
}

/// Returned by a successful [`BulkSink::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSummary {
    pub written_records: u64,
    pub flushes: u64,
}

#[derive(Default)]
struct SinkCounters {
    queued: AtomicUsize,
    written_records: AtomicU64,
    flushes: AtomicU64,
    in_flight: AtomicBool,
}

/// Producer-facing handle. Dropping it without calling [`BulkSink::close`]
/// still drains the queue, but nobody observes the outcome.
pub struct BulkSink {
    tx: mpsc::UnboundedSender<SinkCommand>,
    counters: Arc<SinkCounters>,
    high_water_mark: usize,
    handle: JoinHandle<()>,
}

/// Build a sink around `client` and spawn its scheduler on the current tokio
/// runtime.
///
/// # Errors
///
/// [`SinkError::Configuration`] when `client` is `None` ("client is required")
/// or the options are invalid.
pub fn create_bulk_sink<C: BulkClient>(
    client: Option<C>,
    options: SinkOptions,
) -> Result<(BulkSink, SinkEvents)> {
    let client = client.ok_or_else(SinkError::missing_client)?;
    options.validate()?;

    let (tx, rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let counters = Arc::new(SinkCounters::default());

    tracing::info!(
        "[SINK] started: high_water_mark={}, timeout={:?}",
        options.high_water_mark,
        options.timeout
    );

    let scheduler = Scheduler {
        client: Arc::new(client),
        high_water_mark: options.high_water_mark,
        timeout: options.timeout,
        queue: VecDeque::new(),
        in_flight: None,
        idle_due: false,
        written_records: 0,
        flushes: 0,
        events: events_tx,
        counters: Arc::clone(&counters),
    };
    let handle = tokio::spawn(scheduler.run(rx));

    Ok((
        BulkSink {
            tx,
            counters,
            high_water_mark: options.high_water_mark,
            handle,
        },
        events_rx,
    ))
}

impl BulkSink {
    /// Queue one record.
    ///
    /// The returned token resolves immediately for records that land below
    /// the high-water mark; those records are acknowledged before they reach
    /// the backend and are lost if the process dies before the next flush.
    /// The record that brings the queue to the mark (and any record queued
    /// behind it) resolves only once its slice has been flushed, with that
    /// flush's outcome.
    ///
    /// Backend failures never surface here; they arrive on the token and the
    /// event channel. The only synchronous error is [`SinkError::Closed`].
    pub fn write(&self, record: IndexRecord) -> Result<AckToken> {
        let (ack, rx) = oneshot::channel();
        self.tx
            .send(SinkCommand::Write { record, ack })
            .map_err(|_| SinkError::Closed)?;
        Ok(AckToken { rx })
    }

    /// Signal that no more writes will occur, optionally with one final record,
    /// and wait until the queue is drained.
    ///
    /// Returns the first error seen while closing (an invalid final record or
    /// a failed drain flush); earlier failures were already reported through
    /// their tokens and the event channel.
    pub async fn close(self, last: Option<IndexRecord>) -> Result<SinkSummary> {
        let (done, rx) = oneshot::channel();
        let sent = self.tx.send(SinkCommand::Close { last, done });
        drop(self.tx);
        let outcome = match sent {
            Ok(()) => rx.await.unwrap_or(Err(SinkError::Closed)),
            Err(_) => Err(SinkError::Closed),
        };
        if let Err(e) = self.handle.await {
            tracing::error!("[SINK] scheduler task failed: {}", e);
        }
        outcome
    }

    /// Counters as last published by the scheduler.
    pub fn stats(&self) -> SinkStats {
        SinkStats {
            queued: self.counters.queued.load(Ordering::Acquire),
            written_records: self.counters.written_records.load(Ordering::Acquire),
            flushes: self.counters.flushes.load(Ordering::Acquire),
            in_flight: self.counters.in_flight.load(Ordering::Acquire),
        }
    }

    /// Records per flush slice and the threshold that triggers a flush.
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }
}

struct QueuedRecord {
    record: IndexRecord,
    /// `Some` while the producer is still being held back for this record.
    ack: Option<Ack>,
}

#[derive(Debug, Clone, Copy)]
enum FlushTrigger {
    Threshold,
    Idle,
    Close,
}

struct PendingFlush {
    seq: u64,
    size: usize,
    trigger: FlushTrigger,
    acks: Vec<Ack>,
    handle: JoinHandle<Result<()>>,
}

struct Closing {
    done: Option<oneshot::Sender<Result<SinkSummary>>>,
    first_error: Option<SinkError>,
}

struct Scheduler<C> {
    client: Arc<C>,
    high_water_mark: usize,
    timeout: Option<Duration>,
    queue: VecDeque<QueuedRecord>,
    in_flight: Option<PendingFlush>,
    /// An idle tick found records while a flush was in flight.
    idle_due: bool,
    written_records: u64,
    flushes: u64,
    events: mpsc::UnboundedSender<SinkEvent>,
    counters: Arc<SinkCounters>,
}

impl<C: BulkClient> Scheduler<C> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SinkCommand>) {
        let mut deadline = self.timeout.map(|t| Instant::now() + t);
        let mut closing: Option<Closing> = None;

        loop {
            if closing.is_some() && self.in_flight.is_none() {
                if self.queue.is_empty() {
                    if let Some(state) = closing.take() {
                        self.finish(state);
                    }
                    return;
                }
                self.start_flush(FlushTrigger::Close);
                self.sync_counters();
            }

            tokio::select! {
                biased;
                joined = settle(&mut self.in_flight) => {
                    let failure = self.on_settled(joined);
                    match closing.as_mut() {
                        Some(state) => {
                            if let Some(e) = failure {
                                state.first_error.get_or_insert(e);
                            }
                        }
                        None => self.maybe_flush(),
                    }
                }
                command = rx.recv(), if closing.is_none() => match command {
                    Some(SinkCommand::Write { record, ack }) => {
                        let _ = self.enqueue(record, Some(ack));
                        self.maybe_flush();
                    }
                    Some(SinkCommand::Close { last, done }) => {
                        tracing::debug!(
                            "[SINK] close requested, pending={}, final_record={}",
                            self.queue.len(),
                            last.is_some()
                        );
                        deadline = None;
                        let mut state = Closing {
                            done: Some(done),
                            first_error: None,
                        };
                        if let Some(record) = last {
                            if let Err(e) = self.enqueue(record, None) {
                                state.first_error = Some(e);
                            }
                        }
                        closing = Some(state);
                    }
                    None => {
                        tracing::info!(
                            "[SINK] all handles dropped, draining {} pending",
                            self.queue.len()
                        );
                        deadline = None;
                        closing = Some(Closing {
                            done: None,
                            first_error: None,
                        });
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_idle_tick();
                    deadline = self.timeout.map(|t| Instant::now() + t);
                }
            }
            self.sync_counters();
        }
    }

    /// Validate and append. Records below the mark are acknowledged on the spot.
    fn enqueue(&mut self, record: IndexRecord, ack: Option<Ack>) -> Result<()> {
        if let Err(e) = validate_record(&record) {
            tracing::warn!("[SINK] rejected record for index {:?}: {}", record.index, e);
            let _ = self.events.send(SinkEvent::Error(e.clone()));
            if let Some(ack) = ack {
                let _ = ack.send(Err(e.clone()));
            }
            return Err(e);
        }

        let position = self.queue.len();
        let ack = match ack {
            Some(ack) if position + 1 < self.high_water_mark => {
                let _ = ack.send(Ok(()));
                None
            }
            other => other,
        };
        self.queue.push_back(QueuedRecord { record, ack });
        Ok(())
    }

    fn maybe_flush(&mut self) {
        if self.in_flight.is_some() || self.queue.is_empty() {
            return;
        }
        if self.queue.len() >= self.high_water_mark {
            self.start_flush(FlushTrigger::Threshold);
        } else if self.idle_due {
            self.start_flush(FlushTrigger::Idle);
        }
    }

    fn on_idle_tick(&mut self) {
        if self.queue.is_empty() {
            tracing::trace!("[SINK] idle tick, queue empty");
            return;
        }
        if self.in_flight.is_some() {
            tracing::debug!(
                "[SINK] idle tick deferred, flush in flight, pending={}",
                self.queue.len()
            );
            self.idle_due = true;
            return;
        }
        tracing::debug!("[SINK] idle tick, flushing {} pending", self.queue.len());
        self.start_flush(FlushTrigger::Idle);
    }

    /// Extract at most one high-water-mark sized slice from the head of the
    /// queue and submit it.
    fn start_flush(&mut self, trigger: FlushTrigger) {
        let size = self.queue.len().min(self.high_water_mark);
        let mut batch = Vec::with_capacity(size);
        let mut acks = Vec::new();
        for queued in self.queue.drain(..size) {
            if let Some(ack) = queued.ack {
                acks.push(ack);
            }
            batch.push(queued.record);
        }
        self.release_acks_below_mark();
        self.idle_due = false;
        self.flushes += 1;

        tracing::debug!(
            "[SINK] flush #{} ({:?}): submitting {} records, {} still queued",
            self.flushes,
            trigger,
            size,
            self.queue.len()
        );

        let client = Arc::clone(&self.client);
        let handle = tokio::spawn(async move {
            let response = client.submit(batch).await?;
            check_bulk_response(&response)
        });

        self.in_flight = Some(PendingFlush {
            seq: self.flushes,
            size,
            trigger,
            acks,
            handle,
        });
    }

    /// After a slice leaves the queue, records that moved below the mark no
    /// longer need to hold their producer back.
    fn release_acks_below_mark(&mut self) {
        let below = self.high_water_mark.saturating_sub(1).min(self.queue.len());
        for queued in self.queue.iter_mut().take(below) {
            if let Some(ack) = queued.ack.take() {
                let _ = ack.send(Ok(()));
            }
        }
    }

    /// Apply the outcome of the in-flight flush. Returns the failure, if any.
    fn on_settled(
        &mut self,
        joined: std::result::Result<Result<()>, JoinError>,
    ) -> Option<SinkError> {
        let pending = self.in_flight.take()?;
        let result = joined.unwrap_or_else(|e| {
            Err(SinkError::Transport(format!("flush task failed: {}", e)))
        });

        match result {
            Ok(()) => {
                self.written_records += pending.size as u64;
                self.sync_counters();
                tracing::debug!(
                    "[SINK] flush #{} ({:?}) done: {} records, written_records={}",
                    pending.seq,
                    pending.trigger,
                    pending.size,
                    self.written_records
                );
                let _ = self.events.send(SinkEvent::Flushed {
                    records: pending.size,
                    written_records: self.written_records,
                });
                for ack in pending.acks {
                    let _ = ack.send(Ok(()));
                }
                None
            }
            Err(e) => {
                tracing::error!(
                    code = e.code(),
                    "[SINK] flush #{} ({:?}) failed, dropping {} records: {}",
                    pending.seq,
                    pending.trigger,
                    pending.size,
                    e
                );
                self.sync_counters();
                let _ = self.events.send(SinkEvent::Error(e.clone()));
                for ack in pending.acks {
                    let _ = ack.send(Err(e.clone()));
                }
                Some(e)
            }
        }
    }

    fn finish(&mut self, state: Closing) {
        tracing::info!(
            "[SINK] finished: written_records={}, flushes={}",
            self.written_records,
            self.flushes
        );
        self.sync_counters();
        let _ = self.events.send(SinkEvent::Finished {
            written_records: self.written_records,
        });
        if let Some(done) = state.done {
            let outcome = match state.first_error {
                Some(e) => Err(e),
                None => Ok(SinkSummary {
                    written_records: self.written_records,
                    flushes: self.flushes,
                }),
            };
            let _ = done.send(outcome);
        }
    }

    fn sync_counters(&self) {
        self.counters
            .queued
            .store(self.queue.len(), Ordering::Release);
        self.counters
            .written_records
            .store(self.written_records, Ordering::Release);
        self.counters.flushes.store(self.flushes, Ordering::Release);
        self.counters
            .in_flight
            .store(self.in_flight.is_some(), Ordering::Release);
    }
}

/// Completes when the in-flight flush does; pends forever when there is none.
async fn settle(
    in_flight: &mut Option<PendingFlush>,
) -> std::result::Result<Result<()>, JoinError> {
    match in_flight {
        Some(pending) => (&mut pending.handle).await,
        None => std::future::pending().await,
    }
}
