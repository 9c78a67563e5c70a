use bulksink::{BulkClient, BulkResponse, IndexRecord, Result};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Scripted in-memory backend.
///
/// Every submitted batch is recorded. Responses are taken from the scripted
/// queue, falling back to an all-success outcome. A gated client blocks each
/// submission until a semaphore permit is added.
#[derive(Default)]
pub struct MockClient {
    batches: Mutex<Vec<Vec<IndexRecord>>>,
    responses: Mutex<VecDeque<Result<BulkResponse>>>,
    gate: Option<Arc<Semaphore>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

#[allow(dead_code)]
impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated() -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let client = Arc::new(Self {
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        });
        (client, gate)
    }

    pub fn push_response(&self, response: Result<BulkResponse>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn submissions(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    /// The `n` field of every submitted record, in submission order.
    pub fn submitted_ns(&self) -> Vec<u64> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|r| r.body["n"].as_u64().unwrap())
            .collect()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl BulkClient for MockClient {
    fn submit(
        &self,
        batch: Vec<IndexRecord>,
    ) -> impl Future<Output = Result<BulkResponse>> + Send {
        let count = batch.len();
        self.batches.lock().unwrap().push(batch);
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(BulkResponse::all_ok(count)));
        let gate = self.gate.clone();

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        async move {
            if let Some(gate) = gate {
                gate.acquire().await.unwrap().forget();
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
            response
        }
    }
}

pub fn record(n: u64) -> IndexRecord {
    IndexRecord::new("test-index", "test-type", serde_json::json!({ "n": n }))
}

/// Spin the current-thread runtime until `cond` holds.
#[allow(dead_code)]
pub async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
