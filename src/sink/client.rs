use crate::error::Result;
use crate::types::{BulkResponse, IndexRecord};
use std::future::Future;
use std::sync::Arc;

/// The bulk backend capability the sink submits slices to.
///
/// `submit` receives an owned copy of one slice and resolves exactly once:
/// `Err` for a transport-level failure, `Ok` with the per-item outcome
/// otherwise. Implementations must not retry on the sink's behalf.
pub trait BulkClient: Send + Sync + 'static {
    fn submit(
        &self,
        batch: Vec<IndexRecord>,
    ) -> impl Future<Output = Result<BulkResponse>> + Send;
}

impl<C: BulkClient> BulkClient for Arc<C> {
    fn submit(
        &self,
        batch: Vec<IndexRecord>,
    ) -> impl Future<Output = Result<BulkResponse>> + Send {
        C::submit(self, batch)
    }
}
