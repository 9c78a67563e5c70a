//! Batching write sink for index records.
//!
//! Records written to a [`BulkSink`] are queued and forwarded to a
//! [`BulkClient`] in slices of at most `high_water_mark` records. A slice is
//! submitted when the queue reaches the mark, when the optional idle timer
//! fires with records pending, and when the sink is closed. At most one slice
//! is in flight at a time.
//!
//! ```no_run
//! use bulksink::{create_bulk_sink, IndexRecord, SinkOptions};
//! # async fn run(client: impl bulksink::BulkClient) -> bulksink::Result<()> {
//! let (sink, _events) = create_bulk_sink(Some(client), SinkOptions::default())?;
//! sink.write(IndexRecord::new("products", "product", serde_json::json!({"name": "lamp"})))?
//!     .await?;
//! let summary = sink.close(None).await?;
//! println!("wrote {} records", summary.written_records);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod sink;
pub mod types;

pub use config::{SinkOptions, DEFAULT_HIGH_WATER_MARK};
pub use error::{Result, SinkError};
pub use sink::{
    check_bulk_response, create_bulk_sink, validate_record, AckToken, BulkClient, BulkSink,
    SinkEvent, SinkEvents, SinkStats, SinkSummary,
};
pub use types::{BulkItem, BulkResponse, IndexRecord, ItemError, ItemOutcome};
