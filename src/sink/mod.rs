pub mod client;
pub mod events;
pub mod response;
pub mod validate;
pub mod write_queue;

pub use client::BulkClient;
pub use events::{SinkEvent, SinkEvents};
pub use response::check_bulk_response;
pub use validate::validate_record;
pub use write_queue::{create_bulk_sink, AckToken, BulkSink, SinkStats, SinkSummary};
