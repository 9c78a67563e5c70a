pub mod client;

pub use client::{encode_bulk_body, HttpBulkClient};
