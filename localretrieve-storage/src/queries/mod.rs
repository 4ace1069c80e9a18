//! Query modules operating through the adapter. Higher layers compose
//! these; nothing here starts timers or talks to the network.

pub mod cache_ops;
pub mod collection_ops;
pub mod document_ops;
pub mod queue_ops;

use chrono::{DateTime, Utc};

/// Millisecond timestamps are the at-rest time encoding.
pub(crate) fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub(crate) fn datetime_to_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}
