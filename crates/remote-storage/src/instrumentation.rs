//! Metric names and recording helpers.
//!
//! Recording goes through the `metrics` facade; the host process decides
//! which recorder (if any) is installed.

use std::time::Instant;

use metrics::{Unit, counter, describe_counter, describe_histogram, histogram};
use reqwest::StatusCode;

/// Per-call duration histogram, tagged by [`OPERATION_TAG_NAME`].
pub const STORAGE_MANAGER_TIMER_NAME: &str = "cdn3_storage_manager_duration_seconds";

/// Response counter, tagged by [`OPERATION_TAG_NAME`] and [`STATUS_TAG_NAME`].
pub const STORAGE_MANAGER_STATUS_COUNTER_NAME: &str = "cdn3_storage_manager_status_total";

pub const OPERATION_TAG_NAME: &str = "op";
pub const STATUS_TAG_NAME: &str = "status";

pub(crate) const OP_COPY: &str = "copy";
pub(crate) const OP_LIST: &str = "list";
pub(crate) const OP_USAGE: &str = "usage";

/// Registers descriptions for the metrics emitted by this crate.
pub fn describe_metrics() {
    describe_histogram!(
        STORAGE_MANAGER_TIMER_NAME,
        Unit::Seconds,
        "Wall-clock duration of cdn3 storage operations"
    );
    describe_counter!(
        STORAGE_MANAGER_STATUS_COUNTER_NAME,
        Unit::Count,
        "Storage manager responses by operation and HTTP status"
    );
}

/// Records the elapsed time of one operation when dropped.
///
/// Moving the timer into the operation's future guarantees exactly one
/// sample per invocation on every exit path.
pub(crate) struct OperationTimer {
    op: &'static str,
    start: Instant,
}

impl OperationTimer {
    pub(crate) fn start(op: &'static str) -> Self {
        Self {
            op,
            start: Instant::now(),
        }
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        histogram!(STORAGE_MANAGER_TIMER_NAME, OPERATION_TAG_NAME => self.op)
            .record(self.start.elapsed().as_secs_f64());
    }
}

pub(crate) fn record_status(op: &'static str, status: StatusCode) {
    counter!(
        STORAGE_MANAGER_STATUS_COUNTER_NAME,
        OPERATION_TAG_NAME => op,
        STATUS_TAG_NAME => status.as_u16().to_string()
    )
    .increment(1);
}
