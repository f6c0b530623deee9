// medallion-core/src/domain/run/context.rs

use chrono::{DateTime, NaiveDate, Utc};

use super::id::RunId;

/// Passed explicitly to every stage of a run. There is no ambient run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: RunId,
    /// Reference date for date-relative soft rules ("stocked in the future").
    pub as_of: NaiveDate,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(run_id: RunId, as_of: NaiveDate, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            as_of,
            started_at,
        }
    }

    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((now - self.started_at).num_milliseconds()).unwrap_or(0)
    }
}
