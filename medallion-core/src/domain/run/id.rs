// medallion-core/src/domain/run/id.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Run identifier. Allocated from the wall clock in epoch milliseconds, bumped
/// past the last known id so ids stay strictly increasing even if the clock
/// stalls or steps backwards.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl RunId {
    pub fn next_after(last: Option<RunId>, now_ms: u64) -> RunId {
        match last {
            Some(RunId(prev)) if prev >= now_ms => RunId(prev.saturating_add(1)),
            _ => RunId(now_ms),
        }
    }

    pub fn as_i64(&self) -> i64 {
        i64::try_from(self.0).unwrap_or(i64::MAX)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(RunId)
    }
}
