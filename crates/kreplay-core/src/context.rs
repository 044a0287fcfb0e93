use tokio::time::Instant;

use crate::naming::Naming;
use crate::timeline::TimelineTable;

/// State shared by the two concurrent tasks of one epoch.
///
/// Everything here is either immutable or guarded by the table's own lock.
/// The unfinished counter and node registry are owned by the correlator
/// alone and therefore live there, not here.
#[derive(Debug)]
pub struct EpochContext {
    pub index: u32,
    pub origin: Instant,
    pub naming: Naming,
    pub table: TimelineTable,
}

impl EpochContext {
    pub fn new(index: u32, origin: Instant, naming: Naming, table: TimelineTable) -> Self {
        Self {
            index,
            origin,
            naming,
            table,
        }
    }

    /// Seconds from the origin to `at`, rounded to the millisecond.
    pub fn seconds_at(&self, at: Instant) -> f64 {
        let elapsed = at.saturating_duration_since(self.origin);
        (elapsed.as_secs_f64() * 1000.0).round() / 1000.0
    }

    pub fn now_secs(&self) -> f64 {
        self.seconds_at(Instant::now())
    }

    pub fn subject_name(&self, unit_id: &str) -> String {
        self.naming.render(self.index, unit_id)
    }
}
