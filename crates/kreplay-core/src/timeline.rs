//! The per-epoch timeline table.
//!
//! One row per unit, one column per observed or derived metric. The
//! table is shared by the submission scheduler and the event correlator;
//! every single cell access takes the table lock and releases it before
//! returning, so no caller ever holds it across an await point.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::unit::SubmittableUnit;

/// Columns of the exported table, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    JobId,
    WorkloadName,
    Profile,
    SubmissionTime,
    RequestedResources,
    RequestedTime,
    Success,
    FinalState,
    StartingTime,
    ExecutionTime,
    FinishTime,
    WaitingTime,
    TurnaroundTime,
    Stretch,
    AllocatedResources,
    ConsumedEnergy,
    Metadata,
    ScheduledTime,
    PullingTime,
    PulledTime,
    CreatedTime,
}

impl Column {
    pub const ALL: [Column; 21] = [
        Column::JobId,
        Column::WorkloadName,
        Column::Profile,
        Column::SubmissionTime,
        Column::RequestedResources,
        Column::RequestedTime,
        Column::Success,
        Column::FinalState,
        Column::StartingTime,
        Column::ExecutionTime,
        Column::FinishTime,
        Column::WaitingTime,
        Column::TurnaroundTime,
        Column::Stretch,
        Column::AllocatedResources,
        Column::ConsumedEnergy,
        Column::Metadata,
        Column::ScheduledTime,
        Column::PullingTime,
        Column::PulledTime,
        Column::CreatedTime,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::JobId => "job_id",
            Column::WorkloadName => "workload_name",
            Column::Profile => "profile",
            Column::SubmissionTime => "submission_time",
            Column::RequestedResources => "requested_resources",
            Column::RequestedTime => "requested_time",
            Column::Success => "success",
            Column::FinalState => "final_state",
            Column::StartingTime => "starting_time",
            Column::ExecutionTime => "execution_time",
            Column::FinishTime => "finish_time",
            Column::WaitingTime => "waiting_time",
            Column::TurnaroundTime => "turnaround_time",
            Column::Stretch => "stretch",
            Column::AllocatedResources => "allocated_resources",
            Column::ConsumedEnergy => "consumed_energy",
            Column::Metadata => "metadata",
            Column::ScheduledTime => "scheduled_time",
            Column::PullingTime => "pulling_time",
            Column::PulledTime => "pulled_time",
            Column::CreatedTime => "created_time",
        }
    }

    pub fn header() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.name()).collect()
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Batsim final states written by this tool.
pub mod final_state {
    pub const COMPLETED_SUCCESSFULLY: &str = "COMPLETED_SUCCESSFULLY";
    pub const REJECTED: &str = "REJECTED";
    pub const UNOBSERVED_COMPLETION: &str = "UNOBSERVED_COMPLETION";
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    /// Seconds relative to the epoch origin (or a duration in seconds).
    Seconds(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn seconds(&self) -> Option<f64> {
        match self {
            Cell::Seconds(s) => Some(*s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Int(n) => write!(f, "{n}"),
            Cell::Seconds(s) if !s.is_finite() => Ok(()),
            Cell::Seconds(s) => write!(f, "{s:.6}"),
        }
    }
}

/// Index of a row in a [`TimelineTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId(usize);

pub type Row = Vec<Cell>;

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<Row>,
    by_job: HashMap<String, RowId>,
}

#[derive(Debug, Default)]
pub struct TimelineTable {
    inner: Mutex<Inner>,
}

impl TimelineTable {
    /// Build a fresh table with the static columns filled in.
    pub fn new(units: &[SubmittableUnit], workload_name: &str) -> Self {
        let mut inner = Inner::default();
        for unit in units {
            let mut row = vec![Cell::Empty; Column::ALL.len()];
            row[Column::JobId.index()] = Cell::Text(unit.id.clone());
            row[Column::WorkloadName.index()] = Cell::Text(workload_name.to_string());
            row[Column::Profile.index()] = Cell::Text(unit.profile.clone());
            row[Column::RequestedResources.index()] = Cell::Int(unit.requested_resources.into());
            // no time limit is enforced on the cluster
            row[Column::RequestedTime.index()] = Cell::Int(0);
            row[Column::ConsumedEnergy.index()] = Cell::Int(-1);
            row[Column::FinalState.index()] =
                Cell::Text(final_state::COMPLETED_SUCCESSFULLY.to_string());
            row[Column::Success.index()] = Cell::Int(1);
            inner.by_job.insert(unit.id.clone(), RowId(inner.rows.len()));
            inner.rows.push(row);
        }
        Self {
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Cells are independent; a panicked writer cannot leave a row half-updated.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn lookup_row(&self, job_id: &str) -> Option<RowId> {
        self.lock().by_job.get(job_id).copied()
    }

    pub fn write(&self, row: RowId, column: Column, value: Cell) {
        if let Some(r) = self.lock().rows.get_mut(row.0) {
            r[column.index()] = value;
        }
    }

    /// Write `value` unless the cell already holds something.
    /// Returns whether the write happened.
    pub fn write_if_empty(&self, row: RowId, column: Column, value: Cell) -> bool {
        let mut inner = self.lock();
        match inner.rows.get_mut(row.0) {
            Some(r) if r[column.index()].is_empty() => {
                r[column.index()] = value;
                true
            }
            _ => false,
        }
    }

    pub fn read(&self, row: RowId, column: Column) -> Cell {
        self.lock()
            .rows
            .get(row.0)
            .map(|r| r[column.index()].clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` over every row with the lock held once. Used after the
    /// concurrent phase of an epoch is over.
    pub fn update_rows(&self, mut f: impl FnMut(&mut Row)) {
        for row in self.lock().rows.iter_mut() {
            f(row);
        }
    }

    pub fn snapshot(&self) -> Vec<Row> {
        self.lock().rows.clone()
    }
}

/// Typed access into a raw [`Row`].
pub trait RowExt {
    fn get_cell(&self, column: Column) -> &Cell;
    fn set_cell(&mut self, column: Column, value: Cell);
}

impl RowExt for Row {
    fn get_cell(&self, column: Column) -> &Cell {
        &self[column.index()]
    }

    fn set_cell(&mut self, column: Column, value: Cell) {
        self[column.index()] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::test_unit;
    use std::sync::Arc;

    #[test]
    fn header_has_all_columns_in_order() {
        let header = Column::header();
        assert_eq!(header.len(), 21);
        assert_eq!(header[0], "job_id");
        assert_eq!(header[3], "submission_time");
        assert_eq!(header[13], "stretch");
        assert_eq!(header[20], "created_time");
    }

    #[test]
    fn static_columns_are_prefilled() {
        let table = TimelineTable::new(&[test_unit("7", 0.0)], "w0");
        let row = table.lookup_row("7").unwrap();
        assert_eq!(table.read(row, Column::JobId), Cell::Text("7".into()));
        assert_eq!(table.read(row, Column::WorkloadName), Cell::Text("w0".into()));
        assert_eq!(table.read(row, Column::Success), Cell::Int(1));
        assert_eq!(table.read(row, Column::ConsumedEnergy), Cell::Int(-1));
        assert!(table.read(row, Column::SubmissionTime).is_empty());
    }

    #[test]
    fn unknown_job_has_no_row() {
        let table = TimelineTable::new(&[test_unit("7", 0.0)], "w0");
        assert!(table.lookup_row("8").is_none());
    }

    #[test]
    fn write_if_empty_keeps_first_value() {
        let table = TimelineTable::new(&[test_unit("1", 0.0)], "w0");
        let row = table.lookup_row("1").unwrap();
        assert!(table.write_if_empty(row, Column::PulledTime, Cell::Seconds(1.0)));
        assert!(!table.write_if_empty(row, Column::PulledTime, Cell::Seconds(2.0)));
        assert_eq!(table.read(row, Column::PulledTime), Cell::Seconds(1.0));
    }

    #[test]
    fn cells_render_fixed_point_and_blank_undefined() {
        assert_eq!(Cell::Seconds(1.5).to_string(), "1.500000");
        assert_eq!(Cell::Seconds(f64::NAN).to_string(), "");
        assert_eq!(Cell::Empty.to_string(), "");
        assert_eq!(Cell::Int(-1).to_string(), "-1");
    }

    #[test]
    fn concurrent_writers_touch_distinct_cells() {
        let units: Vec<_> = (0..64).map(|i| test_unit(&i.to_string(), 0.0)).collect();
        let table = Arc::new(TimelineTable::new(&units, "w0"));
        let handles: Vec<_> = (0..64)
            .map(|i| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    let row = table.lookup_row(&i.to_string()).unwrap();
                    table.write(row, Column::SubmissionTime, Cell::Seconds(i as f64));
                    table.write(row, Column::FinishTime, Cell::Seconds(i as f64 + 1.0));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for i in 0..64 {
            let row = table.lookup_row(&i.to_string()).unwrap();
            assert_eq!(table.read(row, Column::FinishTime), Cell::Seconds(i as f64 + 1.0));
        }
    }
}
