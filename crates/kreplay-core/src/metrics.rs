//! Derived columns computed once an epoch's raw timestamps are in.

use crate::timeline::{final_state, Cell, Column, Row, RowExt, TimelineTable};

/// Derived metrics for one completed row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derived {
    pub execution: f64,
    pub waiting: f64,
    pub turnaround: f64,
    /// NaN when the execution time is zero.
    pub stretch: f64,
}

pub fn derive(submission: f64, starting: f64, finish: f64) -> Derived {
    let execution = finish - starting;
    let waiting = starting - submission;
    let stretch = if execution == 0.0 {
        f64::NAN
    } else {
        (finish - submission) / execution
    };
    Derived {
        execution,
        waiting,
        turnaround: execution + waiting,
        stretch,
    }
}

/// Fill execution, waiting, turnaround and stretch for every row whose
/// submission, starting and finish times were all observed.
///
/// Rows that never completed keep blank derived columns and are marked
/// `REJECTED` (never submitted) or `UNOBSERVED_COMPLETION`. Returns the
/// number of finalized rows.
pub fn finalize(table: &TimelineTable) -> usize {
    let mut finalized = 0;
    table.update_rows(|row| {
        if finalize_row(row) {
            finalized += 1;
        }
    });
    finalized
}

fn finalize_row(row: &mut Row) -> bool {
    let submission = row.get_cell(Column::SubmissionTime).seconds();
    let starting = row.get_cell(Column::StartingTime).seconds();
    let finish = row.get_cell(Column::FinishTime).seconds();

    match (submission, starting, finish) {
        (Some(submission), Some(starting), Some(finish)) => {
            let d = derive(submission, starting, finish);
            row.set_cell(Column::ExecutionTime, Cell::Seconds(d.execution));
            row.set_cell(Column::WaitingTime, Cell::Seconds(d.waiting));
            row.set_cell(Column::TurnaroundTime, Cell::Seconds(d.turnaround));
            row.set_cell(Column::Stretch, Cell::Seconds(d.stretch));
            true
        }
        _ => {
            let state = match (submission, finish) {
                (None, _) => final_state::REJECTED,
                (Some(_), None) => final_state::UNOBSERVED_COMPLETION,
                // finished but the start was never reported: keep the outcome
                (Some(_), Some(_)) => return false,
            };
            row.set_cell(Column::FinalState, Cell::Text(state.to_string()));
            row.set_cell(Column::Success, Cell::Int(0));
            false
        }
    }
}
