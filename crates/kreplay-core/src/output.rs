//! Persisting epoch tables as simulator-compatible `_jobs.csv` files.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{ReplayError, Result};
use crate::timeline::{Column, TimelineTable};

/// Where epoch files go: `<dir>/<prefix><epoch>_jobs.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPrefix {
    pub dir: PathBuf,
    pub prefix: String,
}

impl OutputPrefix {
    /// Split `path/to/dir/prefix`. A trailing separator means an empty prefix.
    pub fn parse(out: &str) -> Self {
        if out.ends_with('/') || out.ends_with(std::path::MAIN_SEPARATOR) {
            return Self {
                dir: PathBuf::from(out),
                prefix: String::new(),
            };
        }
        let path = Path::new(out);
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { dir, prefix }
    }

    pub fn epoch_path(&self, epoch: u32) -> PathBuf {
        self.dir.join(format!("{}{epoch}_jobs.csv", self.prefix))
    }
}

pub fn render_csv(table: &TimelineTable) -> Result<Vec<u8>> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(Column::header()).map_err(csv_err)?;
    for row in table.snapshot() {
        w.write_record(row.iter().map(|c| c.to_string()))
            .map_err(csv_err)?;
    }
    w.into_inner()
        .map_err(|e| ReplayError::Io(e.into_error()))
}

fn csv_err(e: csv::Error) -> ReplayError {
    ReplayError::Io(e.into())
}

/// Write the table to `path`, replacing any previous file atomically.
pub fn write_table(path: &Path, table: &TimelineTable) -> Result<()> {
    let output_err = |e: std::io::Error| ReplayError::Output {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let data = render_csv(table)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(output_err)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(output_err)?;
    tmp.write_all(&data).map_err(output_err)?;
    tmp.persist(path).map_err(|e| output_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::Cell;
    use crate::unit::test_unit;
    use tempfile::TempDir;

    #[test]
    fn prefix_parsing() {
        let p = OutputPrefix::parse("results/run-a/exp");
        assert_eq!(p.dir, PathBuf::from("results/run-a"));
        assert_eq!(p.prefix, "exp");
        assert_eq!(p.epoch_path(2), PathBuf::from("results/run-a/exp2_jobs.csv"));

        let bare = OutputPrefix::parse("exp");
        assert_eq!(bare.epoch_path(0), PathBuf::from("./exp0_jobs.csv"));

        let dir_only = OutputPrefix::parse("results/");
        assert_eq!(dir_only.epoch_path(1), PathBuf::from("results/1_jobs.csv"));
    }

    #[test]
    fn writes_header_and_one_line_per_unit() {
        let dir = TempDir::new().unwrap();
        let table = TimelineTable::new(&[test_unit("1", 0.0), test_unit("2", 5.0)], "w0");
        let row = table.lookup_row("1").unwrap();
        table.write(row, Column::SubmissionTime, Cell::Seconds(0.25));

        let path = dir.path().join("nested/out0_jobs.csv");
        write_table(&path, &table).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("job_id,workload_name,profile,submission_time,"));
        assert!(lines[1].starts_with("1,w0,delay1,0.250000,1,0,1,COMPLETED_SUCCESSFULLY,"));
        assert_eq!(lines[2].split(',').count(), 21);
    }

    #[test]
    fn unwritable_destination_is_an_output_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let table = TimelineTable::new(&[test_unit("1", 0.0)], "w0");
        let err = write_table(&blocker.join("out0_jobs.csv"), &table).unwrap_err();
        assert!(matches!(err, ReplayError::Output { .. }), "{err:?}");
    }
}
