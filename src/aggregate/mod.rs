//! Run summary and the flat results table.
//!
//! Table columns are positional and consumed by external tooling: experiment
//! index, worker counters, worker timings, local timings, partition size.
//! Partitions that failed simply have no row.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::coordinator::{ExperimentOutcome, TaskFailure};
use crate::dispatch::ResultRecord;
use crate::error::{Error, Result};

pub const METRICS_FILE: &str = "metrics.json";
pub const OPTIONS_FILE: &str = "data.json";
pub const TABLE_FILE: &str = "parts.csv";

pub const TABLE_HEADER: [&str; 14] = [
    "expe",
    "n_expanded",
    "n_inserted",
    "n_touched",
    "n_updated",
    "n_surplus",
    "plen",
    "finished",
    "t_receive",
    "t_astar",
    "t_search",
    "t_prepare",
    "t_partition",
    "size",
];

/// Wall-clock time of the three phases of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTimings {
    pub read: Duration,
    pub workload: Duration,
    pub process: Duration,
}

/// `metrics.json`. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub num_queries: usize,
    pub num_partitions: usize,
    pub t_read: f64,
    pub t_workload: f64,
    pub t_process: f64,
    pub num_results: usize,
    pub num_failures: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub experiment: usize,
    pub partition: usize,
    pub record: ResultRecord,
}

impl ResultRow {
    fn fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(TABLE_HEADER.len());
        fields.push(self.experiment.to_string());
        fields.extend(self.record.columns());
        fields
    }
}

/// Rows in experiment-major, partition-minor order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn from_outcomes(outcomes: &[ExperimentOutcome]) -> Self {
        let mut rows: Vec<ResultRow> = outcomes
            .iter()
            .flat_map(|outcome| {
                outcome.results.iter().map(|(partition, record)| ResultRow {
                    experiment: outcome.index,
                    partition: *partition,
                    record: record.clone(),
                })
            })
            .collect();
        rows.sort_by_key(|row| (row.experiment, row.partition));
        Self { rows }
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the table to `out`; I/O errors are reported against `destination`.
    pub fn write_csv<W: Write>(&self, out: W, destination: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(TABLE_HEADER)?;
        for row in &self.rows {
            writer.write_record(row.fields())?;
        }
        writer.flush().map_err(|e| Error::io(destination, e))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub table: ResultTable,
    pub failures: Vec<TaskFailure>,
}

impl RunReport {
    pub fn new(
        num_queries: usize,
        num_partitions: usize,
        timings: PhaseTimings,
        outcomes: &[ExperimentOutcome],
    ) -> Self {
        let table = ResultTable::from_outcomes(outcomes);
        let failures: Vec<TaskFailure> = outcomes
            .iter()
            .flat_map(|outcome| outcome.failures.iter().cloned())
            .collect();

        let summary = RunSummary {
            num_queries,
            num_partitions,
            t_read: timings.read.as_secs_f64(),
            t_workload: timings.workload.as_secs_f64(),
            t_process: timings.process.as_secs_f64(),
            num_results: table.len(),
            num_failures: failures.len(),
        };

        Self {
            summary,
            table,
            failures,
        }
    }

    /// Write `metrics.json`, `data.json` and `parts.csv` into `dir`.
    pub fn write_outputs<O: Serialize>(&self, dir: &Path, options: &O) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let metrics = dir.join(METRICS_FILE);
        let content = serde_json::to_string_pretty(&self.summary)?;
        fs::write(&metrics, content).map_err(|e| Error::io(&metrics, e))?;

        let data = dir.join(OPTIONS_FILE);
        let content = serde_json::to_string_pretty(options)?;
        fs::write(&data, content).map_err(|e| Error::io(&data, e))?;

        let table = dir.join(TABLE_FILE);
        let file = fs::File::create(&table).map_err(|e| Error::io(&table, e))?;
        self.table.write_csv(file, &table)?;

        tracing::info!("Run outputs written to {}", dir.display());
        Ok(())
    }

    /// Summary JSON followed by the table, for runs without an output directory.
    pub fn print<W: Write>(&self, mut out: W, destination: &Path) -> Result<()> {
        let summary = serde_json::to_string_pretty(&self.summary)?;
        writeln!(out, "{summary}").map_err(|e| Error::io(destination, e))?;
        self.table.write_csv(out, destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::WorkerStats;

    fn record(plen: u64, size: usize) -> ResultRecord {
        let stats: WorkerStats = format!("10,20,30,40,0,{plen},1,1.5,2,3").parse().unwrap();
        ResultRecord::new(stats, Duration::from_nanos(100), Duration::from_nanos(900), size)
    }

    fn outcomes() -> Vec<ExperimentOutcome> {
        vec![
            ExperimentOutcome {
                index: 1,
                diff: "b.diff".to_string(),
                results: vec![(0, record(7, 1))],
                failures: vec![],
            },
            ExperimentOutcome {
                index: 0,
                diff: "-".to_string(),
                results: vec![(0, record(5, 2)), (2, record(6, 3))],
                failures: vec![TaskFailure {
                    experiment: 0,
                    host: "node-1".to_string(),
                    worker_id: 1,
                    status: 255,
                    message: "Connection refused".to_string(),
                }],
            },
        ]
    }

    #[test]
    fn test_table_is_experiment_major() {
        let table = ResultTable::from_outcomes(&outcomes());
        let keys: Vec<(usize, usize)> = table
            .rows()
            .iter()
            .map(|row| (row.experiment, row.partition))
            .collect();
        assert_eq!(keys, vec![(0, 0), (0, 2), (1, 0)]);
    }

    #[test]
    fn test_csv_header_and_gaps() {
        let mut buffer = Vec::new();
        ResultTable::from_outcomes(&outcomes())
            .write_csv(&mut buffer, Path::new(TABLE_FILE))
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "expe,n_expanded,n_inserted,n_touched,n_updated,n_surplus,plen,finished,t_receive,t_astar,t_search,t_prepare,t_partition,size"
        );
        assert_eq!(lines[1], "0,10,20,30,40,0,5,1,1.5,2,3,100,900,2");
        // The failed partition 1 has no row.
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_summary_counts() {
        let timings = PhaseTimings {
            read: Duration::from_millis(1500),
            workload: Duration::from_millis(250),
            process: Duration::from_secs(3),
        };
        let report = RunReport::new(6, 3, timings, &outcomes());

        assert_eq!(report.summary.num_queries, 6);
        assert_eq!(report.summary.num_results, 3);
        assert_eq!(report.summary.num_failures, 1);
        assert_eq!(report.summary.t_read, 1.5);
        assert_eq!(report.summary.t_workload, 0.25);
        assert_eq!(report.failures[0].host, "node-1");
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("run-1");
        let report = RunReport::new(6, 3, PhaseTimings::default(), &outcomes());

        report
            .write_outputs(&out, &serde_json::json!({"scenario": "full.scen"}))
            .unwrap();

        let metrics: RunSummary =
            serde_json::from_str(&fs::read_to_string(out.join(METRICS_FILE)).unwrap()).unwrap();
        assert_eq!(metrics, report.summary);
        let data = fs::read_to_string(out.join(OPTIONS_FILE)).unwrap();
        assert!(data.contains("full.scen"));
        let table = fs::read_to_string(out.join(TABLE_FILE)).unwrap();
        assert!(table.starts_with("expe,"));
        assert_eq!(table.lines().count(), 4);
    }

    #[test]
    fn test_print_to_writer() {
        let mut buffer = Vec::new();
        RunReport::new(0, 1, PhaseTimings::default(), &[])
            .print(&mut buffer, Path::new("<stdout>"))
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("\"num_partitions\": 1"));
        assert!(text.trim_end().ends_with("t_partition,size"));
    }

    /// Accepts every write, fails every flush.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn test_flush_error_names_destination() {
        let report = RunReport::new(6, 3, PhaseTimings::default(), &outcomes());

        let err = report.print(ClosedPipe, Path::new("<stdout>")).unwrap_err();
        assert!(matches!(err, Error::Io { ref path, .. } if path == Path::new("<stdout>")));

        let err = report
            .table
            .write_csv(ClosedPipe, Path::new("/srv/out/parts.csv"))
            .unwrap_err();
        assert!(matches!(err, Error::Io { ref path, .. } if path == Path::new("/srv/out/parts.csv")));
    }
}
