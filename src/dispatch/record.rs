use serde::Serialize;
use std::str::FromStr;
use std::time::Duration;

/// Number of comma-separated fields in a worker response line.
pub const WORKER_FIELDS: usize = 10;

/// Counters and timings a worker reports for one partition, in wire order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerStats {
    pub n_expanded: u64,
    pub n_inserted: u64,
    pub n_touched: u64,
    pub n_updated: u64,
    pub n_surplus: u64,
    pub plen: u64,
    pub finished: u64,
    pub t_receive: f64,
    pub t_astar: f64,
    pub t_search: f64,
}

impl FromStr for WorkerStats {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != WORKER_FIELDS {
            return Err(format!(
                "expected {} fields, found {}",
                WORKER_FIELDS,
                fields.len()
            ));
        }

        fn int(name: &str, value: &str) -> Result<u64, String> {
            value
                .parse()
                .map_err(|_| format!("{name} is not a count: '{value}'"))
        }
        fn time(name: &str, value: &str) -> Result<f64, String> {
            value
                .parse()
                .map_err(|_| format!("{name} is not a duration: '{value}'"))
        }

        Ok(Self {
            n_expanded: int("n_expanded", fields[0])?,
            n_inserted: int("n_inserted", fields[1])?,
            n_touched: int("n_touched", fields[2])?,
            n_updated: int("n_updated", fields[3])?,
            n_surplus: int("n_surplus", fields[4])?,
            plen: int("plen", fields[5])?,
            finished: int("finished", fields[6])?,
            t_receive: time("t_receive", fields[7])?,
            t_astar: time("t_astar", fields[8])?,
            t_search: time("t_search", fields[9])?,
        })
    }
}

/// Outcome of one partition in one experiment. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    #[serde(flatten)]
    pub worker: WorkerStats,
    /// Nanoseconds spent writing the query file.
    pub t_prepare: u64,
    /// Nanoseconds for the whole channel round trip.
    pub t_partition: u64,
    pub size: usize,
}

impl ResultRecord {
    pub fn new(worker: WorkerStats, prepare: Duration, round_trip: Duration, size: usize) -> Self {
        Self {
            worker,
            t_prepare: nanos(prepare),
            t_partition: nanos(round_trip),
            size,
        }
    }

    /// Values in table column order: worker counters, worker timings, local
    /// timings, partition size.
    pub fn columns(&self) -> Vec<String> {
        let w = &self.worker;
        vec![
            w.n_expanded.to_string(),
            w.n_inserted.to_string(),
            w.n_touched.to_string(),
            w.n_updated.to_string(),
            w.n_surplus.to_string(),
            w.plen.to_string(),
            w.finished.to_string(),
            w.t_receive.to_string(),
            w.t_astar.to_string(),
            w.t_search.to_string(),
            self.t_prepare.to_string(),
            self.t_partition.to_string(),
            self.size.to_string(),
        ]
    }
}

fn nanos(duration: Duration) -> u64 {
    duration.as_nanos().min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_worker_line() {
        let stats: WorkerStats = "120, 300,310,12,0,4512,1,1500.5,880000,910000"
            .parse()
            .unwrap();
        assert_eq!(stats.n_expanded, 120);
        assert_eq!(stats.n_inserted, 300);
        assert_eq!(stats.plen, 4512);
        assert_eq!(stats.finished, 1);
        assert_eq!(stats.t_receive, 1500.5);
        assert_eq!(stats.t_search, 910000.0);
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        let err = "1,2,3".parse::<WorkerStats>().unwrap_err();
        assert!(err.contains("expected 10 fields, found 3"));
        assert!("".parse::<WorkerStats>().is_err());
    }

    #[test]
    fn test_parse_rejects_bad_counter() {
        let err = "1,2,x,4,5,6,1,7,8,9".parse::<WorkerStats>().unwrap_err();
        assert!(err.contains("n_touched"));
    }

    #[test]
    fn test_columns_order() {
        let stats: WorkerStats = "1,2,3,4,5,6,1,7,8,9".parse().unwrap();
        let record = ResultRecord::new(
            stats,
            Duration::from_nanos(11),
            Duration::from_micros(12),
            13,
        );
        assert_eq!(
            record.columns(),
            vec!["1", "2", "3", "4", "5", "6", "1", "7", "8", "9", "11", "12000", "13"]
        );
    }
}
