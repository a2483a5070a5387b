use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::harness::Measurement;
use crate::Result;

pub const CSV_HEADER: [&str; 9] = [
    "Count", "MinTime", "MaxTime", "AvgTime", "Page", "PageSize", "keyword", "User", "DBprofile",
];

/// One benchmark result row with the request shape it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkRecord {
    pub command: String,
    pub page: u32,
    pub page_size: u32,
    pub keyword: String,
    pub profile: String,
    pub db_profile: u32,
    pub measurement: Measurement,
}

impl BenchmarkRecord {
    fn csv_row(&self) -> [String; 9] {
        let (page, page_size) = if self.page != 0 {
            (self.page.to_string(), self.page_size.to_string())
        } else {
            ("-".to_string(), "-".to_string())
        };
        let m = &self.measurement;
        [
            m.count.to_string(),
            format!("{:.2}", m.min),
            format!("{:.2}", m.max),
            format!("{:.2}", m.avg),
            page,
            page_size,
            self.keyword.clone(),
            self.profile.clone(),
            self.db_profile.to_string(),
        ]
    }
}

/// Per-command CSV files under `<root>/individual/<host>/` and `<root>/accumulated/<host>/`.
///
/// The individual file is truncated the first time a command is saved by this store and
/// appended to afterwards; the accumulated file is only ever appended to. A header is written
/// whenever the opened file is empty.
#[derive(Debug)]
pub struct ReportStore {
    root: PathBuf,
    host: String,
    seen: HashSet<String>,
}

impl ReportStore {
    pub fn new(root: impl Into<PathBuf>, host: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            host: host.into(),
            seen: HashSet::new(),
        }
    }

    pub fn host_dir(&self, kind: &str) -> PathBuf {
        self.root.join(kind).join(&self.host)
    }

    pub fn individual_path(&self, command: &str) -> PathBuf {
        self.host_dir("individual").join(format!("{command}.csv"))
    }

    pub fn accumulated_path(&self, command: &str) -> PathBuf {
        self.host_dir("accumulated").join(format!("{command}.csv"))
    }

    pub fn save(&mut self, record: &BenchmarkRecord) -> Result<()> {
        std::fs::create_dir_all(self.host_dir("individual"))?;
        std::fs::create_dir_all(self.host_dir("accumulated"))?;

        let first_in_run = self.seen.insert(record.command.clone());
        let row = record.csv_row();

        let individual = self.individual_path(&record.command);
        let file = if first_in_run {
            File::create(&individual)?
        } else {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&individual)?
        };
        append_row(file, &row)?;

        let accumulated = self.accumulated_path(&record.command);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&accumulated)?;
        append_row(file, &row)?;

        debug!(
            command = %record.command,
            path = %individual.display(),
            "saved benchmark row"
        );
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn append_row(file: File, row: &[String; 9]) -> Result<()> {
    let needs_header = file.metadata()?.len() == 0;
    let mut w = csv::Writer::from_writer(file);
    if needs_header {
        w.write_record(CSV_HEADER)?;
    }
    w.write_record(row)?;
    w.flush()?;
    Ok(())
}
