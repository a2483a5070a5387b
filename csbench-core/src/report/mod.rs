//! Per-category statistics over a [`ResultBucket`], rendered as a table, CSV or TSV.

mod render;

use std::path::Path;

use crate::Result;
use crate::bucket::{ResultBucket, TaskResult};
use crate::stats::Summary;

pub use render::{HEADERS, render};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString, strum::VariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Table,
    Csv,
    Tsv,
}

/// One rendered line: `"<category> - All|Successful|Failed"` and its summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub label: String,
    pub count: usize,
    /// `None` for an empty sample.
    pub summary: Option<Summary>,
}

impl ReportRow {
    fn from_sample(label: String, sample: &[f64]) -> Self {
        Self {
            label,
            count: sample.len(),
            summary: Summary::from_durations(sample),
        }
    }
}

/// Builds the rows for every category, in category order.
///
/// The `Successful`/`Failed` split is only added when the category has at least one failure.
pub fn rows(bucket: &ResultBucket) -> Vec<ReportRow> {
    let mut out = Vec::new();
    for (category, results) in bucket.iter() {
        let (all, ok, failed) = split(results);
        out.push(ReportRow::from_sample(format!("{category} - All"), &all));
        if !failed.is_empty() {
            out.push(ReportRow::from_sample(
                format!("{category} - Successful"),
                &ok,
            ));
            out.push(ReportRow::from_sample(
                format!("{category} - Failed"),
                &failed,
            ));
        }
    }
    out
}

fn split(results: &[TaskResult]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut all = Vec::with_capacity(results.len());
    let mut ok = Vec::new();
    let mut failed = Vec::new();
    for r in results {
        all.push(r.duration);
        if r.success {
            ok.push(r.duration);
        } else {
            failed.push(r.duration);
        }
    }
    (all, ok, failed)
}

/// Renders `bucket` and writes it to `output`, or stdout when no path is given.
pub fn write_report(
    bucket: &ResultBucket,
    format: ReportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let text = render(&rows(bucket), format)?;
    match output {
        Some(path) => std::fs::write(path, text)?,
        None => print!("{text}"),
    }
    Ok(())
}
