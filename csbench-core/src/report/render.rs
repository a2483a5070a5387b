use std::fmt::Write as _;

use super::{ReportFormat, ReportRow};
use crate::Result;
use crate::stats::Summary;

pub const HEADERS: [&str; 9] = [
    "Type",
    "Count",
    "Min",
    "Max",
    "Avg",
    "Median",
    "90th percentile",
    "95th percentile",
    "99th percentile",
];

pub fn render(rows: &[ReportRow], format: ReportFormat) -> Result<String> {
    let cells: Vec<[String; 9]> = rows.iter().map(cells).collect();
    match format {
        ReportFormat::Table => Ok(render_table(&cells)),
        ReportFormat::Csv => render_delimited(&cells, b','),
        ReportFormat::Tsv => render_delimited(&cells, b'\t'),
    }
}

fn cells(row: &ReportRow) -> [String; 9] {
    let s = row.summary.as_ref();
    [
        row.label.clone(),
        row.count.to_string(),
        metric(s, |s| s.min),
        metric(s, |s| s.max),
        metric(s, |s| s.mean),
        metric(s, |s| s.median),
        metric(s, |s| s.p90),
        metric(s, |s| s.p95),
        metric(s, |s| s.p99),
    ]
}

fn metric(summary: Option<&Summary>, pick: fn(&Summary) -> f64) -> String {
    match summary {
        Some(s) => pick(s).to_string(),
        None => "-".to_string(),
    }
}

fn render_delimited(rows: &[[String; 9]], delimiter: u8) -> Result<String> {
    let mut w = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    w.write_record(HEADERS)?;
    for row in rows {
        w.write_record(row)?;
    }
    let bytes = w
        .into_inner()
        .map_err(|e| crate::Error::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn render_table(rows: &[[String; 9]]) -> String {
    let mut widths = HEADERS.map(str::len);
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }

    let border = {
        let mut s = String::from("+");
        for w in widths {
            s.push_str(&"-".repeat(w + 2));
            s.push('+');
        }
        s
    };

    let mut out = String::new();
    writeln!(out, "{border}").ok();
    let header: Vec<String> = HEADERS.iter().map(|h| h.to_uppercase()).collect();
    push_line(&mut out, &header, &widths, false);
    writeln!(out, "{border}").ok();
    for row in rows {
        push_line(&mut out, row, &widths, true);
    }
    writeln!(out, "{border}").ok();
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize; 9], numeric: bool) {
    out.push('|');
    for (i, (cell, w)) in cells.iter().zip(widths.iter()).enumerate() {
        // Label column left-aligned, numbers right-aligned.
        if numeric && i > 0 {
            write!(out, " {cell:>w$} |").ok();
        } else {
            write!(out, " {cell:<w$} |").ok();
        }
    }
    out.push('\n');
}
