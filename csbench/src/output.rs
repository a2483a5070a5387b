//! Console banners printed around a run.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use csbench_core::benchmark::CounterSnapshot;
use csbench_core::{Config, ResultBucket};

pub(crate) fn config_banner(out: &mut impl Write, config: &Config) {
    let roles: Vec<&str> = config.profiles.iter().map(|p| p.name.as_str()).collect();

    writeln!(out, "\n\nConfig details:").ok();
    writeln!(out, "Management server : {}", config.url).ok();
    writeln!(out, "Roles : {}", roles.join(", ")).ok();
    writeln!(out, "Iterations : {}", config.iterations).ok();
    writeln!(out, "Page : {}", config.page).ok();
    writeln!(out, "PageSize : {}", config.page_size).ok();
    writeln!(out).ok();
}

pub(crate) fn profile_banner(out: &mut impl Write, profile: &str) {
    writeln!(out, "\n==================================================").ok();
    writeln!(out, "Profile: [{profile}]").ok();
    writeln!(out, "==================================================").ok();
}

pub(crate) fn benchmark_summary(
    out: &mut impl Write,
    snapshot: &CounterSnapshot,
    log_file: &Path,
    report_dir: &Path,
) {
    writeln!(out, "\n\n\n==================================================").ok();
    writeln!(out, "Log file : {}", log_file.display()).ok();
    writeln!(out, "Reports directory per API : {}", report_dir.display()).ok();
    writeln!(out, "Number of APIs : {}", snapshot.total).ok();
    writeln!(out, "Successful APIs : {}", snapshot.succeeded).ok();
    writeln!(out, "Failed APIs : {}", snapshot.failed).ok();
    writeln!(out, "Time in seconds per API call : {:.2} avg", snapshot.avg_secs()).ok();
    writeln!(out, "==================================================").ok();
    writeln!(out, "Done with benchmarking").ok();
}

pub(crate) fn bulk_summary(
    out: &mut impl Write,
    what: &str,
    bucket: &ResultBucket,
    elapsed: Duration,
) {
    writeln!(
        out,
        "\nDone with {what} in {:.2} seconds: {} tasks, {} failed",
        elapsed.as_secs_f64(),
        bucket.len(),
        bucket.failed()
    )
    .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut Vec<u8>)) -> String {
        let mut buf = Vec::new();
        f(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[test]
    fn config_banner_lists_roles_in_file_order() {
        let config = match Config::parse(
            "url = http://mgmt:8080/client/api\niterations = 3\n[admin]\napikey = a\nsecretkey = b\n[user]\napikey = c\nsecretkey = d\n",
        ) {
            Ok(c) => c,
            Err(e) => panic!("config: {e}"),
        };
        let text = render(|buf| config_banner(buf, &config));
        assert!(text.contains("Management server : http://mgmt:8080/client/api"));
        assert!(text.contains("Roles : admin, user"));
        assert!(text.contains("Iterations : 3"));
    }

    #[test]
    fn benchmark_summary_reports_counts() {
        let snapshot = CounterSnapshot {
            total: 4,
            succeeded: 3,
            failed: 1,
            latency_secs: 2.0,
        };
        let text = render(|buf| {
            benchmark_summary(buf, &snapshot, Path::new("csmetrics.log"), Path::new("report"))
        });
        assert!(text.contains("Number of APIs : 4"));
        assert!(text.contains("Failed APIs : 1"));
        assert!(text.contains("Time in seconds per API call : 0.50 avg"));
        assert!(text.trim_end().ends_with("Done with benchmarking"));
    }
}
