use std::time::Duration;

use csbench_core::benchmark::{BenchmarkRunner, BenchmarkSettings, ReportStore, parse_commands};
use csbench_core::{ApiEndpoint, Profile};
use csbench_testserver::{DEFAULT_API_KEY, DEFAULT_SECRET_KEY, TestServer, TestServerOptions};

#[tokio::test]
async fn benchmark_signs_calls_and_writes_reports() -> anyhow::Result<()> {
    let options = TestServerOptions {
        canned_count: 7,
        ..TestServerOptions::default()
    }
    .with_failing_command("listHosts");
    let server = TestServer::start_with(options).await?;
    let dir = tempfile::tempdir()?;

    let endpoint = ApiEndpoint::new(server.api_url(), Some(Duration::from_secs(5)));
    let settings = BenchmarkSettings {
        iterations: 3,
        ..BenchmarkSettings::default()
    };
    let store = ReportStore::new(dir.path(), "127.0.0.1");
    let mut runner = BenchmarkRunner::new(endpoint, settings, store);

    let profile = Profile::new("admin", DEFAULT_API_KEY, DEFAULT_SECRET_KEY);
    let commands = parse_commands("listZones\nlistHosts\n");
    let records = runner.run_profile(&profile, &commands).await?;

    anyhow::ensure!(records.len() == 2, "unexpected records: {records:?}");
    let zones = &records[0].measurement;
    anyhow::ensure!(zones.count == 7 && zones.executed == 3 && !zones.aborted);
    let hosts = &records[1].measurement;
    anyhow::ensure!(hosts.aborted && hosts.executed == 1 && hosts.count == 0);

    anyhow::ensure!(server.stats().signature_failures() == 0);
    anyhow::ensure!(server.stats().command("listZones") == 3);
    anyhow::ensure!(server.stats().command("listHosts") == 1);

    let snap = runner.counters().snapshot();
    anyhow::ensure!(snap.total == 4 && snap.succeeded == 3 && snap.failed == 1);

    let individual = std::fs::read_to_string(runner.store().individual_path("listZones"))?;
    let mut lines = individual.lines();
    anyhow::ensure!(
        lines.next() == Some("Count,MinTime,MaxTime,AvgTime,Page,PageSize,keyword,User,DBprofile")
    );
    let row = lines.next().unwrap_or_default();
    anyhow::ensure!(row.starts_with("7,"), "row: {row}");
    anyhow::ensure!(row.ends_with(",-,-,,admin,0"), "row: {row}");

    let accumulated = std::fs::read_to_string(runner.store().accumulated_path("listHosts"))?;
    anyhow::ensure!(accumulated.lines().count() == 2);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn wrong_secret_is_reported_as_failure() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let dir = tempfile::tempdir()?;

    let endpoint = ApiEndpoint::new(server.api_url(), Some(Duration::from_secs(5)));
    let store = ReportStore::new(dir.path(), "127.0.0.1");
    let mut runner = BenchmarkRunner::new(endpoint, BenchmarkSettings::default(), store);

    let profile = Profile::new("user", DEFAULT_API_KEY, "wrong-secret");
    let records = runner
        .run_profile(&profile, &parse_commands("listZones"))
        .await?;

    anyhow::ensure!(records.len() == 1 && records[0].measurement.aborted);
    anyhow::ensure!(server.stats().signature_failures() == 1);
    anyhow::ensure!(runner.counters().snapshot().failed == 1);

    server.shutdown().await;
    Ok(())
}
