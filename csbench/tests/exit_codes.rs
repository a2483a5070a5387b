use std::path::Path;
use std::process::Command;

use anyhow::Context as _;
use csbench_testserver::{DEFAULT_API_KEY, DEFAULT_SECRET_KEY, TestServer, TestServerOptions};

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn write_config(dir: &Path, url: &str, extra: &str) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join("config");
    let text = format!(
        "url = {url}\niterations = 2\nparentdomainid = root-domain\n{extra}\n[admin]\napikey = {DEFAULT_API_KEY}\nsecretkey = {DEFAULT_SECRET_KEY}\n"
    );
    std::fs::write(&path, text).context("write config")?;
    Ok(path)
}

async fn run_csbench(dir: &Path, args: Vec<String>) -> anyhow::Result<std::process::Output> {
    let exe = env!("CARGO_BIN_EXE_csbench");
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        Command::new(exe)
            .args(&args)
            .arg("--log-file")
            .arg(dir.join("csmetrics.log"))
            .current_dir(&dir)
            .env_remove("RUST_LOG")
            .output()
    })
    .await
    .context("spawn_blocking join")?
    .context("run csbench binary")
}

fn ensure_code(out: &std::process::Output, expected: i32) -> anyhow::Result<()> {
    anyhow::ensure!(
        status_code(out.status) == expected,
        "expected exit code {expected}, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let exe = env!("CARGO_BIN_EXE_csbench");

    let out = Command::new(exe)
        .arg("benchmark")
        .arg("--workers")
        .arg("0")
        .output()
        .context("run csbench binary")?;

    ensure_code(&out, 30)
}

#[tokio::test]
async fn missing_config_exit_30() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = run_csbench(
        dir.path(),
        vec![
            "benchmark".to_string(),
            "--config".to_string(),
            "does-not-exist".to_string(),
        ],
    )
    .await?;
    ensure_code(&out, 30)
}

#[tokio::test]
async fn create_without_resources_exit_30() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = write_config(dir.path(), "http://127.0.0.1:9/client/api", "")?;
    let out = run_csbench(
        dir.path(),
        vec![
            "create".to_string(),
            "--config".to_string(),
            config.display().to_string(),
        ],
    )
    .await?;
    ensure_code(&out, 30)
}

#[tokio::test]
async fn clean_benchmark_exit_0_and_writes_reports() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let config = write_config(dir.path(), &server.api_url(), "")?;
    std::fs::write(dir.path().join("listCommands.txt"), "listZones\nlistHosts keyword=kvm\n")?;

    let out = run_csbench(
        dir.path(),
        vec![
            "benchmark".to_string(),
            "--config".to_string(),
            config.display().to_string(),
        ],
    )
    .await?;
    server.shutdown().await;
    ensure_code(&out, 0)?;

    let stdout = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(stdout.contains("Profile: [admin]"), "stdout:\n{stdout}");
    anyhow::ensure!(stdout.contains("Number of APIs : 6"), "stdout:\n{stdout}");
    anyhow::ensure!(stdout.contains("Done with benchmarking"), "stdout:\n{stdout}");

    let report = dir.path().join("report");
    for kind in ["individual", "accumulated"] {
        for command in ["listZones", "listHosts"] {
            let path = report.join(kind).join("127.0.0.1").join(format!("{command}.csv"));
            anyhow::ensure!(path.is_file(), "missing {}", path.display());
        }
    }
    let hosts = std::fs::read_to_string(report.join("individual/127.0.0.1/listHosts.csv"))?;
    anyhow::ensure!(hosts.lines().count() == 3, "listHosts.csv:\n{hosts}");
    anyhow::ensure!(dir.path().join("csmetrics.log").is_file());

    Ok(())
}

#[tokio::test]
async fn failing_command_exit_10() -> anyhow::Result<()> {
    let options = TestServerOptions::default().with_failing_command("listHosts");
    let server = TestServer::start_with(options)
        .await
        .context("start test server")?;
    let dir = tempfile::tempdir()?;
    let config = write_config(dir.path(), &server.api_url(), "")?;
    std::fs::write(dir.path().join("listCommands.txt"), "listZones\nlistHosts\n")?;

    let out = run_csbench(
        dir.path(),
        vec![
            "benchmark".to_string(),
            "--config".to_string(),
            config.display().to_string(),
        ],
    )
    .await?;
    server.shutdown().await;
    ensure_code(&out, 10)
}

#[tokio::test]
async fn vm_action_report_goes_to_output_file() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    {
        let mut cloud = server.cloud().lock();
        let domain = cloud.seed_domain("root-domain");
        let account = cloud.seed_account(&domain);
        for _ in 0..3 {
            cloud.seed_vm(&domain, &account, "Running");
        }
        for _ in 0..2 {
            cloud.seed_vm(&domain, &account, "Stopped");
        }
    }
    let dir = tempfile::tempdir()?;
    let config = write_config(dir.path(), &server.api_url(), "")?;
    let report = dir.path().join("toggle.csv");

    let out = run_csbench(
        dir.path(),
        vec![
            "vm-action".to_string(),
            "toggle".to_string(),
            "--config".to_string(),
            config.display().to_string(),
            "--format".to_string(),
            "csv".to_string(),
            "--output".to_string(),
            report.display().to_string(),
        ],
    )
    .await?;
    server.shutdown().await;
    ensure_code(&out, 0)?;

    let csv = std::fs::read_to_string(&report)?;
    anyhow::ensure!(csv.contains("vmaction-start - All,2,"), "report:\n{csv}");
    anyhow::ensure!(csv.contains("vmaction-stop - All,3,"), "report:\n{csv}");
    Ok(())
}

#[tokio::test]
async fn get_method_benchmark_exit_0() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let config = write_config(dir.path(), &server.api_url(), "")?;
    std::fs::write(dir.path().join("listCommands.txt"), "listZones keyword=kvm\n")?;

    let out = run_csbench(
        dir.path(),
        vec![
            "benchmark".to_string(),
            "--config".to_string(),
            config.display().to_string(),
            "--method".to_string(),
            "get".to_string(),
        ],
    )
    .await?;
    let signature_failures = server.stats().signature_failures();
    let zones = server.stats().command("listZones");
    server.shutdown().await;
    ensure_code(&out, 0)?;

    anyhow::ensure!(signature_failures == 0);
    // Keyword and unfiltered invocations, two iterations each.
    anyhow::ensure!(zones == 4, "listZones calls: {zones}");
    Ok(())
}

#[tokio::test]
async fn unsignable_expiry_exit_30_before_any_request() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config");
    let text = format!(
        "url = {}\n[admin]\napikey = {DEFAULT_API_KEY}\nsecretkey = {DEFAULT_SECRET_KEY}\nexpires = 9000000000000000000\n",
        server.api_url()
    );
    std::fs::write(&path, text)?;
    std::fs::write(dir.path().join("listCommands.txt"), "listZones\n")?;

    let out = run_csbench(
        dir.path(),
        vec![
            "benchmark".to_string(),
            "--config".to_string(),
            path.display().to_string(),
        ],
    )
    .await?;
    let requests = server.stats().requests_total();
    server.shutdown().await;
    ensure_code(&out, 30)?;

    anyhow::ensure!(requests == 0, "unexpected requests: {requests}");
    Ok(())
}
