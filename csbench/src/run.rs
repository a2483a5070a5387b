use std::sync::Arc;

use anyhow::Context as _;
use tokio::time::Instant;
use tracing::info;

use csbench_core::api::CloudStackClient;
use csbench_core::benchmark::{BenchmarkRunner, BenchmarkSettings, ReportStore, load_commands};
use csbench_core::ops::{BulkSettings, ResourceSelection, provision, teardown, vm_action};
use csbench_core::report::write_report;
use csbench_core::{ApiEndpoint, Config, ResultBucket};

use crate::cli::{BenchmarkArgs, Cli, Command, GlobalArgs};
use crate::exit_codes::ExitCode;
use crate::logging;
use crate::output;
use crate::run_error::{RunError, invalid, runtime};

pub async fn run(cli: Cli) -> Result<ExitCode, RunError> {
    let global = cli.global;
    let _log_guard = logging::init(&global.log_file, &global.log_level).map_err(runtime)?;

    let config = Config::load(&global.config)
        .with_context(|| format!("failed to load config: {}", global.config.display()))
        .map_err(invalid)?;

    match cli.command {
        Command::Benchmark(args) => benchmark(&global, &config, args).await,
        Command::Create(args) => {
            let what = args.selection();
            if what.is_empty() {
                return Err(invalid(anyhow::anyhow!(
                    "create needs at least one of --domain, --limits, --network, --vm, --volume"
                )));
            }
            bulk(&global, &config, "create", |api, settings| async move {
                provision::create(api, &settings, what).await
            })
            .await
        }
        Command::Teardown(args) => {
            let what: ResourceSelection = args.selection();
            if what.is_empty() {
                return Err(invalid(anyhow::anyhow!(
                    "teardown needs at least one of --domain, --network, --vm, --volume"
                )));
            }
            bulk(&global, &config, "teardown", |api, settings| async move {
                teardown::teardown(api, &settings, what).await
            })
            .await
        }
        Command::VmAction(args) => {
            let action = args.action;
            bulk(&global, &config, "vm-action", |api, settings| async move {
                vm_action::run(api, &settings, action).await
            })
            .await
        }
    }
}

async fn benchmark(
    global: &GlobalArgs,
    config: &Config,
    args: BenchmarkArgs,
) -> Result<ExitCode, RunError> {
    let commands = load_commands(&args.commands).map_err(invalid)?;
    if commands.is_empty() {
        return Err(invalid(anyhow::anyhow!(
            "command list {} is empty",
            args.commands.display()
        )));
    }

    output::config_banner(&mut std::io::stdout().lock(), config);

    let settings = BenchmarkSettings {
        iterations: config.iterations,
        page: config.page,
        page_size: config.page_size,
        db_profile: global.db_profile,
        average: args.average,
    };
    let endpoint = ApiEndpoint::new(&config.url, global.timeout).with_method(global.method);
    let store = ReportStore::new(&args.report_dir, &config.host);
    let mut runner = BenchmarkRunner::new(endpoint, settings, store);

    for profile in &config.profiles {
        output::profile_banner(&mut std::io::stdout().lock(), &profile.name);
        runner
            .run_profile(profile, &commands)
            .await
            .with_context(|| format!("benchmark failed for profile {}", profile.name))
            .map_err(runtime)?;
    }

    let snapshot = runner.counters().snapshot();
    output::benchmark_summary(
        &mut std::io::stdout().lock(),
        &snapshot,
        &global.log_file,
        &args.report_dir,
    );
    Ok(ExitCode::from_failures(snapshot.failed))
}

/// Runs one admin-only bulk path and renders its per-category report.
async fn bulk<F, Fut>(
    global: &GlobalArgs,
    config: &Config,
    what: &str,
    op: F,
) -> Result<ExitCode, RunError>
where
    F: FnOnce(Arc<CloudStackClient>, BulkSettings) -> Fut,
    Fut: std::future::Future<Output = csbench_core::Result<ResultBucket>>,
{
    let admin = config
        .admin_profile()
        .with_context(|| {
            format!(
                "{what} requires a [{}] profile in {}",
                csbench_core::ADMIN_PROFILE,
                global.config.display()
            )
        })
        .map_err(invalid)?;
    if config.provisioning.parent_domain_id.is_empty() {
        return Err(invalid(anyhow::anyhow!(
            "{what} requires parentdomainid in {}",
            global.config.display()
        )));
    }

    let endpoint = ApiEndpoint::new(&config.url, global.timeout).with_method(global.method);
    let api = Arc::new(CloudStackClient::new(
        endpoint,
        admin.clone(),
        config.provisioning.clone(),
    ));
    let settings = BulkSettings::from_config(config, global.workers);

    info!(workers = global.workers, parent = %settings.parent_domain_id, "starting {what}");
    let started = Instant::now();
    let bucket = op(api, settings).await.map_err(runtime)?;

    output::bulk_summary(&mut std::io::stdout().lock(), what, &bucket, started.elapsed());
    write_report(&bucket, global.format, global.output.as_deref())
        .context("failed to write report")
        .map_err(runtime)?;

    Ok(ExitCode::from_failures(bucket.failed() as u64))
}
