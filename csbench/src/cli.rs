use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use csbench_core::benchmark::AverageMode;
use csbench_core::ops::{ResourceSelection, VmAction};
use csbench_core::RequestMethod;
use csbench_core::report::ReportFormat;

fn parse_workers(input: &str) -> Result<usize, String> {
    match input.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(format!(
            "invalid worker count '{input}' (expected a positive integer)"
        )),
        Ok(n) => Ok(n),
    }
}

fn parse_report_format(input: &str) -> Result<ReportFormat, String> {
    input
        .parse()
        .map_err(|_| format!("invalid format '{input}' (expected table, csv or tsv)"))
}

fn parse_request_method(input: &str) -> Result<RequestMethod, String> {
    input
        .parse()
        .map_err(|_| format!("invalid method '{input}' (expected post or get)"))
}

fn parse_average_mode(input: &str) -> Result<AverageMode, String> {
    input
        .parse()
        .map_err(|_| format!("invalid average mode '{input}' (expected executed or requested)"))
}

fn parse_vm_action(input: &str) -> Result<VmAction, String> {
    input.parse().map_err(|_| {
        format!("invalid vm action '{input}' (expected start, stop, reboot, toggle or random)")
    })
}

#[derive(Debug, Parser)]
#[command(
    name = "csbench",
    author,
    version,
    about = "Benchmark and bulk-provisioning tool for the CloudStack API",
    long_about = "csbench times read-only API calls for every profile of a config file and writes per-command CSV reports.\n\nWith the admin profile it also creates, tears down and drives large numbers of domains, networks, VMs and volumes concurrently, reporting latency per task category.",
    after_help = "Examples:\n  csbench benchmark --config config/config\n  csbench create --domain --limits --network --vm --workers 20\n  csbench vm-action toggle --format csv --output toggle.csv\n  csbench teardown --vm --volume --network --domain"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Time every command of the command list for every profile
    Benchmark(BenchmarkArgs),

    /// Create resources under the parent domain (admin profile)
    Create(CreateArgs),

    /// Delete resources under the parent domain (admin profile)
    Teardown(TeardownArgs),

    /// Start, stop, reboot or toggle every VM under the parent domain (admin profile)
    VmAction(VmActionArgs),
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Path to the profile/config file
    #[arg(long, global = true, default_value = "config/config")]
    pub config: PathBuf,

    /// Maximum number of concurrent bulk tasks
    #[arg(long, global = true, default_value = "10", value_parser = parse_workers)]
    pub workers: usize,

    /// Report format for bulk operations: table, csv or tsv
    #[arg(
        long,
        global = true,
        default_value_t = ReportFormat::Table,
        value_parser = parse_report_format
    )]
    pub format: ReportFormat,

    /// Write the bulk report to this file instead of stdout
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    /// Database profile identifier recorded with every benchmark row
    #[arg(long = "dbprofile", global = true, default_value_t = 0)]
    pub db_profile: u32,

    /// Send signed parameters as a form body (post) or a query string (get)
    #[arg(
        long,
        global = true,
        default_value_t = RequestMethod::Post,
        value_parser = parse_request_method
    )]
    pub method: RequestMethod,

    /// Per-request timeout (e.g. 30s, 2m); unlimited when omitted
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// File receiving a copy of every log line
    #[arg(long, global = true, default_value = "csmetrics.log")]
    pub log_file: PathBuf,

    /// Log filter (e.g. info, debug, csbench_core=trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Args)]
pub struct BenchmarkArgs {
    /// Command list, one API command per line with an optional `keyword=<value>`
    #[arg(long, default_value = "listCommands.txt")]
    pub commands: PathBuf,

    /// Directory holding the individual/ and accumulated/ CSV reports
    #[arg(long, default_value = "report")]
    pub report_dir: PathBuf,

    /// Divisor of the average when a call stops early: executed or requested iterations
    #[arg(long, default_value_t = AverageMode::Executed, value_parser = parse_average_mode)]
    pub average: AverageMode,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Sub-domains, each with one domain-admin account
    #[arg(long)]
    pub domain: bool,

    /// Lift every resource limit of the sub-domains and their accounts
    #[arg(long)]
    pub limits: bool,

    /// Shared networks in every sub-domain
    #[arg(long)]
    pub network: bool,

    /// VMs in every network
    #[arg(long)]
    pub vm: bool,

    /// Data volumes attached to every VM
    #[arg(long)]
    pub volume: bool,
}

impl CreateArgs {
    pub fn selection(&self) -> ResourceSelection {
        ResourceSelection {
            domain: self.domain,
            limits: self.limits,
            network: self.network,
            vm: self.vm,
            volume: self.volume,
        }
    }
}

#[derive(Debug, Args)]
pub struct TeardownArgs {
    #[arg(long)]
    pub domain: bool,

    #[arg(long)]
    pub network: bool,

    /// Destroy and expunge VMs
    #[arg(long)]
    pub vm: bool,

    #[arg(long)]
    pub volume: bool,
}

impl TeardownArgs {
    pub fn selection(&self) -> ResourceSelection {
        ResourceSelection {
            domain: self.domain,
            limits: false,
            network: self.network,
            vm: self.vm,
            volume: self.volume,
        }
    }
}

#[derive(Debug, Args)]
pub struct VmActionArgs {
    /// start, stop, reboot, toggle or random
    #[arg(value_parser = parse_vm_action)]
    pub action: VmAction,
}
