//! Benchmark path: every command of the command list is called for every profile, timed by
//! the harness and persisted as CSV rows.

mod commands;
mod counters;
mod harness;
mod store;

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

pub use commands::{Invocation, OperationDescriptor, load_commands, parse_commands};
pub use counters::{CounterSnapshot, RunCounters};
pub use harness::{ApiTransport, AverageMode, CallOutcome, Measurement, measure};
pub use store::{BenchmarkRecord, CSV_HEADER, ReportStore};

use crate::Result;
use crate::profile::Profile;
use crate::signing::benchmark_params;

/// Knobs shared by every invocation of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkSettings {
    pub iterations: u32,
    pub page: u32,
    pub page_size: u32,
    pub db_profile: u32,
    pub average: AverageMode,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            iterations: 1,
            page: 0,
            page_size: 0,
            db_profile: 0,
            average: AverageMode::default(),
        }
    }
}

/// Runs commands sequentially and owns the report files, so rows are never interleaved.
#[derive(Debug)]
pub struct BenchmarkRunner<T> {
    transport: T,
    settings: BenchmarkSettings,
    counters: Arc<RunCounters>,
    store: ReportStore,
}

impl<T: ApiTransport> BenchmarkRunner<T> {
    pub fn new(transport: T, settings: BenchmarkSettings, store: ReportStore) -> Self {
        Self {
            transport,
            settings,
            counters: Arc::new(RunCounters::new()),
            store,
        }
    }

    pub fn counters(&self) -> Arc<RunCounters> {
        Arc::clone(&self.counters)
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    /// Runs every command for `profile` and returns the saved records in execution order.
    pub async fn run_profile(
        &mut self,
        profile: &Profile,
        commands: &[OperationDescriptor],
    ) -> Result<Vec<BenchmarkRecord>> {
        info!(profile = %profile.name, commands = commands.len(), "benchmarking profile");

        let mut records = Vec::new();
        for descriptor in commands {
            for inv in descriptor.invocations(self.settings.page, self.settings.page_size) {
                let record = self.run_invocation(profile, &inv).await?;
                self.store.save(&record)?;
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn run_invocation(&self, profile: &Profile, inv: &Invocation) -> Result<BenchmarkRecord> {
        let params = benchmark_params(
            profile,
            &inv.command,
            inv.page,
            inv.page_size,
            &inv.keyword,
            Utc::now(),
        );
        let m = measure(
            &self.transport,
            &params,
            self.settings.iterations,
            self.settings.average,
            &self.counters,
        )
        .await?;

        info!(
            command = %inv.command,
            page = inv.page,
            keyword = %inv.keyword,
            count = m.count,
            "count [{}] : time in seconds [min - {:.2}] [max - {:.2}] [avg - {:.2}]",
            m.count,
            m.min,
            m.max,
            m.avg
        );

        Ok(BenchmarkRecord {
            command: inv.command.clone(),
            page: inv.page,
            page_size: inv.page_size,
            keyword: inv.keyword.clone(),
            profile: profile.name.clone(),
            db_profile: self.settings.db_profile,
            measurement: m,
        })
    }
}
