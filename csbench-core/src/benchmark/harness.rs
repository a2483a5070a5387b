use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::counters::RunCounters;
use crate::api::ApiError;
use crate::endpoint::ApiEndpoint;
use crate::signing::SignedParams;
use crate::{Error, Result};

/// Result of one signed call: elapsed wall-clock time and the reported entity count.
#[derive(Debug)]
pub struct CallOutcome {
    pub elapsed: Duration,
    pub result: std::result::Result<u64, ApiError>,
}

/// Executes a signed request once.
pub trait ApiTransport: Send + Sync {
    fn call(&self, params: &SignedParams) -> impl Future<Output = CallOutcome> + Send;
}

impl ApiTransport for ApiEndpoint {
    async fn call(&self, params: &SignedParams) -> CallOutcome {
        let started = Instant::now();
        let result = self.send(params).await.map(|reply| reply.count());
        CallOutcome {
            elapsed: started.elapsed(),
            result,
        }
    }
}

/// Divisor used for the average of a repeated call.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString, strum::VariantNames,
)]
#[strum(serialize_all = "kebab-case")]
pub enum AverageMode {
    /// Iterations that actually ran.
    #[default]
    Executed,
    /// Iterations that were requested, even when the loop stopped early.
    Requested,
}

/// Latency summary for one invocation (seconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Count reported by the last successful iteration.
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub executed: u32,
    /// Whether an iteration failed and stopped the loop.
    pub aborted: bool,
}

/// Calls `params` up to `iterations` times, stopping at the first failing iteration.
///
/// min/max include the failing iteration. Every call is recorded in `counters`.
pub async fn measure<T: ApiTransport>(
    transport: &T,
    params: &SignedParams,
    iterations: u32,
    mode: AverageMode,
    counters: &RunCounters,
) -> Result<Measurement> {
    if iterations == 0 {
        return Err(Error::InvalidIterations);
    }

    let command = params.command();
    let mut min = f64::MAX;
    let mut max = 0.0f64;
    let mut total = 0.0f64;
    let mut count = 0u64;
    let mut executed = 0u32;
    let mut aborted = false;

    for iteration in 1..=iterations {
        let outcome = transport.call(params).await;
        executed += 1;
        counters.record(outcome.result.is_ok(), outcome.elapsed);

        let secs = outcome.elapsed.as_secs_f64();
        min = min.min(secs);
        max = max.max(secs);
        total += secs;

        match outcome.result {
            Ok(c) => {
                count = c;
                debug!(command, iteration, count = c, elapsed = secs, "iteration finished");
            }
            Err(err) => {
                warn!(
                    command,
                    iteration,
                    code = err.remote_code(),
                    transport = err.transport_kind().map(tracing::field::display),
                    error = %err,
                    "api call failed"
                );
                aborted = true;
                break;
            }
        }
    }

    let divisor = match mode {
        AverageMode::Executed => executed,
        AverageMode::Requested => iterations,
    };

    Ok(Measurement {
        count,
        min,
        max,
        avg: total / f64::from(divisor),
        executed,
        aborted,
    })
}
