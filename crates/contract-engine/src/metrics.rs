//! # Engine Metrics
//!
//! Prometheus counters for the contract service, registered in the default
//! registry.
//!
//! Enable with the `metrics` feature:
//! ```toml
//! contract-engine = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `contract_engine_executions_total{outcome}` - Executions by halt outcome
//! - `contract_engine_gas_used_total` - Gas consumed by all executions
//! - `contract_engine_deployments_total` - Contracts installed
//! - `contract_engine_compile_failures_total{kind}` - Rejected sources
//! - `contract_engine_rejected_requests_total{reason}` - Requests refused before execution
//!
//! Without the feature every recording function is a no-op.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

#[cfg(feature = "metrics")]
struct EngineMetrics {
    executions: IntCounterVec,
    gas_used: IntCounter,
    deployments: IntCounter,
    compile_failures: IntCounterVec,
    rejected_requests: IntCounterVec,
}

#[cfg(feature = "metrics")]
impl EngineMetrics {
    fn register() -> prometheus::Result<Self> {
        Ok(Self {
            executions: register_int_counter_vec!(
                "contract_engine_executions_total",
                "Total executions by outcome",
                &["outcome"]
            )?,
            gas_used: register_int_counter!(
                "contract_engine_gas_used_total",
                "Total gas consumed by executions"
            )?,
            deployments: register_int_counter!(
                "contract_engine_deployments_total",
                "Total contracts installed"
            )?,
            compile_failures: register_int_counter_vec!(
                "contract_engine_compile_failures_total",
                "Total sources rejected by the compiler",
                &["kind"]
            )?,
            rejected_requests: register_int_counter_vec!(
                "contract_engine_rejected_requests_total",
                "Total requests refused before execution",
                &["reason"]
            )?,
        })
    }
}

#[cfg(feature = "metrics")]
lazy_static! {
    // None if another registration already claimed the names.
    static ref METRICS: Option<EngineMetrics> = EngineMetrics::register().ok();
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record a finished execution. `outcome` is `"Success"` or an error kind.
#[cfg(feature = "metrics")]
pub fn record_execution(outcome: &str, gas_used: u64) {
    if let Some(metrics) = METRICS.as_ref() {
        metrics.executions.with_label_values(&[outcome]).inc();
        metrics.gas_used.inc_by(gas_used);
    }
}

/// Record an installed contract.
#[cfg(feature = "metrics")]
pub fn record_deployment() {
    if let Some(metrics) = METRICS.as_ref() {
        metrics.deployments.inc();
    }
}

/// Record a compile failure by error kind.
#[cfg(feature = "metrics")]
pub fn record_compile_failure(kind: &str) {
    if let Some(metrics) = METRICS.as_ref() {
        metrics.compile_failures.with_label_values(&[kind]).inc();
    }
}

/// Record a request refused before execution.
#[cfg(feature = "metrics")]
pub fn record_rejected(reason: &str) {
    if let Some(metrics) = METRICS.as_ref() {
        metrics.rejected_requests.with_label_values(&[reason]).inc();
    }
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

/// Record a finished execution.
#[cfg(not(feature = "metrics"))]
pub fn record_execution(_outcome: &str, _gas_used: u64) {}

/// Record an installed contract.
#[cfg(not(feature = "metrics"))]
pub fn record_deployment() {}

/// Record a compile failure by error kind.
#[cfg(not(feature = "metrics"))]
pub fn record_compile_failure(_kind: &str) {}

/// Record a request refused before execution.
#[cfg(not(feature = "metrics"))]
pub fn record_rejected(_reason: &str) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_never_panics() {
        record_execution("Success", 21_000);
        record_execution("OutOfGas", 100);
        record_deployment();
        record_compile_failure("CompileSyntaxError");
        record_rejected("GasLimitTooHigh");
    }
}
