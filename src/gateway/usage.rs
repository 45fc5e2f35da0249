//! Usage tracking via the UsageSink trait.
//!
//! The gateway reports every call attempt through a UsageSink:
//! - the CLI uses TallyUsageSink (tracing events plus run totals for the report)
//! - tests use NoopUsageSink

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// Status of a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Error => "error",
        }
    }
}

/// Record of a provider API call for logging.
#[derive(Debug, Clone)]
pub struct ProviderCallRecord {
    /// Provider name, e.g. "openrouter".
    pub provider: &'static str,
    /// Endpoint, e.g. "chat/completions".
    pub endpoint: &'static str,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Cost in nanodollars (1e-9 USD) as reported by the provider.
    pub cost_nanodollars: i64,
    /// Evaluation run this call belongs to.
    pub run_id: Option<Uuid>,
    /// Scenario this call was made for.
    pub scenario_id: Option<String>,
    /// Zero-based retry attempt.
    pub attempt: u32,
    pub latency_ms: u64,
    pub status: CallStatus,
    /// Error code if status is Error.
    pub error_code: Option<String>,
    /// Which code path made this call.
    pub caller: &'static str,
    pub timestamp: DateTime<Utc>,
}

impl ProviderCallRecord {
    /// Create a new record with required fields, defaulting others.
    pub fn new(
        provider: &'static str,
        endpoint: &'static str,
        model: impl Into<String>,
        caller: &'static str,
    ) -> Self {
        Self {
            provider,
            endpoint,
            model: model.into(),
            input_tokens: 0,
            output_tokens: 0,
            cost_nanodollars: 0,
            run_id: None,
            scenario_id: None,
            attempt: 0,
            latency_ms: 0,
            status: CallStatus::Success,
            error_code: None,
            caller,
            timestamp: Utc::now(),
        }
    }

    pub fn tokens(mut self, input: u32, output: u32) -> Self {
        self.input_tokens = input;
        self.output_tokens = output;
        self
    }

    pub fn cost(mut self, nanodollars: i64) -> Self {
        self.cost_nanodollars = nanodollars;
        self
    }

    pub fn run(mut self, run_id: Option<Uuid>) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn scenario(mut self, scenario_id: Option<String>) -> Self {
        self.scenario_id = scenario_id;
        self
    }

    pub fn attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn latency(mut self, ms: u64) -> Self {
        self.latency_ms = ms;
        self
    }

    pub fn error(mut self, code: impl Into<String>) -> Self {
        self.status = CallStatus::Error;
        self.error_code = Some(code.into());
        self
    }
}

/// Trait for recording provider call usage.
#[async_trait]
pub trait UsageSink: Send + Sync + 'static {
    /// Record a provider call. This should be fire-and-forget:
    /// failures should be logged but not propagated.
    async fn record(&self, record: ProviderCallRecord);
}

/// No-op usage sink that discards all records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageSink;

#[async_trait]
impl UsageSink for NoopUsageSink {
    async fn record(&self, _record: ProviderCallRecord) {}
}

/// Aggregate usage over a run, embedded in the report metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub calls: u64,
    pub failed_calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_nanodollars: i64,
}

/// Emits one tracing event per call and keeps running totals.
#[derive(Debug, Default)]
pub struct TallyUsageSink {
    calls: AtomicU64,
    failed_calls: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    cost_nanodollars: AtomicI64,
}

impl TallyUsageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn totals(&self) -> UsageTotals {
        UsageTotals {
            calls: self.calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
            cost_nanodollars: self.cost_nanodollars.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl UsageSink for TallyUsageSink {
    async fn record(&self, record: ProviderCallRecord) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.input_tokens
            .fetch_add(record.input_tokens as u64, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(record.output_tokens as u64, Ordering::Relaxed);
        self.cost_nanodollars
            .fetch_add(record.cost_nanodollars, Ordering::Relaxed);

        match record.status {
            CallStatus::Success => debug!(
                provider = record.provider,
                endpoint = record.endpoint,
                model = %record.model,
                caller = record.caller,
                scenario = record.scenario_id.as_deref().unwrap_or("-"),
                tokens = record.input_tokens + record.output_tokens,
                cost_nanos = record.cost_nanodollars,
                latency_ms = record.latency_ms,
                "provider call"
            ),
            CallStatus::Error => {
                self.failed_calls.fetch_add(1, Ordering::Relaxed);
                warn!(
                    provider = record.provider,
                    model = %record.model,
                    caller = record.caller,
                    scenario = record.scenario_id.as_deref().unwrap_or("-"),
                    attempt = record.attempt,
                    status = record.status.as_str(),
                    error = record.error_code.as_deref().unwrap_or("unknown"),
                    "provider call failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tally_accumulates_success_and_failure() {
        let sink = TallyUsageSink::new();
        sink.record(
            ProviderCallRecord::new("openrouter", "chat/completions", "m", "test")
                .tokens(10, 5)
                .cost(300),
        )
        .await;
        sink.record(
            ProviderCallRecord::new("openrouter", "chat/completions", "m", "test")
                .error("timeout"),
        )
        .await;

        let totals = sink.totals();
        assert_eq!(totals.calls, 2);
        assert_eq!(totals.failed_calls, 1);
        assert_eq!(totals.input_tokens, 10);
        assert_eq!(totals.output_tokens, 5);
        assert_eq!(totals.cost_nanodollars, 300);
    }
}
