// Provider call accounting, injected into the provider clients.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct EndpointStats {
    pub total_calls: u64,
    pub error_count: u64,
    pub last_call_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub session_started_at: DateTime<Utc>,
    /// Keyed by `"<provider>:<method>"`.
    pub endpoints: BTreeMap<String, EndpointStats>,
}

impl UsageSnapshot {
    pub fn total_calls(&self) -> u64 {
        self.endpoints.values().map(|stats| stats.total_calls).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.endpoints.values().map(|stats| stats.error_count).sum()
    }
}

/// Reporting collaborator for outbound provider calls.
pub trait UsageRecorder: Send + Sync {
    fn record(&self, provider: &str, method: &str, outcome: CallOutcome);
    fn snapshot(&self) -> UsageSnapshot;
    /// Clears counters at a session boundary.
    fn reset(&self);
}

pub type SharedUsage = Arc<dyn UsageRecorder>;

struct TrackerState {
    session_started_at: DateTime<Utc>,
    endpoints: BTreeMap<String, EndpointStats>,
}

impl TrackerState {
    fn fresh() -> Self {
        Self {
            session_started_at: Utc::now(),
            endpoints: BTreeMap::new(),
        }
    }
}

/// In-memory tracker; one instance per host session.
pub struct ProviderUsageTracker {
    state: RwLock<TrackerState>,
}

impl ProviderUsageTracker {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TrackerState::fresh()),
        }
    }

    pub fn shared() -> SharedUsage {
        Arc::new(Self::new())
    }
}

impl Default for ProviderUsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageRecorder for ProviderUsageTracker {
    fn record(&self, provider: &str, method: &str, outcome: CallOutcome) {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let stats = state
            .endpoints
            .entry(format!("{}:{}", provider, method))
            .or_default();
        stats.total_calls += 1;
        if outcome == CallOutcome::Failure {
            stats.error_count += 1;
        }
        stats.last_call_at = Some(Utc::now());
    }

    fn snapshot(&self) -> UsageSnapshot {
        let state = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        UsageSnapshot {
            session_started_at: state.session_started_at,
            endpoints: state.endpoints.clone(),
        }
    }

    fn reset(&self) {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *state = TrackerState::fresh();
    }
}

/// Recorder that drops everything.
#[cfg(test)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUsage;

#[cfg(test)]
impl UsageRecorder for NoopUsage {
    fn record(&self, _provider: &str, _method: &str, _outcome: CallOutcome) {}

    fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            session_started_at: Utc::now(),
            endpoints: BTreeMap::new(),
        }
    }

    fn reset(&self) {}
}

/// One-line summary for operators, `None` when nothing was called.
pub fn compact_summary(snapshot: &UsageSnapshot) -> Option<String> {
    if snapshot.endpoints.is_empty() {
        return None;
    }
    let elapsed = Utc::now() - snapshot.session_started_at;
    let per_endpoint = snapshot
        .endpoints
        .iter()
        .map(|(key, stats)| format!("{}={}/{}err", key, stats.total_calls, stats.error_count))
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!(
        "Provider calls: {} ({} errors) in {}s [{}]",
        snapshot.total_calls(),
        snapshot.total_errors(),
        elapsed.num_seconds().max(0),
        per_endpoint
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_and_errors_per_endpoint() {
        let tracker = ProviderUsageTracker::new();
        tracker.record("Etherscan", "balance", CallOutcome::Success);
        tracker.record("Etherscan", "balance", CallOutcome::Failure);
        tracker.record("Alchemy", "alchemy_getTokenMetadata", CallOutcome::Success);

        let snapshot = tracker.snapshot();
        let balance = &snapshot.endpoints["Etherscan:balance"];
        assert_eq!(balance.total_calls, 2);
        assert_eq!(balance.error_count, 1);
        assert!(balance.last_call_at.is_some());
        assert_eq!(snapshot.total_calls(), 3);
        assert_eq!(snapshot.total_errors(), 1);
    }

    #[test]
    fn reset_starts_a_new_session() {
        let tracker = ProviderUsageTracker::new();
        tracker.record("Etherscan", "balance", CallOutcome::Success);
        let before = tracker.snapshot().session_started_at;
        tracker.reset();
        let after = tracker.snapshot();
        assert!(after.endpoints.is_empty());
        assert!(after.session_started_at >= before);
    }

    #[test]
    fn compact_summary_is_empty_without_calls() {
        let tracker = ProviderUsageTracker::new();
        assert!(compact_summary(&tracker.snapshot()).is_none());
        tracker.record("Alchemy", "alchemy_getTokenBalances", CallOutcome::Failure);
        let summary = compact_summary(&tracker.snapshot()).expect("has calls");
        assert!(summary.contains("Alchemy:alchemy_getTokenBalances=1/1err"));
    }
}
