use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical per-switch outcome values
pub mod outcome_status {
    pub const COMPLETED: &str = "completed";
    pub const INVALID_CONFIG: &str = "invalid_config";
    pub const TRANSPORT_FAILED: &str = "transport_failed";
    pub const NOT_ATTEMPTED: &str = "not_attempted";
}

/// SwitchOutcome records what happened to one switch during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchOutcome {
    pub hostname: String,
    pub status: String,
    pub commands_sent: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl SwitchOutcome {
    pub fn completed(hostname: &str, commands_sent: usize, transcript: Option<String>) -> Self {
        Self {
            hostname: hostname.to_string(),
            status: outcome_status::COMPLETED.to_string(),
            commands_sent,
            error: None,
            transcript,
        }
    }

    /// A failed switch. `error` should carry the full cause chain.
    pub fn failed(hostname: &str, status: &str, commands_sent: usize, error: String) -> Self {
        Self {
            hostname: hostname.to_string(),
            status: status.to_string(),
            commands_sent,
            error: Some(error),
            transcript: None,
        }
    }

    pub fn not_attempted(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            status: outcome_status::NOT_ATTEMPTED.to_string(),
            commands_sent: 0,
            error: None,
            transcript: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == outcome_status::INVALID_CONFIG || self.status == outcome_status::TRANSPORT_FAILED
    }
}

/// RunReport summarizes one provisioning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<SwitchOutcome>,
}

impl RunReport {
    pub fn start() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn count(&self, status: &str) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SwitchOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}
