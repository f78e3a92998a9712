use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use search_core::SessionSummary;

/// JSON document printed at the end of a run.
#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub seed: Option<u64>,
    pub employment_rate: f64,
    pub summary: SessionSummary,
}

impl SessionReport {
    pub fn new(
        session_id: Uuid,
        started_at: DateTime<Utc>,
        seed: Option<u64>,
        summary: SessionSummary,
    ) -> Self {
        Self {
            session_id,
            started_at,
            finished_at: Utc::now(),
            seed,
            employment_rate: summary.employment_rate(),
            summary,
        }
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}
