use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowStatus {
    #[default]
    Success,
    /// Extraction worked but some episodes could not be written.
    Partial,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedGuest {
    pub show_id: String,
    pub air_date: NaiveDate,
    pub raw_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowReport {
    pub show_id: String,
    pub status: ShowStatus,
    pub episodes_seen: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub unresolved: Vec<UnresolvedGuest>,
    pub errors: Vec<String>,
}

impl ShowReport {
    pub fn new(show_id: &str) -> Self {
        Self {
            show_id: show_id.to_string(),
            ..Default::default()
        }
    }

    pub fn failed(show_id: &str, error: String) -> Self {
        Self {
            status: ShowStatus::Failure,
            errors: vec![error],
            ..Self::new(show_id)
        }
    }

    pub fn record(&mut self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Inserted => self.inserted += 1,
            ReconcileOutcome::Updated => self.updated += 1,
            ReconcileOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn record_fault(&mut self, error: String) {
        self.failed += 1;
        self.errors.push(error);
        self.status = ShowStatus::Partial;
    }
}

/// Summary of one orchestrator invocation, returned to the trigger caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRunResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub shows: Vec<ShowReport>,
}

impl CrawlRunResult {
    pub fn show(&self, show_id: &str) -> Option<&ShowReport> {
        self.shows.iter().find(|s| s.show_id == show_id)
    }

    pub fn inserted(&self) -> usize {
        self.shows.iter().map(|s| s.inserted).sum()
    }

    pub fn updated(&self) -> usize {
        self.shows.iter().map(|s| s.updated).sum()
    }

    pub fn unchanged(&self) -> usize {
        self.shows.iter().map(|s| s.unchanged).sum()
    }

    pub fn unresolved_guests(&self) -> Vec<&UnresolvedGuest> {
        self.shows.iter().flat_map(|s| s.unresolved.iter()).collect()
    }

    pub fn errors(&self) -> Vec<&str> {
        self.shows
            .iter()
            .flat_map(|s| s.errors.iter().map(String::as_str))
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.shows.iter().any(|s| s.status != ShowStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_marks_report_partial() {
        let mut report = ShowReport::new("lanz");
        report.record(ReconcileOutcome::Inserted);
        report.record_fault("disk full".into());
        assert_eq!(report.status, ShowStatus::Partial);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_run_result_serializes_status_snake_case() {
        let now = Utc::now();
        let result = CrawlRunResult {
            started_at: now,
            finished_at: now,
            shows: vec![ShowReport::failed("lanz", "boom".into())],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["shows"][0]["status"], "failure");
        assert!(result.has_failures());
        assert_eq!(result.errors(), vec!["boom"]);
    }
}
