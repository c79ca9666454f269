//! The cumulative diagnostic report and stage outcome wrappers

use crate::models::results::{
    BlockingFactor, DnsResult, ExceptionRecord, HttpResult, TcpResult, TlsResult,
};
use crate::types::ConnectionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Slot for one stage in the report
///
/// `NotRun` is a stage the pipeline never reached, `Failed` is a stage that
/// could not produce a record at all, and `Completed` carries whatever the
/// stage observed, including records that describe an invalid peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum StageOutcome<T> {
    NotRun,
    Failed(ExceptionRecord),
    Completed(T),
}

impl<T> Default for StageOutcome<T> {
    fn default() -> Self {
        Self::NotRun
    }
}

impl<T> StageOutcome<T> {
    /// The stage record, when one was produced
    pub fn result(&self) -> Option<&T> {
        match self {
            Self::Completed(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_not_run(&self) -> bool {
        matches!(self, Self::NotRun)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Everything one stage hands back to the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput<T> {
    pub outcome: StageOutcome<T>,
    pub factors: Vec<BlockingFactor>,
    pub exceptions: Vec<ExceptionRecord>,
}

impl<T> StageOutput<T> {
    /// A stage that produced a record
    pub fn completed(result: T) -> Self {
        Self {
            outcome: StageOutcome::Completed(result),
            factors: Vec::new(),
            exceptions: Vec::new(),
        }
    }

    /// A stage that produced no record; the fault is also kept as an exception
    pub fn failed(exception: ExceptionRecord) -> Self {
        Self {
            outcome: StageOutcome::Failed(exception.clone()),
            factors: Vec::new(),
            exceptions: vec![exception],
        }
    }

    pub fn with_factor(mut self, factor: BlockingFactor) -> Self {
        self.factors.push(factor);
        self
    }

    pub fn with_exception(mut self, exception: ExceptionRecord) -> Self {
        self.exceptions.push(exception);
        self
    }
}

/// Cumulative report of one diagnostic run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub domain: String,
    pub status: ConnectionStatus,
    pub dns: StageOutcome<DnsResult>,
    pub tcp: StageOutcome<TcpResult>,
    pub tls: StageOutcome<TlsResult>,
    pub http: StageOutcome<HttpResult>,
    pub exceptions: Vec<ExceptionRecord>,
    pub blocking_factors: Vec<BlockingFactor>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Report {
    /// Empty report before any run
    pub fn idle<S: Into<String>>(domain: S) -> Self {
        Self {
            domain: domain.into(),
            status: ConnectionStatus::Idle,
            dns: StageOutcome::NotRun,
            tcp: StageOutcome::NotRun,
            tls: StageOutcome::NotRun,
            http: StageOutcome::NotRun,
            exceptions: Vec::new(),
            blocking_factors: Vec::new(),
            completed_at: None,
        }
    }

    /// Fresh report for a run that just started
    pub fn loading<S: Into<String>>(domain: S) -> Self {
        Self {
            status: ConnectionStatus::Loading,
            ..Self::idle(domain)
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == ConnectionStatus::Loading
    }

    /// Findings at or above `severity`, in report order
    pub fn factors_at_least(
        &self,
        severity: crate::types::Severity,
    ) -> impl Iterator<Item = &BlockingFactor> {
        self.blocking_factors
            .iter()
            .filter(move |factor| factor.severity <= severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Phase, Severity};

    #[test]
    fn test_loading_report_is_empty() {
        let report = Report::loading("example.com");
        assert!(report.is_loading());
        assert!(report.dns.is_not_run());
        assert!(report.http.is_not_run());
        assert!(report.exceptions.is_empty());
        assert!(report.completed_at.is_none());
    }

    #[test]
    fn test_failed_stage_output_keeps_exception() {
        let exception = ExceptionRecord::new(Phase::Tls, "Io", Some("reset".to_string()));
        let output: StageOutput<TlsResult> = StageOutput::failed(exception.clone());
        assert_eq!(output.outcome, StageOutcome::Failed(exception.clone()));
        assert_eq!(output.exceptions, vec![exception]);
        assert!(output.outcome.result().is_none());
    }

    #[test]
    fn test_completed_invalid_is_distinct_from_failed() {
        let output = StageOutput::completed(TlsResult::invalid());
        assert!(output.outcome.is_completed());
        assert_eq!(output.outcome.result().map(|r| r.is_valid), Some(false));
    }

    #[test]
    fn test_factors_at_least() {
        let mut report = Report::idle("example.com");
        report.blocking_factors.push(BlockingFactor::new("a", Severity::Low, "low"));
        report.blocking_factors.push(BlockingFactor::new("b", Severity::Critical, "crit"));
        report.blocking_factors.push(BlockingFactor::new("c", Severity::High, "high"));
        let names: Vec<_> = report
            .factors_at_least(Severity::High)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_stage_outcome_serialization() {
        let outcome: StageOutcome<TcpResult> = StageOutcome::NotRun;
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"state":"not_run"}"#);
    }
}
