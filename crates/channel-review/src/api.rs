use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// A single reportable problem. Only the message and curated details are kept;
/// underlying error values are rendered to text before they get here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub message: String,
    #[serde(default)]
    pub details: Vec<String>,
    pub severity: Severity,
}

impl Finding {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: vec![],
            severity: Severity::Error,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: vec![],
            severity: Severity::Warning,
        }
    }

    pub fn with_details<I, S>(mut self, details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.details.extend(details.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Warnings,
    Errors,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingDetails {
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

/// Accumulated findings for one package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed(finding: Finding) -> Self {
        let mut out = Self::new();
        out.push(finding);
        out
    }

    pub fn push(&mut self, finding: Finding) {
        match finding.severity {
            Severity::Error => self.errors.push(finding),
            Severity::Warning => self.warnings.push(finding),
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Finding::error(message));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Finding::warning(message));
    }

    pub fn outcome(&self) -> Outcome {
        if !self.errors.is_empty() {
            Outcome::Errors
        } else if !self.warnings.is_empty() {
            Outcome::Warnings
        } else {
            Outcome::Success
        }
    }

    pub fn into_run_result(self) -> RunResult {
        let result = match self.outcome() {
            Outcome::Success => RunStatus::Success,
            Outcome::Warnings => RunStatus::Warnings,
            Outcome::Errors => RunStatus::Errors,
        };
        RunResult {
            result,
            details: Some(FindingDetails {
                errors: self.errors,
                warnings: self.warnings,
            }),
            message: None,
            status_code: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Warnings,
    Errors,
    Completed,
    Error,
}

/// Top-level result of one invocation, for both the single-package test and
/// the pull-request review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub result: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<FindingDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        rename = "__status_code__",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub status_code: Option<u16>,
}

impl RunResult {
    pub fn completed(message: impl Into<String>) -> Self {
        Self {
            result: RunStatus::Completed,
            details: None,
            message: Some(message.into()),
            status_code: None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            result: RunStatus::Error,
            details: None,
            message: Some(message.into()),
            status_code: Some(500),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.result, RunStatus::Errors | RunStatus::Error)
    }

    pub fn errors(&self) -> &[Finding] {
        self.details.as_ref().map_or(&[], |d| d.errors.as_slice())
    }

    pub fn warnings(&self) -> &[Finding] {
        self.details.as_ref().map_or(&[], |d| d.warnings.as_slice())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewVerdict {
    Success,
    Warning,
    Error,
}

impl ReviewVerdict {
    pub fn from_flags(errors: bool, warnings: bool) -> Self {
        if errors {
            Self::Error
        } else if warnings {
            Self::Warning
        } else {
            Self::Success
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_dominate_warnings() {
        let mut r = ValidationResult::new();
        r.warning("w1");
        r.warning("w2");
        r.error("e");
        assert_eq!(r.outcome(), Outcome::Errors);
        assert_eq!(ReviewVerdict::from_flags(true, true), ReviewVerdict::Error);
    }

    #[test]
    fn warnings_only_and_empty_outcomes() {
        let mut r = ValidationResult::new();
        assert_eq!(r.outcome(), Outcome::Success);
        r.warning("w");
        assert_eq!(r.outcome(), Outcome::Warnings);
        assert_eq!(
            ReviewVerdict::from_flags(false, true),
            ReviewVerdict::Warning
        );
        assert_eq!(
            ReviewVerdict::from_flags(false, false),
            ReviewVerdict::Success
        );
    }

    #[test]
    fn run_result_serializes_status_code_key() {
        let v = serde_json::to_value(RunResult::fatal("boom")).expect("serialize");
        assert_eq!(v["result"], "error");
        assert_eq!(v["__status_code__"], 500);
        assert_eq!(v["message"], "boom");
        assert!(v.get("details").is_none());
    }

    #[test]
    fn run_result_carries_details_for_package_runs() {
        let mut r = ValidationResult::new();
        r.push(Finding::error("bad").with_details(["one", "two"]));
        let out = r.into_run_result();
        let v = serde_json::to_value(&out).expect("serialize");
        assert_eq!(v["result"], "errors");
        assert_eq!(v["details"]["errors"][0]["message"], "bad");
        assert_eq!(v["details"]["errors"][0]["details"][1], "two");
        assert!(v["details"]["warnings"].as_array().expect("array").is_empty());
        assert!(out.is_failure());
    }
}
