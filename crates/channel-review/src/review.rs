//! Pull-request review: the plain-text report, the markdown comment wrapped
//! around it, and delivery to the code host.

use crate::api::{ReviewVerdict, RunResult, RunStatus};
use crate::config::{CrawlerConfig, ReviewEventPolicy, ReviewPolicyConfig};
use crate::differ::DiffSet;
use crate::errors::PublishError;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;

const GITHUB_V3_JSON: &str = "application/vnd.github.v3+json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewEvent {
    RequestChanges,
    Comment,
    Approve,
}

impl ReviewEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestChanges => "REQUEST_CHANGES",
            Self::Comment => "COMMENT",
            Self::Approve => "APPROVE",
        }
    }

    pub fn for_verdict(policy: ReviewEventPolicy, verdict: ReviewVerdict) -> Self {
        match (policy, verdict) {
            (ReviewEventPolicy::RequestChanges, _) => Self::RequestChanges,
            (ReviewEventPolicy::ByVerdict, ReviewVerdict::Error) => Self::RequestChanges,
            (ReviewEventPolicy::ByVerdict, ReviewVerdict::Warning) => Self::Comment,
            (ReviewEventPolicy::ByVerdict, ReviewVerdict::Success) => Self::Approve,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub verdict: ReviewVerdict,
    pub event: ReviewEvent,
    pub report: Vec<String>,
    pub body: String,
}

fn section(out: &mut Vec<String>, title: &str, items: impl IntoIterator<Item = impl AsRef<str>>) {
    if !out.is_empty() {
        out.push(String::new());
    }
    out.push(title.to_string());
    for item in items {
        out.push(format!("  - {}", item.as_ref()));
    }
}

/// Plain-text report lines plus the error/warning flags that drive the
/// verdict. `results` holds the package test result for each added package.
pub fn compose_report(diff: &DiffSet, results: &BTreeMap<String, RunResult>) -> (Vec<String>, bool, bool) {
    let mut out: Vec<String> = vec![];
    let mut errors = false;
    let mut warnings = false;

    if !diff.removed_repositories.is_empty() {
        section(&mut out, "Repositories removed:", &diff.removed_repositories);
    }
    if !diff.added_repositories.is_empty() {
        section(&mut out, "Repositories added:", &diff.added_repositories);
        for scan in &diff.repository_scans {
            out.push(String::new());
            out.push(format!("Processing repository \"{}\"", scan.url));
            for e in &scan.errors {
                errors = true;
                out.push(format!("  - ERROR: {e}"));
            }
            if let Some(n) = scan.package_count {
                let plural = if n == 1 { "" } else { "s" };
                out.push(format!("  - Found {n} package{plural}"));
            }
        }
    }
    if !diff.removed.is_empty() {
        section(&mut out, "Packages removed:", &diff.removed);
    }
    if !diff.modified.is_empty() {
        section(&mut out, "Packages modified:", &diff.modified);
    }
    if !diff.added.is_empty() {
        section(&mut out, "Packages added:", &diff.added);
        for name in &diff.added {
            out.push(String::new());
            out.push(format!("Processing package \"{name}\""));
            let Some(result) = results.get(name) else {
                errors = true;
                out.push("  - ERROR: Package was not tested".to_string());
                continue;
            };
            if result.result == RunStatus::Success {
                out.push("  - All checks passed".to_string());
                continue;
            }
            if let Some(message) = result.message.as_deref().filter(|_| result.errors().is_empty()) {
                errors = true;
                out.push(format!("  - ERROR: {message}"));
            }
            for finding in result.errors() {
                errors = true;
                out.push(format!("  - ERROR: {}", finding.message));
                out.extend(finding.details.iter().map(|d| format!("    - {d}")));
            }
            for finding in result.warnings() {
                warnings = true;
                out.push(format!("  - WARNING: {}", finding.message));
                out.extend(finding.details.iter().map(|d| format!("    - {d}")));
            }
        }
    }
    (out, errors, warnings)
}

pub fn compose(
    diff: &DiffSet,
    results: &BTreeMap<String, RunResult>,
    policy: &ReviewPolicyConfig,
) -> Review {
    let (report, errors, warnings) = compose_report(diff, results);
    let verdict = ReviewVerdict::from_flags(errors, warnings);

    let mut comment = vec![
        format!("### Automated testing result: {}", verdict.as_str()),
        String::new(),
    ];
    match diff.links.len() {
        0 => {}
        1 => {
            if let Some((name, url)) = diff.links.iter().next() {
                comment.push(format!("Repo link: [{name}]({url})"));
            }
        }
        _ => {
            comment.push("Repo links:".to_string());
            comment.push(String::new());
            for name in &diff.added {
                if let Some(url) = diff.links.get(name) {
                    comment.push(format!("  - [{name}]({url})"));
                }
            }
            comment.push(String::new());
        }
    }
    if errors || warnings {
        comment.push(format!("[Results help]({})", policy.help_url));
        comment.push(String::new());
    }
    if !report.is_empty() {
        comment.push("```".to_string());
        comment.extend(report.iter().cloned());
        comment.push("```".to_string());
    }

    Review {
        verdict,
        event: ReviewEvent::for_verdict(policy.event, verdict),
        report,
        body: comment.join("\n"),
    }
}

pub trait ReviewPublisher {
    fn publish(&self, pr_url: &str, review: &Review) -> Result<(), PublishError>;
}

#[derive(Debug, Serialize)]
struct ReviewPayload<'a> {
    body: &'a str,
    event: ReviewEvent,
}

/// Posts reviews through the GitHub REST API.
pub struct GithubReviews {
    client: Client,
    token: String,
}

impl GithubReviews {
    pub fn new(settings: &CrawlerConfig, token: impl Into<String>) -> Result<Self, PublishError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| PublishError::Network(e.to_string()))?;
        Ok(Self {
            client,
            token: token.into(),
        })
    }
}

pub fn reviews_url(pr_url: &str) -> String {
    format!("{}/reviews", pr_url.trim_end_matches('/'))
}

impl ReviewPublisher for GithubReviews {
    fn publish(&self, pr_url: &str, review: &Review) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(&ReviewPayload {
            body: &review.body,
            event: review.event,
        })
        .map_err(|e| PublishError::Network(e.to_string()))?;
        let url = reviews_url(pr_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, HeaderValue::from_static(GITHUB_V3_JSON))
            .body(payload)
            .send()
            .map_err(|e| PublishError::Network(e.to_string()))?;

        let status = response.status();
        tracing::info!(url = %url, status = status.as_u16(), event = review.event.as_str(), "posted review");
        if status.as_u16() == 200 {
            return Ok(());
        }
        if status.is_success() {
            return Err(PublishError::Status(status.as_u16()));
        }
        let message = format!(
            "HTTP Error {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        );
        let body = response.text().unwrap_or_default();
        Err(PublishError::Rejected { message, body })
    }
}

/// Writes the review body to `sink` instead of posting it.
pub struct DryRun<W: Write> {
    sink: RefCell<W>,
}

impl<W: Write> DryRun<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: RefCell::new(sink),
        }
    }

    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }
}

impl<W: Write> ReviewPublisher for DryRun<W> {
    fn publish(&self, pr_url: &str, review: &Review) -> Result<(), PublishError> {
        let mut sink = self.sink.borrow_mut();
        writeln!(sink, "POST {} ({})", reviews_url(pr_url), review.event.as_str())
            .and_then(|_| writeln!(sink, "{}", review.body))
            .map_err(|e| PublishError::Network(e.to_string()))
    }
}

#[cfg(test)]
mod tests;
