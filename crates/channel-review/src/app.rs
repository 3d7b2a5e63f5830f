use crate::api::RunResult;
use crate::config::{ReviewConfig, ReviewPolicyConfig};
use crate::differ::diff;
use crate::pipeline::PackageTester;
use crate::provider::ChannelProvider;
use crate::review::{DryRun, GithubReviews, ReviewPublisher, compose};
use crate::transport::{ConnectionPool, Connector};
use crate::vcs::{GitCli, VersionControl};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const CHECKS_RAN: &str = "Checks ran successfully";

#[derive(Debug, Clone)]
pub struct PullRequest {
    pub pr_url: String,
    pub old_rev: String,
    pub new_rev: String,
}

/// Tests one manifest entry with the production provider and transport.
pub fn test_package(cfg: &ReviewConfig, entry: &Value) -> RunResult {
    let pool = ConnectionPool::new(cfg.crawler.clone());
    let provider = ChannelProvider::new(cfg.crawler.github_api_base.clone());
    PackageTester::new(&provider, &pool, cfg.extract.clone()).run_tests(entry)
}

/// Diffs the two revisions, tests every added package, and publishes the
/// review. Fatal problems come back as a 500 result and nothing is posted.
pub fn review_pull_request(
    request: &PullRequest,
    vcs: &dyn VersionControl,
    connector: &dyn Connector,
    tester: &PackageTester<'_>,
    publisher: &dyn ReviewPublisher,
    policy: &ReviewPolicyConfig,
) -> RunResult {
    let span = tracing::info_span!("pull_request", pr = %request.pr_url);
    let _guard = span.enter();

    let changes = match diff(vcs, connector, &request.old_rev, &request.new_rev) {
        Ok(changes) => changes,
        Err(e) => {
            tracing::error!(error = %e, "diff failed");
            return RunResult::fatal(e.to_string());
        }
    };

    let mut results = BTreeMap::new();
    for name in &changes.added {
        let Some(spec) = changes.added_specs.get(name) else {
            continue;
        };
        results.insert(name.clone(), tester.run_tests(spec));
    }

    let review = compose(&changes, &results, policy);
    tracing::info!(verdict = review.verdict.as_str(), "review composed");
    match publisher.publish(&request.pr_url, &review) {
        Ok(()) => RunResult::completed(CHECKS_RAN),
        Err(e) => {
            tracing::error!(error = %e, "publish failed");
            RunResult::fatal(e.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct PullRequestOptions {
    pub request: PullRequest,
    pub repo_root: PathBuf,
    pub dry_run: bool,
}

/// Production wiring for [`review_pull_request`]: git in `repo_root`, the
/// pooled HTTP transport, and either GitHub or a dry-run publisher on stderr.
pub fn test_pull_request(cfg: &ReviewConfig, opts: &PullRequestOptions) -> RunResult {
    let vcs = GitCli::new(&opts.repo_root);
    let pool = ConnectionPool::new(cfg.crawler.clone());
    let provider = ChannelProvider::new(cfg.crawler.github_api_base.clone());
    let tester = PackageTester::new(&provider, &pool, cfg.extract.clone());

    let publisher: Box<dyn ReviewPublisher> = if opts.dry_run {
        Box::new(DryRun::new(std::io::stderr()))
    } else {
        let Some(token) = cfg.crawler.github_token.clone() else {
            return RunResult::fatal(
                "Error posting review to PR - no GitHub token; pass --token or set GITHUB_TOKEN",
            );
        };
        match GithubReviews::new(&cfg.crawler, token) {
            Ok(p) => Box::new(p),
            Err(e) => return RunResult::fatal(e.to_string()),
        }
    };

    review_pull_request(
        &opts.request,
        &vcs,
        &pool,
        &tester,
        publisher.as_ref(),
        &cfg.review,
    )
}
