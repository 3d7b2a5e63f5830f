use channel_review::api::RunResult;
use channel_review::app::{PullRequest, PullRequestOptions, test_package, test_pull_request};
use channel_review::config::ReviewConfig;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "channel-review")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated review of package channel changes", long_about = None)]
pub struct Cli {
    /// Config file (TOML); falls back to $CHANNEL_REVIEW_CONFIG, then defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Test a single package entry
    Package {
        /// JSON file holding one package entry, or `-` for stdin
        spec: String,
    },

    /// Review the manifest changes of a pull request and post the result
    PullRequest {
        /// API URL of the pull request
        #[arg(long)]
        pr_url: String,

        /// Base revision
        #[arg(long)]
        old: String,

        /// Head revision
        #[arg(long)]
        new: String,

        /// Checkout of the channel repository
        #[arg(long, default_value = ".")]
        repo_root: PathBuf,

        /// GitHub token used for API calls and posting the review
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Print the review to stderr instead of posting it
        #[arg(long)]
        dry_run: bool,
    },
}

fn read_spec(spec: &str) -> Result<Value, String> {
    let raw = if spec == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("failed to read package entry from stdin: {e}"))?;
        buf
    } else {
        std::fs::read_to_string(Path::new(spec))
            .map_err(|e| format!("failed to read package entry {spec}: {e}"))?
    };
    let value: Value =
        serde_json::from_str(&raw).map_err(|e| format!("package entry is not valid JSON: {e}"))?;
    if !value.is_object() {
        return Err("package entry must be a JSON object".to_string());
    }
    Ok(value)
}

/// `Err` is reserved for usage and config problems; review outcomes, good or
/// bad, come back as a [`RunResult`].
pub fn run(cli: Cli) -> Result<RunResult, String> {
    let mut cfg = ReviewConfig::discover(cli.config.as_deref()).map_err(|e| e.to_string())?;
    match cli.command {
        Command::Package { spec } => {
            let entry = read_spec(&spec)?;
            cfg.crawler.github_token = std::env::var("GITHUB_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty());
            Ok(test_package(&cfg, &entry))
        }
        Command::PullRequest {
            pr_url,
            old,
            new,
            repo_root,
            token,
            dry_run,
        } => {
            cfg.crawler.github_token = token.filter(|t| !t.trim().is_empty());
            let opts = PullRequestOptions {
                request: PullRequest {
                    pr_url,
                    old_rev: old,
                    new_rev: new,
                },
                repo_root,
                dry_run,
            };
            Ok(test_pull_request(&cfg, &opts))
        }
    }
}
