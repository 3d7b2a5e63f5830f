use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid config value [{section}].{key}: {message}")]
    Invalid {
        section: &'static str,
        key: &'static str,
        message: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Unable to set up HTTP client for {purpose}: {message}")]
    Client { purpose: String, message: String },
    #[error("HTTP error {status} {purpose} {url}")]
    Status {
        status: u16,
        purpose: String,
        url: String,
    },
    #[error("Error {purpose} {url}: {message}")]
    Network {
        purpose: String,
        url: String,
        message: String,
    },
    #[error("Error {purpose} {url}: response exceeds {max_bytes} bytes")]
    TooLarge {
        purpose: String,
        url: String,
        max_bytes: u64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("failed to run git {args:?}: {source}")]
    Spawn {
        args: Vec<String>,
        source: std::io::Error,
    },
    #[error("git {args:?} failed: {stderr}")]
    Failed { args: Vec<String>, stderr: String },
    #[error("git diff output included a line without status and filename\n\n{output}")]
    MalformedDiff { output: String },
}

/// Failures that make the rest of a pull-request evaluation meaningless.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("Unable to diff {old}..{new}")]
    DiffUnavailable { old: String, new: String },
    #[error("{0}")]
    Malformed(VcsError),
    #[error("Unsure how to test a change that adds or removes a file, aborting")]
    UnsupportedFileChange { status: String, path: String },
    #[error("Unable to read {path} at {rev}: {message}")]
    ShowFailed {
        rev: String,
        path: String,
        message: String,
    },
    #[error("Unable to parse {path} at {rev}: {message}")]
    InvalidManifest {
        rev: String,
        path: String,
        message: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Error posting review to PR - {0}")]
    Status(u16),
    #[error("Error posting review to PR - {message} (response: {body})")]
    Rejected { message: String, body: String },
    #[error("Error posting review to PR - {0}")]
    Network(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{0}")]
    Unexpected(String),
}
