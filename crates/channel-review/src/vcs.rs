use crate::errors::VcsError;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub status: String,
    pub path: String,
}

pub trait VersionControl {
    fn changed_files(&self, old: &str, new: &str) -> Result<Vec<ChangedFile>, VcsError>;
    fn show(&self, rev: &str, path: &str) -> Result<Vec<u8>, VcsError>;
}

/// `git` binary driven in `repo_root`.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_root: PathBuf,
}

impl GitCli {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    fn run_git(&self, args: &[&str]) -> Result<Vec<u8>, VcsError> {
        let owned = || args.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let out = Command::new("git")
            .current_dir(&self.repo_root)
            .args(args)
            .output()
            .map_err(|source| VcsError::Spawn {
                args: owned(),
                source,
            })?;
        if !out.status.success() {
            return Err(VcsError::Failed {
                args: owned(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(out.stdout)
    }
}

/// Parses `git diff --name-status` output. Each line is a status and a path
/// separated by whitespace; anything else rejects the whole output.
pub fn parse_name_status(output: &str) -> Result<Vec<ChangedFile>, VcsError> {
    let mut files = vec![];
    for line in output.trim().lines() {
        let parsed = line
            .split_once(char::is_whitespace)
            .map(|(status, path)| (status, path.trim_start()))
            .filter(|(status, path)| !status.is_empty() && !path.is_empty());
        let Some((status, path)) = parsed else {
            return Err(VcsError::MalformedDiff {
                output: output.trim().to_string(),
            });
        };
        files.push(ChangedFile {
            status: status.to_string(),
            path: path.to_string(),
        });
    }
    Ok(files)
}

impl VersionControl for GitCli {
    fn changed_files(&self, old: &str, new: &str) -> Result<Vec<ChangedFile>, VcsError> {
        let raw = self.run_git(&["diff", "--name-status", "--no-renames", old, new])?;
        parse_name_status(&String::from_utf8_lossy(&raw))
    }

    fn show(&self, rev: &str, path: &str) -> Result<Vec<u8>, VcsError> {
        self.run_git(&["show", &format!("{rev}:{path}")])
    }
}
