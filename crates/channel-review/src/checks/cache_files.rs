use super::common::{build_globset, package_dirs, package_files};
use super::{CheckOutcome, CheckerId, CheckerSetting, FileChecker};
use std::path::{Path, PathBuf};

const CACHE_FILE_GLOBS: &[&str] = &["**/*.pyc", "**/*.pyo", "**/.DS_Store", "**/Thumbs.db", "**/*.cache"];

pub struct CacheFilesChecker {
    root: PathBuf,
}

pub fn construct(root: &Path, _setting: Option<&CheckerSetting>) -> Box<dyn FileChecker> {
    Box::new(CacheFilesChecker {
        root: root.to_path_buf(),
    })
}

impl FileChecker for CacheFilesChecker {
    fn id(&self) -> CheckerId {
        CheckerId::CacheFiles
    }

    fn run(&mut self) -> CheckOutcome {
        let mut out = CheckOutcome::default();
        let globs = match build_globset(CACHE_FILE_GLOBS) {
            Ok(set) => set,
            Err(e) => {
                out.fail(e);
                return out;
            }
        };
        for dir in package_dirs(&self.root) {
            if dir.rsplit('/').next() == Some("__pycache__") {
                out.fail(format!("Package contains a Python cache folder: {dir}"));
            }
        }
        for (rel, _) in package_files(&self.root) {
            if rel.split('/').any(|seg| seg == "__pycache__") {
                continue;
            }
            if globs.is_match(&rel) {
                out.fail(format!("Package contains a cache file: {rel}"));
            }
        }
        out
    }
}
