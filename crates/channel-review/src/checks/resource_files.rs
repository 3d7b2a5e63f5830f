use super::common::{build_globset, package_files};
use super::{CheckOutcome, CheckerId, CheckerSetting, FileChecker};
use std::path::{Path, PathBuf};

const METADATA_GLOBS: &[&str] = &[
    "README*",
    "readme*",
    "LICENSE*",
    "LICENCE*",
    "license*",
    "CHANGELOG*",
    "changelog*",
    ".gitignore",
    ".gitattributes",
    ".editorconfig",
    ".travis.yml",
    "appveyor.yml",
    ".github/**",
    ".gitlab-ci.yml",
];

pub struct ResourceFilesChecker {
    root: PathBuf,
}

pub fn construct(root: &Path, _setting: Option<&CheckerSetting>) -> Box<dyn FileChecker> {
    Box::new(ResourceFilesChecker {
        root: root.to_path_buf(),
    })
}

impl FileChecker for ResourceFilesChecker {
    fn id(&self) -> CheckerId {
        CheckerId::ResourceFiles
    }

    fn run(&mut self) -> CheckOutcome {
        let mut out = CheckOutcome::default();
        let metadata = match build_globset(METADATA_GLOBS) {
            Ok(set) => set,
            Err(e) => {
                out.fail(e);
                return out;
            }
        };
        let has_resources = package_files(&self.root)
            .iter()
            .any(|(rel, _)| !metadata.is_match(rel));
        if !has_resources {
            out.fail("The package does not contain any resource files");
        }
        out
    }
}
