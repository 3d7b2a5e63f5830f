use super::common::{has_extension, package_files};
use super::{CheckOutcome, CheckerId, CheckerSetting, FileChecker};
use std::path::{Path, PathBuf};

/// Sublime Text only loads plugins from the package root, so Python code that
/// lives exclusively in subfolders is never executed unless imported.
pub struct PluginLocationChecker {
    root: PathBuf,
}

pub fn construct(root: &Path, _setting: Option<&CheckerSetting>) -> Box<dyn FileChecker> {
    Box::new(PluginLocationChecker {
        root: root.to_path_buf(),
    })
}

impl FileChecker for PluginLocationChecker {
    fn id(&self) -> CheckerId {
        CheckerId::PluginLocation
    }

    fn run(&mut self) -> CheckOutcome {
        let mut out = CheckOutcome::default();
        let python: Vec<String> = package_files(&self.root)
            .into_iter()
            .map(|(rel, _)| rel)
            .filter(|rel| has_extension(rel, "py"))
            .collect();
        let in_root = python.iter().any(|rel| !rel.contains('/'));
        if !python.is_empty() && !in_root {
            out.warn(format!(
                "Python files were found only in subfolders ({} file(s)); plugins are only loaded from the package root",
                python.len()
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn subfolder_only_python_warns() {
        let dir = tempdir().expect("temp dir");
        std::fs::create_dir_all(dir.path().join("src")).expect("mkdir");
        std::fs::write(dir.path().join("src/plugin.py"), "").expect("write");
        let out = construct(dir.path(), None).run();
        assert_eq!(out.warnings.len(), 1);
        assert!(out.failures.is_empty());
    }

    #[test]
    fn root_plugin_is_fine() {
        let dir = tempdir().expect("temp dir");
        std::fs::create_dir_all(dir.path().join("lib")).expect("mkdir");
        std::fs::write(dir.path().join("plugin.py"), "").expect("write");
        std::fs::write(dir.path().join("lib/util.py"), "").expect("write");
        assert_eq!(construct(dir.path(), None).run(), CheckOutcome::default());
    }

    #[test]
    fn no_python_is_fine() {
        let dir = tempdir().expect("temp dir");
        std::fs::write(dir.path().join("Main.sublime-menu"), "[]").expect("write");
        assert_eq!(construct(dir.path(), None).run(), CheckOutcome::default());
    }
}
