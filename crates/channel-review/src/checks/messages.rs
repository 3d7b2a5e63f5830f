use super::{CheckOutcome, CheckerId, CheckerSetting, FileChecker};
use crate::provider::SemVer;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Validates `messages.json`: keys are `install` or versions, optionally
/// carrying one of the release tag prefixes; values name existing files.
pub struct MessagesChecker {
    root: PathBuf,
    prefixes: Vec<String>,
}

pub fn construct(root: &Path, setting: Option<&CheckerSetting>) -> Box<dyn FileChecker> {
    let mut checker = MessagesChecker {
        root: root.to_path_buf(),
        prefixes: vec![],
    };
    if let Some(CheckerSetting::TagPrefixes(prefixes)) = setting {
        for p in prefixes {
            checker.add_prefix(p);
        }
    }
    Box::new(checker)
}

impl MessagesChecker {
    pub fn add_prefix(&mut self, prefix: &str) {
        if !prefix.is_empty() && !self.prefixes.iter().any(|p| p == prefix) {
            self.prefixes.push(prefix.to_string());
        }
    }

    fn is_version_key(&self, key: &str) -> bool {
        if SemVer::parse(key).is_some() {
            return true;
        }
        self.prefixes
            .iter()
            .filter_map(|p| key.strip_prefix(p.as_str()))
            .any(|rest| SemVer::parse(rest).is_some())
    }
}

impl FileChecker for MessagesChecker {
    fn id(&self) -> CheckerId {
        CheckerId::Messages
    }

    fn run(&mut self) -> CheckOutcome {
        let mut out = CheckOutcome::default();
        let index = self.root.join("messages.json");
        if !index.is_file() {
            if self.root.join("messages").is_dir() {
                out.warn("Package has a \"messages\" folder but no messages.json file");
            }
            return out;
        }

        let raw = match std::fs::read(&index) {
            Ok(raw) => raw,
            Err(e) => {
                out.fail(format!("Unable to read messages.json: {e}"));
                return out;
            }
        };
        let parsed: Value = match serde_json::from_slice(&raw) {
            Ok(v) => v,
            Err(e) => {
                out.fail(format!("Unable to parse messages.json: {e}"));
                return out;
            }
        };
        let Some(map) = parsed.as_object() else {
            out.fail("messages.json must contain a JSON object");
            return out;
        };

        for (key, value) in map {
            if key != "install" && !self.is_version_key(key) {
                out.fail(format!(
                    "Key \"{key}\" in messages.json is not \"install\" or a version number"
                ));
            }
            let Some(rel) = value.as_str() else {
                out.fail(format!(
                    "Value for key \"{key}\" in messages.json must be a file path string"
                ));
                continue;
            };
            if !self.root.join(rel).is_file() {
                out.fail(format!(
                    "File \"{rel}\" referenced in messages.json for key \"{key}\" does not exist"
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(path, body).expect("write");
    }

    #[test]
    fn absent_messages_is_fine() {
        let dir = tempdir().expect("temp dir");
        let out = construct(dir.path(), None).run();
        assert_eq!(out, CheckOutcome::default());
    }

    #[test]
    fn folder_without_index_warns() {
        let dir = tempdir().expect("temp dir");
        write(dir.path(), "messages/1.0.0.txt", "hello");
        let out = construct(dir.path(), None).run();
        assert!(out.failures.is_empty());
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn valid_index_with_prefixed_versions() {
        let dir = tempdir().expect("temp dir");
        write(
            dir.path(),
            "messages.json",
            r#"{"install": "messages/install.txt", "st3-1.2.0": "messages/1.2.0.txt", "2.0.0": "messages/2.0.0.txt"}"#,
        );
        write(dir.path(), "messages/install.txt", "hi");
        write(dir.path(), "messages/1.2.0.txt", "hi");
        write(dir.path(), "messages/2.0.0.txt", "hi");

        let setting = CheckerSetting::TagPrefixes(vec!["st3-".into()]);
        let out = construct(dir.path(), Some(&setting)).run();
        assert_eq!(out, CheckOutcome::default());
    }

    #[test]
    fn prefixed_key_without_configured_prefix_fails() {
        let dir = tempdir().expect("temp dir");
        write(dir.path(), "messages.json", r#"{"st3-1.2.0": "messages/1.2.0.txt"}"#);
        write(dir.path(), "messages/1.2.0.txt", "hi");
        let out = construct(dir.path(), None).run();
        assert_eq!(out.failures.len(), 1, "{out:?}");
        assert!(out.failures[0].contains("st3-1.2.0"));
    }

    #[test]
    fn missing_files_and_bad_json_fail() {
        let dir = tempdir().expect("temp dir");
        write(dir.path(), "messages.json", r#"{"install": "messages/nope.txt", "1.0.0": 5}"#);
        let out = construct(dir.path(), None).run();
        assert_eq!(out.failures.len(), 2, "{out:?}");

        write(dir.path(), "messages.json", "{ not json");
        let out = construct(dir.path(), None).run();
        assert_eq!(out.failures.len(), 1);
        assert!(out.failures[0].starts_with("Unable to parse messages.json"));

        write(dir.path(), "messages.json", "[]");
        let out = construct(dir.path(), None).run();
        assert_eq!(out.failures, vec!["messages.json must contain a JSON object".to_string()]);
    }
}
