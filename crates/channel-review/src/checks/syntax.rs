use super::common::{has_extension, package_files};
use super::{CheckOutcome, CheckerId, CheckerSetting, FileChecker};
use std::path::{Path, PathBuf};

/// First build that understands `.sublime-syntax`.
const SUBLIME_SYNTAX_BUILD: u32 = 3092;

/// Highest build admitted by a `sublime_text` selector; `None` means unbounded.
/// Unrecognized selectors are treated as unbounded.
pub(crate) fn selector_max_build(selector: &str) -> Option<u32> {
    let s = selector.trim();
    if s.is_empty() || s == "*" {
        return None;
    }
    if let Some((_, hi)) = s.split_once(" - ") {
        return hi.trim().parse().ok();
    }
    if let Some(rest) = s.strip_prefix("<=") {
        return rest.trim().parse().ok();
    }
    if let Some(rest) = s.strip_prefix('<') {
        return rest.trim().parse::<u32>().ok().map(|b| b.saturating_sub(1));
    }
    if s.starts_with('>') {
        return None;
    }
    s.parse().ok()
}

pub struct SyntaxChecker {
    root: PathBuf,
    selector: String,
}

pub fn construct(root: &Path, setting: Option<&CheckerSetting>) -> Box<dyn FileChecker> {
    let selector = match setting {
        Some(CheckerSetting::Selector(s)) => s.clone(),
        _ => "*".to_string(),
    };
    Box::new(SyntaxChecker {
        root: root.to_path_buf(),
        selector,
    })
}

impl FileChecker for SyntaxChecker {
    fn id(&self) -> CheckerId {
        CheckerId::Syntax
    }

    fn run(&mut self) -> CheckOutcome {
        let mut out = CheckOutcome::default();
        let files = package_files(&self.root);
        let legacy: Vec<&str> = files
            .iter()
            .map(|(rel, _)| rel.as_str())
            .filter(|rel| has_extension(rel, "tmLanguage"))
            .collect();
        if legacy.is_empty() {
            return out;
        }
        let has_modern = files
            .iter()
            .any(|(rel, _)| has_extension(rel, "sublime-syntax"));
        if has_modern {
            return out;
        }
        let targets_modern = selector_max_build(&self.selector)
            .is_none_or(|max| max >= SUBLIME_SYNTAX_BUILD);
        if targets_modern {
            out.warn(format!(
                "Syntax definitions use the legacy .tmLanguage format ({}); consider converting them to .sublime-syntax",
                legacy.join(", ")
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
    fn selector_bounds() {
        assert_eq!(selector_max_build("*"), None);
        assert_eq!(selector_max_build(">=4000"), None);
        assert_eq!(selector_max_build(">3000"), None);
        assert_eq!(selector_max_build("<3000"), Some(2999));
        assert_eq!(selector_max_build("<=3091"), Some(3091));
        assert_eq!(selector_max_build("3000 - 3999"), Some(3999));
        assert_eq!(selector_max_build("3176"), Some(3176));
    }

    fn tree_with_tm_language() -> tempfile::TempDir {
        let dir = tempdir().expect("temp dir");
        std::fs::create_dir_all(dir.path().join("Syntaxes")).expect("mkdir");
        std::fs::write(dir.path().join("Syntaxes/Lang.tmLanguage"), "<plist/>").expect("write");
        dir
    }

    #[test]
    fn tm_language_only_warns_for_modern_builds() {
        let dir = tree_with_tm_language();
        let setting = CheckerSetting::Selector(">=3092".into());
        let out = construct(dir.path(), Some(&setting)).run();
        assert!(out.failures.is_empty());
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("Syntaxes/Lang.tmLanguage"));
    }

    #[test]
    fn legacy_builds_are_exempt() {
        let dir = tree_with_tm_language();
        let setting = CheckerSetting::Selector("<3000".into());
        let out = construct(dir.path(), Some(&setting)).run();
        assert_eq!(out, CheckOutcome::default());
    }

    #[test]
    fn sublime_syntax_alongside_is_fine() {
        let dir = tree_with_tm_language();
        std::fs::write(dir.path().join("Syntaxes/Lang.sublime-syntax"), "%YAML 1.2").expect("write");
        let out = construct(dir.path(), None).run();
        assert_eq!(out, CheckOutcome::default());
    }
}
