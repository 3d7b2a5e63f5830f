//! Works out which packages and repositories a pull request touches by
//! comparing manifest files between two revisions.

use crate::errors::{DiffError, VcsError};
use crate::manifest::{ChannelManifest, SCHEMA_VERSION, package_name};
use crate::transport::{Connector, Transport};
use crate::vcs::VersionControl;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

pub const CHANNEL_FILE: &str = "channel.json";
pub const REPOSITORY_FILE: &str = "repository.json";

fn shard_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^repository/(\w|0-9)\.json$").expect("valid shard regex"))
}

pub fn is_manifest_file(path: &str) -> bool {
    path == CHANNEL_FILE || path == REPOSITORY_FILE || shard_regex().is_match(path)
}

/// Outcome of fetching one repository newly added to the channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryScan {
    pub url: String,
    pub errors: Vec<String>,
    /// Set once the manifest was parsed and accepted.
    pub package_count: Option<usize>,
}

impl RepositoryScan {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffSet {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub added_repositories: BTreeSet<String>,
    pub removed_repositories: BTreeSet<String>,
    /// Full manifest entry for every added package.
    pub added_specs: BTreeMap<String, Value>,
    /// `details` URL for added packages that declare one.
    pub links: BTreeMap<String, String>,
    pub repository_scans: Vec<RepositoryScan>,
}

impl DiffSet {
    fn add(&mut self, name: String, spec: &Value, with_link: bool) {
        if with_link && let Some(details) = spec.get("details").and_then(Value::as_str) {
            self.links.insert(name.clone(), details.to_string());
        }
        self.added_specs.insert(name.clone(), spec.clone());
        self.added.insert(name);
    }

    /// Keeps the three name sets disjoint. A name both added and removed was
    /// moved or rewritten, so it counts as modified.
    fn settle(&mut self) {
        let moved: Vec<String> = self.added.intersection(&self.removed).cloned().collect();
        self.modified.extend(moved);
        for name in &self.modified {
            self.added.remove(name);
            self.removed.remove(name);
            self.added_specs.remove(name);
            self.links.remove(name);
        }
    }
}

/// Distinct entries of `list` missing from `other`, keyed by canonical JSON,
/// mapped to the index of their first occurrence.
fn unmatched(list: &[Value], other: &[Value]) -> Vec<usize> {
    let other: BTreeSet<String> = other.iter().map(Value::to_string).collect();
    let mut seen = BTreeMap::new();
    for (i, entry) in list.iter().enumerate() {
        let key = entry.to_string();
        if !other.contains(&key) {
            seen.entry(key).or_insert(i);
        }
    }
    let mut idx: Vec<usize> = seen.into_values().collect();
    idx.sort_unstable();
    idx
}

fn diff_packages(old: &[Value], new: &[Value], out: &mut DiffSet) {
    let deleted = unmatched(old, new);
    let added = unmatched(new, old);

    if deleted.len() == added.len() {
        for i in added {
            out.modified.insert(package_name(&new[i]));
        }
    } else if deleted.is_empty() {
        for i in added {
            out.add(package_name(&new[i]), &new[i], true);
        }
    } else if added.is_empty() {
        for i in deleted {
            out.removed.insert(package_name(&old[i]));
        }
    } else {
        let deleted_names: BTreeSet<String> = deleted.iter().map(|&i| package_name(&old[i])).collect();
        let added_names: BTreeSet<String> = added.iter().map(|&i| package_name(&new[i])).collect();
        for i in added {
            let name = package_name(&new[i]);
            if deleted_names.contains(&name) {
                out.modified.insert(name);
            } else {
                out.add(name, &new[i], true);
            }
        }
        for name in deleted_names.difference(&added_names) {
            out.removed.insert(name.clone());
        }
    }
}

fn package_list<'a>(doc: &'a Value, rev: &str, path: &str) -> Result<&'a [Value], DiffError> {
    doc.get("packages")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| DiffError::InvalidManifest {
            rev: rev.to_string(),
            path: path.to_string(),
            message: "expected a \"packages\" array".to_string(),
        })
}

fn load_revision(vcs: &dyn VersionControl, rev: &str, path: &str) -> Result<Value, DiffError> {
    let raw = vcs.show(rev, path).map_err(|e| DiffError::ShowFailed {
        rev: rev.to_string(),
        path: path.to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_slice(&raw).map_err(|e| DiffError::InvalidManifest {
        rev: rev.to_string(),
        path: path.to_string(),
        message: e.to_string(),
    })
}

fn channel_repositories(doc: Value, rev: &str) -> Result<BTreeSet<String>, DiffError> {
    let channel: ChannelManifest =
        serde_json::from_value(doc).map_err(|e| DiffError::InvalidManifest {
            rev: rev.to_string(),
            path: CHANNEL_FILE.to_string(),
            message: e.to_string(),
        })?;
    Ok(channel.repositories.into_iter().collect())
}

/// Fetches and vets an external repository manifest. Problems are recorded on
/// the scan; only a manifest that passes every check yields packages.
pub fn scan_repository(url: &str, transport: &dyn Transport) -> (RepositoryScan, Vec<(String, Value)>) {
    let mut scan = RepositoryScan::new(url);
    if url.starts_with("http://") {
        scan.errors.push(
            "External repositories added to the default channel must be served over HTTPS"
                .to_string(),
        );
    }

    let raw = match transport.fetch(url, "fetching repository") {
        Ok(raw) => raw,
        Err(e) => {
            scan.errors.push(e.to_string());
            return (scan, vec![]);
        }
    };
    let Ok(text) = String::from_utf8(raw) else {
        scan.errors.push("Unable to decode JSON as UTF-8".to_string());
        return (scan, vec![]);
    };
    let Ok(doc) = serde_json::from_str::<Value>(&text) else {
        scan.errors.push("Unable to parse JSON".to_string());
        return (scan, vec![]);
    };

    let mut missing = false;
    for key in ["schema_version", "packages"] {
        if doc.get(key).is_none() {
            missing = true;
            scan.errors.push(format!("Top-level key \"{key}\" is missing"));
        }
    }
    if missing {
        return (scan, vec![]);
    }
    if doc.get("schema_version").and_then(Value::as_str) != Some(SCHEMA_VERSION) {
        scan.errors
            .push(format!("\"schema_version\" must be \"{SCHEMA_VERSION}\""));
        return (scan, vec![]);
    }
    let Some(entries) = doc.get("packages").and_then(Value::as_array) else {
        scan.errors
            .push("Top-level key \"packages\" must be a list".to_string());
        return (scan, vec![]);
    };

    let packages: Vec<(String, Value)> = entries
        .iter()
        .map(|entry| (package_name(entry), entry.clone()))
        .collect();
    scan.package_count = Some(packages.len());
    (scan, packages)
}

/// Compares every manifest file changed between `old` and `new`, then pulls
/// in the packages of repositories newly listed in the channel.
pub fn diff(
    vcs: &dyn VersionControl,
    connector: &dyn Connector,
    old: &str,
    new: &str,
) -> Result<DiffSet, DiffError> {
    let changed = vcs.changed_files(old, new).map_err(|e| match e {
        VcsError::MalformedDiff { .. } => DiffError::Malformed(e),
        other => {
            tracing::warn!(error = %other, "git diff failed");
            DiffError::DiffUnavailable {
                old: old.to_string(),
                new: new.to_string(),
            }
        }
    })?;

    let mut manifests = vec![];
    for file in changed {
        if !file.path.ends_with(".json") || !is_manifest_file(&file.path) {
            continue;
        }
        if file.status != "M" {
            return Err(DiffError::UnsupportedFileChange {
                status: file.status,
                path: file.path,
            });
        }
        manifests.push(file.path);
    }

    let mut out = DiffSet::default();
    for path in &manifests {
        let before = load_revision(vcs, old, path)?;
        let after = load_revision(vcs, new, path)?;
        if path == CHANNEL_FILE {
            let before = channel_repositories(before, old)?;
            let after = channel_repositories(after, new)?;
            out.removed_repositories = before.difference(&after).cloned().collect();
            out.added_repositories = after.difference(&before).cloned().collect();
        } else {
            diff_packages(
                package_list(&before, old, path)?,
                package_list(&after, new, path)?,
                &mut out,
            );
        }
    }

    let urls: Vec<String> = out.added_repositories.iter().cloned().collect();
    for url in urls {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            continue;
        }
        let transport = connector.connect();
        let (scan, packages) = scan_repository(&url, &*transport);
        drop(transport);
        tracing::info!(
            repository = %url,
            errors = scan.errors.len(),
            packages = packages.len(),
            "scanned repository"
        );
        for (name, spec) in packages {
            out.add(name, &spec, false);
        }
        out.repository_scans.push(scan);
    }

    out.settle();
    tracing::info!(
        files = manifests.len(),
        added = out.added.len(),
        removed = out.removed.len(),
        modified = out.modified.len(),
        repositories_added = out.added_repositories.len(),
        repositories_removed = out.removed_repositories.len(),
        "diff summary"
    );
    Ok(out)
}
