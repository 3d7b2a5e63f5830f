use crate::api::Finding;
use crate::config::ExtractConfig;
use crate::hash::sha256_hex;
use crate::manifest::PackageRecord;
use crate::transport::Transport;
use std::collections::BTreeSet;
use std::fs;
use std::io::{Read, Seek};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use zip::ZipArchive;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// An unpacked package. The staging directory (archive and tree) is removed
/// when this value is dropped.
#[derive(Debug)]
pub struct ExtractedTree {
    _staging: TempDir,
    root: PathBuf,
    files: usize,
}

impl ExtractedTree {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_count(&self) -> usize {
        self.files
    }
}

fn traversal_finding(path: &str) -> Finding {
    Finding::error(format!(
        "The path \"{path}\" appears to be attempting to access other parts of the filesystem"
    ))
}

pub fn ensure_plain_name(name: &str) -> Result<(), Finding> {
    if matches!(name, "" | "." | "..") || name.contains('/') || name.contains('\\') {
        return Err(Finding::error("Invalid package name"));
    }
    Ok(())
}

pub fn primary_secure_url(record: &PackageRecord) -> Result<&str, Finding> {
    match record.primary_release() {
        Some(release) if release.url.starts_with("https://") => Ok(release.url.as_str()),
        _ => Err(Finding::error(
            "Primary release URL does not begin with https://",
        )),
    }
}

fn is_traversal(path: &str) -> bool {
    path.starts_with('/') || path.split('/').any(|seg| seg == "..")
}

/// `Some("dir/")` when every entry sits under one shared top-level directory.
pub(crate) fn single_root(names: &[String]) -> Option<String> {
    let mut roots: BTreeSet<(&str, bool)> = BTreeSet::new();
    for name in names {
        match name.split_once('/') {
            Some((first, _)) => roots.insert((first, true)),
            None => roots.insert((name.as_str(), false)),
        };
    }
    match roots.into_iter().collect::<Vec<_>>().as_slice() {
        [(first, true)] if !first.is_empty() => Some(format!("{first}/")),
        _ => None,
    }
}

/// Joins `rel` onto `root` without touching the filesystem; `None` when a
/// component would climb above `root` or re-anchor the path.
fn contained_join(root: &Path, rel: &str) -> Option<PathBuf> {
    let mut out = root.to_path_buf();
    let mut depth = 0usize;
    for c in Path::new(rel).components() {
        match c {
            Component::Normal(seg) => {
                out.push(seg);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                out.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    out.starts_with(root).then_some(out)
}

fn io_finding(action: &str, path: &Path, e: impl std::fmt::Display) -> Finding {
    Finding::error(format!("Unable to {action} {}: {e}", path.display()))
}

/// Unpacks a zip archive into `dest`, which must already exist. Fails closed:
/// the first unsafe or oversized entry aborts the whole extraction.
pub fn unpack_archive<R: Read + Seek>(
    reader: R,
    dest: &Path,
    limits: &ExtractConfig,
) -> Result<usize, Finding> {
    let root = fs::canonicalize(dest).map_err(|e| io_finding("resolve", dest, e))?;
    let mut zip = ZipArchive::new(reader)
        .map_err(|e| Finding::error(format!("Unable to open package archive: {e}")))?;

    if zip.len() > limits.max_entries {
        return Err(Finding::error(format!(
            "Package archive contains {} entries, more than the limit of {}",
            zip.len(),
            limits.max_entries
        )));
    }

    let mut names: Vec<String> = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let entry = zip
            .by_index(i)
            .map_err(|e| Finding::error(format!("Unable to read package archive entry: {e}")))?;
        let name = entry.name().replace('\\', "/");
        if is_traversal(&name) {
            return Err(traversal_finding(&name));
        }
        names.push(name);
    }

    let prefix = single_root(&names);
    let mut files = 0usize;
    let mut total_bytes: u64 = 0;

    for (i, name) in names.iter().enumerate() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| Finding::error(format!("Unable to read package archive entry: {e}")))?;

        if entry.unix_mode().is_some_and(|m| m & S_IFMT == S_IFLNK) {
            return Err(Finding::error(format!(
                "The path \"{name}\" is a symbolic link, which is not supported in packages"
            )));
        }

        let rel = match &prefix {
            Some(p) => name.strip_prefix(p.as_str()).unwrap_or(name.as_str()),
            None => name.as_str(),
        };
        if rel.is_empty() {
            continue;
        }
        let Some(target) = contained_join(&root, rel) else {
            return Err(traversal_finding(name));
        };

        if name.ends_with('/') {
            fs::create_dir_all(&target).map_err(|e| io_finding("create directory", &target, e))?;
            continue;
        }

        if entry.size() > limits.max_file_bytes {
            return Err(Finding::error(format!(
                "The file \"{name}\" is larger than the limit of {} bytes",
                limits.max_file_bytes
            )));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| io_finding("create directory", parent, e))?;
        }
        let mut out = fs::File::create(&target).map_err(|e| io_finding("write", &target, e))?;
        // Declared sizes can lie; cap what is actually inflated.
        let written = std::io::copy(
            &mut (&mut entry).take(limits.max_file_bytes.saturating_add(1)),
            &mut out,
        )
        .map_err(|e| io_finding("write", &target, e))?;
        if written > limits.max_file_bytes {
            return Err(Finding::error(format!(
                "The file \"{name}\" is larger than the limit of {} bytes",
                limits.max_file_bytes
            )));
        }
        total_bytes = total_bytes.saturating_add(written);
        if total_bytes > limits.max_total_bytes {
            return Err(Finding::error(format!(
                "Package archive expands to more than {} bytes",
                limits.max_total_bytes
            )));
        }
        files += 1;
    }

    tracing::debug!(
        entries = names.len(),
        files,
        rooted = prefix.is_some(),
        "unpacked archive"
    );
    Ok(files)
}

/// Downloads the primary release of `record` and unpacks it into a fresh
/// staging directory.
pub fn extract(
    record: &PackageRecord,
    transport: &dyn Transport,
    limits: &ExtractConfig,
) -> Result<ExtractedTree, Finding> {
    ensure_plain_name(&record.name)?;
    let url = primary_secure_url(record)?;

    let staging = tempfile::Builder::new()
        .prefix("channel-review-")
        .tempdir()
        .map_err(|e| Finding::error(format!("Could not create temp dir: {e}")))?;
    let root = staging.path().join(&record.name);
    fs::create_dir(&root).map_err(|e| io_finding("create directory", &root, e))?;

    let bytes = transport
        .fetch(url, "fetching package")
        .map_err(|e| Finding::error(e.to_string()))?;
    tracing::info!(
        package = %record.name,
        url,
        bytes = bytes.len(),
        sha256 = %sha256_hex(&bytes),
        "downloaded package archive"
    );

    let archive_path = staging
        .path()
        .join(format!("{}.sublime-package", record.name));
    fs::write(&archive_path, &bytes).map_err(|e| io_finding("write", &archive_path, e))?;
    let archive =
        fs::File::open(&archive_path).map_err(|e| io_finding("open", &archive_path, e))?;

    let files = unpack_archive(archive, &root, limits)?;
    Ok(ExtractedTree {
        _staging: staging,
        root,
        files,
    })
}
