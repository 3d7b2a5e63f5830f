//! Metadata provider for schema 3.0.0 repositories.
//!
//! Explicit `url` releases are taken as-is. `tags` and `branch` releases are
//! resolved against GitHub: tags through the REST API (highest semantic
//! version wins), downloads through codeload zipballs.

use crate::errors::{DownloadError, ProviderError};
use crate::manifest::{
    PackageRecord, PackageSpec, Release, ReleaseSource, RepositoryManifest, SCHEMA_VERSION,
    UNNAMED_PACKAGE,
};
use crate::resolver::{MetadataProvider, ProviderReport};
use crate::transport::Transport;
use regex::Regex;
use serde::Deserialize;
use std::cmp::Ordering;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct ChannelProvider {
    api_base: String,
}

impl ChannelProvider {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct GithubRepo {
    owner: String,
    repo: String,
}

fn github_repo_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://github\.com/([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?/?(?:/tree/.*)?$")
            .expect("valid github url regex")
    })
}

fn parse_github_repo(url: &str) -> Option<GithubRepo> {
    let caps = github_repo_regex().captures(url)?;
    Some(GithubRepo {
        owner: caps[1].to_string(),
        repo: caps[2].to_string(),
    })
}

fn semver_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^v?(\d+)\.(\d+)\.(\d+)(?:-([0-9A-Za-z.-]+))?(?:\+[0-9A-Za-z.-]+)?$")
            .expect("valid semver regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SemVer {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Option<String>,
}

impl SemVer {
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        let caps = semver_regex().captures(raw)?;
        Some(Self {
            major: caps[1].parse().ok()?,
            minor: caps[2].parse().ok()?,
            patch: caps[3].parse().ok()?,
            pre: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Deserialize)]
struct GithubTag {
    name: String,
}

/// Picks the highest tag whose remainder after `prefix` is a semantic version.
pub(crate) fn select_release_tag(tags: &[String], prefix: &str) -> Option<(String, String)> {
    tags.iter()
        .filter_map(|tag| {
            let rest = tag.strip_prefix(prefix)?;
            let parsed = SemVer::parse(rest)?;
            Some((parsed, tag.clone(), rest.trim_start_matches('v').to_string()))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, tag, version)| (tag, version))
}

enum PackageError {
    Broken(String),
    Source { url: String, message: String },
}

impl ChannelProvider {
    fn tags_url(&self, gh: &GithubRepo) -> String {
        format!(
            "{}/repos/{}/{}/tags?per_page=100",
            self.api_base, gh.owner, gh.repo
        )
    }

    fn readme_url(&self, gh: &GithubRepo) -> String {
        format!("{}/repos/{}/{}/readme", self.api_base, gh.owner, gh.repo)
    }

    fn list_tags(
        &self,
        gh: &GithubRepo,
        transport: &dyn Transport,
    ) -> Result<Vec<String>, PackageError> {
        let url = self.tags_url(gh);
        let raw = transport
            .fetch(&url, "downloading tags")
            .map_err(|e| PackageError::Source {
                url: url.clone(),
                message: e.to_string(),
            })?;
        let tags: Vec<GithubTag> =
            serde_json::from_slice(&raw).map_err(|e| PackageError::Source {
                url: url.clone(),
                message: format!("Error parsing JSON from {url}: {e}"),
            })?;
        Ok(tags.into_iter().map(|t| t.name).collect())
    }

    fn resolve_source(
        &self,
        name: &str,
        index: usize,
        spec: &PackageSpec,
        source: &ReleaseSource,
        repository_url: &str,
        transport: &dyn Transport,
    ) -> Result<Option<Release>, PackageError> {
        let platforms = source
            .platforms
            .clone()
            .unwrap_or_else(|| vec!["*".to_string()]);
        let sublime_text = source.sublime_text.clone().unwrap_or_else(|| "*".to_string());

        if let Some(url) = &source.url {
            let version = source.version.clone().ok_or_else(|| {
                PackageError::Broken(format!(
                    "Missing \"version\" key for release {index} of package \"{name}\" in the repository {repository_url}"
                ))
            })?;
            return Ok(Some(Release {
                url: url.clone(),
                version,
                platforms,
                sublime_text,
            }));
        }

        let base = source.base.as_deref().or(spec.details.as_deref()).ok_or_else(|| {
            PackageError::Broken(format!(
                "No \"base\" or \"details\" value for release {index} of package \"{name}\" in the repository {repository_url}"
            ))
        })?;
        let gh = parse_github_repo(base).ok_or_else(|| {
            PackageError::Broken(format!(
                "Invalid or unsupported \"base\" URL {base} for package \"{name}\" in the repository {repository_url}"
            ))
        })?;

        if let Some(prefix) = source.tags.as_ref().and_then(|t| t.prefix()) {
            let tags = self.list_tags(&gh, transport)?;
            let Some((tag, version)) = select_release_tag(&tags, prefix) else {
                tracing::debug!(package = name, prefix, "no semver tags found");
                return Ok(None);
            };
            return Ok(Some(Release {
                url: format!(
                    "https://codeload.github.com/{}/{}/zip/{}",
                    gh.owner, gh.repo, tag
                ),
                version,
                platforms,
                sublime_text,
            }));
        }

        if let Some(branch) = &source.branch {
            return Ok(Some(Release {
                url: format!(
                    "https://codeload.github.com/{}/{}/zip/{}",
                    gh.owner, gh.repo, branch
                ),
                version: branch.clone(),
                platforms,
                sublime_text,
            }));
        }

        Err(PackageError::Broken(format!(
            "Release {index} of package \"{name}\" needs one of \"url\", \"tags\" or \"branch\" in the repository {repository_url}"
        )))
    }

    /// Only a 404 means "no readme"; any other failure fails the source so the
    /// package is not reported as missing one.
    fn probe_readme(
        &self,
        spec: &PackageSpec,
        transport: &dyn Transport,
    ) -> Result<Option<String>, PackageError> {
        if let Some(readme) = &spec.readme {
            return Ok(Some(readme.clone()));
        }
        let Some(gh) = spec.details.as_deref().and_then(parse_github_repo) else {
            return Ok(None);
        };
        let url = self.readme_url(&gh);
        match transport.fetch(&url, "checking for readme") {
            Ok(_) => Ok(Some(url)),
            Err(DownloadError::Status { status: 404, .. }) => Ok(None),
            Err(e) => {
                tracing::debug!(error = %e, "readme probe failed");
                Err(PackageError::Source {
                    url,
                    message: e.to_string(),
                })
            }
        }
    }

    fn package(
        &self,
        spec: &PackageSpec,
        repository_url: &str,
        transport: &dyn Transport,
    ) -> Result<(String, PackageRecord), PackageError> {
        let name = spec.package_name().ok_or_else(|| {
            PackageError::Broken(format!(
                "No \"name\" value for one of the packages in the repository {repository_url}"
            ))
        })?;

        let mut releases = vec![];
        for (index, source) in spec.releases.iter().enumerate() {
            if let Some(release) =
                self.resolve_source(&name, index, spec, source, repository_url, transport)?
            {
                releases.push(release);
            }
        }

        let readme = self.probe_readme(spec, transport)?;
        Ok((
            name.clone(),
            PackageRecord {
                name,
                releases,
                readme,
            },
        ))
    }
}

impl MetadataProvider for ChannelProvider {
    fn enumerate(
        &self,
        repository_url: &str,
        manifest: &RepositoryManifest,
        transport: &dyn Transport,
    ) -> Result<ProviderReport, ProviderError> {
        let mut report = ProviderReport::default();
        if manifest.schema_version != SCHEMA_VERSION {
            report.failed_sources.insert(
                repository_url.to_string(),
                format!(
                    "Repository {repository_url} uses unsupported schema_version {:?}",
                    manifest.schema_version
                ),
            );
            return Ok(report);
        }

        for entry in &manifest.packages {
            let spec = match PackageSpec::from_value(entry) {
                Ok(spec) => spec,
                Err(e) => {
                    report.broken_packages.insert(
                        UNNAMED_PACKAGE.to_string(),
                        format!("Invalid package entry in the repository {repository_url}: {e}"),
                    );
                    continue;
                }
            };
            match self.package(&spec, repository_url, transport) {
                Ok(pair) => report.packages.push(pair),
                Err(PackageError::Broken(message)) => {
                    let key = spec
                        .package_name()
                        .unwrap_or_else(|| UNNAMED_PACKAGE.to_string());
                    report.broken_packages.insert(key, message);
                }
                Err(PackageError::Source { url, message }) => {
                    report.failed_sources.insert(url, message);
                }
            }
        }
        Ok(report)
    }
}
