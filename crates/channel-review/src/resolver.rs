use crate::api::Finding;
use crate::errors::ProviderError;
use crate::manifest::{PackageRecord, PackageSpec, RepositoryManifest};
use crate::transport::{Connector, Transport};
use std::collections::BTreeMap;

/// URL the synthetic single-package repository pretends to live at.
pub const PLACEHOLDER_REPOSITORY_URL: &str = "https://example.com";

/// What a provider learned while enumerating one repository manifest.
#[derive(Debug, Clone, Default)]
pub struct ProviderReport {
    pub packages: Vec<(String, PackageRecord)>,
    /// Source URL -> error message.
    pub failed_sources: BTreeMap<String, String>,
    /// Package name -> error message.
    pub broken_packages: BTreeMap<String, String>,
}

pub trait MetadataProvider {
    fn enumerate(
        &self,
        repository_url: &str,
        manifest: &RepositoryManifest,
        transport: &dyn Transport,
    ) -> Result<ProviderReport, ProviderError>;
}

fn clean_message(message: &str) -> String {
    message.replace(&format!(" in the repository {PLACEHOLDER_REPOSITORY_URL}"), "")
}

/// Normalizes one manifest entry through `provider`. Connections opened for
/// the attempt are closed before this returns, whatever the outcome.
pub fn resolve(
    spec: &PackageSpec,
    provider: &dyn MetadataProvider,
    connector: &dyn Connector,
) -> Result<PackageRecord, Finding> {
    let manifest = RepositoryManifest::single(spec)
        .map_err(|e| Finding::error(format!("Unable to encode package entry: {e}")))?;

    let lease = connector.connect();
    let report = provider
        .enumerate(PLACEHOLDER_REPOSITORY_URL, &manifest, &*lease)
        .map_err(|e| Finding::error(clean_message(&e.to_string())))?;
    drop(lease);

    if let Some((name, record)) = report.packages.into_iter().next() {
        tracing::debug!(package = %name, releases = record.releases.len(), "resolved");
        return Ok(record);
    }
    if let Some((_, message)) = report.failed_sources.into_iter().next() {
        return Err(Finding::error(clean_message(&message)));
    }
    if let Some((_, message)) = report.broken_packages.into_iter().next() {
        return Err(Finding::error(clean_message(&message)));
    }
    Err(Finding::error("No package information was found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlerConfig;
    use crate::transport::ConnectionPool;
    use crate::errors::DownloadError;
    use crate::manifest::Release;
    use std::cell::Cell;

    struct Scripted {
        report: ProviderReport,
        fail: Option<String>,
        calls: Cell<usize>,
    }

    impl Scripted {
        fn ok(report: ProviderReport) -> Self {
            Self {
                report,
                fail: None,
                calls: Cell::new(0),
            }
        }
    }

    impl MetadataProvider for Scripted {
        fn enumerate(
            &self,
            repository_url: &str,
            manifest: &RepositoryManifest,
            _transport: &dyn Transport,
        ) -> Result<ProviderReport, ProviderError> {
            self.calls.set(self.calls.get() + 1);
            assert_eq!(repository_url, PLACEHOLDER_REPOSITORY_URL);
            assert_eq!(manifest.schema_version, "3.0.0");
            assert_eq!(manifest.packages.len(), 1);
            match &self.fail {
                Some(msg) => Err(ProviderError::Unexpected(msg.clone())),
                None => Ok(self.report.clone()),
            }
        }
    }

    fn spec() -> PackageSpec {
        PackageSpec {
            name: Some("Demo".into()),
            ..PackageSpec::default()
        }
    }

    fn record() -> PackageRecord {
        PackageRecord {
            name: "Demo".into(),
            releases: vec![Release {
                url: "https://codeload.github.com/o/Demo/zip/1.0.0".into(),
                version: "1.0.0".into(),
                platforms: vec!["*".into()],
                sublime_text: "*".into(),
            }],
            readme: None,
        }
    }

    #[test]
    fn returns_first_yielded_package() {
        let pool = ConnectionPool::new(CrawlerConfig::default());
        let provider = Scripted::ok(ProviderReport {
            packages: vec![("Demo".into(), record())],
            ..ProviderReport::default()
        });
        let out = resolve(&spec(), &provider, &pool).expect("resolved");
        assert_eq!(out, record());
        assert_eq!(provider.calls.get(), 1);
        assert!(pool.is_idle());
    }

    #[test]
    fn failed_source_message_hides_placeholder_repository() {
        let pool = ConnectionPool::new(CrawlerConfig::default());
        let mut report = ProviderReport::default();
        report.failed_sources.insert(
            "https://api.github.com/repos/o/Demo/tags".into(),
            "HTTP error 404 downloading tags in the repository https://example.com".into(),
        );
        report
            .broken_packages
            .insert("Demo".into(), "broken".into());
        let err = resolve(&spec(), &Scripted::ok(report), &pool).expect_err("failure");
        assert_eq!(err.message, "HTTP error 404 downloading tags");
        assert!(!err.message.contains("example.com"));
        assert!(pool.is_idle());
    }

    #[test]
    fn broken_package_used_when_no_failed_source() {
        let pool = ConnectionPool::new(CrawlerConfig::default());
        let mut report = ProviderReport::default();
        report.broken_packages.insert(
            "Demo".into(),
            "No \"name\" value for one of the packages in the repository https://example.com"
                .into(),
        );
        let err = resolve(&spec(), &Scripted::ok(report), &pool).expect_err("failure");
        assert_eq!(err.message, "No \"name\" value for one of the packages");
    }

    #[test]
    fn provider_error_is_cleaned_and_pool_released() {
        let pool = ConnectionPool::new(CrawlerConfig::default());
        let provider = Scripted {
            report: ProviderReport::default(),
            fail: Some("boom in the repository https://example.com".into()),
            calls: Cell::new(0),
        };
        let err = resolve(&spec(), &provider, &pool).expect_err("failure");
        assert_eq!(err.message, "boom");
        assert!(pool.is_idle());
    }

    #[test]
    fn download_error_type_is_displayable() {
        let e = DownloadError::Status {
            status: 404,
            purpose: "fetching package".into(),
            url: "https://x/y.zip".into(),
        };
        assert_eq!(e.to_string(), "HTTP error 404 fetching package https://x/y.zip");
    }
}
