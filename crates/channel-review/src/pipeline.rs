//! Single-package validation: resolve, apply the structural rules, unpack the
//! primary release and run every registered checker over it.

use crate::api::{Finding, RunResult, ValidationResult};
use crate::checks::{CheckerConfigs, CheckerId, CheckerRegistry, CheckerSetting};
use crate::config::ExtractConfig;
use crate::extract::{ensure_plain_name, extract, primary_secure_url};
use crate::manifest::{PackageRecord, PackageSpec};
use crate::resolver::{MetadataProvider, resolve};
use crate::transport::Connector;
use serde_json::Value;
use std::path::Path;

pub const MSG_NAME_CONTAINS_SUBLIME: &str = "Package name contains the word \"sublime\"";
pub const MSG_NO_RELEASES_FOUND: &str =
    "No releases found; check to ensure you have created a valid semver tag";
pub const MSG_NO_RELEASES_SPECIFIED: &str = "No releases specified";
pub const MSG_BRANCH_RELEASE: &str =
    "Branch-based releases are not supported for new packages; please use \"tags\": true";
pub const MSG_ALL_PLATFORMS: &str =
    "The \"platforms\" key may be omitted instead of specifying all platform";
pub const MSG_MISSING_README: &str =
    "Creating a readme for your package will help users understand what it does and how to use it";

/// Structural rules that need only the manifest entry and its resolved record.
pub fn validate(spec: &PackageSpec, record: &PackageRecord) -> ValidationResult {
    let mut out = ValidationResult::new();

    if record.name.to_lowercase().contains("sublime") {
        out.error(MSG_NAME_CONTAINS_SUBLIME);
    }

    if record.releases.is_empty() {
        if spec.releases.is_empty() {
            out.error(MSG_NO_RELEASES_SPECIFIED);
        } else {
            out.error(MSG_NO_RELEASES_FOUND);
        }
    } else {
        for source in &spec.releases {
            if source.branch.is_some() {
                out.error(MSG_BRANCH_RELEASE);
            }
            if source.lists_all_platforms() {
                out.warning(MSG_ALL_PLATFORMS);
            }
        }
    }

    if record.readme.is_none() {
        out.warning(MSG_MISSING_README);
    }
    out
}

/// Per-checker settings derived from the package being tested.
pub fn checker_configs(spec: &PackageSpec, record: &PackageRecord) -> CheckerConfigs {
    let mut configs =
        CheckerConfigs::new().with(CheckerId::Messages, CheckerSetting::TagPrefixes(spec.tag_prefixes()));
    if let Some(release) = record.primary_release() {
        configs = configs.with(
            CheckerId::Syntax,
            CheckerSetting::Selector(release.sublime_text.clone()),
        );
    }
    configs
}

pub fn run_checkers(
    registry: &CheckerRegistry,
    root: &Path,
    configs: &CheckerConfigs,
    out: &mut ValidationResult,
) {
    for mut checker in registry.instantiate(root, configs) {
        let outcome = checker.run();
        tracing::debug!(
            checker = checker.id().as_str(),
            failures = outcome.failures.len(),
            warnings = outcome.warnings.len(),
            "checker finished"
        );
        for failure in outcome.failures {
            out.error(failure);
        }
        for warning in outcome.warnings {
            out.warning(warning);
        }
    }
}

pub struct PackageTester<'a> {
    provider: &'a dyn MetadataProvider,
    connector: &'a dyn Connector,
    registry: CheckerRegistry,
    limits: ExtractConfig,
}

impl<'a> PackageTester<'a> {
    pub fn new(
        provider: &'a dyn MetadataProvider,
        connector: &'a dyn Connector,
        limits: ExtractConfig,
    ) -> Self {
        Self {
            provider,
            connector,
            registry: CheckerRegistry::default(),
            limits,
        }
    }

    pub fn with_registry(mut self, registry: CheckerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn run_tests(&self, entry: &Value) -> RunResult {
        self.evaluate(entry).into_run_result()
    }

    pub fn evaluate(&self, entry: &Value) -> ValidationResult {
        let spec = match PackageSpec::from_value(entry) {
            Ok(spec) => spec,
            Err(e) => {
                return ValidationResult::failed(Finding::error(format!(
                    "Invalid package entry: {e}"
                )));
            }
        };
        let record = match resolve(&spec, self.provider, self.connector) {
            Ok(record) => record,
            Err(finding) => return ValidationResult::failed(finding),
        };
        if let Err(finding) = ensure_plain_name(&record.name) {
            return ValidationResult::failed(finding);
        }

        let _span = tracing::info_span!("package", name = %record.name).entered();
        let mut out = validate(&spec, &record);
        if record.releases.is_empty() {
            return out;
        }
        if let Err(finding) = primary_secure_url(&record) {
            return ValidationResult::failed(finding);
        }

        let transport = self.connector.connect();
        let extracted = extract(&record, &*transport, &self.limits);
        drop(transport);
        let tree = match extracted {
            Ok(tree) => tree,
            Err(finding) => {
                tracing::warn!(error = %finding.message, "extraction failed");
                out.push(finding);
                return out;
            }
        };

        let configs = checker_configs(&spec, &record);
        run_checkers(&self.registry, tree.root(), &configs, &mut out);
        tracing::info!(
            errors = out.errors.len(),
            warnings = out.warnings.len(),
            "package tested"
        );
        out
    }
}
