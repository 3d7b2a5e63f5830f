//! Manifest data as it appears in channel and repository JSON files, plus the
//! normalized package record produced by the metadata provider.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const SCHEMA_VERSION: &str = "3.0.0";

/// Placeholder name used when an entry has neither `name` nor `details`.
pub const UNNAMED_PACKAGE: &str = "<unnamed>";

pub const ALL_PLATFORMS: [&str; 3] = ["windows", "osx", "linux"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelManifest {
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryManifest {
    pub schema_version: String,
    #[serde(default)]
    pub packages: Vec<Value>,
    #[serde(default)]
    pub dependencies: Vec<Value>,
}

impl RepositoryManifest {
    /// A one-package repository wrapping `spec`, used to drive the provider.
    pub fn single(spec: &PackageSpec) -> Result<Self, serde_json::Error> {
        Ok(Self {
            schema_version: SCHEMA_VERSION.to_string(),
            packages: vec![serde_json::to_value(spec)?],
            dependencies: vec![],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagSpec {
    Enabled(bool),
    Prefix(String),
}

impl TagSpec {
    pub fn prefix(&self) -> Option<&str> {
        match self {
            Self::Enabled(true) => Some(""),
            Self::Enabled(false) => None,
            Self::Prefix(p) => Some(p.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub platforms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sublime_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ReleaseSource {
    /// True when the platform list names every platform, either one by one or
    /// through the `*` wildcard.
    pub fn lists_all_platforms(&self) -> bool {
        let Some(platforms) = &self.platforms else {
            return false;
        };
        if platforms.len() == 1 && platforms[0] == "*" {
            return true;
        }
        let mut listed: Vec<&str> = platforms.iter().map(String::as_str).collect();
        listed.sort_unstable();
        listed.dedup();
        let mut all: Vec<&str> = ALL_PLATFORMS.to_vec();
        all.sort_unstable();
        listed == all
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    #[serde(default)]
    pub releases: Vec<ReleaseSource>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PackageSpec {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    pub fn package_name(&self) -> Option<String> {
        if let Some(name) = &self.name {
            return Some(name.clone());
        }
        self.details.as_deref().map(url_basename)
    }

    /// String `tags` values, which double as version prefixes.
    pub fn tag_prefixes(&self) -> Vec<String> {
        self.releases
            .iter()
            .filter_map(|r| match &r.tags {
                Some(TagSpec::Prefix(p)) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Name of a raw manifest entry: `name`, else the basename of `details`.
pub fn package_name(entry: &Value) -> String {
    if let Some(name) = entry.get("name").and_then(Value::as_str) {
        return name.to_string();
    }
    entry
        .get("details")
        .and_then(Value::as_str)
        .map(url_basename)
        .unwrap_or_else(|| UNNAMED_PACKAGE.to_string())
}

pub fn url_basename(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

fn one_or_many<'de, D>(de: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match Option::<OneOrMany>::deserialize(de)? {
        None => None,
        Some(OneOrMany::One(s)) => Some(vec![s]),
        Some(OneOrMany::Many(v)) => Some(v),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub url: String,
    pub version: String,
    pub platforms: Vec<String>,
    pub sublime_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub releases: Vec<Release>,
    pub readme: Option<String>,
}

impl PackageRecord {
    pub fn primary_release(&self) -> Option<&Release> {
        self.releases.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn package_name_prefers_name_then_details_basename() {
        assert_eq!(package_name(&json!({"name": "A", "details": "https://x/B"})), "A");
        assert_eq!(
            package_name(&json!({"details": "https://github.com/o/MyPkg"})),
            "MyPkg"
        );
        assert_eq!(package_name(&json!({"releases": []})), UNNAMED_PACKAGE);
    }

    #[test]
    fn platforms_accept_string_or_list() {
        let spec = PackageSpec::from_value(&json!({
            "name": "A",
            "releases": [
                {"platforms": "*", "tags": true},
                {"platforms": ["osx", "linux"], "tags": "st3-"}
            ]
        }))
        .expect("parse spec");
        assert_eq!(spec.releases[0].platforms.as_deref(), Some(&["*".to_string()][..]));
        assert!(spec.releases[0].lists_all_platforms());
        assert!(!spec.releases[1].lists_all_platforms());
        assert_eq!(spec.tag_prefixes(), vec!["st3-".to_string()]);
    }

    #[test]
    fn all_platforms_in_any_order_are_detected() {
        let r = ReleaseSource {
            platforms: Some(vec!["linux".into(), "windows".into(), "osx".into()]),
            ..ReleaseSource::default()
        };
        assert!(r.lists_all_platforms());
        let missing = ReleaseSource {
            platforms: None,
            ..ReleaseSource::default()
        };
        assert!(!missing.lists_all_platforms());
    }

    #[test]
    fn unknown_keys_survive_round_trip_into_synthetic_repository() {
        let spec = PackageSpec::from_value(&json!({
            "name": "A",
            "labels": ["linting"],
            "releases": [{"tags": true, "sublime_text": ">=4000"}]
        }))
        .expect("parse spec");
        let repo = RepositoryManifest::single(&spec).expect("wrap");
        assert_eq!(repo.schema_version, SCHEMA_VERSION);
        assert_eq!(repo.packages[0]["labels"][0], "linting");
        assert_eq!(repo.packages[0]["releases"][0]["tags"], true);
        assert!(repo.dependencies.is_empty());
    }
}
