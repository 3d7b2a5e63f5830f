//! Content checkers that run over an extracted package tree.

use std::collections::BTreeMap;
use std::path::Path;

pub mod cache_files;
pub mod common;
pub mod messages;
pub mod plugin_location;
pub mod resource_files;
pub mod syntax;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckerId {
    ResourceFiles,
    Messages,
    Syntax,
    CacheFiles,
    PluginLocation,
}

impl CheckerId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResourceFiles => "resource_files",
            Self::Messages => "messages",
            Self::Syntax => "syntax",
            Self::CacheFiles => "cache_files",
            Self::PluginLocation => "plugin_location",
        }
    }
}

/// Extra configuration a checker accepts at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckerSetting {
    TagPrefixes(Vec<String>),
    Selector(String),
}

#[derive(Debug, Clone, Default)]
pub struct CheckerConfigs {
    settings: BTreeMap<CheckerId, CheckerSetting>,
}

impl CheckerConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: CheckerId, setting: CheckerSetting) -> Self {
        self.settings.insert(id, setting);
        self
    }

    pub fn get(&self, id: CheckerId) -> Option<&CheckerSetting> {
        self.settings.get(&id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOutcome {
    pub failures: Vec<String>,
    pub warnings: Vec<String>,
}

impl CheckOutcome {
    pub fn fail(&mut self, message: impl Into<String>) {
        self.failures.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

pub trait FileChecker {
    fn id(&self) -> CheckerId;
    fn run(&mut self) -> CheckOutcome;
}

pub type CheckerCtor = fn(&Path, Option<&CheckerSetting>) -> Box<dyn FileChecker>;

#[derive(Clone)]
pub struct CheckerRegistry {
    entries: Vec<(CheckerId, CheckerCtor)>,
}

impl Default for CheckerRegistry {
    fn default() -> Self {
        Self {
            entries: vec![
                (CheckerId::ResourceFiles, resource_files::construct as CheckerCtor),
                (CheckerId::Messages, messages::construct as CheckerCtor),
                (CheckerId::Syntax, syntax::construct as CheckerCtor),
                (CheckerId::CacheFiles, cache_files::construct as CheckerCtor),
                (CheckerId::PluginLocation, plugin_location::construct as CheckerCtor),
            ],
        }
    }
}

impl CheckerRegistry {
    pub fn empty() -> Self {
        Self { entries: vec![] }
    }

    pub fn register(&mut self, id: CheckerId, ctor: CheckerCtor) {
        self.entries.push((id, ctor));
    }

    pub fn ids(&self) -> Vec<CheckerId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    /// Builds every registered checker against `root`, handing each the
    /// setting stored under its id.
    pub fn instantiate(&self, root: &Path, configs: &CheckerConfigs) -> Vec<Box<dyn FileChecker>> {
        self.entries
            .iter()
            .map(|(id, ctor)| ctor(root, configs.get(*id)))
            .collect()
    }
}
