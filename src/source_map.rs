use crate::error::{Result, RotelError};
use crate::model::RotelModelMeta;
use std::collections::BTreeMap;

/// User aliases keyed by standard source name. `None` (or the string
/// `"none"`) hides a source from the selectable list.
pub type SourceAliases = BTreeMap<String, Option<String>>;

/// A source as exposed to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Front-panel name of the source
    pub standard_name: &'static str,

    /// Command that selects it
    pub command_code: &'static str,

    /// Whether it shows up in the source list
    pub selectable: bool,
}

/// Mapping from user-facing source names to select commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMap {
    entries: BTreeMap<String, SourceEntry>,
}

fn is_hidden(alias: &Option<String>) -> bool {
    match alias {
        None => true,
        Some(alias) => alias.eq_ignore_ascii_case("none"),
    }
}

impl SourceMap {
    /// Merge the model's standard sources with user aliases.
    ///
    /// Each standard source appears exactly once: under its alias when one is
    /// given, otherwise under its standard name. Aliases for sources the
    /// model does not have, and names used twice, are rejected.
    ///
    /// A hidden source keeps its standard name, so that name cannot be used
    /// as an alias for another source: `{"TUNER": null, "VIDEO 1": "TUNER"}`
    /// is rejected.
    pub fn new(meta: &RotelModelMeta, aliases: Option<&SourceAliases>) -> Result<Self> {
        let empty = SourceAliases::new();
        let aliases = aliases.unwrap_or(&empty);

        if let Some(unknown) = aliases.keys().find(|name| meta.source(name).is_none()) {
            return Err(RotelError::InvalidConfig(format!(
                "{} is not a source of model {}",
                unknown, meta.model_id
            )));
        }

        let mut entries = BTreeMap::new();
        for source in meta.sources {
            let (key, selectable) = match aliases.get(source.standard_name) {
                Some(alias) if is_hidden(alias) => (source.standard_name.to_string(), false),
                Some(Some(alias)) => (alias.clone(), true),
                _ => (source.standard_name.to_string(), true),
            };
            let entry = SourceEntry {
                standard_name: source.standard_name,
                command_code: source.command_code,
                selectable,
            };
            if entries.insert(key.clone(), entry).is_some() {
                return Err(RotelError::InvalidConfig(format!(
                    "source name {:?} is used more than once",
                    key
                )));
            }
        }

        tracing::debug!(sources = ?entries.keys().collect::<Vec<_>>(), "Sources to select");
        Ok(Self { entries })
    }

    /// Total number of sources, hidden ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SourceEntry> {
        self.entries.get(name)
    }

    /// Select command for a user-selectable source
    pub fn command_for(&self, name: &str) -> Option<&'static str> {
        self.entries
            .get(name)
            .filter(|entry| entry.selectable)
            .map(|entry| entry.command_code)
    }

    /// Selectable source names, sorted
    pub fn source_list(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.selectable)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }
}
