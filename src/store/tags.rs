//! Per-marketplace affiliate tag mapping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Marketplace id to affiliate tag.
///
/// Blank tags are treated as absent everywhere; [`TagMapping::normalized`]
/// drops them so what gets persisted only holds real tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagMapping(BTreeMap<String, String>);

impl TagMapping {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the trimmed tag for a marketplace, or `None` if absent or blank.
    pub fn tag_for(&self, marketplace_id: &str) -> Option<&str> {
        self.0.get(marketplace_id).map(|t| t.trim()).filter(|t| !t.is_empty())
    }

    /// Sets a tag; a blank value clears it.
    pub fn set(&mut self, marketplace_id: impl Into<String>, tag: impl AsRef<str>) {
        let id = marketplace_id.into();
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            self.0.remove(&id);
        } else {
            self.0.insert(id, tag.to_string());
        }
    }

    /// Removes a tag.
    pub fn clear(&mut self, marketplace_id: &str) -> Option<String> {
        self.0.remove(marketplace_id)
    }

    /// Returns a copy with every tag trimmed and blank tags dropped.
    pub fn normalized(&self) -> Self {
        self.0
            .iter()
            .filter_map(|(k, v)| {
                let v = v.trim();
                (!v.is_empty()).then(|| (k.clone(), v.to_string()))
            })
            .collect()
    }

    /// Iterates over configured (non-blank) tags.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(k, v)| (k.as_str(), v.trim()))
            .filter(|(_, v)| !v.is_empty())
    }

    /// Number of configured (non-blank) tags.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// True if no tag is configured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(String, String)> for TagMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parses `id=tag` pairs as given on the command line.
pub fn parse_assignment(input: &str) -> Result<(String, String), String> {
    let (id, tag) = input
        .split_once('=')
        .ok_or_else(|| format!("Invalid tag assignment '{}'. Use: <marketplace>=<tag>", input))?;

    let id = id.trim().to_lowercase();
    if id.is_empty() {
        return Err(format!("Missing marketplace id in '{}'", input));
    }

    Ok((id, tag.trim().to_string()))
}
