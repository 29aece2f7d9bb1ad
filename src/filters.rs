use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tracing::debug;
use url::Url;

use crate::webhook::MediaType;

/// Root of the user-edited filter file: the downstream instance table plus
/// the ordered filter list. List order is the user's priority order.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterFile {
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

/// A downstream webhook consumer that matched notifications are forwarded
/// to, referenced from filters by id.
#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    pub id: String,
    pub url: Url,
}

/// One ordered routing rule.
#[derive(Debug, Clone, Deserialize)]
pub struct Filter {
    pub media_type: MediaType,
    #[serde(default)]
    pub is_4k: Option<bool>,
    #[serde(default)]
    pub conditions: Option<BTreeMap<String, Condition>>,
    pub apply: ApplyTargets,
}

/// Routing payload of a filter: one instance id or a list of ids, handed
/// back verbatim when the filter matches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ApplyTargets {
    One(String),
    Many(Vec<String>),
}

impl ApplyTargets {
    pub fn ids(&self) -> &[String] {
        match self {
            ApplyTargets::One(id) => std::slice::from_ref(id),
            ApplyTargets::Many(ids) => ids,
        }
    }
}

/// A per-field matching rule: either a bare value carrying include
/// (substring, case-insensitive) semantics, or an object combining
/// `require`, `include` and `exclude` member lists. Objects with other
/// members fall through to the plain form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Rule(ConditionRule),
    Plain(Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionRule {
    #[serde(default)]
    pub require: Option<Value>,
    #[serde(default)]
    pub include: Option<Value>,
    #[serde(default)]
    pub exclude: Option<Value>,
}

impl FilterFile {
    pub async fn load(path: &Path) -> Result<Self, FilterConfigError> {
        let bytes = fs::read(path)
            .await
            .map_err(|source| FilterConfigError::Read {
                source,
                path: path.to_path_buf(),
            })?;

        let file: FilterFile =
            serde_json::from_slice(&bytes).map_err(|source| FilterConfigError::Parse {
                source,
                path: path.to_path_buf(),
            })?;

        file.validate()?;

        debug!(
            path = %path.display(),
            instances = file.instances.len(),
            filters = file.filters.len(),
            "loaded filter file"
        );

        Ok(file)
    }

    fn validate(&self) -> Result<(), FilterConfigError> {
        let mut seen = HashSet::new();
        for instance in &self.instances {
            if !seen.insert(instance.id.as_str()) {
                return Err(FilterConfigError::DuplicateInstance {
                    id: instance.id.clone(),
                });
            }
        }

        for (position, filter) in self.filters.iter().enumerate() {
            for id in filter.apply.ids() {
                if !seen.contains(id.as_str()) {
                    return Err(FilterConfigError::UnknownInstance {
                        id: id.clone(),
                        position,
                    });
                }
            }
        }

        Ok(())
    }

    pub fn instance(&self, id: &str) -> Option<&Instance> {
        self.instances.iter().find(|instance| instance.id == id)
    }
}

#[derive(Debug, Error)]
pub enum FilterConfigError {
    #[error("failed to read filter file at {path}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse filter file at {path}")]
    Parse {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },
    #[error("instance `{id}` is declared more than once")]
    DuplicateInstance { id: String },
    #[error("filter at position {position} applies unknown instance `{id}`")]
    UnknownInstance { id: String, position: usize },
}
