//! Declarative janitor configuration
//!
//! The configuration has two optional sections: a `ttl` shortcut ("read the
//! TTL from this label or annotation on each object") and an ordered list of
//! `rules` (a fixed TTL applied to a set of resources in selected
//! namespaces). It is loaded from YAML in strict mode and validated once at
//! startup; JMESPath expressions and propagation policies are checked during
//! deserialization, everything else by [`Config::validate`].

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::path::PathExpr;
use crate::selector::Selector;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub ttl: TtlConfig,
    pub rules: Vec<Rule>,
}

/// The TTL-on-label/annotation shortcut.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default, rename_all = "camelCase")]
pub struct TtlConfig {
    pub annotation: String,
    pub label: String,
    pub resources: Vec<ResourceSpec>,
    pub delete_options: DeleteOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default, rename_all = "camelCase")]
pub struct Rule {
    /// Unique identifier, used in logs, metrics, and audit events.
    pub id: String,
    /// TTL applied to every matched object.
    pub ttl: String,
    pub resources: Vec<ResourceSpec>,
    pub namespace_selector: Selector,
    pub delete_options: DeleteOptions,
}

/// One resource kind to consider. `group`, `version`, and `kind` may each be
/// a literal or `*`; `kind` carries the server-side resource name (plural),
/// matching the URL form the dynamic API wants.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default, rename_all = "camelCase")]
pub struct ResourceSpec {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub selector: Selector,
    pub timestamp_path: PathExpr,
    pub filter_path: PathExpr,
}

impl fmt::Display for ResourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.kind)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Delete-call options. The empty propagation policy means "the server
/// decides" and is distinct from `Background`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default, rename_all = "camelCase")]
pub struct DeleteOptions {
    pub propagation_policy: PropagationPolicy,
    pub grace_period_seconds: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum PropagationPolicy {
    #[default]
    #[serde(rename = "")]
    ServerDefault,
    Foreground,
    Background,
    Orphan,
}

impl Config {
    /// Load and validate a configuration file. Unknown keys are rejected.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::from_yaml(&data)
    }

    /// Parse a configuration from YAML and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the type system cannot express.
    pub fn validate(&self) -> Result<()> {
        self.ttl.validate()?;

        let mut seen = HashSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !seen.insert(rule.id.as_str()) {
                return Err(ConfigError::DuplicateRuleId(rule.id.clone()));
            }
        }

        Ok(())
    }

    /// Whether the TTL-on-label/annotation mode is configured.
    pub fn ttl_mode_enabled(&self) -> bool {
        !self.ttl.label.is_empty() || !self.ttl.annotation.is_empty()
    }
}

impl TtlConfig {
    fn validate(&self) -> Result<()> {
        if self.label.contains(char::is_whitespace) {
            return Err(ConfigError::LabelWithSpaces);
        }
        for resource in &self.resources {
            resource.validate("ttl")?;
        }
        Ok(())
    }
}

impl Rule {
    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(ConfigError::MissingRuleId);
        }
        if self.resources.is_empty() {
            return Err(ConfigError::NoResources {
                rule: self.id.clone(),
            });
        }
        for resource in &self.resources {
            resource.validate(&self.id)?;
        }
        self.namespace_selector.to_server_string()?;
        Ok(())
    }
}

impl ResourceSpec {
    fn validate(&self, rule: &str) -> Result<()> {
        if self.kind.is_empty() {
            return Err(ConfigError::MissingKind {
                rule: rule.to_string(),
            });
        }
        self.selector.to_server_string()?;
        Ok(())
    }
}
