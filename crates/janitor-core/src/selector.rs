//! Server-side label selector formatting
//!
//! Configuration carries the standard Kubernetes selector shape
//! (`matchLabels` + `matchExpressions`); list calls want the flat string
//! form. Formatting happens once per selector and is cached.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::error::SelectorError;

/// A label selector from configuration, formatted lazily into the
/// server-side selector string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Selector {
    inner: Option<LabelSelector>,
    #[serde(skip)]
    compiled: OnceCell<String>,
}

impl Selector {
    pub fn new(inner: LabelSelector) -> Self {
        Self {
            inner: Some(inner),
            compiled: OnceCell::new(),
        }
    }

    /// True when no selector is configured or both sub-maps are empty.
    /// An empty selector formats to the empty string (list without selector).
    pub fn is_empty(&self) -> bool {
        match &self.inner {
            None => true,
            Some(selector) => {
                selector.match_labels.as_ref().is_none_or(|m| m.is_empty())
                    && selector
                        .match_expressions
                        .as_ref()
                        .is_none_or(|e| e.is_empty())
            }
        }
    }

    /// The server-side selector string, formatted on first use.
    pub fn to_server_string(&self) -> Result<&str, SelectorError> {
        self.compiled
            .get_or_try_init(|| format_label_selector(self.inner.as_ref()))
            .map(String::as_str)
    }
}

/// Format a selector into the flat string the API server understands.
///
/// `matchLabels` become `key=value` pairs; expressions map to the set-based
/// syntax (`key in (a,b)`, `key notin (a,b)`, `key`, `!key`). Requirements
/// that cannot be expressed are a configuration error rather than a silently
/// empty selector.
fn format_label_selector(selector: Option<&LabelSelector>) -> Result<String, SelectorError> {
    let Some(selector) = selector else {
        return Ok(String::new());
    };

    let mut parts: Vec<String> = Vec::new();

    if let Some(labels) = &selector.match_labels {
        // BTreeMap iteration keeps the output deterministic
        for (key, value) in labels {
            parts.push(format!("{key}={value}"));
        }
    }

    if let Some(expressions) = &selector.match_expressions {
        for requirement in expressions {
            let values = requirement.values.clone().unwrap_or_default();
            match requirement.operator.as_str() {
                "In" | "NotIn" => {
                    if values.is_empty() {
                        return Err(SelectorError::MissingValues(requirement.operator.clone()));
                    }
                    let mut values = values;
                    values.sort();
                    let op = if requirement.operator == "In" {
                        "in"
                    } else {
                        "notin"
                    };
                    parts.push(format!("{} {op} ({})", requirement.key, values.join(",")));
                }
                "Exists" | "DoesNotExist" => {
                    if !values.is_empty() {
                        return Err(SelectorError::UnexpectedValues(requirement.operator.clone()));
                    }
                    if requirement.operator == "Exists" {
                        parts.push(requirement.key.clone());
                    } else {
                        parts.push(format!("!{}", requirement.key));
                    }
                }
                other => return Err(SelectorError::UnknownOperator(other.to_string())),
            }
        }
    }

    Ok(parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement;
    use std::collections::BTreeMap;

    fn labels(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn requirement(key: &str, operator: &str, values: &[&str]) -> LabelSelectorRequirement {
        LabelSelectorRequirement {
            key: key.to_string(),
            operator: operator.to_string(),
            values: if values.is_empty() {
                None
            } else {
                Some(values.iter().map(ToString::to_string).collect())
            },
        }
    }

    #[test]
    fn absent_selector_is_empty() {
        let selector = Selector::default();
        assert!(selector.is_empty());
        assert_eq!(selector.to_server_string().unwrap(), "");
    }

    #[test]
    fn empty_maps_are_empty() {
        let selector = Selector::new(LabelSelector {
            match_labels: Some(BTreeMap::new()),
            match_expressions: Some(vec![]),
        });
        assert!(selector.is_empty());
        assert_eq!(selector.to_server_string().unwrap(), "");
    }

    #[test]
    fn match_labels_format_sorted() {
        let selector = Selector::new(LabelSelector {
            match_labels: labels(&[("env", "dev"), ("app", "web")]),
            match_expressions: None,
        });
        assert!(!selector.is_empty());
        assert_eq!(selector.to_server_string().unwrap(), "app=web,env=dev");
    }

    #[test]
    fn expressions_format() {
        let selector = Selector::new(LabelSelector {
            match_labels: labels(&[("app", "web")]),
            match_expressions: Some(vec![
                requirement("tier", "In", &["frontend", "backend"]),
                requirement("stage", "NotIn", &["prod"]),
                requirement("owner", "Exists", &[]),
                requirement("legacy", "DoesNotExist", &[]),
            ]),
        });
        assert_eq!(
            selector.to_server_string().unwrap(),
            "app=web,tier in (backend,frontend),stage notin (prod),owner,!legacy"
        );
    }

    #[test]
    fn in_requires_values() {
        let selector = Selector::new(LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![requirement("tier", "In", &[])]),
        });
        assert_eq!(
            selector.to_server_string().unwrap_err(),
            SelectorError::MissingValues("In".to_string())
        );
    }

    #[test]
    fn exists_rejects_values() {
        let selector = Selector::new(LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![requirement("tier", "Exists", &["x"])]),
        });
        assert_eq!(
            selector.to_server_string().unwrap_err(),
            SelectorError::UnexpectedValues("Exists".to_string())
        );
    }

    #[test]
    fn unknown_operator_is_an_error() {
        let selector = Selector::new(LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![requirement("tier", "Matches", &["x"])]),
        });
        assert_eq!(
            selector.to_server_string().unwrap_err(),
            SelectorError::UnknownOperator("Matches".to_string())
        );
    }

    #[test]
    fn deserializes_from_yaml() {
        let selector: Selector = serde_yaml::from_str(
            r#"
matchLabels:
  env: dev
matchExpressions:
  - key: tier
    operator: In
    values: [frontend]
"#,
        )
        .unwrap();
        assert_eq!(
            selector.to_server_string().unwrap(),
            "env=dev,tier in (frontend)"
        );
    }
}
