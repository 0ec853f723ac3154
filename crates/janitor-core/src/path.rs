//! JMESPath expressions compiled at configuration load
//!
//! Two consumers exist: skip filters (does this object participate at all)
//! and alternate timestamp extraction. Both operate on the plain JSON tree
//! of the live object.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jmespath::{Expression, Variable};
use serde::de::{Deserialize, Deserializer, Error as _};

use crate::error::PathError;
use crate::expiry::parse_timestamp;

/// A JMESPath expression with its source, compiled once at load time.
/// The default value is the empty expression.
#[derive(Clone, Default)]
pub struct PathExpr {
    source: String,
    compiled: Option<Arc<Expression<'static>>>,
}

impl PathExpr {
    /// Compile an expression. Whitespace-only input yields the empty
    /// expression; anything else must compile or is a configuration error.
    pub fn compile(raw: &str) -> Result<Self, PathError> {
        let source = raw.trim().to_string();
        if source.is_empty() {
            return Ok(Self::default());
        }
        let compiled = jmespath::compile(&source).map_err(|err| PathError::Compile {
            path: source.clone(),
            message: err.to_string(),
        })?;
        Ok(Self {
            source,
            compiled: Some(Arc::new(compiled)),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_none()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn search(&self, doc: &serde_json::Value) -> Result<Option<jmespath::Rcvar>, PathError> {
        let Some(expression) = &self.compiled else {
            return Ok(None);
        };
        let data = Variable::from_serializable(doc).map_err(|source| PathError::Search {
            path: self.source.clone(),
            source,
        })?;
        expression
            .search(data)
            .map(Some)
            .map_err(|source| PathError::Search {
                path: self.source.clone(),
                source,
            })
    }

    /// Whether the object should be skipped according to this filter path.
    ///
    /// An empty string result or a `null` result means the path selected
    /// nothing, so the object is skipped; a boolean result selects on `true`.
    /// Any other value keeps the object.
    pub fn skips(&self, doc: &serde_json::Value) -> Result<bool, PathError> {
        let Some(result) = self.search(doc)? else {
            return Ok(false);
        };
        match &*result {
            Variable::String(value) => Ok(value.is_empty()),
            Variable::Bool(selected) => Ok(!selected),
            Variable::Null => Ok(true),
            _ => Ok(false),
        }
    }

    /// Extract an alternate reference timestamp from the object. Non-string
    /// results yield `None`.
    pub fn timestamp(&self, doc: &serde_json::Value) -> Result<Option<DateTime<Utc>>, PathError> {
        let Some(result) = self.search(doc)? else {
            return Ok(None);
        };
        match &*result {
            Variable::String(value) => Ok(parse_timestamp(value)),
            _ => Ok(None),
        }
    }
}

impl fmt::Debug for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathExpr").field(&self.source).finish()
    }
}

impl<'de> Deserialize<'de> for PathExpr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PathExpr::compile(&raw).map_err(D::Error::custom)
    }
}
