//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("rules require an id")]
    MissingRuleId,

    #[error("duplicate rule id '{0}'")]
    DuplicateRuleId(String),

    #[error("rule '{rule}' requires at least one resource")]
    NoResources { rule: String },

    #[error("rule '{rule}' has a resource without a kind")]
    MissingKind { rule: String },

    #[error("label must not contain spaces")]
    LabelWithSpaces,

    #[error("invalid label selector: {0}")]
    Selector(#[from] SelectorError),
}

/// Label selector requirements that cannot be formatted server-side.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("unknown selector operator '{0}'")]
    UnknownOperator(String),

    #[error("selector operator '{0}' requires at least one value")]
    MissingValues(String),

    #[error("selector operator '{0}' must not carry values")]
    UnexpectedValues(String),
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("failed to compile jmespath \"{path}\": {message}")]
    Compile { path: String, message: String },

    #[error("jmespath \"{path}\" evaluation failed: {source}")]
    Search {
        path: String,
        source: jmespath::JmespathError,
    },
}

/// A TTL token that matched none of the accepted forms.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unable to parse time '{raw}'")]
pub struct ExpiryError {
    pub raw: String,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
