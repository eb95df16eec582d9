//! Error types with error codes and fix suggestions
//!
//! Error code ranges:
//! - B3ND-010-019: Declaration errors (parse / evaluation)
//! - B3ND-020-029: Scope errors (computeds)
//! - B3ND-030-039: Session / model errors
//! - B3ND-040-049: Configuration errors
//! - B3ND-050-059: Fixture / IO errors (CLI)
//!
//! Only fatal conditions are errors. Unknown binding names and unsupported
//! handler states are logged with `tracing::warn!` and skipped.

use thiserror::Error;

use crate::expr::ExprError;

pub type Result<T> = std::result::Result<T, B3ndError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum B3ndError {
    // ═══════════════════════════════════════════
    // DECLARATION ERRORS (010-019)
    // ═══════════════════════════════════════════
    /// A binding declaration failed to parse or evaluate. Aborts the pass.
    #[error("[B3ND-010] syntax error in binding on {element}: `{declaration}`: {source}")]
    Declaration {
        element: String,
        declaration: String,
        #[source]
        source: ExprError,
    },

    // ═══════════════════════════════════════════
    // SCOPE ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[B3ND-020] computed '{name}' proxies to a view method that does not exist")]
    ComputedNotFound { name: String },

    // ═══════════════════════════════════════════
    // SESSION ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[B3ND-030] no model to bind: pass one explicitly or expose it from the view")]
    MissingModel,

    #[error("[B3ND-031] session {id} is detached")]
    SessionDetached { id: u64 },

    #[error("[B3ND-032] scheduler unavailable: {reason}")]
    Scheduler { reason: String },

    /// A dotted write cannot be applied without destroying existing data
    #[error("[B3ND-033] cannot write model path '{key}': {reason}")]
    ModelPath { key: String, reason: String },

    // ═══════════════════════════════════════════
    // CONFIG ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[B3ND-040] configuration error: {reason}")]
    Config { reason: String },

    // ═══════════════════════════════════════════
    // FIXTURE / IO ERRORS (050-059)
    // ═══════════════════════════════════════════
    #[error("[B3ND-050] invalid fixture: {reason}")]
    Fixture { reason: String },

    #[error("[B3ND-051] IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("[B3ND-052] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

impl B3ndError {
    /// Get the error code (e.g., "B3ND-010")
    pub fn code(&self) -> &'static str {
        match self {
            Self::Declaration { .. } => "B3ND-010",
            Self::ComputedNotFound { .. } => "B3ND-020",
            Self::MissingModel => "B3ND-030",
            Self::SessionDetached { .. } => "B3ND-031",
            Self::Scheduler { .. } => "B3ND-032",
            Self::ModelPath { .. } => "B3ND-033",
            Self::Config { .. } => "B3ND-040",
            Self::Fixture { .. } => "B3ND-050",
            Self::Io(_) => "B3ND-051",
            Self::YamlParse(_) => "B3ND-052",
        }
    }

    /// Raw declaration text, when the error is attributable to one
    pub fn declaration(&self) -> Option<&str> {
        match self {
            Self::Declaration { declaration, .. } => Some(declaration),
            _ => None,
        }
    }
}

impl FixSuggestion for B3ndError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            B3ndError::Declaration { .. } => Some(
                "Declarations are object-literal bodies: `name: expr, other: expr` using model, view, state or computed",
            ),
            B3ndError::ComputedNotFound { .. } => {
                Some("Add a view method with the computed's name or define the computed as a function")
            }
            B3ndError::MissingModel => Some("Pass a model to bind() or return one from View::model()"),
            B3ndError::SessionDetached { .. } => {
                Some("Create a new session; detached sessions cannot be re-attached")
            }
            B3ndError::Scheduler { .. } => {
                Some("Run inside a tokio runtime or inject a scheduler through BindOptions")
            }
            B3ndError::ModelPath { .. } => {
                Some("Array segments must be indices no larger than the array length; scalars have no fields")
            }
            B3ndError::Config { .. } => Some("Check the TOML syntax and B3ND_* environment variables"),
            B3ndError::Fixture { .. } => Some("A fixture needs `model` and a `tree` of {tag, attrs, text, children}"),
            B3ndError::Io(_) => Some("Check file path and permissions"),
            B3ndError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_error_embeds_text_and_element() {
        let err = B3ndError::Declaration {
            element: "div#main".to_string(),
            declaration: "text: model.".to_string(),
            source: ExprError::new("expected property name", 12),
        };
        assert_eq!(err.code(), "B3ND-010");
        let msg = err.to_string();
        assert!(msg.contains("[B3ND-010]"));
        assert!(msg.contains("div#main"));
        assert!(msg.contains("text: model."));
        assert_eq!(err.declaration(), Some("text: model."));
    }

    #[test]
    fn declaration_error_exposes_source() {
        use std::error::Error as _;

        let err = B3ndError::Declaration {
            element: "span".to_string(),
            declaration: "x: y".to_string(),
            source: ExprError::new("y is not defined", 3),
        };
        let source = err.source().expect("source");
        assert!(source.to_string().contains("y is not defined"));
    }

    #[test]
    fn every_error_has_a_suggestion() {
        let errors = [
            B3ndError::ComputedNotFound {
                name: "total".to_string(),
            },
            B3ndError::MissingModel,
            B3ndError::SessionDetached { id: 3 },
            B3ndError::Scheduler {
                reason: "no runtime".to_string(),
            },
            B3ndError::ModelPath {
                key: "tags.x".to_string(),
                reason: "'x' is not an array index".to_string(),
            },
            B3ndError::Config {
                reason: "bad".to_string(),
            },
        ];
        for err in &errors {
            assert!(err.fix_suggestion().is_some(), "{} has no suggestion", err.code());
        }
    }

    #[test]
    fn session_detached_mentions_id() {
        let err = B3ndError::SessionDetached { id: 42 };
        assert_eq!(err.code(), "B3ND-031");
        assert!(err.to_string().contains("42"));
    }
}
