//! Question form error types.

use thiserror::Error;

/// Errors building or parsing question form documents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormError {
    /// A question identifier was empty.
    #[error("question identifier cannot be empty")]
    EmptyIdentifier,

    /// A multiple-choice question had too few or too many choices.
    #[error("question '{identifier}' has {count} choices (expected 2 to {max})")]
    ChoiceCount {
        identifier: String,
        count: usize,
        max: usize,
    },

    /// The serialized form exceeds the marketplace size limit.
    #[error("question form is {len} characters (limit {max})")]
    TooLarge { len: usize, max: usize },

    /// Writing XML failed.
    #[error("failed to write question form: {0}")]
    Write(String),

    /// The answer document is not well-formed XML.
    #[error("malformed answer document: {0}")]
    Malformed(String),

    /// A question identifier in an answer was not a question key.
    #[error("invalid question identifier in answer: '{0}'")]
    InvalidQuestionIdentifier(String),

    /// An answer element was missing a required child.
    #[error("answer is missing {0}")]
    IncompleteAnswer(&'static str),
}

impl FormError {
    pub(crate) fn write(err: impl std::fmt::Display) -> Self {
        Self::Write(err.to_string())
    }

    pub(crate) fn malformed(err: impl std::fmt::Display) -> Self {
        Self::Malformed(err.to_string())
    }
}
