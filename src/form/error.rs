use crate::storage::StoreError;

/// Errors raised while building, parsing or saving a form.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// A field failed validation.
    #[error("Option \"{title}\" contains an invalid input value. {reason}")]
    Invalid {
        /// The option title.
        title: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A field that may not be empty is empty.
    #[error("Option \"{title}\" must not be empty.")]
    Required {
        /// The option title.
        title: String,
    },

    /// The record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A pre-commit hook rejected the save.
    #[error("{0}")]
    Hook(String),

    /// A tab was declared twice on one section.
    #[error("tab '{0}' already defined")]
    DuplicateTab(String),

    /// An option was placed on a tab that was never declared.
    #[error("tab '{0}' is not defined")]
    UnknownTab(String),

    /// A section id or name does not exist on the map.
    #[error("unknown section '{0}'")]
    UnknownSection(String),

    /// A form description could not be parsed.
    #[error("invalid form description: {0}")]
    Blueprint(String),
}
