use scribe_engine::DirectiveError;
use thiserror::Error;

/// Result type for task operations
pub type Result<T> = std::result::Result<T, TaskError>;

/// Errors raised while building or integrating tasks
#[derive(Error, Debug)]
pub enum TaskError {
    /// Detection, validation or splicing failed in the engine
    #[error(transparent)]
    Engine(#[from] DirectiveError),

    /// An annotated entity carries no `autocomplete` directive
    #[error("Entity '{0}' has no autocomplete directive")]
    MissingAutocomplete(String),

    /// A group with no tasks cannot be integrated
    #[error("Task group '{0}' is empty")]
    EmptyGroup(String),
}
