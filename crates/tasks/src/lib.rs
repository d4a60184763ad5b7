//! # Scribe Tasks
//!
//! Built-in `autocomplete` / `hint` directives and the task layer on top of
//! the engine: every annotated entity becomes a [`Task`], tasks sharing an
//! `autocomplete(group=...)` form a [`TaskGroup`], and each group produces
//! the [`PromptSection`]s handed to whatever writes the code. The response
//! is spliced back with [`TaskGroup::integrate`].
//!
//! ```text
//! SourceDocument ──> registry().parse() ──> Scan
//!                                            │
//!                         task_groups() <────┘
//!                              │
//!                              ├──> prompt_sections()  (requirement, context, dependencies)
//!                              └──> integrate(response)
//! ```

pub mod directives;
mod error;
mod group;
mod task;

pub use directives::{registry, registry_with, Autocomplete, Hint, AUTOCOMPLETE, HINT, PREFIX};
pub use error::{Result, TaskError};
pub use group::{group_key, task_groups, DependencySnippet, PromptSection, TaskGroup};
pub use task::{Task, TaskKind};
