use std::fmt;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, DirectiveError>;

/// Usage rule that an invalid-usage error reports as violated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Violation {
    /// A directive type was defined without a usable configuration
    MissingConfig,
    /// A directive configuration is internally inconsistent
    InvalidConfig,
    /// Two directive types share the same canonical name
    DuplicateName,
    /// Two directive types share the same alias
    DuplicateAlias,
    /// Directive placed on a declaration kind it does not allow
    Placement,
    /// Directive repeated on one declaration although it is single-use
    Multiplicity,
    /// A co-directive named in `requires` is absent
    MissingRequirement,
    /// A co-directive named in `resists` is present
    ResistedPresent,
    /// Module-level `run(...)` marker found inside a class or function
    NestedModuleMarker,
    /// A named entity, class or function does not exist
    NotFound,
    /// Markers were asked to be dropped without a namespace prefix
    MissingPrefix,
}

impl Violation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingConfig => "missing_config",
            Self::InvalidConfig => "invalid_config",
            Self::DuplicateName => "duplicate_name",
            Self::DuplicateAlias => "duplicate_alias",
            Self::Placement => "placement",
            Self::Multiplicity => "multiplicity",
            Self::MissingRequirement => "missing_requirement",
            Self::ResistedPresent => "resisted_present",
            Self::NestedModuleMarker => "nested_module_marker",
            Self::NotFound => "not_found",
            Self::MissingPrefix => "missing_prefix",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while detecting, validating or splicing directives
#[derive(Error, Debug)]
pub enum DirectiveError {
    /// The source text is not valid Python
    #[error("Parse error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    /// A directive's arguments do not fit its declared schema
    #[error("Schema violation in directive '{directive}': {message}")]
    Schema { directive: String, message: String },

    /// Configuration or placement rule broken
    #[error("{message}")]
    InvalidUsage {
        violation: Violation,
        subject: String,
        message: String,
    },

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tree-sitter error
    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),

    /// Conflicting text edits
    #[error("Splice error: {0}")]
    Splice(String),
}

impl DirectiveError {
    /// Create a parse error
    pub fn parse(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a schema error for a directive
    pub fn schema(directive: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            directive: directive.into(),
            message: message.into(),
        }
    }

    /// Create an invalid usage error
    pub fn usage(
        violation: Violation,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidUsage {
            violation,
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error for a named entity
    pub fn not_found(kind: &str, name: &str) -> Self {
        Self::usage(
            Violation::NotFound,
            name,
            format!("{kind} with name '{name}' does not exist"),
        )
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitter(msg.into())
    }

    /// Create a splice error
    pub fn splice(msg: impl Into<String>) -> Self {
        Self::Splice(msg.into())
    }

    /// The violated usage rule, if this is an invalid-usage error
    #[must_use]
    pub const fn violation(&self) -> Option<Violation> {
        match self {
            Self::InvalidUsage { violation, .. } => Some(*violation),
            _ => None,
        }
    }

    /// Whether this error is a schema violation
    #[must_use]
    pub const fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }
}
