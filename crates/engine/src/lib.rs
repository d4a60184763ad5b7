//! # Scribe Engine
//!
//! Annotation-driven transformation of Python source files.
//!
//! ## Philosophy
//!
//! Source files carry markers in a namespace chosen by the caller:
//! - `@prefix.name(...)` decorators annotate classes and functions
//! - `prefix.run(prefix.name(...), ...)` annotates the module itself
//!
//! The engine finds these markers, validates them against registered
//! directive types, and rewrites the annotated code without disturbing the
//! formatting of anything it does not touch.
//!
//! ## Architecture
//!
//! ```text
//! Python Source
//!     │
//!     ├──> Tree-sitter Parsing → SourceDocument
//!     │
//!     ├──> EntityDetector (one depth-first pass)
//!     │    ├─> Marker calls filtered by prefix
//!     │    ├─> Alias → DirectiveDefinition
//!     │    └─> Arguments bound into Directive values
//!     │
//!     ├──> Validator (placement, multiplicity, requires, resists)
//!     │
//!     ├──> DependencyResolver (hint references → CodeDependency[])
//!     │
//!     └──> Splicer
//!          ├─> unparse: markers / bodies dropped, imports prepended
//!          └─> update: decorators, signature and body replaced in place
//! ```
//!
//! ## Example
//!
//! ```rust
//! use scribe_engine::{
//!     DirectiveConfig, DirectiveDefinition, DirectiveRegistry, FieldKind, FieldSpec,
//!     SourceDocument, UnparseOptions, Value,
//! };
//!
//! let todo = DirectiveDefinition::new(
//!     DirectiveConfig::new("todo").positional_order(["note"]),
//!     vec![FieldSpec::with_default("note", FieldKind::Str, Value::Str(String::new()))],
//! )
//! .unwrap();
//! let registry = DirectiveRegistry::new("pop", vec![todo]).unwrap();
//!
//! let mut doc = SourceDocument::parse(
//!     "@pop.todo('speed up')\ndef slow():\n    return 1\n",
//!     None,
//! )
//! .unwrap();
//! let scan = registry.parse(&mut doc, false).unwrap();
//!
//! let entity = scan.entities().next().unwrap();
//! assert_eq!(entity.name, "slow");
//! assert_eq!(entity.directives.first("todo").unwrap().str_field("note"), Some("speed up"));
//!
//! let code = scan
//!     .unparse(&doc, entity.id, &UnparseOptions::default().drop_markers(true))
//!     .unwrap();
//! assert_eq!(code, "def slow():\n    return 1");
//! ```

mod config;
mod detector;
mod directive;
mod document;
mod entity;
mod error;
mod group;
mod imports;
mod registry;
mod resolver;
mod splice;
mod syntax;
mod validator;
mod value;

pub use config::{EngineConfig, ResolverConfig};
pub use detector::EntityDetector;
pub use directive::{
    Directive, DirectiveConfig, DirectiveContext, DirectiveDefinition, FieldKind, FieldSpec,
    RUN_ALIAS,
};
pub use document::SourceDocument;
pub use entity::{
    DeclPath, DeclStep, DirectiveMap, Entity, EntityId, EntityKind, Scan,
};
pub use error::{DirectiveError, Result, Violation};
pub use group::{EntityGroup, EntityGrouper};
pub use imports::{EntityMap, ImportFilter, ImportKind, ImportStatement, ImportTarget, ImportedName};
pub use registry::DirectiveRegistry;
pub use resolver::{
    union_dependencies, CodeDependency, DependencyResolver, HintReference, HintResolution,
    ResolutionDiagnostic,
};
pub use splice::{UnparseOptions, UpdateOptions};
pub use syntax::DeclKind;
pub use validator::validate;
pub use value::{Identifier, Value};
