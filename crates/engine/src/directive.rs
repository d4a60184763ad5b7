use crate::error::{DirectiveError, Result, Violation};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alias reserved for the module-level marker call
pub const RUN_ALIAS: &str = "run";

/// Kind of declaration a directive is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveContext {
    Module,
    Class,
    Function,
}

impl DirectiveContext {
    pub const ALL: [Self; 3] = [Self::Module, Self::Class, Self::Function];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Function => "function",
        }
    }
}

impl fmt::Display for DirectiveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Placement and co-occurrence rules of one directive type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveConfig {
    name: String,
    aliases: Vec<String>,
    positional_order: Option<Vec<String>>,
    allow_multiple: bool,
    allowed_contexts: Vec<DirectiveContext>,
    requires: Vec<String>,
    resists: Vec<String>,
}

impl DirectiveConfig {
    /// Config with default rules: alias = name, any context, repeatable
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            positional_order: None,
            allow_multiple: true,
            allowed_contexts: Vec::new(),
            requires: Vec::new(),
            resists: Vec::new(),
        }
    }

    /// Builder: surface names resolving to this directive
    #[must_use]
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: field names consumed by positional arguments
    #[must_use]
    pub fn positional_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.positional_order = Some(order.into_iter().map(Into::into).collect());
        self
    }

    /// Builder: whether one declaration may carry several instances
    #[must_use]
    pub const fn allow_multiple(mut self, allow: bool) -> Self {
        self.allow_multiple = allow;
        self
    }

    /// Builder: declaration kinds the directive may be placed on
    #[must_use]
    pub fn allowed_contexts<I>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = DirectiveContext>,
    {
        self.allowed_contexts = contexts.into_iter().collect();
        self
    }

    /// Builder: directives that must be present alongside this one
    #[must_use]
    pub fn requires<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = names.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: directives that must not be present alongside this one
    #[must_use]
    pub fn resists<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resists = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Aliases, defaulting to the canonical name
    pub fn alias_names(&self) -> Vec<&str> {
        if self.aliases.is_empty() {
            vec![self.name.as_str()]
        } else {
            self.aliases.iter().map(String::as_str).collect()
        }
    }

    pub fn positional_fields(&self) -> Option<&[String]> {
        self.positional_order.as_deref()
    }

    pub const fn allows_multiple(&self) -> bool {
        self.allow_multiple
    }

    /// Allowed contexts, defaulting to all of them
    pub fn contexts(&self) -> &[DirectiveContext] {
        if self.allowed_contexts.is_empty() {
            &DirectiveContext::ALL
        } else {
            &self.allowed_contexts
        }
    }

    pub fn allows_context(&self, context: DirectiveContext) -> bool {
        self.contexts().contains(&context)
    }

    pub fn required(&self) -> &[String] {
        &self.requires
    }

    pub fn resisted(&self) -> &[String] {
        &self.resists
    }

    /// Check internal consistency of the rules
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(DirectiveError::usage(
                Violation::MissingConfig,
                &self.name,
                "Directive config must specify a non-empty name",
            ));
        }

        if let Some(both) = self.requires.iter().find(|name| self.resists.contains(name)) {
            return Err(DirectiveError::usage(
                Violation::InvalidConfig,
                &self.name,
                format!("{both} is in both requires and resists list."),
            ));
        }

        for alias in &self.aliases {
            if alias.trim().is_empty() {
                return Err(DirectiveError::usage(
                    Violation::InvalidConfig,
                    &self.name,
                    format!("Directive {} has an empty alias", self.name),
                ));
            }
        }

        if self.alias_names().contains(&RUN_ALIAS) {
            return Err(DirectiveError::usage(
                Violation::InvalidConfig,
                &self.name,
                format!(
                    "Directive {} cannot use the reserved alias '{RUN_ALIAS}'",
                    self.name
                ),
            ));
        }

        Ok(())
    }
}

/// Accepted shape of a directive field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Bool,
    Int,
    /// Floats; integers are widened
    Float,
    Identifier,
    /// A string or a bare identifier
    Reference,
    List(Box<FieldKind>),
    Dict,
    Any,
}

impl FieldKind {
    /// Check `value` against this kind, returning the normalised value
    fn check(&self, value: Value) -> std::result::Result<Value, Value> {
        match (self, value) {
            (Self::Any, value) => Ok(value),
            (Self::Str, value @ Value::Str(_))
            | (Self::Bool, value @ Value::Bool(_))
            | (Self::Int, value @ Value::Int(_))
            | (Self::Float, value @ Value::Float(_))
            | (Self::Identifier, value @ Value::Identifier(_))
            | (Self::Reference, value @ (Value::Str(_) | Value::Identifier(_)))
            | (Self::Dict, value @ Value::Dict(_)) => Ok(value),
            #[allow(clippy::cast_precision_loss)]
            (Self::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (Self::List(inner), Value::List(items) | Value::Tuple(items)) => {
                let mut checked = Vec::with_capacity(items.len());
                for item in items {
                    checked.push(inner.check(item)?);
                }
                Ok(Value::List(checked))
            }
            (_, value) => Err(value),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str => f.write_str("str"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Identifier => f.write_str("identifier"),
            Self::Reference => f.write_str("str | identifier"),
            Self::List(inner) => write!(f, "list[{inner}]"),
            Self::Dict => f.write_str("dict"),
            Self::Any => f.write_str("any"),
        }
    }
}

/// One declared field of a directive type
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: String,
    kind: FieldKind,
    default: Option<Value>,
    nullable: bool,
}

impl FieldSpec {
    /// Field that must be supplied by the marker
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            nullable: false,
        }
    }

    /// Field with a default value
    pub fn with_default(name: impl Into<String>, kind: FieldKind, default: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            default: Some(default),
            nullable: false,
        }
    }

    /// Field that defaults to `None` and also accepts `None`
    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: Some(Value::None),
            nullable: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub const fn is_required(&self) -> bool {
        self.default.is_none()
    }

    fn check(&self, value: Value) -> std::result::Result<Value, String> {
        if self.nullable && value.is_none() {
            return Ok(value);
        }
        self.kind.check(value).map_err(|bad| {
            format!(
                "field '{}' expects {}, got {} `{bad}`",
                self.name,
                self.kind,
                bad.type_name()
            )
        })
    }
}

/// A directive type: its rules plus its field schema
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveDefinition {
    config: DirectiveConfig,
    fields: Vec<FieldSpec>,
}

impl DirectiveDefinition {
    /// Validate the config and the field schema together
    pub fn new(config: DirectiveConfig, fields: Vec<FieldSpec>) -> Result<Self> {
        config.validate()?;

        for (idx, field) in fields.iter().enumerate() {
            if fields[..idx].iter().any(|f| f.name == field.name) {
                return Err(DirectiveError::usage(
                    Violation::InvalidConfig,
                    config.name(),
                    format!(
                        "Directive {} declares field '{}' twice",
                        config.name(),
                        field.name
                    ),
                ));
            }
        }

        if let Some(order) = config.positional_fields() {
            if let Some(unknown) = order
                .iter()
                .find(|name| !fields.iter().any(|f| &f.name == *name))
            {
                return Err(DirectiveError::usage(
                    Violation::InvalidConfig,
                    config.name(),
                    format!(
                        "Positional field '{unknown}' of directive {} is not a declared field",
                        config.name()
                    ),
                ));
            }
        }

        Ok(Self { config, fields })
    }

    pub const fn config(&self) -> &DirectiveConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Bind marker arguments into a validated directive value.
    ///
    /// Positional values fill `positional_order` first, then keywords are
    /// bound by name, then defaults fill the rest.
    pub fn bind(
        &self,
        alias: &str,
        positional: Vec<Value>,
        keywords: Vec<(String, Value)>,
    ) -> Result<Directive> {
        let name = self.name();
        let mut bound: Vec<(String, Value)> = Vec::new();

        if !positional.is_empty() {
            let order = self.config.positional_fields().ok_or_else(|| {
                DirectiveError::schema(
                    name,
                    format!(
                        "Attempt to pass positional arguments for {name} without specifying positional orders"
                    ),
                )
            })?;
            if positional.len() > order.len() {
                return Err(DirectiveError::schema(
                    name,
                    "Positional arguments number exceed",
                ));
            }
            bound.extend(order.iter().cloned().zip(positional));
        }

        for (key, value) in keywords {
            if self.field(&key).is_none() {
                return Err(DirectiveError::schema(
                    name,
                    format!("unknown field '{key}'"),
                ));
            }
            if bound.iter().any(|(existing, _)| *existing == key) {
                return Err(DirectiveError::schema(
                    name,
                    format!("multiple values for field '{key}'"),
                ));
            }
            bound.push((key, value));
        }

        let mut fields = Vec::with_capacity(self.fields.len());
        for spec in &self.fields {
            let supplied = bound
                .iter()
                .position(|(key, _)| *key == spec.name)
                .map(|idx| bound.swap_remove(idx).1);
            let value = match (supplied, &spec.default) {
                (Some(value), _) => spec
                    .check(value)
                    .map_err(|message| DirectiveError::schema(name, message))?,
                (None, Some(default)) => default.clone(),
                (None, None) => {
                    return Err(DirectiveError::schema(
                        name,
                        format!("field '{}' is required", spec.name),
                    ));
                }
            };
            fields.push((spec.name.clone(), value));
        }

        Ok(Directive {
            name: name.to_string(),
            alias: alias.to_string(),
            fields,
        })
    }
}

/// A bound directive instance found on a declaration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Directive {
    name: String,
    alias: String,
    fields: Vec<(String, Value)>,
}

impl Directive {
    /// Canonical directive name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Surface name used at the marker site
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Bound fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.value(field).and_then(Value::as_str)
    }

    pub fn bool_field(&self, field: &str) -> Option<bool> {
        self.value(field).and_then(Value::as_bool)
    }

    pub fn int_field(&self, field: &str) -> Option<i64> {
        self.value(field).and_then(Value::as_int)
    }

    pub fn float_field(&self, field: &str) -> Option<f64> {
        self.value(field).and_then(Value::as_float)
    }

    pub fn list_field(&self, field: &str) -> Option<&[Value]> {
        self.value(field).and_then(Value::as_list)
    }
}
