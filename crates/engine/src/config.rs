use serde::{Deserialize, Serialize};

/// Configuration for directive detection and document rewriting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Namespace that marker calls must be qualified with (`@prefix.name(...)`)
    pub prefix: String,

    /// Remove markers from the live document once validation succeeds
    pub strip_markers: bool,

    /// Hint resolution behaviour
    pub resolver: ResolverConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prefix: "scribe".to_string(),
            strip_markers: false,
            resolver: ResolverConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Config for a custom marker namespace
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Strict config: unresolved hint symbols are reported instead of being
    /// treated as references to the current document
    pub fn strict() -> Self {
        Self {
            resolver: ResolverConfig {
                self_reference_fallback: false,
            },
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.prefix.is_empty() {
            return Err("prefix must not be empty".to_string());
        }

        let mut chars = self.prefix.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c == '_' || c.is_alphabetic());
        if !valid_start || !chars.all(|c| c == '_' || c.is_alphanumeric()) {
            return Err(format!(
                "prefix '{}' is not a valid identifier",
                self.prefix
            ));
        }

        Ok(())
    }
}

/// Configuration for dependency-hint resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Bare names with no relative import resolve to the current document.
    /// When disabled they produce an "unresolved reference" diagnostic.
    pub self_reference_fallback: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            self_reference_fallback: true,
        }
    }
}
