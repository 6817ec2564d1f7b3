//! Engine limits and name-resolution policy.

use serde::{Deserialize, Serialize};

/// What to do when a column reference matches more than one column of a scope frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityMode {
    /// Take the first match in search order.
    #[default]
    FirstMatch,
    /// Fail with an ambiguity error.
    Strict,
}

/// Analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum nesting of query blocks, subqueries and view expansions.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Handling of ambiguous column references.
    #[serde(default)]
    pub ambiguity: AmbiguityMode,

    /// Treat a missing table in a system schema as "nothing to mask".
    #[serde(default = "default_true")]
    pub skip_system_schemas: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            ambiguity: AmbiguityMode::default(),
            skip_system_schemas: true,
        }
    }
}

fn default_max_depth() -> usize {
    64
}

fn default_true() -> bool {
    true
}
