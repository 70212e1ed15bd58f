use anyhow::{Context, Result};
use std::collections::HashMap;

/// Populations of the states compared in the default per-capita chart.
static DEFAULT_POPULATIONS: &[(&str, f64)] = &[
    ("LA", 4.66e6),
    ("CA", 39.56e6),
    ("NY", 19.54e6),
    ("GA", 10.52e6),
    ("MD", 6.043e6),
];

/// Maps state codes to the divisor used for per-capita normalization.
///
/// Stored as a plain JSON object on disk:
/// ```json
/// {
///   "CA": 39560000,
///   "NY": 19540000
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Populations {
    entries: HashMap<String, f64>,
}

impl Populations {
    /// Loads the table from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read population table '{path}'"))?;
        Self::from_json(&content).with_context(|| format!("invalid population table '{path}'"))
    }

    /// Parses a table from its JSON text, rejecting unusable divisors.
    pub fn from_json(content: &str) -> Result<Self> {
        let entries: HashMap<String, f64> = serde_json::from_str(content)?;

        for (state, divisor) in &entries {
            if !divisor.is_finite() || *divisor <= 0.0 {
                anyhow::bail!("population for '{state}' must be a positive number, got {divisor}");
            }
        }

        Ok(Self { entries })
    }

    /// The built-in table for LA, CA, NY, GA and MD.
    pub fn builtin() -> Self {
        Self {
            entries: DEFAULT_POPULATIONS
                .iter()
                .map(|(state, pop)| (state.to_string(), *pop))
                .collect(),
        }
    }

    /// Returns the configured divisor for `state`, if any.
    pub fn get(&self, state: &str) -> Option<f64> {
        self.entries.get(state).copied()
    }

    /// Iterates over all `(state, divisor)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
