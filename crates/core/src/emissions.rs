use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Factor given to caller-supplied vocabulary that has no curated value.
pub const DEFAULT_FACTOR: f64 = 1.0;

/// Built-in emission factors (kg CO2e per unit). Order is match priority.
pub const DEFAULT_FACTORS: &[(&str, f64)] = &[
    ("milk", 1.5),
    ("chicken", 6.9),
    ("bread", 1.0),
    ("egg", 0.2),
    ("beef", 60.0),
    ("apple", 0.3),
    ("rice", 2.7),
    ("pasta", 1.8),
    ("cheese", 13.5),
    ("tomato", 1.1),
    ("coffee", 0.7),
    ("water", 0.2),
    ("soda", 0.5),
    ("plastic bag", 0.05),
    ("paper bag", 0.04),
    ("tea", 0.2),
    ("juice", 0.9),
    ("toilet paper", 1.3),
    ("detergent", 2.0),
    ("pizza", 5.0),
    ("sandwich", 3.0),
    ("banana", 0.3),
    ("potato", 0.2),
    ("cucumber", 0.2),
    ("onion", 0.3),
    ("carrot", 0.25),
    ("fish", 5.0),
    ("mutton", 24.0),
    ("yogurt", 2.2),
    ("butter", 11.9),
    ("chocolate", 7.0),
    ("milkshake", 1.8),
    ("beer", 0.6),
    ("wine", 1.5),
    ("energy drink", 1.0),
    ("green tea", 0.1),
    ("shampoo", 2.3),
    ("toothpaste", 1.0),
    ("handwash", 1.5),
    ("soap", 0.7),
    ("facewash", 1.8),
    ("chips", 2.0),
    ("biscuits", 1.2),
    ("instant noodles", 1.5),
    ("ice cream", 3.0),
    ("coconut water", 0.3),
    ("bottled juice", 1.0),
    ("snack bar", 1.1),
];

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("Emission factor for '{key}' must be a positive number, got {factor}")]
    InvalidFactor { key: String, factor: f64 },
    #[error("Emission table key must not be empty")]
    EmptyKey,
}

/// A purchased item as recovered from receipt text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedItem {
    pub item: String,
    pub quantity: f64,
}

impl ParsedItem {
    pub fn new(item: impl Into<String>, quantity: f64) -> Self {
        Self { item: item.into(), quantity }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionResult {
    pub item: String,
    pub quantity: f64,
    /// kg CO2e: `quantity * factor`.
    pub emissions: f64,
}

/// Keyword -> factor mapping scanned in insertion order.
///
/// Keys can be added but never removed, so a key that matched once keeps matching for
/// the lifetime of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionsTable {
    entries: Vec<(String, f64)>,
}

impl Default for EmissionsTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_FACTORS
                .iter()
                .map(|(k, f)| (k.to_string(), *f))
                .collect(),
        }
    }
}

impl EmissionsTable {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn factor(&self, key: &str) -> Option<f64> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, f)| *f)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, f)| (k.as_str(), *f))
    }

    /// Append `key` unless it is already present. Returns whether the key was added.
    pub fn insert(&mut self, key: &str, factor: f64) -> Result<bool, TableError> {
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            return Err(TableError::EmptyKey);
        }
        if !factor.is_finite() || factor <= 0.0 {
            return Err(TableError::InvalidFactor { key, factor });
        }
        if self.contains(&key) {
            return Ok(false);
        }
        self.entries.push((key, factor));
        Ok(true)
    }

    pub fn extend<I>(&mut self, factors: I) -> Result<usize, TableError>
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut added = 0;
        for (key, factor) in factors {
            if self.insert(&key, factor)? {
                added += 1;
            }
        }
        Ok(added)
    }

    fn first_match(&self, item: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| item.contains(k.as_str()))
            .map(|(_, f)| *f)
    }
}

/// Request-scoped terms that extend what a receipt can match.
///
/// Holds only terms the base table lacks; all of them carry [`DEFAULT_FACTOR`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vocabulary {
    terms: Vec<String>,
}

impl Vocabulary {
    /// Build from a comma-separated hint list such as `"oat milk, tofu,,"`.
    pub fn from_hints(base: &EmissionsTable, hints: &str) -> Self {
        let mut terms: Vec<String> = Vec::new();
        for term in hints.split(',').map(|t| t.trim().to_lowercase()) {
            if term.is_empty() || base.contains(&term) || terms.contains(&term) {
                continue;
            }
            terms.push(term);
        }
        Self { terms }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn first_match(&self, item: &str) -> Option<f64> {
        self.terms
            .iter()
            .any(|t| item.contains(t.as_str()))
            .then_some(DEFAULT_FACTOR)
    }
}

/// Match every item against `vocabulary` first, then `table`, keeping the first key that
/// occurs as a substring of the item name. Items without a hit are dropped.
pub fn estimate(
    table: &EmissionsTable,
    vocabulary: &Vocabulary,
    items: &[ParsedItem],
) -> Vec<EmissionResult> {
    let results: Vec<EmissionResult> = items
        .iter()
        .filter(|entry| !entry.item.is_empty())
        .filter_map(|entry| {
            let factor = vocabulary
                .first_match(&entry.item)
                .or_else(|| table.first_match(&entry.item))?;
            Some(EmissionResult {
                item: entry.item.clone(),
                quantity: entry.quantity,
                emissions: factor * entry.quantity,
            })
        })
        .collect();
    tracing::debug!(matched = results.len(), parsed = items.len(), "Estimated emissions");
    results
}

pub fn total_emissions(results: &[EmissionResult]) -> f64 {
    results.iter().map(|r| r.emissions).sum()
}
