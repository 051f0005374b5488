use crate::types::ChangeSet;

/// Decides whether a commit's note warrants an entry in the living document.
///
/// The orchestrator only sees this predicate, so the keyword heuristic can be
/// swapped for a configured or learned policy without touching the loop.
pub trait SignificanceGate: Send + Sync {
    fn should_update(&self, message: &str, changes: &ChangeSet) -> bool;
}

/// Keywords whose presence in a commit message signals a change worth
/// documenting. Deliberately omits plain "fix": routine fixups should not
/// churn the document.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "feature", "add", "new", "version", "release", "update", "improve", "enhance", "docs",
    "readme",
];

// ---------------------------------------------------------------------------
// KeywordGate
// ---------------------------------------------------------------------------

/// Case-insensitive substring match against a keyword list. A heuristic, not
/// a classifier; false negatives are acceptable.
#[derive(Debug, Clone)]
pub struct KeywordGate {
    keywords: Vec<String>,
}

impl KeywordGate {
    pub fn new(keywords: impl IntoIterator<Item = String>) -> Self {
        Self {
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

impl Default for KeywordGate {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().map(|k| k.to_string()))
    }
}

impl SignificanceGate for KeywordGate {
    fn should_update(&self, message: &str, _changes: &ChangeSet) -> bool {
        let message = message.to_lowercase();
        self.keywords.iter().any(|k| message.contains(k.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
