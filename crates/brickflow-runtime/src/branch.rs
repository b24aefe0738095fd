//! Branch-path tracking: the key+counter trail identifying the current
//! position in the nested pipeline tree.
//!
//! Paths are append-only values. Descending into a control-flow branch
//! produces a new, extended path; a path captured by a trace record is never
//! mutated afterwards. A branch that runs zero times produces no extension
//! and therefore no trace entries, which is the defined signal for "not
//! executed".

use serde::{Deserialize, Serialize};
use std::fmt;

/// One control-flow edge: the key names the edge taken (e.g. `"if"`,
/// `"loop"`), the counter disambiguates repeated entries (loop iterations,
/// retry attempts).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchEntry {
    pub key: String,
    pub counter: u32,
}

/// An ordered list of branch entries. Two paths are equal iff their entry
/// sequences are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchPath {
    entries: Vec<BranchEntry>,
}

impl BranchPath {
    /// The empty path of a top-level pipeline.
    pub fn root() -> Self {
        Self::default()
    }

    /// Pure extension: returns a new path with one more entry. The receiver
    /// is unchanged.
    pub fn extend(&self, key: impl Into<String>, counter: u32) -> Self {
        let mut entries = self.entries.clone();
        entries.push(BranchEntry {
            key: key.into(),
            counter,
        });
        Self { entries }
    }

    pub fn entries(&self) -> &[BranchEntry] {
        &self.entries
    }

    pub fn is_root(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Display for BranchPath {
    /// Renders `key:counter` entries joined by `/`; the root path renders
    /// as `.`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return write!(f, ".");
        }
        let rendered: Vec<String> = self
            .entries
            .iter()
            .map(|e| format!("{}:{}", e.key, e.counter))
            .collect();
        write!(f, "{}", rendered.join("/"))
    }
}
