//! Run diagnostics
//!
//! Nothing in the engine aborts a run. Problems are recorded here and
//! returned next to the best-effort result; every push is also logged.

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// One recorded problem
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Malformed keyword group or out-of-range setting; the item was skipped
    /// or replaced by its fallback
    Config { scope: String, message: String },

    /// Persisted baseline could not be read; the run used an empty baseline
    BaselineCorrupt { message: String },

    /// Baseline commit failed and was rolled back
    BaselineCommitFailed { message: String },

    /// A single atomic fragment exceeded the channel budget on its own
    OversizedFragment {
        channel: String,
        batch_index: usize,
        bytes: usize,
        max_bytes: usize,
    },
}

impl Diagnostic {
    pub fn config(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic::Config {
            scope: scope.into(),
            message: message.into(),
        }
    }

    /// Informational entries do not indicate a misconfiguration or data loss
    pub fn is_informational(&self) -> bool {
        matches!(self, Diagnostic::OversizedFragment { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Config { scope, message } => {
                write!(f, "configuration error in {}: {}", scope, message)
            }
            Diagnostic::BaselineCorrupt { message } => {
                write!(f, "baseline unreadable, treated as empty: {}", message)
            }
            Diagnostic::BaselineCommitFailed { message } => {
                write!(f, "baseline commit failed, previous baseline kept: {}", message)
            }
            Diagnostic::OversizedFragment {
                channel,
                batch_index,
                bytes,
                max_bytes,
            } => write!(
                f,
                "channel {} batch {} is {} bytes (budget {}) because of one indivisible fragment",
                channel, batch_index, bytes, max_bytes
            ),
        }
    }
}

/// Ordered collection of diagnostics for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_informational() {
            info!("{}", diagnostic);
        } else {
            warn!("{}", diagnostic);
        }
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of configuration errors
    pub fn config_errors(&self) -> usize {
        self.items
            .iter()
            .filter(|d| matches!(d, Diagnostic::Config { .. }))
            .count()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
