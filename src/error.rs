//! The orchestrator's I/O-boundary error type.
//!
//! Per the no-parse-errors contract (spec §7), this is never returned from
//! the public [`crate::Parser::parse`] API — a failed read degrades to an
//! empty `Document` with a single `Anchor`, exactly like any other
//! malformed-construct-degrades-to-plain-text case. It exists so the
//! orchestrator's internal file-walking logic is `?`-composable and
//! unit-testable on its own, and so the degradation is logged with a
//! concrete cause instead of being swallowed blind.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ParseIoError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cyclic include detected at {0}")]
    Cycle(PathBuf),

    #[error("{0} is not a recognized markdown file extension")]
    UnsupportedExtension(String),
}
