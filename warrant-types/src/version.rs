//! Optimistic-concurrency version tokens.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The (sequence number, primary term) pair the backend returns with every
/// read and write of a document.
///
/// A token is never stored inside the document. It is captured on read and
/// handed back unchanged as the precondition of the next write; the backend
/// rejects the write if the document changed in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken {
    pub seq_no: u64,
    pub primary_term: u64,
}

impl VersionToken {
    #[must_use]
    pub const fn new(seq_no: u64, primary_term: u64) -> Self {
        Self {
            seq_no,
            primary_term,
        }
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.seq_no, self.primary_term)
    }
}
