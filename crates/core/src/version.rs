//! Row versioning used for optimistic concurrency.
//!
//! Every committed row carries the sequence number of the commit that last
//! wrote it. A transaction remembers the version it observed for each row it
//! touched; two transactions that observed the same version and both write are
//! serialized because the second commit sees a newer version and is rejected.

/// Optimistic concurrency expectation for a stored row.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// The row must not exist yet.
    Absent,
    /// Require the row to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn from_observed(observed: Option<u64>) -> Self {
        match observed {
            Some(v) => ExpectedVersion::Exact(v),
            None => ExpectedVersion::Absent,
        }
    }

    pub fn matches(self, actual: Option<u64>) -> bool {
        match (self, actual) {
            (ExpectedVersion::Absent, None) => true,
            (ExpectedVersion::Exact(v), Some(a)) => v == a,
            _ => false,
        }
    }
}
