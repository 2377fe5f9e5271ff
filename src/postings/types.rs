//! Key types addressing postings records

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dense term identifier in `[0, unique_terms)`
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TermId(pub u64);

impl TermId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dense document identifier in `[0, num_docs)`
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DocId(pub u64);

impl DocId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Integral identifier able to address a postings record (primary key) or
/// a pair within one (secondary key).
///
/// In the inverted index the roles are (term, doc); the forward index
/// transposes them to (doc, term). Both sides are dense and gap-encodable.
pub trait PostingsKey:
    Copy + Eq + Ord + fmt::Debug + Send + Sync + 'static
{
    fn from_u64(raw: u64) -> Self;

    fn to_u64(self) -> u64;
}

impl PostingsKey for TermId {
    fn from_u64(raw: u64) -> Self {
        TermId(raw)
    }

    fn to_u64(self) -> u64 {
        self.0
    }
}

impl PostingsKey for DocId {
    fn from_u64(raw: u64) -> Self {
        DocId(raw)
    }

    fn to_u64(self) -> u64 {
        self.0
    }
}

impl PostingsKey for u64 {
    fn from_u64(raw: u64) -> Self {
        raw
    }

    fn to_u64(self) -> u64 {
        self
    }
}
