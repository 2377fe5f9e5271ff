//! Compressed-postings text indexing and retrieval toolkit
//!
//! The on-disk heart is a gap-encoded, variable-width postings format
//! shared by two index flavors: inverted (term -> docs) for querying and
//! forward (doc -> terms) for feature export. A forward index is either
//! ingested directly from libsvm data or derived from an inverted index
//! through an external-memory transposition. Ranking reads inverted
//! postings streams and accumulates per-document scores.

pub mod config;
pub mod error;
pub mod index;
pub mod postings;
pub mod ranker;

pub use config::Config;
pub use error::{CuttleError, Result};
pub use index::{
    ChunkHandler, ChunkProducer, CorpusStatistics, Document, ForwardIndex, ForwardRecord,
    InvertedIndex, InvertedRecord,
};
pub use postings::{
    CodecError, DocId, PostingsFile, PostingsFileWriter, PostingsKey, PostingsRecord,
    PostingsStream, TermId, Weight,
};
pub use ranker::{Ranker, ScoreData, SearchResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
