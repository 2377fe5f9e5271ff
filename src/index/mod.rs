//! Index construction and access
//!
//! Two index flavors share the postings subsystem: the inverted index
//! keys records by term, the forward index by document. Either is built
//! directly from its input, or the forward flavor is derived from an
//! inverted one through the external-sort chunk pipeline.
//!
//! # Architecture
//!
//! - `CorpusStatistics`: per-document and corpus-wide counts for ranking
//! - `libsvm`: corpus line parsing
//! - `InvertedIndex`: term -> (doc, count), sealed from a document stream
//! - `ChunkHandler` / `ChunkProducer`: RAM-bounded spill and merge
//! - `ForwardIndex`: doc -> (term, value), via libsvm ingest or uninversion

mod chunk;
mod forward;
mod inverted;
pub mod libsvm;
mod statistics;

pub use chunk::*;
pub use forward::*;
pub use inverted::*;
pub use statistics::*;
