//! On-disk postings subsystem
//!
//! The same record layout backs both index flavors: a primary key selects
//! a record, and the record stores gap-encoded (secondary key, weight)
//! pairs. A sibling offset table gives O(1) random access by primary key.
//!
//! # Architecture
//!
//! - `codec`: varint / raw-double byte codec and the `Weight` seam
//! - `PostingsRecord`: in-memory record with merge and lookup
//! - `PostingsFileWriter`: sequential writer producing `<stem>` + `<stem>_index`
//! - `PostingsFile`: memory-mapped read-only view, factory for streams
//! - `PostingsStream`: lazy pair decoder borrowing the mapped region

mod codec;
mod file;
mod record;
mod stream;
mod types;
mod writer;

pub use codec::*;
pub use file::*;
pub use record::*;
pub use stream::*;
pub use types::*;
pub use writer::*;
