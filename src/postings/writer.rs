//! Sequential writer for the compressed postings file pair
//!
//! Produces `<stem>` (concatenated counts sections, no header) and
//! `<stem>_index` (a dense little-endian u64 offset per primary key).
//! Records must arrive in ascending primary-key order; keys that are
//! skipped get an empty placeholder record so the offset table stays
//! addressable by primary key. A half-written pair is corrupt and must be
//! rebuilt from scratch.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{CuttleError, Result};
use crate::postings::codec::{self, Weight};
use crate::postings::record::PostingsRecord;
use crate::postings::types::PostingsKey;

/// Derive the sibling offset-table path for a postings stem
pub fn offset_table_path(stem: &Path) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push("_index");
    PathBuf::from(name)
}

/// Streaming writer for one postings file keyed over `[0, num_keys)`
pub struct PostingsFileWriter<W = u64> {
    out: BufWriter<File>,
    index_path: PathBuf,
    byte_locations: Vec<u64>,
    byte_pos: u64,
    next_key: u64,
    num_keys: u64,
    finished: bool,
    _weight: PhantomData<W>,
}

impl<W: Weight> PostingsFileWriter<W> {
    /// Create the postings file at `stem`, sized for `num_keys` primary
    /// keys
    pub fn new<P: AsRef<Path>>(stem: P, num_keys: u64) -> Result<Self> {
        let stem = stem.as_ref();
        let out = BufWriter::new(File::create(stem)?);
        Ok(Self {
            out,
            index_path: offset_table_path(stem),
            byte_locations: Vec::with_capacity(num_keys as usize),
            byte_pos: 0,
            next_key: 0,
            num_keys,
            finished: false,
            _weight: PhantomData,
        })
    }

    /// Append one record, emitting empty placeholders for any skipped
    /// primary keys first
    pub fn write<P, S>(&mut self, record: &PostingsRecord<P, S, W>) -> Result<()>
    where
        P: PostingsKey,
        S: PostingsKey,
    {
        let pk = record.primary_key().to_u64();
        if pk < self.next_key {
            return Err(CuttleError::Corrupt(format!(
                "record {} written out of primary-key order",
                pk
            )));
        }
        if pk >= self.num_keys {
            return Err(CuttleError::OutOfRange(pk));
        }

        while self.next_key < pk {
            self.write_empty()?;
        }

        self.byte_locations.push(self.byte_pos);
        self.byte_pos += record.write_counts(&mut self.out)? as u64;
        self.next_key += 1;
        Ok(())
    }

    fn write_empty(&mut self) -> Result<()> {
        self.byte_locations.push(self.byte_pos);
        self.byte_pos += codec::write_uint(&mut self.out, 0)? as u64;
        self.next_key += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        while self.next_key < self.num_keys {
            self.write_empty()?;
        }
        self.out.flush()?;

        let mut index = BufWriter::new(File::create(&self.index_path)?);
        for &location in &self.byte_locations {
            index.write_all(&location.to_le_bytes())?;
        }
        index.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Pad out any trailing keys and flush both files
    pub fn finish(mut self) -> Result<()> {
        self.finalize()
    }
}

impl<W> Drop for PostingsFileWriter<W> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                index = %self.index_path.display(),
                "postings writer dropped without finish; offset table not flushed"
            );
        }
    }
}
