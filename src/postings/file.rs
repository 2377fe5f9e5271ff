//! Memory-mapped postings file reader
//!
//! Opens a `<stem>` / `<stem>_index` pair read-only and hands out lazy
//! streams at byte offsets looked up in the index. The reader holds no
//! mutable state beyond the two mappings, so a single instance is safe to
//! share across any number of query threads without locking.

use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{CuttleError, Result};
use crate::postings::codec::Weight;
use crate::postings::record::PostingsRecord;
use crate::postings::stream::PostingsStream;
use crate::postings::types::PostingsKey;
use crate::postings::writer::offset_table_path;

/// Read-only view over a sealed postings file
pub struct PostingsFile<P, S, W = u64> {
    postings: Mmap,
    offsets: Mmap,
    num_keys: usize,
    _marker: PhantomData<fn(P) -> (S, W)>,
}

impl<P, S, W> PostingsFile<P, S, W>
where
    P: PostingsKey,
    S: PostingsKey,
    W: Weight,
{
    /// Map `<stem>` and `<stem>_index` for reading
    pub fn open<Q: AsRef<Path>>(stem: Q) -> Result<Self> {
        let stem = stem.as_ref();
        let postings = map_readonly(stem)?;
        let index_path = offset_table_path(stem);
        let offsets = map_readonly(&index_path)?;

        if offsets.len() % 8 != 0 {
            return Err(CuttleError::Corrupt(format!(
                "offset table {} has length {}, not a multiple of 8",
                index_path.display(),
                offsets.len()
            )));
        }

        Ok(Self {
            num_keys: offsets.len() / 8,
            postings,
            offsets,
            _marker: PhantomData,
        })
    }

    /// Number of primary keys addressable in this file
    pub fn num_keys(&self) -> usize {
        self.num_keys
    }

    fn offset(&self, key: usize) -> usize {
        let start = key * 8;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.offsets[start..start + 8]);
        u64::from_le_bytes(raw) as usize
    }

    /// Lazy stream over the record for `pk`, or `None` when the key is
    /// outside the file. Lookup itself touches only the offset table.
    pub fn find_stream(&self, pk: P) -> Option<PostingsStream<'_, S, W>> {
        let key = pk.to_u64() as usize;
        if key >= self.num_keys {
            return None;
        }
        // an offset past the mapped data marks the file corrupt; the
        // poisoned stream reports it on first use
        let data = self.postings.get(self.offset(key)..).unwrap_or(&[]);
        Some(PostingsStream::new(data))
    }

    /// Materialize the record for `pk`; out-of-range keys produce an
    /// empty record rather than an error
    pub fn find(&self, pk: P) -> Result<PostingsRecord<P, S, W>> {
        let mut record = PostingsRecord::new(pk);
        if let Some(mut stream) = self.find_stream(pk) {
            let counts: Vec<(S, W)> = stream.by_ref().collect();
            if stream.is_corrupt() {
                return Err(CuttleError::Corrupt(format!(
                    "truncated or malformed record {}",
                    pk.to_u64()
                )));
            }
            record.set_counts(counts);
        }
        Ok(record)
    }
}

fn map_readonly(path: &Path) -> Result<Mmap> {
    let file = File::open(path)?;
    // Safety: the pair is write-once; nothing remaps or truncates it
    // while readers hold the mapping.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postings::types::{DocId, TermId};
    use crate::postings::writer::PostingsFileWriter;
    use std::fs;
    use tempfile::TempDir;

    type InvRecord = PostingsRecord<TermId, DocId, u64>;
    type InvFile = PostingsFile<TermId, DocId, u64>;

    fn build(tmp: &TempDir, records: &[(u64, Vec<(u64, u64)>)], num_keys: u64) -> InvFile {
        let stem = tmp.path().join("postings");
        let mut writer = PostingsFileWriter::<u64>::new(&stem, num_keys).unwrap();
        for &(pk, ref counts) in records {
            let mut record = InvRecord::new(TermId(pk));
            record.set_counts(counts.iter().map(|&(d, c)| (DocId(d), c)));
            writer.write(&record).unwrap();
        }
        writer.finish().unwrap();
        InvFile::open(&stem).unwrap()
    }

    #[test]
    fn test_find_matches_what_was_written() {
        let tmp = TempDir::new().unwrap();
        let file = build(
            &tmp,
            &[
                (0, vec![(0, 2), (2, 1)]),
                (1, vec![(1, 1)]),
                (2, vec![(0, 1), (1, 3), (2, 2)]),
            ],
            3,
        );

        assert_eq!(file.num_keys(), 3);
        assert_eq!(
            file.find(TermId(0)).unwrap().counts(),
            &[(DocId(0), 2), (DocId(2), 1)]
        );
        assert_eq!(file.find(TermId(1)).unwrap().counts(), &[(DocId(1), 1)]);
        assert_eq!(
            file.find(TermId(2)).unwrap().counts(),
            &[(DocId(0), 1), (DocId(1), 3), (DocId(2), 2)]
        );
    }

    #[test]
    fn test_stream_agrees_with_find() {
        let tmp = TempDir::new().unwrap();
        let file = build(&tmp, &[(0, vec![(3, 1), (9, 4)]), (2, vec![(5, 2)])], 3);

        for pk in 0..3 {
            let streamed: Vec<_> = file.find_stream(TermId(pk)).unwrap().collect();
            assert_eq!(streamed, file.find(TermId(pk)).unwrap().counts());
        }
    }

    #[test]
    fn test_gap_keys_read_as_empty_records() {
        let tmp = TempDir::new().unwrap();
        let file = build(&tmp, &[(4, vec![(1, 1)])], 6);

        for pk in [0, 1, 2, 3, 5] {
            let stream = file.find_stream(TermId(pk)).unwrap();
            assert_eq!(stream.size(), 0);
            assert!(file.find(TermId(pk)).unwrap().counts().is_empty());
        }
        assert_eq!(file.find(TermId(4)).unwrap().counts(), &[(DocId(1), 1)]);
    }

    #[test]
    fn test_out_of_range_lookups() {
        let tmp = TempDir::new().unwrap();
        let file = build(&tmp, &[(0, vec![(1, 1)])], 2);

        assert!(file.find_stream(TermId(2)).is_none());
        let record = file.find(TermId(2)).unwrap();
        assert_eq!(record.primary_key(), TermId(2));
        assert!(record.counts().is_empty());
    }

    #[test]
    fn test_misaligned_offset_table_rejected() {
        let tmp = TempDir::new().unwrap();
        let stem = tmp.path().join("postings");
        {
            let mut writer = PostingsFileWriter::<u64>::new(&stem, 1).unwrap();
            writer.write(&InvRecord::new(TermId(0))).unwrap();
            writer.finish().unwrap();
        }

        let index_path = offset_table_path(&stem);
        let mut bytes = fs::read(&index_path).unwrap();
        bytes.push(0);
        fs::write(&index_path, bytes).unwrap();

        assert!(matches!(
            InvFile::open(&stem),
            Err(CuttleError::Corrupt(_))
        ));
    }

    #[test]
    fn test_truncated_postings_surface_corrupt() {
        let tmp = TempDir::new().unwrap();
        let stem = tmp.path().join("postings");
        {
            let mut writer = PostingsFileWriter::<u64>::new(&stem, 1).unwrap();
            let mut record = InvRecord::new(TermId(0));
            record.set_counts(vec![(DocId(1), 1), (DocId(2), 1)]);
            writer.write(&record).unwrap();
            writer.finish().unwrap();
        }

        let mut bytes = fs::read(&stem).unwrap();
        bytes.truncate(bytes.len() - 1);
        fs::write(&stem, bytes).unwrap();

        let file = InvFile::open(&stem).unwrap();
        assert!(matches!(
            file.find(TermId(0)),
            Err(CuttleError::Corrupt(_))
        ));
    }

    #[test]
    fn test_reader_is_shareable_across_threads() {
        let tmp = TempDir::new().unwrap();
        let file = build(&tmp, &[(0, vec![(1, 2)]), (1, vec![(0, 5)])], 2);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for pk in 0..2 {
                        let record = file.find(TermId(pk)).unwrap();
                        assert_eq!(record.counts().len(), 1);
                    }
                });
            }
        });
    }
}
