//! External-memory record sorting for index transposition
//!
//! Producers buffer re-keyed records in RAM and spill them to numbered
//! chunk files once the buffer crosses its threshold. Each producer owns
//! its chunks; a serial merge pass then folds chunk pairs together,
//! smallest first, with a streaming two-record merge until a single
//! sorted run remains. Chunk inputs are deleted only after the merged
//! output is written; on an aborted build they are left behind for
//! inspection.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{CuttleError, Result};
use crate::postings::{PostingsKey, PostingsRecord, Weight};

/// Default producer buffer threshold before a spill
pub const DEFAULT_BUFFER_BYTES: usize = 128 * 1024 * 1024;

/// One sorted run on disk, ordered smallest-first for merging
#[derive(Debug, PartialEq, Eq)]
struct Chunk {
    size: u64,
    path: PathBuf,
}

impl Ord for Chunk {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.size
            .cmp(&other.size)
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl PartialOrd for Chunk {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Coordinates producers and the merge pass for one build
pub struct ChunkHandler<P, S, W> {
    build_dir: PathBuf,
    chunks: Mutex<BinaryHeap<Reverse<Chunk>>>,
    next_producer: AtomicUsize,
    merge_seq: AtomicUsize,
    _marker: PhantomData<fn(P) -> (S, W)>,
}

impl<P, S, W> ChunkHandler<P, S, W>
where
    P: PostingsKey,
    S: PostingsKey,
    W: Weight,
{
    /// Create a handler spilling into `build_dir`
    pub fn new<Q: AsRef<Path>>(build_dir: Q) -> Result<Self> {
        let build_dir = build_dir.as_ref().to_path_buf();
        fs::create_dir_all(&build_dir)?;
        Ok(Self {
            build_dir,
            chunks: Mutex::new(BinaryHeap::new()),
            next_producer: AtomicUsize::new(0),
            merge_seq: AtomicUsize::new(0),
            _marker: PhantomData,
        })
    }

    /// A producer with its own buffer and chunk-file namespace
    pub fn make_producer(&self, max_buffer_bytes: usize) -> ChunkProducer<'_, P, S, W> {
        ChunkProducer {
            handler: self,
            id: self.next_producer.fetch_add(1, Ordering::Relaxed),
            seq: 0,
            buffer: BTreeMap::new(),
            bytes_pending: 0,
            max_buffer_bytes,
            finished: false,
        }
    }

    fn register(&self, path: PathBuf, size: u64) {
        self.chunks.lock().push(Reverse(Chunk { size, path }));
    }

    /// Fold chunk pairs until one sorted run remains and return its path;
    /// `None` when no producer spilled anything
    pub fn merge_chunks(&self) -> Result<Option<PathBuf>> {
        loop {
            let (left, right) = {
                let mut chunks = self.chunks.lock();
                if chunks.len() < 2 {
                    break;
                }
                let left = chunks.pop().map(|Reverse(c)| c);
                let right = chunks.pop().map(|Reverse(c)| c);
                match (left, right) {
                    (Some(left), Some(right)) => (left, right),
                    _ => break,
                }
            };

            debug!(
                left = %left.path.display(),
                right = %right.path.display(),
                "merging chunk pair"
            );
            let merged = self.merge_pair(&left, &right)?;
            fs::remove_file(&left.path)?;
            fs::remove_file(&right.path)?;
            self.chunks.lock().push(Reverse(merged));
        }

        Ok(self.chunks.lock().pop().map(|Reverse(c)| c.path))
    }

    /// Streaming two-way merge; memory footprint is two records
    fn merge_pair(&self, left: &Chunk, right: &Chunk) -> Result<Chunk> {
        let seq = self.merge_seq.fetch_add(1, Ordering::Relaxed);
        let path = self.build_dir.join(format!("chunk-m-{}", seq));
        let mut out = BufWriter::new(File::create(&path)?);
        let mut size = 0u64;

        let mut lhs = BufReader::new(File::open(&left.path)?);
        let mut rhs = BufReader::new(File::open(&right.path)?);

        let mut l_rec = PostingsRecord::<P, S, W>::new(P::from_u64(0));
        let mut r_rec = PostingsRecord::<P, S, W>::new(P::from_u64(0));
        let mut l_live = l_rec.read_packed(&mut lhs)? != 0;
        let mut r_live = r_rec.read_packed(&mut rhs)? != 0;

        while l_live && r_live {
            match l_rec
                .primary_key()
                .to_u64()
                .cmp(&r_rec.primary_key().to_u64())
            {
                std::cmp::Ordering::Less => {
                    size += l_rec.write_packed(&mut out)? as u64;
                    l_live = l_rec.read_packed(&mut lhs)? != 0;
                }
                std::cmp::Ordering::Greater => {
                    size += r_rec.write_packed(&mut out)? as u64;
                    r_live = r_rec.read_packed(&mut rhs)? != 0;
                }
                std::cmp::Ordering::Equal => {
                    let other =
                        mem::replace(&mut r_rec, PostingsRecord::new(P::from_u64(0)));
                    l_rec.merge_with(other);
                    size += l_rec.write_packed(&mut out)? as u64;
                    l_live = l_rec.read_packed(&mut lhs)? != 0;
                    r_live = r_rec.read_packed(&mut rhs)? != 0;
                }
            }
        }

        while l_live {
            size += l_rec.write_packed(&mut out)? as u64;
            l_live = l_rec.read_packed(&mut lhs)? != 0;
        }
        while r_live {
            size += r_rec.write_packed(&mut out)? as u64;
            r_live = r_rec.read_packed(&mut rhs)? != 0;
        }

        out.flush()?;
        Ok(Chunk { size, path })
    }
}

/// Buffers transposed records for one worker and spills sorted chunks
pub struct ChunkProducer<'a, P, S, W>
where
    P: PostingsKey,
    S: PostingsKey,
    W: Weight,
{
    handler: &'a ChunkHandler<P, S, W>,
    id: usize,
    seq: usize,
    buffer: BTreeMap<u64, PostingsRecord<P, S, W>>,
    bytes_pending: usize,
    max_buffer_bytes: usize,
    finished: bool,
}

impl<'a, P, S, W> ChunkProducer<'a, P, S, W>
where
    P: PostingsKey,
    S: PostingsKey,
    W: Weight,
{
    /// Re-key one source record: every `(primary, weight)` pair lands in
    /// the buffered record for `primary`, listed under `secondary`
    pub fn produce<I>(&mut self, secondary: S, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (P, W)>,
    {
        let pair_footprint = mem::size_of::<(S, W)>() + mem::size_of::<u64>();
        for (primary, weight) in pairs {
            self.buffer
                .entry(primary.to_u64())
                .or_insert_with(|| PostingsRecord::new(primary))
                .increase_count(secondary, weight);
            self.bytes_pending += pair_footprint;
        }

        if self.bytes_pending >= self.max_buffer_bytes {
            self.spill()?;
        }
        Ok(())
    }

    fn spill(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let path = self
            .handler
            .build_dir
            .join(format!("chunk-{}-{}", self.id, self.seq));
        self.seq += 1;

        let mut out = BufWriter::new(File::create(&path)?);
        let mut size = 0u64;
        for record in self.buffer.values() {
            size += record.write_packed(&mut out)? as u64;
        }
        out.flush()?;

        debug!(chunk = %path.display(), records = self.buffer.len(), "spilled chunk");
        self.handler.register(path, size);
        self.buffer.clear();
        self.bytes_pending = 0;
        Ok(())
    }

    /// Spill whatever remains buffered
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        self.spill()
    }
}

impl<'a, P, S, W> Drop for ChunkProducer<'a, P, S, W>
where
    P: PostingsKey,
    S: PostingsKey,
    W: Weight,
{
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.spill() {
                warn!(producer = self.id, error = %e, "final chunk spill failed");
            }
        }
    }
}
