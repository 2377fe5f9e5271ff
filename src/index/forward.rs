//! Forward index: doc -> (term, feature value) postings
//!
//! Two build paths produce the same sealed artifacts. When the corpus is
//! already a libsvm-formatted file, records are written straight from the
//! parsed lines. Otherwise an inverted index is transposed through the
//! external-sort chunk pipeline and the surviving run is compressed into
//! the final postings pair, filling document-id gaps so the offset table
//! stays dense.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crossbeam::channel;
use tracing::info;

use crate::config::Config;
use crate::error::{CuttleError, Result};
use crate::index::chunk::{ChunkHandler, DEFAULT_BUFFER_BYTES};
use crate::index::inverted::{
    self, InvertedIndex, LABELS_FILE, POSTINGS_STEM, STATS_FILE, UNIQUE_TERMS_FILE,
};
use crate::index::libsvm;
use crate::index::statistics::CorpusStatistics;
use crate::postings::{
    DocId, PostingsFile, PostingsFileWriter, PostingsRecord, PostingsStream, TermId,
};

/// Record flavor stored by the forward index
pub type ForwardRecord = PostingsRecord<DocId, TermId, f64>;

/// Number of uninversion producer threads
const UNINVERT_PRODUCERS: usize = 4;

/// Sealed, read-only forward index
pub struct ForwardIndex {
    dir: PathBuf,
    postings: PostingsFile<DocId, TermId, f64>,
    stats: CorpusStatistics,
    labels: Vec<String>,
    total_unique_terms: u64,
}

impl ForwardIndex {
    /// Build (or reuse) the forward index named by the configuration.
    ///
    /// With `analyzers[0].method == "libsvm"` the corpus file at
    /// `<prefix>/<dataset>/<dataset>.dat` is ingested directly. A valid
    /// existing index is reused; an invalidated one is rebuilt.
    pub fn create(config: &Config) -> Result<Self> {
        let dir = PathBuf::from(config.require_as::<String>("forward-index")?);

        if Self::valid(&dir) {
            info!(index = %dir.display(), "reusing existing forward index");
            return Self::open(&dir);
        }

        if !is_libsvm_format(config)? {
            return Err(CuttleError::Config(
                "analyzers[0].method must be \"libsvm\" to ingest directly; \
                 uninvert an inverted index instead"
                    .to_string(),
            ));
        }

        let prefix = config.require_as::<String>("prefix")?;
        let dataset = config.require_as::<String>("dataset")?;
        let corpus = PathBuf::from(prefix).join(&dataset).join(format!("{}.dat", dataset));

        fs::create_dir_all(&dir)?;
        info!(index = %dir.display(), corpus = %corpus.display(), "creating forward index from libsvm data");
        create_libsvm_postings(&corpus, &dir)?;
        Self::open(&dir)
    }

    /// Transpose `inv` into a forward index sealed under `dir`
    pub fn uninvert<P: AsRef<Path>>(inv: &InvertedIndex, dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        info!(index = %dir.display(), "creating forward index by uninverting");

        let chunk_dir = dir.join("chunks");
        let handler: ChunkHandler<DocId, TermId, f64> = ChunkHandler::new(&chunk_dir)?;

        std::thread::scope(|scope| -> Result<()> {
            let (tx, rx) = channel::bounded::<crate::index::inverted::InvertedRecord>(
                UNINVERT_PRODUCERS * 2,
            );

            let mut workers = Vec::with_capacity(UNINVERT_PRODUCERS);
            for _ in 0..UNINVERT_PRODUCERS {
                let rx = rx.clone();
                let handler = &handler;
                workers.push(scope.spawn(move || -> Result<()> {
                    let mut producer = handler.make_producer(DEFAULT_BUFFER_BYTES);
                    while let Ok(record) = rx.recv() {
                        let term = record.primary_key();
                        producer.produce(
                            term,
                            record.counts().iter().map(|&(d, c)| (d, c as f64)),
                        )?;
                    }
                    producer.finish()
                }));
            }
            drop(rx);

            let mut feed_error = None;
            for term in 0..inv.unique_terms() {
                let record = inv.search_primary(TermId(term))?;
                if record.counts().is_empty() {
                    continue;
                }
                if tx.send(record).is_err() {
                    // a producer died; its join below reports why
                    feed_error = Some(CuttleError::Corrupt(
                        "uninversion producer exited early".to_string(),
                    ));
                    break;
                }
            }
            drop(tx);

            for worker in workers {
                match worker.join() {
                    Ok(result) => result?,
                    Err(_) => {
                        return Err(CuttleError::Corrupt(
                            "uninversion producer panicked".to_string(),
                        ))
                    }
                }
            }
            match feed_error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })?;

        let stem = dir.join(POSTINGS_STEM);
        match handler.merge_chunks()? {
            Some(survivor) => {
                compress(&survivor, &stem, inv.num_docs())?;
                fs::remove_file(&survivor)?;
            }
            None => {
                // no postings at all; still seal an index of empty records
                PostingsFileWriter::<f64>::new(&stem, inv.num_docs())?.finish()?;
            }
        }
        fs::remove_dir_all(&chunk_dir)?;

        copy_uninverted_metadata(inv.index_dir(), dir)?;
        inverted::write_unique_terms(dir, inv.unique_terms())?;

        info!(index = %dir.display(), docs = inv.num_docs(), "forward index sealed");
        Self::open(dir)
    }

    /// Open a previously sealed index
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !Self::valid(dir) {
            return Err(CuttleError::Corrupt(format!(
                "{} does not hold a complete forward index",
                dir.display()
            )));
        }

        Ok(Self {
            postings: PostingsFile::open(dir.join(POSTINGS_STEM))?,
            stats: CorpusStatistics::load(dir.join(STATS_FILE))?,
            labels: inverted::read_labels(dir)?,
            total_unique_terms: inverted::read_unique_terms(dir)?,
            dir: dir.to_path_buf(),
        })
    }

    /// Whether `dir` holds every artifact of a sealed index
    pub fn valid(dir: &Path) -> bool {
        inverted::index_files_present(dir) && dir.join(LABELS_FILE).exists()
    }

    /// Drop the sentinel so the next [`create`](Self::create) rebuilds
    pub fn invalidate(dir: &Path) -> Result<()> {
        let sentinel = dir.join(UNIQUE_TERMS_FILE);
        if sentinel.exists() {
            fs::remove_file(sentinel)?;
        }
        Ok(())
    }

    pub fn index_dir(&self) -> &Path {
        &self.dir
    }

    pub fn num_docs(&self) -> u64 {
        self.stats.num_docs()
    }

    pub fn unique_terms(&self) -> u64 {
        self.total_unique_terms
    }

    pub fn doc_size(&self, d_id: DocId) -> Option<u64> {
        self.stats.doc_size(d_id)
    }

    pub fn label(&self, d_id: DocId) -> Option<&str> {
        self.labels.get(d_id.as_usize()).map(String::as_str)
    }

    /// Materialized feature record for `d_id`
    pub fn search_primary(&self, d_id: DocId) -> Result<ForwardRecord> {
        self.postings.find(d_id)
    }

    /// Lazy feature stream for `d_id`
    pub fn stream_for(&self, d_id: DocId) -> Option<PostingsStream<'_, TermId, f64>> {
        self.postings.find_stream(d_id)
    }

    /// One liblinear-formatted line for `d_id`: the label followed by
    /// 1-based `feature:value` pairs
    pub fn liblinear_data(&self, d_id: DocId) -> Result<String> {
        if d_id.as_u64() >= self.num_docs() {
            return Err(CuttleError::OutOfRange(d_id.as_u64()));
        }

        let record = self.search_primary(d_id)?;
        let label = self.label(d_id).unwrap_or_default();
        let mut line = label.to_string();
        for &(term, value) in record.counts() {
            line.push_str(&format!(" {}:{}", term.as_u64() + 1, value));
        }
        Ok(line)
    }
}

/// Ingest a libsvm corpus file straight into sealed forward postings
fn create_libsvm_postings(corpus: &Path, dir: &Path) -> Result<()> {
    // the writer needs the document count up front, so count lines first
    let num_docs = BufReader::new(File::open(corpus)?).lines().count() as u64;

    let stem = dir.join(POSTINGS_STEM);
    let mut writer = PostingsFileWriter::<f64>::new(&stem, num_docs)?;
    let mut stats = CorpusStatistics::with_capacity(num_docs as usize);
    let mut labels = Vec::with_capacity(num_docs as usize);
    let mut max_term_id = None::<u64>;

    for (line_no, line) in BufReader::new(File::open(corpus)?).lines().enumerate() {
        let line = line?;
        labels.push(libsvm::label(&line)?.to_string());
        let counts = libsvm::counts(&line)?;

        let length: f64 = counts.iter().map(|&(_, v)| v).sum();
        let d_id = stats.add_document(length as u64, counts.len() as u64);
        debug_assert_eq!(d_id.as_usize(), line_no);

        for &(term, _) in &counts {
            max_term_id = Some(max_term_id.map_or(term.as_u64(), |m| m.max(term.as_u64())));
        }

        let mut record = ForwardRecord::new(d_id);
        record.set_counts(counts);
        writer.write(&record)?;
    }
    writer.finish()?;

    stats.save(dir.join(STATS_FILE))?;
    inverted::write_labels(dir, &labels)?;
    // ids are 0-based, so the term count is one past the largest seen
    inverted::write_unique_terms(dir, max_term_id.map_or(0, |m| m + 1))?;

    info!(
        postings = %stem.display(),
        bytes = fs::metadata(&stem)?.len(),
        "created compressed postings file"
    );
    Ok(())
}

/// Rewrite the surviving chunk as the final postings pair, letting the
/// writer pad document-id gaps with empty records
fn compress(chunk: &Path, stem: &Path, num_docs: u64) -> Result<()> {
    let mut writer = PostingsFileWriter::<f64>::new(stem, num_docs)?;
    let mut input = BufReader::new(File::open(chunk)?);
    let mut record = ForwardRecord::new(DocId(0));
    while record.read_packed(&mut input)? != 0 {
        writer.write(&record)?;
    }
    writer.finish()?;

    info!(
        postings = %stem.display(),
        bytes = fs::metadata(stem)?.len(),
        "created compressed postings file"
    );
    Ok(())
}

/// Carry the label and statistics sidecars over from the inverted index
fn copy_uninverted_metadata(from: &Path, to: &Path) -> Result<()> {
    for file in [STATS_FILE, LABELS_FILE] {
        fs::copy(from.join(file), to.join(file))?;
    }
    Ok(())
}

/// Whether the configuration selects the direct libsvm ingest path
pub fn is_libsvm_format(config: &Config) -> Result<bool> {
    let analyzers = config
        .get_table_array("analyzers")
        .ok_or_else(|| CuttleError::Config("analyzers".to_string()))?;
    if analyzers.len() != 1 {
        return Ok(false);
    }
    let method: String = analyzers[0].require_as("method")?;
    Ok(method == "libsvm")
}
