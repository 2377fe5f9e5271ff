//! Inverted index: term -> (doc, count) postings
//!
//! Built in memory from a document sequence and sealed into the
//! compressed postings pair plus sidecar statistics. At query time the
//! ranker reads postings streams and corpus statistics from here.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{CuttleError, Result};
use crate::index::statistics::CorpusStatistics;
use crate::postings::{
    DocId, PostingsFile, PostingsFileWriter, PostingsRecord, PostingsStream, TermId,
};

pub(crate) const POSTINGS_STEM: &str = "postings";
pub(crate) const STATS_FILE: &str = "corpus.stats";
pub(crate) const LABELS_FILE: &str = "corpus.labels";
pub(crate) const UNIQUE_TERMS_FILE: &str = "corpus.uniqueterms";

/// A labeled document as a bag of term counts
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub label: String,
    pub counts: Vec<(TermId, u64)>,
}

/// Record flavor stored by the inverted index
pub type InvertedRecord = PostingsRecord<TermId, DocId, u64>;

/// Sealed, read-only inverted index
pub struct InvertedIndex {
    dir: PathBuf,
    postings: PostingsFile<TermId, DocId, u64>,
    stats: CorpusStatistics,
    unique_terms: u64,
}

impl InvertedIndex {
    /// Invert a document sequence and seal the result under `dir`.
    ///
    /// Documents receive dense ids in iteration order. The term-id space
    /// is taken to be `[0, max_term + 1)` so the offset table is dense.
    pub fn create<P, I>(dir: P, docs: I) -> Result<Self>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = Document>,
    {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        info!(index = %dir.display(), "creating inverted index");

        let mut inverted: BTreeMap<u64, InvertedRecord> = BTreeMap::new();
        let mut stats = CorpusStatistics::new();
        let mut labels = Vec::new();

        for document in docs {
            let d_id = stats.add_document(
                document.counts.iter().map(|&(_, c)| c).sum(),
                document.counts.len() as u64,
            );
            labels.push(document.label);

            for (term, count) in document.counts {
                // doc ids arrive in ascending order, so this appends
                inverted
                    .entry(term.as_u64())
                    .or_insert_with(|| InvertedRecord::new(term))
                    .increase_count(d_id, count);
            }
        }

        let unique_terms = inverted
            .keys()
            .next_back()
            .map(|&term| term + 1)
            .unwrap_or(0);

        let stem = dir.join(POSTINGS_STEM);
        let mut writer = PostingsFileWriter::<u64>::new(&stem, unique_terms)?;
        for record in inverted.values() {
            writer.write(record)?;
        }
        writer.finish()?;

        stats.save(dir.join(STATS_FILE))?;
        write_labels(dir, &labels)?;
        write_unique_terms(dir, unique_terms)?;

        info!(
            index = %dir.display(),
            docs = stats.num_docs(),
            terms = unique_terms,
            "inverted index sealed"
        );
        Self::open(dir)
    }

    /// Open a previously sealed index
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !Self::valid(dir) {
            return Err(CuttleError::Corrupt(format!(
                "{} does not hold a complete inverted index",
                dir.display()
            )));
        }

        let unique_terms = read_unique_terms(dir)?;
        Ok(Self {
            postings: PostingsFile::open(dir.join(POSTINGS_STEM))?,
            stats: CorpusStatistics::load(dir.join(STATS_FILE))?,
            unique_terms,
            dir: dir.to_path_buf(),
        })
    }

    /// Whether `dir` holds every artifact of a sealed index
    pub fn valid(dir: &Path) -> bool {
        index_files_present(dir)
    }

    pub fn index_dir(&self) -> &Path {
        &self.dir
    }

    pub fn num_docs(&self) -> u64 {
        self.stats.num_docs()
    }

    pub fn unique_terms(&self) -> u64 {
        self.unique_terms
    }

    /// Corpus token count
    pub fn total_terms(&self) -> u64 {
        self.stats.total_terms()
    }

    pub fn avg_dl(&self) -> f64 {
        self.stats.avg_dl()
    }

    pub fn doc_size(&self, d_id: DocId) -> Option<u64> {
        self.stats.doc_size(d_id)
    }

    pub fn doc_unique_terms(&self, d_id: DocId) -> Option<u64> {
        self.stats.doc_unique_terms(d_id)
    }

    /// Materialized postings record for `term`
    pub fn search_primary(&self, term: TermId) -> Result<InvertedRecord> {
        self.postings.find(term)
    }

    /// Lazy postings stream for `term`
    pub fn stream_for(&self, term: TermId) -> Option<PostingsStream<'_, DocId, u64>> {
        self.postings.find_stream(term)
    }

    /// Number of documents containing `term`
    pub fn doc_freq(&self, term: TermId) -> u64 {
        self.stream_for(term).map(|s| s.size()).unwrap_or(0)
    }

    /// Corpus-wide occurrence count of `term`
    pub fn corpus_term_count(&self, term: TermId) -> u64 {
        self.stream_for(term).map(|s| s.total_counts()).unwrap_or(0)
    }
}

pub(crate) fn write_unique_terms(dir: &Path, unique_terms: u64) -> Result<()> {
    fs::write(dir.join(UNIQUE_TERMS_FILE), unique_terms.to_string())?;
    Ok(())
}

pub(crate) fn read_unique_terms(dir: &Path) -> Result<u64> {
    let raw = fs::read_to_string(dir.join(UNIQUE_TERMS_FILE))?;
    raw.trim()
        .parse()
        .map_err(|_| CuttleError::Corrupt(format!("unreadable term count '{}'", raw.trim())))
}

pub(crate) fn write_labels(dir: &Path, labels: &[String]) -> Result<()> {
    let bytes = bincode::serialize(labels)
        .map_err(|e| CuttleError::Corrupt(format!("cannot write labels: {}", e)))?;
    fs::write(dir.join(LABELS_FILE), bytes)?;
    Ok(())
}

pub(crate) fn read_labels(dir: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(dir.join(LABELS_FILE))?;
    bincode::deserialize(&bytes)
        .map_err(|e| CuttleError::Corrupt(format!("cannot read labels: {}", e)))
}

pub(crate) fn index_files_present(dir: &Path) -> bool {
    let stem = dir.join(POSTINGS_STEM);
    dir.join(UNIQUE_TERMS_FILE).exists()
        && stem.exists()
        && crate::postings::offset_table_path(&stem).exists()
        && dir.join(STATS_FILE).exists()
}
