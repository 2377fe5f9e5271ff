//! Corpus statistics backing ranker normalization
//!
//! Per document: length (token count) and unique-term count. Corpus-wide:
//! document count, total token count, and cached average document length.
//! Persisted as a bincode sidecar next to the postings pair.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CuttleError, Result};
use crate::postings::DocId;

/// Document-level and corpus-level counts gathered during a build
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CorpusStatistics {
    total_terms: u64,
    doc_lengths: Vec<u64>,
    doc_unique_terms: Vec<u64>,
    avg_dl: f64,
}

impl CorpusStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            total_terms: 0,
            doc_lengths: Vec::with_capacity(capacity),
            doc_unique_terms: Vec::with_capacity(capacity),
            avg_dl: 0.0,
        }
    }

    /// Record one document, assigning it the next dense id
    pub fn add_document(&mut self, length: u64, unique_terms: u64) -> DocId {
        let d_id = DocId(self.doc_lengths.len() as u64);
        self.doc_lengths.push(length);
        self.doc_unique_terms.push(unique_terms);
        self.total_terms += length;
        self.update_avg_dl();
        d_id
    }

    pub fn num_docs(&self) -> u64 {
        self.doc_lengths.len() as u64
    }

    /// Total token count across the corpus
    pub fn total_terms(&self) -> u64 {
        self.total_terms
    }

    pub fn doc_size(&self, d_id: DocId) -> Option<u64> {
        self.doc_lengths.get(d_id.as_usize()).copied()
    }

    pub fn doc_unique_terms(&self, d_id: DocId) -> Option<u64> {
        self.doc_unique_terms.get(d_id.as_usize()).copied()
    }

    pub fn avg_dl(&self) -> f64 {
        self.avg_dl
    }

    fn update_avg_dl(&mut self) {
        let docs = self.doc_lengths.len();
        self.avg_dl = if docs > 0 {
            self.total_terms as f64 / docs as f64
        } else {
            0.0
        };
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let out = BufWriter::new(File::create(path.as_ref())?);
        bincode::serialize_into(out, self)
            .map_err(|e| CuttleError::Corrupt(format!("cannot write corpus statistics: {}", e)))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let input = BufReader::new(File::open(path.as_ref())?);
        bincode::deserialize_from(input)
            .map_err(|e| CuttleError::Corrupt(format!("cannot read corpus statistics: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_document_accounting() {
        let mut stats = CorpusStatistics::new();
        let d0 = stats.add_document(100, 30);
        let d1 = stats.add_document(200, 50);
        let d2 = stats.add_document(150, 40);

        assert_eq!(d0, DocId(0));
        assert_eq!(d2, DocId(2));
        assert_eq!(stats.num_docs(), 3);
        assert_eq!(stats.total_terms(), 450);
        assert!((stats.avg_dl() - 150.0).abs() < 1e-9);
        assert_eq!(stats.doc_size(DocId(1)), Some(200));
        assert_eq!(stats.doc_unique_terms(DocId(1)), Some(50));
        assert_eq!(stats.doc_size(DocId(3)), None);
    }

    #[test]
    fn test_empty_corpus() {
        let stats = CorpusStatistics::new();
        assert_eq!(stats.num_docs(), 0);
        assert_eq!(stats.avg_dl(), 0.0);
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("corpus.stats");

        let mut stats = CorpusStatistics::new();
        stats.add_document(10, 4);
        stats.add_document(30, 9);
        stats.save(&path).unwrap();

        let loaded = CorpusStatistics::load(&path).unwrap();
        assert_eq!(loaded.num_docs(), 2);
        assert_eq!(loaded.total_terms(), 40);
        assert_eq!(loaded.doc_unique_terms(DocId(1)), Some(9));
        assert!((loaded.avg_dl() - 20.0).abs() < 1e-9);
    }
}
