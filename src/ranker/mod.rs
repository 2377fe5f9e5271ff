//! Query-time scoring over inverted postings
//!
//! For each query term the kernel walks the term's postings stream,
//! accumulating per-document partial scores in a sparse map; once every
//! term is consumed, a bounded min-heap keeps the top-k documents. The
//! ranker itself is a tagged enum: language-model variants share the
//! smoothing hooks in [`lm`], the vector-space variants carry their own
//! closed-form formulas.

mod lm;

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use crate::config::Config;
use crate::error::{CuttleError, Result};
use crate::index::InvertedIndex;
use crate::postings::{DocId, TermId};

/// Everything a ranker may inspect while scoring one (term, document)
/// match
#[derive(Clone, Copy, Debug)]
pub struct ScoreData {
    pub d_id: DocId,
    pub t_id: TermId,
    /// Term frequency in the current document
    pub doc_term_count: f64,
    /// Document length in tokens
    pub doc_size: f64,
    /// Distinct terms in the current document
    pub doc_unique_terms: f64,
    /// Average document length across the corpus
    pub avg_dl: f64,
    /// Total number of documents
    pub num_docs: u64,
    /// Document frequency of the current term
    pub doc_count: u64,
    /// Corpus-wide occurrence count of the current term
    pub corpus_term_count: f64,
    /// Corpus token count
    pub total_terms: f64,
    /// Weight of the current term in the query
    pub query_term_weight: f64,
    /// Sum of all query term weights
    pub query_length: f64,
}

/// A scored document
#[derive(Clone, Copy, Debug)]
pub struct SearchResult {
    pub d_id: DocId,
    pub score: f32,
}

impl PartialEq for SearchResult {
    fn eq(&self, other: &Self) -> bool {
        self.d_id == other.d_id
    }
}

impl Eq for SearchResult {}

impl PartialOrd for SearchResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchResult {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed on score so the heap root is the weakest candidate
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.d_id.cmp(&other.d_id))
    }
}

/// Bounded min-heap keeping the k best candidates seen so far
struct TopKCollector {
    heap: BinaryHeap<SearchResult>,
    k: usize,
}

impl TopKCollector {
    fn new(k: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(k + 1),
            k,
        }
    }

    fn collect(&mut self, result: SearchResult) {
        if self.heap.len() < self.k {
            self.heap.push(result);
        } else if let Some(weakest) = self.heap.peek() {
            if result.score > weakest.score {
                self.heap.pop();
                self.heap.push(result);
            }
        }
    }

    fn into_sorted_results(self) -> Vec<SearchResult> {
        let mut results = self.heap.into_vec();
        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.d_id.cmp(&b.d_id))
        });
        results
    }
}

/// Scoring function selected for a query session
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Ranker {
    /// Absolute-discount language model, `delta` in (0, 1]
    AbsoluteDiscount { delta: f32 },
    /// Dirichlet-prior language model with pseudo-count mass `mu`
    DirichletPrior { mu: f32 },
    /// Jelinek-Mercer interpolated language model, weight `lambda`
    JelinekMercer { lambda: f32 },
    /// Pivoted document-length normalization, slope `s`
    PivotedLength { s: f32 },
    /// Okapi BM25 with saturation `k1`, length slope `b`, query
    /// saturation `k3`
    OkapiBm25 { k1: f32, b: f32, k3: f32 },
}

impl Ranker {
    /// Select a ranker from the `ranker` configuration table; absent
    /// parameters take the conventional defaults
    pub fn from_config(config: &Config) -> Result<Self> {
        let table = config
            .get_table("ranker")
            .ok_or_else(|| CuttleError::Config("ranker".to_string()))?;
        let method: String = table.require_as("method")?;

        match method.as_str() {
            "absolute-discount" => Ok(Ranker::AbsoluteDiscount {
                delta: table.get_as("delta").unwrap_or(0.7),
            }),
            "dirichlet-prior" => Ok(Ranker::DirichletPrior {
                mu: table.get_as("mu").unwrap_or(2000.0),
            }),
            "jelinek-mercer" => Ok(Ranker::JelinekMercer {
                lambda: table.get_as("lambda").unwrap_or(0.7),
            }),
            "pivoted-length" => Ok(Ranker::PivotedLength {
                s: table.get_as("s").unwrap_or(0.2),
            }),
            "bm25" => Ok(Ranker::OkapiBm25 {
                k1: table.get_as("k1").unwrap_or(1.2),
                b: table.get_as("b").unwrap_or(0.75),
                k3: table.get_as("k3").unwrap_or(500.0),
            }),
            other => Err(CuttleError::Config(format!(
                "unknown ranker method '{}'",
                other
            ))),
        }
    }

    /// Contribution of one (term, document) match
    pub fn score_one(&self, sd: &ScoreData) -> f32 {
        match *self {
            Ranker::AbsoluteDiscount { delta } => {
                lm::score_one(&lm::AbsoluteDiscount { delta }, sd)
            }
            Ranker::DirichletPrior { mu } => lm::score_one(&lm::DirichletPrior { mu }, sd),
            Ranker::JelinekMercer { lambda } => {
                lm::score_one(&lm::JelinekMercer { lambda }, sd)
            }
            Ranker::PivotedLength { s } => pivoted_length(s, sd),
            Ranker::OkapiBm25 { k1, b, k3 } => okapi_bm25(k1, b, k3, sd),
        }
    }

    /// Per-document constant applied once per candidate; zero for the
    /// vector-space rankers
    fn initial_score(&self, sd: &ScoreData) -> f32 {
        match *self {
            Ranker::AbsoluteDiscount { delta } => {
                lm::initial_score(&lm::AbsoluteDiscount { delta }, sd)
            }
            Ranker::DirichletPrior { mu } => lm::initial_score(&lm::DirichletPrior { mu }, sd),
            Ranker::JelinekMercer { lambda } => {
                lm::initial_score(&lm::JelinekMercer { lambda }, sd)
            }
            Ranker::PivotedLength { .. } | Ranker::OkapiBm25 { .. } => 0.0,
        }
    }

    /// Score every document matching the weighted query and return the
    /// top `k`, best first
    pub fn score(
        &self,
        index: &InvertedIndex,
        query: &[(TermId, f64)],
        k: usize,
    ) -> Vec<SearchResult> {
        let query_length: f64 = query.iter().map(|&(_, w)| w).sum();
        let mut accumulator: FxHashMap<DocId, f32> = FxHashMap::default();

        for &(t_id, query_term_weight) in query {
            let Some(stream) = index.stream_for(t_id) else {
                continue;
            };
            let doc_count = stream.size();
            if doc_count == 0 {
                continue;
            }
            let corpus_term_count = stream.total_counts() as f64;

            for (d_id, count) in stream {
                let sd = ScoreData {
                    d_id,
                    t_id,
                    doc_term_count: count as f64,
                    doc_size: index.doc_size(d_id).unwrap_or(0) as f64,
                    doc_unique_terms: index.doc_unique_terms(d_id).unwrap_or(0) as f64,
                    avg_dl: index.avg_dl(),
                    num_docs: index.num_docs(),
                    doc_count,
                    corpus_term_count,
                    total_terms: index.total_terms() as f64,
                    query_term_weight,
                    query_length,
                };
                *accumulator.entry(d_id).or_insert(0.0) += self.score_one(&sd);
            }
        }

        let mut collector = TopKCollector::new(k);
        for (d_id, partial) in accumulator {
            let sd = ScoreData {
                d_id,
                t_id: TermId(0),
                doc_term_count: 0.0,
                doc_size: index.doc_size(d_id).unwrap_or(0) as f64,
                doc_unique_terms: index.doc_unique_terms(d_id).unwrap_or(0) as f64,
                avg_dl: index.avg_dl(),
                num_docs: index.num_docs(),
                doc_count: 0,
                corpus_term_count: 0.0,
                total_terms: index.total_terms() as f64,
                query_term_weight: 0.0,
                query_length,
            };
            collector.collect(SearchResult {
                d_id,
                score: partial + self.initial_score(&sd),
            });
        }
        collector.into_sorted_results()
    }
}

/// Pivoted-length normalization (Singhal et al.)
fn pivoted_length(s: f32, sd: &ScoreData) -> f32 {
    let tf = 1.0 + (1.0 + (sd.doc_term_count as f32).ln()).ln();
    let norm = (1.0 - s) + s * (sd.doc_size as f32 / sd.avg_dl as f32);
    let idf = ((sd.num_docs as f32 + 1.0) / (0.5 + sd.doc_count as f32)).ln();
    tf / norm * sd.query_term_weight as f32 * idf
}

/// Okapi BM25 with query-term saturation
fn okapi_bm25(k1: f32, b: f32, k3: f32, sd: &ScoreData) -> f32 {
    let doc_len = sd.doc_size as f32;
    // the +1 keeps the IDF positive for very common terms
    let idf = (1.0
        + (sd.num_docs as f32 - sd.doc_count as f32 + 0.5) / (sd.doc_count as f32 + 0.5))
        .ln();

    let tf_doc = sd.doc_term_count as f32;
    let tf = ((k1 + 1.0) * tf_doc)
        / (k1 * ((1.0 - b) + b * doc_len / sd.avg_dl as f32) + tf_doc);

    let qtw = sd.query_term_weight as f32;
    let qtf = ((k3 + 1.0) * qtw) / (k3 + qtw);

    tf * idf * qtf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Document;
    use serde_json::json;
    use tempfile::TempDir;

    fn sd(doc_term_count: f64, doc_size: f64) -> ScoreData {
        ScoreData {
            d_id: DocId(0),
            t_id: TermId(0),
            doc_term_count,
            doc_size,
            doc_unique_terms: 20.0,
            avg_dl: 80.0,
            num_docs: 1000,
            doc_count: 50,
            corpus_term_count: 200.0,
            total_terms: 80_000.0,
            query_term_weight: 1.0,
            query_length: 1.0,
        }
    }

    #[test]
    fn test_pivoted_length_reference_score() {
        let ranker = Ranker::PivotedLength { s: 0.2 };
        let score = ranker.score_one(&sd(3.0, 100.0));

        // TF = 1 + ln(1 + ln 3); norm = 0.8 + 0.2 * 100/80;
        // IDF = ln(1001 / 50.5)
        let tf = 1.0 + (1.0 + 3.0f64.ln()).ln();
        let norm = 0.8 + 0.2 * (100.0 / 80.0);
        let idf = (1001.0 / 50.5f64).ln();
        let expected = (tf / norm * idf) as f32;

        assert!((score - expected).abs() < 1e-3);
    }

    #[test]
    fn test_bm25_monotone_in_tf_and_rarity() {
        let ranker = Ranker::OkapiBm25 {
            k1: 1.2,
            b: 0.75,
            k3: 500.0,
        };

        let low_tf = ranker.score_one(&sd(1.0, 100.0));
        let high_tf = ranker.score_one(&sd(5.0, 100.0));
        assert!(high_tf > low_tf);

        let mut rare = sd(3.0, 100.0);
        rare.doc_count = 5;
        let common = ranker.score_one(&sd(3.0, 100.0));
        assert!(ranker.score_one(&rare) > common);
    }

    #[test]
    fn test_longer_documents_normalized_down() {
        for ranker in [
            Ranker::PivotedLength { s: 0.2 },
            Ranker::OkapiBm25 {
                k1: 1.2,
                b: 0.75,
                k3: 500.0,
            },
        ] {
            let short = ranker.score_one(&sd(3.0, 40.0));
            let long = ranker.score_one(&sd(3.0, 400.0));
            assert!(short > long, "{:?}", ranker);
        }
    }

    #[test]
    fn test_factory_methods_and_defaults() {
        let config = Config::from_value(json!({
            "ranker": {"method": "dirichlet-prior"}
        }))
        .unwrap();
        assert_eq!(
            Ranker::from_config(&config).unwrap(),
            Ranker::DirichletPrior { mu: 2000.0 }
        );

        let config = Config::from_value(json!({
            "ranker": {"method": "bm25", "k1": 0.9}
        }))
        .unwrap();
        assert_eq!(
            Ranker::from_config(&config).unwrap(),
            Ranker::OkapiBm25 {
                k1: 0.9,
                b: 0.75,
                k3: 500.0
            }
        );

        let config = Config::from_value(json!({
            "ranker": {"method": "rocchio"}
        }))
        .unwrap();
        assert!(matches!(
            Ranker::from_config(&config),
            Err(CuttleError::Config(_))
        ));

        let config = Config::from_value(json!({})).unwrap();
        assert!(Ranker::from_config(&config).is_err());
    }

    fn doc(counts: &[(u64, u64)]) -> Document {
        Document {
            label: "+1".to_string(),
            counts: counts.iter().map(|&(t, c)| (TermId(t), c)).collect(),
        }
    }

    fn small_index(tmp: &TempDir) -> InvertedIndex {
        InvertedIndex::create(
            tmp.path(),
            vec![
                doc(&[(0, 5), (1, 1)]),   // heavy on term 0
                doc(&[(1, 6)]),           // term 1 only
                doc(&[(0, 1), (2, 2)]),   // light on term 0
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_score_ranks_matching_docs_first() {
        let tmp = TempDir::new().unwrap();
        let index = small_index(&tmp);

        for ranker in [
            Ranker::PivotedLength { s: 0.2 },
            Ranker::OkapiBm25 {
                k1: 1.2,
                b: 0.75,
                k3: 500.0,
            },
            Ranker::DirichletPrior { mu: 10.0 },
            Ranker::JelinekMercer { lambda: 0.7 },
            Ranker::AbsoluteDiscount { delta: 0.7 },
        ] {
            let results = ranker.score(&index, &[(TermId(0), 1.0)], 10);
            // only docs containing term 0 are candidates
            let ids: Vec<_> = results.iter().map(|r| r.d_id).collect();
            assert_eq!(ids.len(), 2, "{:?}", ranker);
            assert_eq!(ids[0], DocId(0), "{:?}", ranker);
            assert!(ids.contains(&DocId(2)));
        }
    }

    #[test]
    fn test_top_k_bounds_results() {
        let tmp = TempDir::new().unwrap();
        let index = small_index(&tmp);
        let ranker = Ranker::OkapiBm25 {
            k1: 1.2,
            b: 0.75,
            k3: 500.0,
        };

        let results = ranker.score(&index, &[(TermId(0), 1.0), (TermId(1), 1.0)], 1);
        assert_eq!(results.len(), 1);

        let all = ranker.score(&index, &[(TermId(0), 1.0), (TermId(1), 1.0)], 10);
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(all[0].d_id, results[0].d_id);
    }

    #[test]
    fn test_unknown_query_term_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let index = small_index(&tmp);
        let ranker = Ranker::PivotedLength { s: 0.2 };

        let results = ranker.score(&index, &[(TermId(99), 1.0)], 10);
        assert!(results.is_empty());
    }
}
