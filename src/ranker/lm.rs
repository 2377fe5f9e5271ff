//! Smoothing shared by the language-model rankers
//!
//! Every language-model variant scores a matched term as
//! `qtw * ln(p_s(w|d) / (c_d * p(w|C)))` and adds a per-document
//! constant `|q| * ln(c_d)`, where `p_s` is the smoothed document model
//! and `c_d` the document-dependent smoothing constant. Variants differ
//! only in those two functions.

use crate::ranker::ScoreData;

/// The two hooks a language-model smoothing method provides
pub(crate) trait Smoothing {
    /// Smoothed probability of the current term under the document model
    fn smoothed_prob(&self, sd: &ScoreData) -> f32;

    /// Document-dependent smoothing constant
    fn doc_constant(&self, sd: &ScoreData) -> f32;
}

/// Per-term contribution of a language-model ranker
pub(crate) fn score_one<S: Smoothing>(smoothing: &S, sd: &ScoreData) -> f32 {
    let p_wc = (sd.corpus_term_count / sd.total_terms) as f32;
    let ratio = smoothing.smoothed_prob(sd) / (smoothing.doc_constant(sd) * p_wc);
    sd.query_term_weight as f32 * ratio.ln()
}

/// Per-document constant added once per candidate
pub(crate) fn initial_score<S: Smoothing>(smoothing: &S, sd: &ScoreData) -> f32 {
    sd.query_length as f32 * smoothing.doc_constant(sd).ln()
}

/// Absolute discounting: subtract a fixed `delta` from every observed
/// count and redistribute the mass over the corpus model
pub(crate) struct AbsoluteDiscount {
    pub delta: f32,
}

impl Smoothing for AbsoluteDiscount {
    fn smoothed_prob(&self, sd: &ScoreData) -> f32 {
        let p_wc = (sd.corpus_term_count / sd.total_terms) as f32;
        let numerator = (sd.doc_term_count as f32 - self.delta).max(0.0);
        numerator / sd.doc_size as f32 + self.doc_constant(sd) * p_wc
    }

    fn doc_constant(&self, sd: &ScoreData) -> f32 {
        self.delta * sd.doc_unique_terms as f32 / sd.doc_size as f32
    }
}

/// Dirichlet-prior smoothing with pseudo-count mass `mu`
pub(crate) struct DirichletPrior {
    pub mu: f32,
}

impl Smoothing for DirichletPrior {
    fn smoothed_prob(&self, sd: &ScoreData) -> f32 {
        let p_wc = (sd.corpus_term_count / sd.total_terms) as f32;
        (sd.doc_term_count as f32 + self.mu * p_wc) / (sd.doc_size as f32 + self.mu)
    }

    fn doc_constant(&self, sd: &ScoreData) -> f32 {
        self.mu / (sd.doc_size as f32 + self.mu)
    }
}

/// Jelinek-Mercer interpolation with fixed weight `lambda`
pub(crate) struct JelinekMercer {
    pub lambda: f32,
}

impl Smoothing for JelinekMercer {
    fn smoothed_prob(&self, sd: &ScoreData) -> f32 {
        let p_wc = (sd.corpus_term_count / sd.total_terms) as f32;
        let p_ml = sd.doc_term_count as f32 / sd.doc_size as f32;
        (1.0 - self.lambda) * p_ml + self.lambda * p_wc
    }

    fn doc_constant(&self, _sd: &ScoreData) -> f32 {
        self.lambda
    }
}
