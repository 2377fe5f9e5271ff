//! Line parser for libsvm-formatted corpora
//!
//! One document per line: a label token followed by `feature:value`
//! pairs. Feature ids are 1-based on the wire and converted to 0-based
//! here; duplicate ids within a line sum their values.

use crate::error::{CuttleError, Result};
use crate::postings::TermId;

/// The label token of a libsvm line
pub fn label(line: &str) -> Result<&str> {
    line.split_whitespace()
        .next()
        .ok_or_else(|| CuttleError::Parse("empty line".to_string()))
}

/// The `(term, value)` pairs of a libsvm line, 0-based and coalesced
pub fn counts(line: &str) -> Result<Vec<(TermId, f64)>> {
    let mut pairs = Vec::new();
    for token in line.split_whitespace().skip(1) {
        let (id, value) = token
            .split_once(':')
            .ok_or_else(|| CuttleError::Parse(format!("expected feature:value, got '{}'", token)))?;

        let id: u64 = id
            .parse()
            .map_err(|_| CuttleError::Parse(format!("invalid feature id '{}'", id)))?;
        if id == 0 {
            return Err(CuttleError::Parse(
                "feature ids are 1-based; got 0".to_string(),
            ));
        }

        let value: f64 = value
            .parse()
            .map_err(|_| CuttleError::Parse(format!("invalid feature value '{}'", value)))?;
        if !value.is_finite() || value < 0.0 {
            return Err(CuttleError::Parse(format!(
                "feature value {} is not a finite non-negative number",
                value
            )));
        }

        pairs.push((TermId(id - 1), value));
    }

    pairs.sort_unstable_by_key(|&(id, _)| id);
    pairs.dedup_by(|curr, prev| {
        if prev.0 == curr.0 {
            prev.1 += curr.1;
            true
        } else {
            false
        }
    });
    Ok(pairs)
}
