//! End-to-end uninversion: inverted postings transposed into a forward
//! index through the chunk pipeline

use std::fs::{self, File};
use std::io::Write;

use serde_json::json;
use tempfile::TempDir;

use cuttle::{Config, DocId, Document, ForwardIndex, InvertedIndex, TermId};

fn doc(label: &str, counts: &[(u64, u64)]) -> Document {
    Document {
        label: label.to_string(),
        counts: counts.iter().map(|&(t, c)| (TermId(t), c)).collect(),
    }
}

fn sample_docs() -> Vec<Document> {
    vec![
        doc("+1", &[(0, 2), (2, 1)]),
        doc("-1", &[(1, 1)]),
        doc("+1", &[(0, 1), (1, 3), (2, 2)]),
    ]
}

#[test]
fn uninversion_transposes_every_pair() {
    let tmp = TempDir::new().unwrap();
    let inverted = InvertedIndex::create(tmp.path().join("inv"), sample_docs()).unwrap();
    let forward = ForwardIndex::uninvert(&inverted, tmp.path().join("fwd")).unwrap();

    assert_eq!(forward.num_docs(), 3);
    assert_eq!(forward.unique_terms(), 3);

    // (term, doc, c) in the inverted index iff (doc, term, c) forward
    for term in 0..inverted.unique_terms() {
        let record = inverted.search_primary(TermId(term)).unwrap();
        for &(d_id, count) in record.counts() {
            let fwd = forward.search_primary(d_id).unwrap();
            assert_eq!(fwd.count(TermId(term)), count as f64);
        }
    }
    for d_id in 0..forward.num_docs() {
        let record = forward.search_primary(DocId(d_id)).unwrap();
        for &(term, value) in record.counts() {
            let inv = inverted.search_primary(term).unwrap();
            assert_eq!(inv.count(DocId(d_id)) as f64, value);
        }
    }
}

#[test]
fn uninverted_index_equals_directly_built_one() {
    let tmp = TempDir::new().unwrap();

    // directly ingested from the libsvm rendition of the same corpus
    let corpus_dir = tmp.path().join("corpus");
    fs::create_dir_all(&corpus_dir).unwrap();
    let mut data = File::create(corpus_dir.join("corpus.dat")).unwrap();
    writeln!(data, "+1 1:2 3:1").unwrap();
    writeln!(data, "-1 2:1").unwrap();
    writeln!(data, "+1 1:1 2:3 3:2").unwrap();
    drop(data);

    let config = Config::from_value(json!({
        "prefix": tmp.path().to_str().unwrap(),
        "dataset": "corpus",
        "forward-index": tmp.path().join("direct").to_str().unwrap(),
        "analyzers": [{"method": "libsvm"}],
    }))
    .unwrap();
    let direct = ForwardIndex::create(&config).unwrap();

    // built by inverting first, then uninverting
    let inverted = InvertedIndex::create(tmp.path().join("inv"), sample_docs()).unwrap();
    let uninverted = ForwardIndex::uninvert(&inverted, tmp.path().join("fwd")).unwrap();

    assert_eq!(direct.num_docs(), uninverted.num_docs());
    assert_eq!(direct.unique_terms(), uninverted.unique_terms());
    for d_id in 0..direct.num_docs() {
        assert_eq!(
            direct.search_primary(DocId(d_id)).unwrap().counts(),
            uninverted.search_primary(DocId(d_id)).unwrap().counts(),
            "doc {}",
            d_id
        );
        assert_eq!(
            direct.liblinear_data(DocId(d_id)).unwrap(),
            uninverted.liblinear_data(DocId(d_id)).unwrap()
        );
    }
}

#[test]
fn document_gaps_still_yield_a_dense_table() {
    let tmp = TempDir::new().unwrap();

    // doc 1 carries no terms at all: a gap in the primary-key space of
    // the forward index
    let docs = vec![
        doc("+1", &[(0, 1)]),
        doc("-1", &[]),
        doc("+1", &[(1, 2)]),
    ];
    let inverted = InvertedIndex::create(tmp.path().join("inv"), docs).unwrap();
    let forward = ForwardIndex::uninvert(&inverted, tmp.path().join("fwd")).unwrap();

    assert_eq!(forward.num_docs(), 3);
    let empty = forward.search_primary(DocId(1)).unwrap();
    assert!(empty.counts().is_empty());
    assert_eq!(forward.stream_for(DocId(1)).unwrap().size(), 0);
    assert_eq!(
        forward.search_primary(DocId(2)).unwrap().counts(),
        &[(TermId(1), 2.0)]
    );
}

#[test]
fn chunk_directory_is_cleaned_up() {
    let tmp = TempDir::new().unwrap();
    let inverted = InvertedIndex::create(tmp.path().join("inv"), sample_docs()).unwrap();
    let fwd_dir = tmp.path().join("fwd");
    ForwardIndex::uninvert(&inverted, &fwd_dir).unwrap();

    assert!(!fwd_dir.join("chunks").exists());
    assert!(ForwardIndex::valid(&fwd_dir));
}

#[test]
fn larger_corpus_round_trips_through_uninversion() {
    let tmp = TempDir::new().unwrap();

    // enough terms that several producers each contribute a chunk
    let mut docs = Vec::new();
    for d in 0..200u64 {
        let mut counts = Vec::new();
        for t in 0..30u64 {
            if (d + t) % 3 == 0 {
                counts.push((t, 1 + (d * t) % 7));
            }
        }
        docs.push(doc("+1", &counts));
    }

    let inverted = InvertedIndex::create(tmp.path().join("inv"), docs.clone()).unwrap();
    let forward = ForwardIndex::uninvert(&inverted, tmp.path().join("fwd")).unwrap();

    assert_eq!(forward.num_docs(), 200);
    for (d, document) in docs.iter().enumerate() {
        let record = forward.search_primary(DocId(d as u64)).unwrap();
        let expected: Vec<(TermId, f64)> = document
            .counts
            .iter()
            .map(|&(t, c)| (t, c as f64))
            .collect();
        assert_eq!(record.counts(), expected.as_slice(), "doc {}", d);
    }
}
