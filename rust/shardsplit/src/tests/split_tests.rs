use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use shardsplit_common::error::ErrorKind;
use shardsplit_corpus::{Corpus, CorpusReader, Document};
use shardsplit_testkit::{
    corpus::{SegmentFixture, read_documents, read_ids, write_corpus, write_id_corpus},
    data_gen::generate_corpus,
};

use crate::{
    assign::shard_for_id,
    driver::{PartitionDriver, PassMode, SplitParams, SplitSummary, shard_output_paths},
    progress::{Phase, ProgressReporter},
};

fn leaves(corpora: &[&Corpus]) -> Vec<Arc<dyn CorpusReader>> {
    corpora.iter().flat_map(|c| c.leaves()).collect()
}

fn split(corpora: &[&Corpus], out: &Path, num_shards: u32, params: SplitParams) -> SplitSummary {
    PartitionDriver::new(params)
        .split(leaves(corpora), &shard_output_paths(out, num_shards))
        .unwrap()
}

fn shard_ids(out: &Path, num_shards: u32) -> Vec<Vec<String>> {
    shard_output_paths(out, num_shards)
        .iter()
        .map(|path| read_ids(path, "id").unwrap())
        .collect()
}

fn live_ids(corpora: &[&Corpus]) -> Vec<String> {
    corpora
        .iter()
        .flat_map(|c| read_ids(c.path(), "id").unwrap())
        .collect()
}

#[test]
fn test_split_four_ids_into_two_shards() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_id_corpus(&dir.path().join("in"), "id", &["a", "b", "c", "d"], &[]).unwrap();
    let out = dir.path().join("out");

    let summary = split(&[&corpus], &out, 2, SplitParams::default());
    assert_eq!(summary.num_shards(), 2);
    assert_eq!(summary.source_docs, 4);
    assert_eq!(summary.shards[0].documents, 0);
    assert_eq!(summary.shards[1].documents, 4);
    assert_eq!(summary.shards[1].path, out.join("part-1"));

    let shards = shard_ids(&out, 2);
    assert!(shards[0].is_empty());
    assert_eq!(shards[1], vec!["a", "b", "c", "d"]);
    for (shard, ids) in shards.iter().enumerate() {
        for id in ids {
            assert_eq!(shard_for_id(id, 2), shard as u32);
        }
    }
}

#[test]
fn test_three_shards_follow_digest() {
    let dir = tempfile::tempdir().unwrap();
    let ids = (1..=8).map(|i| format!("doc-{i}")).collect::<Vec<_>>();
    let ids = ids.iter().map(String::as_str).collect::<Vec<_>>();
    let corpus = write_id_corpus(&dir.path().join("in"), "id", &ids, &[]).unwrap();
    let out = dir.path().join("out");

    split(&[&corpus], &out, 3, SplitParams::default());
    let shards = shard_ids(&out, 3);
    assert_eq!(shards[0], vec!["doc-1", "doc-5"]);
    assert_eq!(shards[1], vec!["doc-3", "doc-6", "doc-7", "doc-8"]);
    assert_eq!(shards[2], vec!["doc-2", "doc-4"]);
}

#[test]
fn test_shards_are_complete_and_disjoint() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = generate_corpus(&dir.path().join("in"), 42, &[40, 0, 25, 35], 0.1).unwrap();
    let out = dir.path().join("out");

    let summary = split(&[&corpus], &out, 5, SplitParams::default());
    assert_eq!(summary.total_documents(), corpus.num_docs());
    assert_eq!(summary.source_max_doc as u64, corpus.max_doc());

    let mut seen = HashMap::new();
    for (shard, ids) in shard_ids(&out, 5).into_iter().enumerate() {
        assert_eq!(ids.len() as u64, summary.shards[shard].documents);
        for id in ids {
            assert_eq!(shard_for_id(&id, 5), shard as u32);
            assert!(seen.insert(id, shard).is_none(), "document in two shards");
        }
    }
    let expected = live_ids(&[&corpus]).into_iter().collect::<BTreeSet<_>>();
    assert_eq!(seen.into_keys().collect::<BTreeSet<_>>(), expected);
}

#[test]
fn test_source_deletions_are_not_written() {
    let dir = tempfile::tempdir().unwrap();
    let ids = (1..=8).map(|i| format!("doc-{i}")).collect::<Vec<_>>();
    let ids = ids.iter().map(String::as_str).collect::<Vec<_>>();
    // doc-2 and doc-5 are deleted before the split
    let corpus = write_id_corpus(&dir.path().join("in"), "id", &ids, &[1, 4]).unwrap();
    let out = dir.path().join("out");

    let summary = split(&[&corpus], &out, 3, SplitParams::default());
    assert_eq!(summary.total_documents(), 6);
    let shards = shard_ids(&out, 3);
    assert_eq!(shards[0], vec!["doc-1"]);
    assert_eq!(shards[1], vec!["doc-3", "doc-6", "doc-7", "doc-8"]);
    assert_eq!(shards[2], vec!["doc-4"]);

    // The input is untouched
    let reopened = Corpus::open(corpus.path()).unwrap();
    assert_eq!(reopened.num_docs(), 6);
    assert_eq!(reopened.max_doc(), 8);
}

#[test]
fn test_documents_are_copied_whole() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = generate_corpus(&dir.path().join("in"), 3, &[30], 0.0).unwrap();
    let out = dir.path().join("out");
    split(&[&corpus], &out, 2, SplitParams::default());

    let source = read_documents(corpus.path())
        .unwrap()
        .into_iter()
        .map(|doc| (doc.get_text("id").unwrap(), doc))
        .collect::<HashMap<_, _>>();
    let mut written = 0;
    for path in shard_output_paths(&out, 2) {
        for doc in read_documents(&path).unwrap() {
            let id = doc.get_text("id").unwrap();
            assert_eq!(source.get(&id), Some(&doc));
            written += 1;
        }
    }
    assert_eq!(written, source.len());
}

#[test]
fn test_resplit_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = generate_corpus(&dir.path().join("in"), 11, &[20, 20], 0.2).unwrap();
    let out = dir.path().join("out");

    split(&[&corpus], &out, 3, SplitParams::default());
    let first = shard_ids(&out, 3);
    // Same destination again: shards are recreated, not appended to
    split(&[&corpus], &out, 3, SplitParams::default());
    assert_eq!(shard_ids(&out, 3), first);

    let other = dir.path().join("other");
    split(&[&corpus], &other, 3, SplitParams::default());
    assert_eq!(shard_ids(&other, 3), first);
}

#[test]
fn test_existing_destination_is_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    write_id_corpus(&out.join("part-0"), "id", &["stale-1", "stale-2"], &[]).unwrap();

    let corpus = write_id_corpus(&dir.path().join("in"), "id", &["a", "b", "c", "d"], &[]).unwrap();
    split(&[&corpus], &out, 2, SplitParams::default());
    assert!(read_ids(&out.join("part-0"), "id").unwrap().is_empty());
}

#[test]
fn test_single_live_document_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_id_corpus(&dir.path().join("in"), "id", &["a", "b"], &[1]).unwrap();
    let out = dir.path().join("out");

    let err = PartitionDriver::new(SplitParams::default())
        .split(leaves(&[&corpus]), &shard_output_paths(&out, 2))
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Precondition { .. }));
    assert!(!out.exists());
}

#[test]
fn test_empty_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let err = PartitionDriver::new(SplitParams::default())
        .split(Vec::new(), &shard_output_paths(&out, 2))
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Precondition { .. }));
}

#[test]
fn test_single_output_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_id_corpus(&dir.path().join("in"), "id", &["a", "b", "c"], &[]).unwrap();
    let outputs = vec![dir.path().join("out").join("part-0")];

    let err = PartitionDriver::new(SplitParams::default())
        .split(leaves(&[&corpus]), &outputs)
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Precondition { .. }));
    assert!(!outputs[0].exists());

    let err = PartitionDriver::new(SplitParams::default())
        .split(leaves(&[&corpus]), &[])
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Precondition { .. }));
}

#[test]
fn test_missing_id_aborts_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut fixture = SegmentFixture::with_ids("id", &["a", "b", "c"]);
    fixture.push(Document::new().with_field("title", "no id here"));
    fixture.push(Document::new().with_field("id", "e"));
    let corpus = write_corpus(&dir.path().join("in"), &[fixture]).unwrap();
    let out = dir.path().join("out");
    let outputs = shard_output_paths(&out, 2);

    let err = PartitionDriver::new(SplitParams::default())
        .split(leaves(&[&corpus]), &outputs)
        .unwrap_err();
    match err.kind() {
        ErrorKind::MissingIdField { field, ordinal } => {
            assert_eq!(field, "id");
            assert_eq!(*ordinal, 3);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.is_configuration());
    assert!(outputs.iter().all(|path| !path.exists()));
}

#[test]
fn test_numeric_id_is_treated_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let mut fixture = SegmentFixture::with_ids("id", &["a", "b"]);
    // Past u64 range, so the stored value is a rounded f64
    fixture.push(Document::new().with_field("id", 12345678901234567890123.0_f64));
    let corpus = write_corpus(&dir.path().join("in"), &[fixture]).unwrap();
    let outputs = shard_output_paths(&dir.path().join("out"), 2);

    let err = PartitionDriver::new(SplitParams::default())
        .split(leaves(&[&corpus]), &outputs)
        .unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::MissingIdField { ordinal: 2, .. }
    ));
    assert!(outputs.iter().all(|path| !path.exists()));
}

#[test]
fn test_wrong_id_field_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_id_corpus(&dir.path().join("in"), "id", &["a", "b"], &[]).unwrap();
    let params = SplitParams {
        id_field: "uuid".to_string(),
        ..Default::default()
    };
    let err = PartitionDriver::new(params)
        .split(leaves(&[&corpus]), &shard_output_paths(&dir.path().join("out"), 2))
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::MissingIdField { ordinal: 0, .. }));
}

#[test]
fn test_custom_id_field() {
    let dir = tempfile::tempdir().unwrap();
    let corpus =
        write_id_corpus(&dir.path().join("in"), "key", &["a", "b", "c", "d"], &[]).unwrap();
    let out = dir.path().join("out");
    let params = SplitParams {
        id_field: "key".to_string(),
        ..Default::default()
    };
    let summary = split(&[&corpus], &out, 3, params);
    assert_eq!(
        summary.shards.iter().map(|s| s.documents).collect::<Vec<_>>(),
        vec![1, 3, 0]
    );
    assert_eq!(read_ids(&out.join("part-0"), "key").unwrap(), vec!["d"]);
}

#[test]
fn test_multiple_input_corpora() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_corpus(
        &dir.path().join("first"),
        &[
            SegmentFixture::with_ids("id", &["doc-1", "doc-2", "doc-3"]).deleting(&[0]),
            SegmentFixture::with_ids("id", &["doc-4"]),
        ],
    )
    .unwrap();
    let second = write_id_corpus(
        &dir.path().join("second"),
        "id",
        &["doc-5", "doc-6", "doc-7", "doc-8"],
        &[3],
    )
    .unwrap();
    let out = dir.path().join("out");

    let summary = split(&[&first, &second], &out, 4, SplitParams::default());
    assert_eq!(summary.source_max_doc, 8);
    assert_eq!(summary.source_docs, 6);
    let shards = shard_ids(&out, 4);
    assert!(shards[0].is_empty());
    assert_eq!(shards[1], vec!["doc-5"]);
    assert!(shards[2].is_empty());
    assert_eq!(shards[3], vec!["doc-2", "doc-3", "doc-4", "doc-6", "doc-7"]);
}

#[test]
fn test_parallel_matches_sequential() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = generate_corpus(&dir.path().join("in"), 5, &[60, 17, 44], 0.15).unwrap();

    let sequential = dir.path().join("seq");
    let expected = split(&[&corpus], &sequential, 4, SplitParams::default());

    for threads in [None, Some(1), Some(3)] {
        let out = dir.path().join(format!("par-{threads:?}"));
        let params = SplitParams {
            mode: PassMode::Parallel { threads },
            ..Default::default()
        };
        let summary = split(&[&corpus], &out, 4, params);
        let counts = |s: &SplitSummary| s.shards.iter().map(|o| o.documents).collect::<Vec<_>>();
        assert_eq!(counts(&summary), counts(&expected));
        assert_eq!(shard_ids(&out, 4), shard_ids(&sequential, 4));
    }
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<(&'static str, Phase, u8)>>,
}

impl ProgressReporter for RecordingProgress {
    fn start(&self, phase: Phase) {
        self.events.lock().unwrap().push(("start", phase, 0));
    }

    fn update(&self, phase: Phase, percent: u8) {
        self.events.lock().unwrap().push(("update", phase, percent));
    }

    fn finish(&self, phase: Phase) {
        self.events.lock().unwrap().push(("finish", phase, 100));
    }
}

#[test]
fn test_progress_phases_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = write_id_corpus(&dir.path().join("in"), "id", &["a", "b", "c", "d"], &[]).unwrap();
    let progress = RecordingProgress::default();
    let outputs: Vec<PathBuf> = shard_output_paths(&dir.path().join("out"), 2);
    PartitionDriver::new(SplitParams::default())
        .with_progress(&progress)
        .split(leaves(&[&corpus]), &outputs)
        .unwrap();

    let events = progress.events.into_inner().unwrap();
    let boundaries = events
        .iter()
        .filter(|(kind, _, _)| *kind != "update")
        .map(|&(kind, phase, _)| (kind, phase))
        .collect::<Vec<_>>();
    let shard = |shard| Phase::Shard {
        shard,
        num_shards: 2,
    };
    assert_eq!(
        boundaries,
        vec![
            ("start", Phase::Hashing),
            ("finish", Phase::Hashing),
            ("start", shard(0)),
            ("finish", shard(0)),
            ("start", shard(1)),
            ("finish", shard(1)),
        ]
    );
    let hashing = events
        .iter()
        .filter(|(kind, phase, _)| *kind == "update" && *phase == Phase::Hashing)
        .map(|&(_, _, percent)| percent)
        .collect::<Vec<_>>();
    assert_eq!(hashing, vec![25, 50, 75, 100]);
}
