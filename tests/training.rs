use std::cmp::Ordering;

use bstr::ByteSlice;
use rustc_hash::{FxHashMap, FxHashSet};
use tbpe::{BpeError, PreTokenizer, SegmentKind, StopReason, Trainer, TrainerConfig, Vocabulary};

const SPECIAL: &str = "<|endoftext|>";

fn trainer(vocab_size: usize) -> Trainer {
    let cfg = TrainerConfig::builder()
        .target_vocab_size(vocab_size)
        .special_tokens([SPECIAL])
        .show_progress(false)
        .build()
        .expect("valid config");
    Trainer::new(cfg)
}

fn sample_corpus() -> Vec<String> {
    vec![
        "The quick brown fox jumps over the lazy dog. It's 2024, isn't it?\n\n".to_string(),
        format!("Once upon a time{SPECIAL} there lived   a  tokenizer\t\twho couldn't stop merging."),
        "caf\u{e9} na\u{ef}ve \u{65e5}\u{672c}\u{8a9e} \u{1F600}\u{1F600} <|not special|> end  ".to_string(),
    ]
}

#[test]
fn final_size_matches_seed_plus_merges() {
    for target in [258, 300, 10_000] {
        let artifacts = trainer(target).train_from_texts(&sample_corpus()).unwrap();
        let model = &artifacts.model;
        assert_eq!(model.vocab_size(), 257 + model.merges().len());
        assert!(model.vocab_size() <= target);
        match artifacts.metrics.stop_reason {
            StopReason::Converged => assert_eq!(model.vocab_size(), target),
            StopReason::Exhausted => assert!(model.vocab_size() < target),
            StopReason::MaxMergesReached => panic!("no merge limit configured"),
        }
    }
}

#[test]
fn vocabulary_entries_are_unique_and_seeded() {
    let model = trainer(400).train_from_texts(&sample_corpus()).unwrap().model;
    let tokens = model.token_bytes();
    for byte in 0..=255u8 {
        assert_eq!(tokens[byte as usize], vec![byte]);
    }
    assert_eq!(tokens[256], SPECIAL.as_bytes());
    let unique: FxHashSet<&[u8]> = tokens.iter().map(Vec::as_slice).collect();
    assert_eq!(unique.len(), tokens.len());
}

#[test]
fn segments_round_trip_the_corpus() {
    let corpus = sample_corpus();
    let trainer = trainer(400);
    let mut segments = trainer.encode(&corpus).unwrap();
    let artifacts = trainer.train_from_segments(&mut segments).unwrap();

    let mut vocab = Vocabulary::with_special_tokens(&[SPECIAL]).unwrap();
    for &pair in artifacts.model.merges() {
        vocab.push(vocab.concat(pair)).unwrap();
    }
    assert_eq!(vocab.tokens(), artifacts.model.token_bytes());
    assert_eq!(segments.decode(&vocab).unwrap(), corpus.concat().as_bytes());
}

#[test]
fn marker_never_appears_in_merged_tokens() {
    let corpus = vec![format!(
        "{SPECIAL}<|x|> <|y|> <|z|>{SPECIAL} a<|b <| <| <|"
    )];
    let artifacts = trainer(1_000).train_from_texts(&corpus).unwrap();
    for token in &artifacts.model.token_bytes()[257..] {
        assert!(
            token.find("<|").is_none(),
            "merged token {:?} contains the marker",
            token.as_bstr()
        );
    }
    assert!(!artifacts.metrics.rejected.is_empty());
}

#[test]
fn low_lower_lowest() {
    let artifacts = trainer(260).train_from_texts(&["low lower lowest"]).unwrap();
    let merges = artifacts.model.merge_bytes();
    // (l,o) and (o,w) both occur three times and nothing occurs more often.
    assert_eq!(merges[0], (b"o".to_vec(), b"w".to_vec()));
    assert_eq!(merges[1], (b"l".to_vec(), b"ow".to_vec()));
    assert_eq!(artifacts.metrics.iterations[0].best_frequency, 3);
    assert_eq!(artifacts.metrics.stop_reason, StopReason::Converged);

    let trainer = trainer(1_000);
    let mut segments = trainer.encode(&["low lower lowest"]).unwrap();
    let artifacts = trainer.train_from_segments(&mut segments).unwrap();
    assert_eq!(artifacts.metrics.stop_reason, StopReason::Exhausted);
    assert!(segments.segments().all(|segment| segment.len() == 1));
}

#[test]
fn exact_ties_pick_greatest_concatenation() {
    // Every pair occurs exactly twice; "zy" is the greatest concatenation.
    let artifacts = trainer(258)
        .train_from_texts(&["ab ab zy zy mn mn"])
        .unwrap();
    let first = &artifacts.model.merge_bytes()[0];
    assert_eq!(first, &(b"z".to_vec(), b"y".to_vec()));

    let reordered = trainer(258)
        .train_from_texts(&["mn mn zy zy ab ab"])
        .unwrap();
    assert_eq!(reordered.model.merges(), artifacts.model.merges());
}

#[test]
fn training_is_deterministic() {
    let first = trainer(350).train_from_texts(&sample_corpus()).unwrap();
    let second = trainer(350).train_from_texts(&sample_corpus()).unwrap();
    assert_eq!(first.model.merges(), second.model.merges());
    assert_eq!(first.model.token_bytes(), second.model.token_bytes());
}

#[test]
fn configuration_errors_are_raised_before_training() {
    let err = TrainerConfig::builder()
        .target_vocab_size(257)
        .special_tokens([SPECIAL])
        .build()
        .unwrap_err();
    assert!(matches!(err, BpeError::Config(_)));

    let err = TrainerConfig::builder()
        .target_vocab_size(300)
        .special_tokens([SPECIAL, SPECIAL])
        .build()
        .unwrap_err();
    assert!(matches!(err, BpeError::Config(_)));

    let err = trainer(300).train_from_texts(&[""]).unwrap_err();
    assert!(matches!(err, BpeError::Config(_)));
}

type RefPair = (usize, usize);

/// Straightforward trainer that recounts every pair before each step.
fn recount_merges(texts: &[&str], target: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    let pre = PreTokenizer::with_special_tokens(&[SPECIAL]).unwrap();
    let mut vocab: Vec<Vec<u8>> = (0..=255u8).map(|b| vec![b]).collect();
    vocab.push(SPECIAL.as_bytes().to_vec());
    let mut segments: Vec<Vec<usize>> = Vec::new();
    for text in texts {
        for token in pre.split(text).unwrap() {
            if token.kind == SegmentKind::Special {
                segments.push(vec![256]);
            } else {
                segments.push(token.text.bytes().map(usize::from).collect());
            }
        }
    }

    let rank = |vocab: &[Vec<u8>], a: (RefPair, usize), b: (RefPair, usize)| -> Ordering {
        let joined_a = [vocab[a.0 .0].as_slice(), vocab[a.0 .1].as_slice()].concat();
        let joined_b = [vocab[b.0 .0].as_slice(), vocab[b.0 .1].as_slice()].concat();
        a.1.cmp(&b.1)
            .then_with(|| joined_a.cmp(&joined_b))
            .then_with(|| vocab[a.0 .0].len().cmp(&vocab[b.0 .0].len()))
            .then_with(|| b.0.cmp(&a.0))
    };

    let mut excluded: FxHashSet<RefPair> = FxHashSet::default();
    let mut merges = Vec::new();
    while vocab.len() < target {
        let mut counts: FxHashMap<RefPair, usize> = FxHashMap::default();
        for segment in &segments {
            for window in segment.windows(2) {
                *counts.entry((window[0], window[1])).or_insert(0) += 1;
            }
        }
        let best = counts
            .into_iter()
            .filter(|(pair, _)| !excluded.contains(pair))
            .max_by(|&a, &b| rank(&vocab, a, b));
        let Some((pair, _)) = best else {
            break;
        };

        let merged = [vocab[pair.0].as_slice(), vocab[pair.1].as_slice()].concat();
        let forbidden = merged.find("<|").is_some() && merged != SPECIAL.as_bytes();
        if forbidden || vocab.contains(&merged) {
            excluded.insert(pair);
            continue;
        }
        let id = vocab.len();
        merges.push((vocab[pair.0].clone(), vocab[pair.1].clone()));
        vocab.push(merged);

        for segment in &mut segments {
            let mut rewritten = Vec::with_capacity(segment.len());
            let mut i = 0;
            while i < segment.len() {
                if i + 1 < segment.len() && segment[i] == pair.0 && segment[i + 1] == pair.1 {
                    rewritten.push(id);
                    i += 2;
                } else {
                    rewritten.push(segment[i]);
                    i += 1;
                }
            }
            *segment = rewritten;
        }
    }
    merges
}

#[test]
fn incremental_index_matches_full_recount() {
    let corpus = [
        "aaaa abab aaaaa ababab aaa the lower lowest lowest newer newest aaaa aaaa",
        "<|x|> a<|b <| <|y||> ||<< <|endoftext|><|endoftext|> mississippi banana bandana",
        "It's 12345 and 123 or 1234, isn't it?\n\n\t  spaces   here  \n we've they'll",
        "caf\u{e9} caf\u{e9}s na\u{ef}ve aaaa abab bababa <|endoftext|> zzzzzz zz",
    ];
    for target in [280, 320, 500, 2_000] {
        let artifacts = trainer(target).train_from_texts(&corpus).unwrap();
        let expected = recount_merges(&corpus, target);
        assert_eq!(
            artifacts.model.merge_bytes(),
            expected,
            "merge tables diverge at target {target}"
        );
    }
}
