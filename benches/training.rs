use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use tbpe::{Trainer, TrainerConfig};

const WORDS: [&str; 16] = [
    "the", "lower", "lowest", "newer", "widest", "token", "merge", "pair", "byte", "level",
    "training", "vocabulary", "isn't", "we've", "2024", "!!",
];

fn build_documents() -> Vec<String> {
    let mut documents = Vec::with_capacity(64);
    for doc in 0..64usize {
        let mut text = String::with_capacity(16 * 1024);
        for idx in 0..2048usize {
            let word = WORDS[(idx * 7 + doc * 3 + idx / 5) % WORDS.len()];
            if idx % 13 == 0 {
                text.push('\n');
            } else {
                text.push(' ');
            }
            text.push_str(word);
        }
        text.push_str("<|endoftext|>");
        documents.push(text);
    }
    documents
}

fn bench_training(c: &mut Criterion) {
    let documents = build_documents();
    let total_bytes: usize = documents.iter().map(String::len).sum();
    let cfg = TrainerConfig::builder()
        .special_tokens(["<|endoftext|>"])
        .target_vocab_size(512)
        .show_progress(false)
        .build()
        .expect("configuration");

    let mut group = c.benchmark_group("train_text_corpus");
    group.throughput(Throughput::Bytes(total_bytes as u64));
    group.sampling_mode(SamplingMode::Flat);
    group.bench_function(BenchmarkId::from_parameter("MiB_1"), |b| {
        b.iter(|| {
            let trainer = Trainer::new(cfg.clone());
            let artefacts = trainer.train_from_texts(&documents).expect("training");
            let _ = black_box(artefacts);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_training);
criterion_main!(benches);
