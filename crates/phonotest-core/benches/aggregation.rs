use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use phonotest_core::model::{Category, Position, TrialResponse};
use phonotest_core::report::{generate_csv, ReportKind};
use phonotest_core::statistics::{aggregate, OrganizerKey};
use uuid::Uuid;

const PHONEMES: [&str; 6] = ["b", "p", "d", "t", "g", "k"];

fn make_responses(subjects: usize, trials: usize) -> Vec<TrialResponse> {
    let received_at = Utc::now();
    let mut out = Vec::with_capacity(subjects * trials * 2);
    for s in 0..subjects {
        for position in [Position::Pre, Position::Post] {
            for t in 0..trials {
                let phoneme = PHONEMES[t % PHONEMES.len()];
                out.push(TrialResponse {
                    submission_id: Uuid::nil(),
                    subject_id: format!("subject-{s}"),
                    category: Category::Word,
                    position,
                    trial_index: t,
                    trial_token: format!("{phoneme}-token-{t}"),
                    trial_beginning_phoneme: phoneme.to_string(),
                    trial_speaker_id: "s1".into(),
                    sentence: None,
                    user_response_index: (t % 3) as i64,
                    is_correct: (s + t) % 3 != 0,
                    reaction_time: 400.0 + ((s * 7 + t * 13) % 500) as f64,
                    timestamp: 1_700_000_000_000.0 + t as f64,
                    received_at,
                });
            }
        }
    }
    out
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    let small = make_responses(10, 40);
    group.bench_function("10 subjects x 40 trials by phoneme", |b| {
        b.iter(|| aggregate(black_box(&small), Category::Word, OrganizerKey::Phoneme))
    });

    let large = make_responses(200, 40);
    group.bench_function("200 subjects x 40 trials by token", |b| {
        b.iter(|| aggregate(black_box(&large), Category::Word, OrganizerKey::Token))
    });

    group.finish();
}

fn bench_generate_csv(c: &mut Criterion) {
    let responses = make_responses(200, 40);
    let kind = ReportKind::new(Category::Word, OrganizerKey::Token);
    c.bench_function("generate_csv 200x40", |b| {
        b.iter(|| generate_csv(black_box(&responses), kind))
    });
}

criterion_group!(benches, bench_aggregate, bench_generate_csv);
criterion_main!(benches);
