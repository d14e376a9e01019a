use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use lexstream::{engine::bt, pattern::Pattern, DfaMatcher, RegexMatcher};

fn word_pattern() -> Pattern {
    let mut b = Pattern::builder();
    let s0 = b.state();
    let s1 = b.state();
    for state in [s0, s1] {
        b.range(state, b'0', b'9', s1);
        b.range(state, b'A', b'Z', s1);
        b.byte(state, b'_', s1);
        b.range(state, b'a', b'z', s1);
    }
    b.accept(s1, 1);
    b.build().unwrap()
}

fn haystack() -> String {
    "lorem ipsum dolor sit amet, consectetur adipiscing elit, \
     sed do eiusmod tempor incididunt ut labore et dolore magna aliqua. "
        .repeat(512)
}

fn bench_find(c: &mut Criterion) {
    let hay = haystack();

    c.bench_function("dfa_find_words", |b| {
        let pattern = word_pattern();
        b.iter(|| {
            let mut m = DfaMatcher::builder(pattern.clone())
                .input(black_box(hay.as_str()))
                .build();
            let mut count = 0usize;
            while m.find() != 0 {
                count += 1;
            }
            count
        })
    });

    c.bench_function("bt_find_words", |b| {
        let pattern = bt::Pattern::new(r"\w+").unwrap();
        b.iter(|| {
            let mut m = RegexMatcher::builder(pattern.clone())
                .input(black_box(hay.as_str()))
                .build();
            let mut count = 0usize;
            while m.find() != 0 {
                count += 1;
            }
            count
        })
    });

    c.bench_function("dfa_find_literal_prefix", |b| {
        let mut builder = Pattern::builder();
        let mut from = builder.state();
        for &octet in b"magna" {
            let to = builder.state();
            builder.byte(from, octet, to);
            from = to;
        }
        builder.accept(from, 1);
        let pattern = builder.build().unwrap();
        b.iter(|| {
            let mut m = DfaMatcher::builder(pattern.clone())
                .input(black_box(hay.as_str()))
                .build();
            let mut count = 0usize;
            while m.find() != 0 {
                count += 1;
            }
            count
        })
    });
}

criterion_group!(benches, bench_find);
criterion_main!(benches);
