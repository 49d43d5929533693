//! Lexer benchmarks.
//!
//! Run with: `cargo bench --package actc-lex`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use actc_lex::{tokenize, DefineStack};

fn lexer_token_count(source: &str) -> usize {
    let defines = DefineStack::new();
    tokenize(source, "<bench>", &defines)
        .expect("bench source must lex")
        .len()
}

fn bench_lexer_declarations(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");

    let source = "BYTE x CHAR y=['a] INT z=[$1234] CARD a";
    group.throughput(Throughput::Bytes(source.len() as u64));

    group.bench_function("global_decls", |b| {
        b.iter(|| lexer_token_count(black_box(source)))
    });

    group.finish();
}

fn bench_lexer_routine(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_routine");

    let source = r#"
        INT i
        PROC main()
          i = 0
          WHILE i < 10
          DO
            i = i + 1
            IF i = 5 THEN
              EXIT
            FI
          OD
        RETURN
    "#;
    group.throughput(Throughput::Bytes(source.len() as u64));

    group.bench_function("while_loop", |b| {
        b.iter(|| lexer_token_count(black_box(source)))
    });

    group.finish();
}

criterion_group!(benches, bench_lexer_declarations, bench_lexer_routine);
criterion_main!(benches);
