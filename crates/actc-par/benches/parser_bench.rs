//! Parser benchmarks.
//!
//! Run with: `cargo bench --package actc-par`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use actc_lex::{tokenize, DefineStack};
use actc_par::Parser;
use actc_util::Handler;

fn parse_source(source: &str) -> usize {
    let mut handler = Handler::new();
    let tokens = tokenize(source, "<bench>", &DefineStack::new()).expect("bench source must lex");
    let ast = Parser::new(tokens, &mut handler)
        .parse_program()
        .expect("bench source must parse");
    ast.routines.len()
}

fn bench_parser_declarations(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_declarations");

    let source = "TYPE Pt = [BYTE x BYTE y] BYTE a, b, c INT i CARD ARRAY ca = [$1234, $5678] Pt p";
    group.throughput(Throughput::Bytes(source.len() as u64));

    group.bench_function("global_decls", |b| {
        b.iter(|| parse_source(black_box(source)))
    });

    group.finish();
}

fn bench_parser_expressions(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_expressions");

    let source = r#"
        BYTE b INT i CARD c
        PROC main()
          i = b + 1000 * 2 - c / 4
          i = (b LSH 2) & $0F % (c ! 3)
          IF i < 100 AND b > 2 THEN i = -i FI
        RETURN
    "#;
    group.throughput(Throughput::Bytes(source.len() as u64));

    group.bench_function("mixed_operators", |b| {
        b.iter(|| parse_source(black_box(source)))
    });

    group.finish();
}

criterion_group!(benches, bench_parser_declarations, bench_parser_expressions);
criterion_main!(benches);
