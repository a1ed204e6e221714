use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use emberc::lexer::Lexer;

fn synthetic_module(functions: usize) -> String {
    let mut source = String::new();
    for i in 0..functions {
        source.push_str(&format!(
            "fn work_{i}(mut acc: i32) -> i32 {{\n\
                 for i in 0..100 {{\n\
                     acc = acc + match i {{ 0 => 10, 1 => 20, _ => i * 2 }};\n\
                 }}\n\
                 while acc > 1_000 {{ acc = acc - 0x10; }}\n\
                 return acc;\n\
             }}\n"
        ));
    }
    source
}

fn lex_all(input: &str) -> usize {
    let mut lexer = Lexer::new(input);
    lexer.tokenize_all().len()
}

fn criterion_benchmark(c: &mut Criterion) {
    let input = synthetic_module(200);
    c.bench_function("tokenize_all", |b| {
        b.iter(|| lex_all(black_box(&input)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
