use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use regex_memo_runtime::backtrack::backtrack;
use regex_memo_runtime::*;

// `(a+)+b` with a whole-match group: the classic catastrophic-backtracking
// shape once the input withholds the final `b`.
fn nested_plus_program() -> Program {
    Program::new(vec![
        Opcode::Save(InstSave::new(0)),
        Opcode::Save(InstSave::new(2)),
        Opcode::Char(InstChar::new('a')),
        Opcode::Split(InstSplit::new(InstIndex::from(2u32), InstIndex::from(4u32))),
        Opcode::Save(InstSave::new(3)),
        Opcode::Split(InstSplit::new(InstIndex::from(1u32), InstIndex::from(6u32))),
        Opcode::Char(InstChar::new('b')),
        Opcode::Save(InstSave::new(1)),
        Opcode::Match,
    ])
}

pub fn memoized_vs_unmemoized(c: &mut Criterion) {
    let mut group = c.benchmark_group("catastrophic (a+)+b rejection");

    for n in [8usize, 12, 16] {
        let input: String = std::iter::repeat('a').take(n).chain(['X']).collect();
        group.throughput(Throughput::Elements(n as u64));

        let unmemoized = nested_plus_program();
        group.bench_with_input(BenchmarkId::new("unmemoized", n), &input, |b, input| {
            b.iter(|| {
                let outcome = backtrack(&unmemoized, input).unwrap();
                assert!(outcome.matched.is_none())
            })
        });

        let mut memoized = nested_plus_program().with_encoding(TableEncoding::Rle, 1);
        memoized.determine_memo_nodes(VertexSelector::InDegreeGt1);
        group.bench_with_input(BenchmarkId::new("indeg-memoized", n), &input, |b, input| {
            b.iter(|| {
                let outcome = backtrack(&memoized, input).unwrap();
                assert!(outcome.matched.is_none())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, memoized_vs_unmemoized);
criterion_main!(benches);
