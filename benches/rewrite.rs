//! Rewrite benchmarks

use exprmap::expr::build::*;
use exprmap::expr::{RcExpr, Value};
use exprmap::{ExpressionMapper, MapperConfiguration, TypeId, TypeRegistry};
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn setup() -> (Rc<TypeRegistry>, TypeId, MapperConfiguration) {
    let types = Rc::new(TypeRegistry::new());
    let child = types.record("Child").member("Value", types.int32()).build();
    let source = types
        .record("Source")
        .member("Value", types.int32())
        .member("Foo", types.int32())
        .member("Child", child)
        .build();
    let dest = types
        .record("Dest")
        .member("Value", types.int32())
        .member("Bar", types.int32())
        .member("ChildValue", types.int32())
        .build();
    let mut builder = MapperConfiguration::builder(types.clone());
    builder
        .create_map(source, dest)
        .for_member("Bar", |types, s| member(types, s, "Foo"));
    let config = builder.build().unwrap();
    (types, dest, config)
}

/// `d => d.ChildValue == 0 && d.Bar == 1 && ...` with `n` clauses
fn wide_predicate(types: &TypeRegistry, dest: TypeId, n: i64) -> RcExpr {
    let d = param("d", dest);
    let body = (0..n)
        .map(|i| {
            let name = if i % 2 == 0 { "ChildValue" } else { "Bar" };
            equal(
                types,
                member(types, parameter(&d), name).unwrap(),
                constant(Value::int(i), types.int32()),
            )
            .unwrap()
        })
        .reduce(|l, r| and_also(types, l, r).unwrap())
        .unwrap();
    lambda(types, vec![d], body)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let (types, dest, config) = setup();
    let mapper = ExpressionMapper::new(&config);
    let small = wide_predicate(&types, dest, 1);
    let wide = wide_predicate(&types, dest, 64);
    c.bench_function("rewrite flattened predicate", |b| {
        b.iter(|| mapper.rewrite(black_box(&small), None).unwrap())
    });
    c.bench_function("rewrite 64 clause predicate", |b| {
        b.iter(|| mapper.rewrite(black_box(&wide), None).unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
