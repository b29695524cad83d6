//! Conversion benchmarks
//!
//! Measures encode/decode cost for scalars, vectors and nested aggregates.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pythonic::{
    BridgeConfig, CellArray, Converter, Decode, Dims, Encode, HostValue, NumericArray, StructValue,
};

fn converter() -> Converter {
    Converter::with_config(&BridgeConfig::default())
}

fn bench_scalars(c: &mut Criterion) {
    let mut conv = converter();
    let value = HostValue::from(std::f64::consts::PI);

    c.bench_function("scalar_round_trip", |b| {
        b.iter(|| {
            let encoded = conv.encode(black_box(&value)).unwrap();
            conv.decode(encoded.get().unwrap()).unwrap()
        })
    });
}

fn bench_vectors(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_round_trip");
    let mut conv = converter();

    for size in [16usize, 1024, 65536] {
        let data: Vec<f64> = (0..size).map(|i| i as f64 * 0.5).collect();
        let value = HostValue::Array(NumericArray::row(data));
        group.bench_with_input(BenchmarkId::from_parameter(size), &value, |b, value| {
            b.iter(|| {
                let encoded = conv.encode(black_box(value)).unwrap();
                conv.decode(encoded.get().unwrap()).unwrap()
            })
        });
    }
    group.finish();
}

fn bench_matrix_fallback(c: &mut Criterion) {
    let conv = converter();
    let data: Vec<i32> = (0..64 * 64).collect();
    let value = HostValue::Array(NumericArray::new(Dims::matrix(64, 64), data).unwrap());

    c.bench_function("matrix_object_array_encode", |b| {
        b.iter(|| conv.encode(black_box(&value)).unwrap())
    });
}

fn bench_aggregates(c: &mut Criterion) {
    let mut conv = converter();
    let fields: Vec<(String, HostValue)> = (0..32)
        .map(|i| (format!("field_{i}"), HostValue::from(i as f64)))
        .collect();
    let record = StructValue::from_fields(fields).unwrap();
    let cell = HostValue::Cell(CellArray::row(vec![HostValue::Struct(record.clone()); 8]));

    c.bench_function("struct_round_trip", |b| {
        let value = HostValue::Struct(record.clone());
        b.iter(|| {
            let encoded = conv.encode(black_box(&value)).unwrap();
            conv.decode_struct(encoded.get().unwrap()).unwrap()
        })
    });

    c.bench_function("cell_of_structs_encode", |b| {
        b.iter(|| conv.encode(black_box(&cell)).unwrap())
    });
}

criterion_group!(benches, bench_scalars, bench_vectors, bench_matrix_fallback, bench_aggregates);
criterion_main!(benches);
