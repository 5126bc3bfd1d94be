// ABOUTME: Benchmarks BSON encode/decode through serde, the value tree and size calculation.
// ABOUTME: JSON timings from serde_json are printed alongside as a reference point.

use bson_wire::{
    calculate_object_size, deserialize, deserialize_with_config, doc, from_slice, serialize,
    to_vec, Bson, Decimal128, DecoderConfig, Document, EncoderConfig, Long, ObjectId,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct SimpleStruct {
    name: String,
    age: u32,
    active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct ComplexStruct {
    id: u64,
    name: String,
    email: String,
    scores: Vec<i32>,
    metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Metadata {
    created: String,
    updated: String,
    tags: Vec<String>,
    rating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Batch {
    users: Vec<ComplexStruct>,
}

fn create_simple_data() -> SimpleStruct {
    SimpleStruct {
        name: "Alice".to_string(),
        age: 30,
        active: true,
    }
}

fn create_complex_data(i: u64) -> ComplexStruct {
    ComplexStruct {
        id: 12_345_678_901_234 + i,
        name: format!("User {i}"),
        email: format!("user{i}@example.com"),
        scores: vec![95, 87, 92, 88, 91, 89, 94, 90, 93, 86],
        metadata: Metadata {
            created: "2024-01-15T10:30:00Z".to_string(),
            updated: "2024-01-18T14:22:33Z".to_string(),
            tags: vec!["premium".to_string(), "verified".to_string()],
            rating: 4.7,
        },
    }
}

fn create_mixed_document() -> Document {
    let mut rows = Vec::new();
    for i in 0..100i32 {
        rows.push(Bson::from(doc! {
            "_id": (ObjectId::from_bytes([i as u8; 12])),
            "n": i,
            "wide": (Long::from_i64(i64::from(i) << 40)),
            "price": (Decimal128::from(i)),
            "label": (format!("row {i}")),
        }));
    }
    doc! { "rows": (Bson::Array(rows)) }
}

fn bench_simple_struct(c: &mut Criterion) {
    let data = create_simple_data();
    let mut group = c.benchmark_group("simple_struct");

    group.bench_function("bson_encode", |b| b.iter(|| to_vec(black_box(&data)).unwrap()));
    group.bench_function("json_encode", |b| {
        b.iter(|| serde_json::to_vec(black_box(&data)).unwrap())
    });

    let bson_bytes = to_vec(&data).unwrap();
    let json_bytes = serde_json::to_vec(&data).unwrap();

    group.bench_function("bson_decode", |b| {
        b.iter(|| {
            let decoded: SimpleStruct = from_slice(black_box(&bson_bytes)).unwrap();
            decoded
        })
    });
    group.bench_function("json_decode", |b| {
        b.iter(|| {
            let decoded: SimpleStruct = serde_json::from_slice(black_box(&json_bytes)).unwrap();
            decoded
        })
    });

    println!(
        "Simple struct sizes: BSON={} bytes, JSON={} bytes",
        bson_bytes.len(),
        json_bytes.len()
    );
    group.finish();
}

fn bench_nested_data(c: &mut Criterion) {
    let data = Batch {
        users: (0..100).map(create_complex_data).collect(),
    };
    let mut group = c.benchmark_group("nested_100_objects");

    let bson_bytes = to_vec(&data).unwrap();
    let json_bytes = serde_json::to_vec(&data).unwrap();
    group.throughput(Throughput::Bytes(bson_bytes.len() as u64));

    group.bench_function("bson_encode", |b| b.iter(|| to_vec(black_box(&data)).unwrap()));
    group.bench_function("json_encode", |b| {
        b.iter(|| serde_json::to_vec(black_box(&data)).unwrap())
    });
    group.bench_function("bson_decode", |b| {
        b.iter(|| {
            let decoded: Batch = from_slice(black_box(&bson_bytes)).unwrap();
            decoded
        })
    });
    group.bench_function("json_decode", |b| {
        b.iter(|| {
            let decoded: Batch = serde_json::from_slice(black_box(&json_bytes)).unwrap();
            decoded
        })
    });

    println!(
        "Nested data sizes: BSON={} bytes, JSON={} bytes ({:.1}% of JSON)",
        bson_bytes.len(),
        json_bytes.len(),
        (bson_bytes.len() as f64 / json_bytes.len() as f64) * 100.0
    );
    group.finish();
}

fn bench_value_tree(c: &mut Criterion) {
    let doc = create_mixed_document();
    let config = EncoderConfig::default();
    let bytes = serialize(&doc, &config).unwrap();
    let exact = DecoderConfig::default().with_promote_values(false);

    let mut group = c.benchmark_group("value_tree_100_rows");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("serialize", |b| {
        b.iter(|| serialize(black_box(&doc), &config).unwrap())
    });
    group.bench_function("calculate_object_size", |b| {
        b.iter(|| calculate_object_size(black_box(&doc), &config).unwrap())
    });
    group.bench_function("deserialize_promoted", |b| {
        b.iter(|| deserialize(black_box(&bytes)).unwrap())
    });
    group.bench_function("deserialize_exact", |b| {
        b.iter(|| deserialize_with_config(black_box(&bytes), exact.clone()).unwrap())
    });
    group.finish();
}

fn bench_decimal128(c: &mut Criterion) {
    let inputs = [
        "0.001234",
        "-1.234567890123456789012345678901234E+6000",
        "12345678901234567890",
        "NaN",
    ];
    let values: Vec<Decimal128> = inputs.iter().map(|s| s.parse().unwrap()).collect();

    let mut group = c.benchmark_group("decimal128");
    group.bench_function("parse", |b| {
        b.iter(|| {
            for s in &inputs {
                black_box(Decimal128::parse(black_box(s)).unwrap());
            }
        })
    });
    group.bench_function("format", |b| {
        b.iter(|| {
            for d in &values {
                black_box(d.to_string());
            }
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_simple_struct,
    bench_nested_data,
    bench_value_tree,
    bench_decimal128,
);

criterion_main!(benches);
