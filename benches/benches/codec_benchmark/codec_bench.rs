use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tarsio::{
    consts::{TARS_NORMAL, TUP_VERSION},
    FieldDescriptor, FieldType, RequestPacket, StructDescriptor, StructValue, TarsDecoder,
    TarsEncoder, Value,
};

fn make_payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

fn sample_request(payload: usize) -> RequestPacket {
    RequestPacket {
        version: TUP_VERSION,
        packet_type: TARS_NORMAL,
        message_type: 0,
        request_id: 7,
        servant_name: "Account.AccountObj".to_string(),
        func_name: "getBalance".to_string(),
        buffer: make_payload(payload),
        timeout: 2000,
        context: vec![("trace".to_string(), "abc123".to_string())],
        status: Vec::new(),
    }
}

fn record_descriptor() -> std::sync::Arc<StructDescriptor> {
    StructDescriptor::new(
        "Record",
        vec![
            FieldDescriptor::new(1, "id", true, FieldType::Int64),
            FieldDescriptor::new(2, "name", true, FieldType::String),
            FieldDescriptor::new(3, "score", false, FieldType::Double),
            FieldDescriptor::new(
                4,
                "payload",
                false,
                FieldType::Vector(Box::new(FieldType::UInt8)),
            ),
        ],
    )
}

fn sample_record(payload: usize) -> StructValue {
    let mut sv = StructValue::new("Record");
    sv.set(1, Value::Int(1_000_000_007));
    sv.set(2, Value::String("record-one".to_string()));
    sv.set(3, Value::Double(0.25));
    sv.set(4, Value::Bytes(make_payload(payload)));
    sv
}

/// Кодирование структуры по дескриптору на разных размерах нагрузки.
fn bench_struct_encode(c: &mut Criterion) {
    let desc = record_descriptor();
    let mut group = c.benchmark_group("struct_encode");
    for size in [64usize, 1024, 16 * 1024] {
        let record = sample_record(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &record, |b, record| {
            b.iter(|| {
                let mut enc = TarsEncoder::new();
                enc.write_struct(0, black_box(record), &desc).unwrap();
                black_box(enc.into_bytes())
            });
        });
    }
    group.finish();
}

/// Декодирование структуры по дескриптору.
fn bench_struct_decode(c: &mut Criterion) {
    let desc = record_descriptor();
    let mut group = c.benchmark_group("struct_decode");
    for size in [64usize, 1024, 16 * 1024] {
        let record = sample_record(size);
        let mut enc = TarsEncoder::new();
        enc.write_struct(0, &record, &desc).unwrap();
        let bytes = enc.into_bytes();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| {
                let mut dec = TarsDecoder::new(black_box(bytes));
                black_box(dec.read_struct(0, true, &desc).unwrap())
            });
        });
    }
    group.finish();
}

/// Полный цикл кадра запроса: encode + decode.
fn bench_request_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_frame");
    for size in [0usize, 1024, 64 * 1024] {
        let request = sample_request(size);
        let frame = request.encode().unwrap();
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("encode", size),
            &request,
            |b, request| {
                b.iter(|| black_box(request.encode().unwrap()));
            },
        );
        group.bench_with_input(BenchmarkId::new("decode", size), &frame, |b, frame| {
            b.iter(|| black_box(RequestPacket::decode(frame).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_struct_encode,
    bench_struct_decode,
    bench_request_frame
);
criterion_main!(benches);
