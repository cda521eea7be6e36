//! # Topic Transport Benchmarks
//!
//! Hot paths of the transport:
//!
//! | Area | Path | Target |
//! |------|------|--------|
//! | Wire | Frame encode/decode of a publish | < 5µs for 1 KiB |
//! | Bus | Handler dispatch per payload | < 1µs per handler |
//! | Throttle | Admission check | < 100ns |
//! | Services | Round-robin responder pick | < 10µs for 16 candidates |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use shared_bus::{HandlerTable, MessageInfo, RawHandler};
use shared_types::msgs::Int32;
use shared_types::{
    AdvertiseServiceOptions, DataMessage, Frame, Message, NodeUuid, ProcessUuid,
    ServicePublisher, SubscribeOptions, Throttle, TransportError,
};
use std::sync::Arc;
use std::time::Duration;
use tp_02_service_bus::RoundRobin;

fn random_payload(len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen()).collect()
}

fn publish_frame(payload: Vec<u8>) -> Frame {
    Frame::data(
        ProcessUuid::new(),
        "bench-host",
        DataMessage::Publish {
            topic: "@/bench@/payload".into(),
            msg_type_name: "tp.msgs.StringMsg".into(),
            nuuid: NodeUuid::new(),
            seq: 42,
            payload,
        },
    )
}

fn bench_wire(c: &mut Criterion) {
    let mut group = c.benchmark_group("wire");
    group.measurement_time(Duration::from_secs(5));

    for size in [64usize, 1024, 16 * 1024] {
        let frame = publish_frame(random_payload(size));
        let bytes = frame.encode().expect("encode");

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("frame_encode", size), &frame, |b, frame| {
            b.iter(|| black_box(frame.encode()))
        });
        group.bench_with_input(BenchmarkId::new("frame_decode", size), &bytes, |b, bytes| {
            b.iter(|| black_box(Frame::decode(bytes)))
        });
    }

    let msg = Int32 { data: 7 };
    group.bench_function("message_encode_int32", |b| b.iter(|| black_box(msg.encode())));

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus");

    for handlers in [1usize, 8, 64] {
        let table = HandlerTable::new();
        for _ in 0..handlers {
            let handler: RawHandler = Arc::new(|payload: &[u8], _: &MessageInfo| {
                Int32::decode(payload).map(drop).map_err(TransportError::from)
            });
            table.insert("@/bench@/count", NodeUuid::new(), handler, &SubscribeOptions::new());
        }
        let payload = Int32 { data: 1 }.encode().expect("encode");
        let info = MessageInfo::new("@/bench@/count", Int32::TYPE_NAME, NodeUuid::new(), true);

        group.throughput(Throughput::Elements(handlers as u64));
        group.bench_with_input(BenchmarkId::new("dispatch", handlers), &payload, |b, payload| {
            b.iter(|| black_box(table.dispatch("@/bench@/count", payload, &info)))
        });
    }

    group.finish();
}

fn bench_throttle(c: &mut Criterion) {
    let mut group = c.benchmark_group("throttle");

    let open = Throttle::per_second(1_000_000_000);
    group.bench_function("try_accept_open", |b| b.iter(|| black_box(open.try_accept())));

    let closed = Throttle::per_second(1);
    closed.try_accept();
    group.bench_function("try_accept_closed", |b| b.iter(|| black_box(closed.try_accept())));

    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("service-selection");

    for count in [1usize, 4, 16] {
        let candidates: Vec<ServicePublisher> = (0..count)
            .map(|i| {
                ServicePublisher::new(
                    "@/bench@/echo",
                    format!("mem://bench/{i}"),
                    format!("sock-{i}"),
                    ProcessUuid::new(),
                    NodeUuid::new(),
                    "tp.msgs.Int32",
                    "tp.msgs.Int32",
                    AdvertiseServiceOptions::new(),
                )
            })
            .collect();
        let selector = RoundRobin::new();

        group.bench_with_input(
            BenchmarkId::new("round_robin", count),
            &candidates,
            |b, candidates| {
                b.iter(|| {
                    black_box(selector.select(
                        "@/bench@/echo",
                        "tp.msgs.Int32",
                        "tp.msgs.Int32",
                        candidates.clone(),
                    ))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_wire, bench_dispatch, bench_throttle, bench_selection);
criterion_main!(benches);
