use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use reactorbot::comms::frame::{FrameParser, TxFrame, FIELD_ID, TYPE_STORAGE, TYPE_SUPPLY};
use reactorbot::comms::{FieldLink, MockTransport};

fn frame_parse_bench(c: &mut Criterion) {
    let mut stream = Vec::new();
    for i in 0..64u8 {
        stream.extend_from_slice(TxFrame::build(TYPE_STORAGE, FIELD_ID, FIELD_ID, &[i & 0x0F]).as_bytes());
        stream.extend_from_slice(&[0x00, 0x13]); // line noise between frames
    }

    let mut group = c.benchmark_group("frame_parser");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    group.bench_function("parse_stream", |b| {
        b.iter(|| {
            let mut parser = FrameParser::new();
            let mut frames = 0;
            for &byte in black_box(&stream) {
                if parser.push(byte).is_some() {
                    frames += 1;
                }
            }
            black_box(frames)
        })
    });
    group.finish();
}

fn link_update_bench(c: &mut Criterion) {
    let mock = MockTransport::new();
    let mut link = FieldLink::with_defaults(Box::new(mock.clone()));
    let storage = TxFrame::build(TYPE_STORAGE, FIELD_ID, FIELD_ID, &[0x05]);
    let supply = TxFrame::build(TYPE_SUPPLY, FIELD_ID, FIELD_ID, &[0x0A]);
    let mut now = 0.0;

    c.bench_function("link_update_two_frames", |b| {
        b.iter(|| {
            mock.inject_read(storage.as_bytes());
            mock.inject_read(supply.as_bytes());
            now += 0.02;
            black_box(link.update(now).unwrap_or(0))
        })
    });

    c.bench_function("link_send_heartbeat", |b| {
        b.iter(|| {
            let _ = link.send_heartbeat();
            mock.take_written();
        })
    });
}

criterion_group!(benches, frame_parse_bench, link_update_bench);
criterion_main!(benches);
