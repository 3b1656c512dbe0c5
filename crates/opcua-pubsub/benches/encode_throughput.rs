// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Encode Throughput Benchmark
//!
//! Measures network message encoding for the two common encodings:
//! - UADP with a RawData payload resolved from metadata
//! - JSON with network and dataset headers
//! - UADP chunking of a single large dataset message

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use opcua_pubsub::flags::{DataSetFieldContentFlags, DataSetMessageContentFlags, NetworkMessageContentFlags};
use opcua_pubsub::{
    BuiltInType, CodecContext, DataSet, DataSetMessage, DataSetMetaData, FieldMetaData, JsonNetworkMessage,
    MessageCodec, MetaDataStore, NetworkMessageBase, UadpNetworkMessage, Variant,
};

type N = NetworkMessageContentFlags;

const FIELDS: usize = 16;

fn metadata() -> DataSetMetaData {
    DataSetMetaData::new(
        "bench",
        (0..FIELDS)
            .map(|i| FieldMetaData::scalar(format!("f{}", i), BuiltInType::Double))
            .collect(),
    )
}

fn base(messages: usize, mask: DataSetFieldContentFlags) -> NetworkMessageBase {
    let messages = (0..messages)
        .map(|id| {
            let mut payload = DataSet::new(mask);
            for i in 0..FIELDS {
                payload.push(format!("f{}", i), Some((i as f64 * 0.5).into()));
            }
            let mut msg = DataSetMessage::new(id as u16 + 1, payload);
            msg.content_mask = DataSetMessageContentFlags::SEQUENCE_NUMBER;
            msg
        })
        .collect();
    let mut base = NetworkMessageBase::new(N::NONE, messages);
    base.publisher_id = Some("1".into());
    base
}

fn bench_uadp_raw(c: &mut Criterion) {
    let ctx = CodecContext::default();
    let store = MetaDataStore::new();
    let mut group = c.benchmark_group("uadp_raw");
    for count in [1usize, 8, 64] {
        for id in 1..=count as u16 {
            store.insert(id, metadata());
        }
        let mut b = base(count, DataSetFieldContentFlags::RAW_DATA);
        b.content_mask = N::PUBLISHER_ID | N::PAYLOAD_HEADER;
        let mut msg = UadpNetworkMessage::new(b);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |bench, _| {
            bench.iter(|| black_box(msg.encode(&ctx, 65535, Some(&store)).unwrap()));
        });
    }
    group.finish();
}

fn bench_json(c: &mut Criterion) {
    let ctx = CodecContext::default();
    let mut group = c.benchmark_group("json");
    for count in [1usize, 8, 64] {
        let mut b = base(count, DataSetFieldContentFlags::NONE);
        b.content_mask = N::NETWORK_MESSAGE_HEADER | N::DATASET_MESSAGE_HEADER | N::PUBLISHER_ID;
        let mut msg = JsonNetworkMessage::new(b);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |bench, _| {
            bench.iter(|| black_box(msg.encode(&ctx, usize::MAX, None).unwrap()));
        });
    }
    group.finish();
}

fn bench_uadp_chunked(c: &mut Criterion) {
    let ctx = CodecContext::default();
    let payload = DataSet::default().with("blob", Variant::ByteString(vec![0xA5; 256 * 1024]));
    let mut msg = UadpNetworkMessage::new(NetworkMessageBase::new(
        N::PUBLISHER_ID | N::PAYLOAD_HEADER,
        vec![DataSetMessage::new(1, payload)],
    ));
    msg.base.publisher_id = Some("1".into());

    let mut group = c.benchmark_group("uadp_chunked");
    group.throughput(Throughput::Bytes(256 * 1024));
    group.bench_function("256k_in_1400", |bench| {
        bench.iter(|| black_box(msg.encode(&ctx, 1400, None).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_uadp_raw, bench_json, bench_uadp_chunked);
criterion_main!(benches);
