use criterion::{black_box, criterion_group, criterion_main, Criterion};

use apns_core::codec;
use apns_core::{Notification, GATEWAY_ERROR_COMMAND, GATEWAY_RESPONSE_LEN};
use serde_json::json;

const DEVICE_TOKEN: &str = "bedb115e0f9afef1bbc49eb03cd789365956aa4bef1f6229f504541f8e2dfdca";

fn bench_notification() -> Notification {
    Notification::new(
        DEVICE_TOKEN,
        json!({
            "aps": {
                "alert": "You've got emails.",
                "badge": 9,
                "sound": "bingbong.aiff",
            },
            "foo": "bar",
            "answer": 42,
        }),
    )
}

fn benchmark_push_frame_encoding(c: &mut Criterion) {
    let notification = bench_notification();

    c.bench_function("encode_push_frame", |b| {
        b.iter(|| codec::encode_push(black_box(&notification)));
    });
}

fn benchmark_token_decoding(c: &mut Criterion) {
    c.bench_function("decode_device_token", |b| {
        b.iter(|| codec::decode_device_token(black_box(DEVICE_TOKEN)));
    });
}

fn benchmark_gateway_response_decoding(c: &mut Criterion) {
    let mut frame = [0u8; GATEWAY_RESPONSE_LEN];
    frame[0] = GATEWAY_ERROR_COMMAND;
    frame[1] = 8;
    frame[2..6].copy_from_slice(&512u32.to_be_bytes());

    c.bench_function("decode_gateway_response", |b| {
        b.iter(|| codec::decode_gateway_response(black_box(&frame)));
    });
}

criterion_group!(
    benches,
    benchmark_push_frame_encoding,
    benchmark_token_decoding,
    benchmark_gateway_response_decoding
);
criterion_main!(benches);
