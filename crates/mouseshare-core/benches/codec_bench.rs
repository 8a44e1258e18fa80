//! Criterion benchmarks for the session frame codec.
//!
//! The codec sits on the per-event hot path (one frame per captured input
//! event), so encode and decode both need to stay well under a microsecond.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mouseshare_core::protocol::codec::{decode_event, encode_event};
use mouseshare_core::protocol::event::{Edge, Event, MouseButton};

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    let mouse_move = Event::MouseMove { x: 960, y: 540, dx: 3, dy: -1 };
    group.bench_function("mouse_move", |b| {
        b.iter(|| encode_event(black_box(&mouse_move), black_box(123_456)))
    });

    let key = Event::Key { vk: 0x41, scan: 0x1E, flags: 0, pressed: true };
    group.bench_function("key_press", |b| {
        b.iter(|| encode_event(black_box(&key), black_box(123_456)))
    });

    let switch = Event::SwitchScreen { edge: Edge::Left, position: 500 };
    group.bench_function("switch_screen", |b| {
        b.iter(|| encode_event(black_box(&switch), black_box(123_456)))
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    let mouse_move = encode_event(&Event::MouseMove { x: 960, y: 540, dx: 3, dy: -1 }, 0);
    group.bench_function("mouse_move", |b| {
        b.iter(|| decode_event(black_box(&mouse_move)).unwrap())
    });

    let button = encode_event(&Event::MouseButton { button: MouseButton::Left, pressed: true }, 0);
    group.bench_function("mouse_button", |b| {
        b.iter(|| decode_event(black_box(&button)).unwrap())
    });

    let keepalive = encode_event(&Event::Keepalive, 0);
    group.bench_function("keepalive", |b| {
        b.iter(|| decode_event(black_box(&keepalive)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
