//! Key Translation Benchmarks
//!
//! Measures the per-event cost of classification, repeat normalization and
//! lock synchronization.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lamco_rdp_keyboard::input::scancode::codes;
use lamco_rdp_keyboard::input::{
    classify, normalize, synchronize, KeyEvent, KeyboardState, KeycodeLookup, LockModifiers,
    Scancode, SyncRequest, X11Keycodes,
};

/// Generate a typing burst: presses with remote repeats, modifiers and releases
fn generate_typing_stream(len: usize) -> Vec<KeyEvent> {
    let lookup = X11Keycodes;
    (0..len)
        .map(|i| {
            let scancode = match i % 7 {
                0 => codes::LSHIFT,
                6 => codes::TAB,
                n => Scancode::new(0x10 + n as u16),
            };
            let keycode = lookup.keycode(scancode).unwrap_or(0);
            if i % 3 == 2 {
                KeyEvent::release(keycode, scancode)
            } else {
                KeyEvent::press(keycode, scancode)
            }
        })
        .collect()
}

fn bench_classify(c: &mut Criterion) {
    let scancodes: Vec<Scancode> = (0u16..0x380).map(Scancode::new).collect();

    c.bench_function("classify_all_scancodes", |b| {
        b.iter(|| {
            for scancode in &scancodes {
                black_box(classify(black_box(*scancode)));
            }
        })
    });
}

fn bench_keycode_lookup(c: &mut Criterion) {
    let lookup = X11Keycodes;
    let scancodes: Vec<Scancode> = (0u16..0x380).map(Scancode::new).collect();

    c.bench_function("x11_keycode_lookup", |b| {
        b.iter(|| {
            for scancode in &scancodes {
                black_box(lookup.keycode(black_box(*scancode)));
            }
        })
    });
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_stream");

    for len in [16usize, 256, 4096] {
        let events = generate_typing_stream(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &events, |b, events| {
            let mut out = Vec::with_capacity(events.len() * 2);
            b.iter(|| {
                let mut state = KeyboardState::default();
                out.clear();
                for event in events {
                    black_box(normalize(&mut state, event, &mut out));
                }
            })
        });
    }

    group.finish();
}

fn bench_synchronize(c: &mut Criterion) {
    let request = SyncRequest::new(true, true, false);
    let current = LockModifiers {
        caps_lock: false,
        num_lock: true,
    };

    c.bench_function("synchronize", |b| {
        let mut out = Vec::with_capacity(9);
        b.iter(|| {
            let mut state = KeyboardState::default();
            out.clear();
            synchronize(&mut state, black_box(request), black_box(current), &mut out);
            black_box(&out);
        })
    });
}

criterion_group!(
    benches,
    bench_classify,
    bench_keycode_lookup,
    bench_normalize,
    bench_synchronize
);
criterion_main!(benches);
