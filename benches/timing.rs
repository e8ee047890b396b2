//! Encapsulation throughput and rejection-path timing.
//!
//! Run with: `cargo bench --bench timing`
//!
//! The `reject` group should show valid, tampered and wrong-modifier
//! decapsulation landing close together: all three derive keys and check the
//! tag before failing. Structural rejects (`short`) return early and carry no
//! key-dependent information.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use citadel_keyblob::{
    Access, CipherContext, CoverMode, EncryptOptions, KeyBuffer, Keyblob, MemoryClass,
    Permissions,
};

const KEYMOD: &[u8; 16] = b"bench-mod-000000";
const KEY_SIZES: &[usize] = &[16, 32, 64, 512, 4096];

fn engine() -> (Keyblob, Access) {
    (
        Keyblob::new(CipherContext::generate()),
        Access::new(Permissions::BLOB, MemoryClass::General),
    )
}

fn bench_encrypt(c: &mut Criterion) {
    let (kb, access) = engine();
    let mut group = c.benchmark_group("encrypt");

    for &size in KEY_SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        let key = KeyBuffer::red(vec![0x42u8; size], MemoryClass::General);
        for cover in [CoverMode::Ecb, CoverMode::Ccm] {
            let opts = EncryptOptions::new().with_cover(cover);
            group.bench_with_input(BenchmarkId::new(cover.to_string(), size), &key, |b, key| {
                b.iter(|| kb.encrypt(black_box(key), KEYMOD, &opts, &access));
            });
        }
    }

    group.finish();
}

fn bench_decrypt(c: &mut Criterion) {
    let (kb, access) = engine();
    let mut group = c.benchmark_group("decrypt");

    for &size in KEY_SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        let key = KeyBuffer::red(vec![0x42u8; size], MemoryClass::General);
        for cover in [CoverMode::Ecb, CoverMode::Ccm] {
            let opts = EncryptOptions::new().with_cover(cover);
            let blob = kb.encrypt(&key, KEYMOD, &opts, &access).unwrap();
            group.bench_with_input(BenchmarkId::new(cover.to_string(), size), &blob, |b, blob| {
                b.iter(|| kb.decrypt(black_box(blob), KEYMOD, &access));
            });
        }
    }

    group.finish();
}

fn bench_reject(c: &mut Criterion) {
    let (kb, access) = engine();
    let key = KeyBuffer::red(vec![0x42u8; 32], MemoryClass::General);
    let blob = kb.encrypt(&key, KEYMOD, &EncryptOptions::new(), &access).unwrap();

    let mut tampered = blob.as_bytes().to_vec();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;
    let tampered = KeyBuffer::black(tampered);
    let short = KeyBuffer::black(vec![0u8; 5]);

    let mut group = c.benchmark_group("reject");
    group.bench_function("valid", |b| {
        b.iter(|| kb.decrypt(black_box(&blob), KEYMOD, &access))
    });
    group.bench_function("tampered", |b| {
        b.iter(|| kb.decrypt(black_box(&tampered), KEYMOD, &access).err())
    });
    group.bench_function("wrong_keymod", |b| {
        b.iter(|| kb.decrypt(black_box(&blob), b"bench-mod-000001", &access).err())
    });
    group.bench_function("short", |b| {
        b.iter(|| kb.decrypt(black_box(&short), KEYMOD, &access).err())
    });
    group.finish();
}

criterion_group!(benches, bench_encrypt, bench_decrypt, bench_reject);
criterion_main!(benches);
