//! Benchmarks for the hand-rolled codecs
//!
//! - base58 encode/decode of 32-byte addresses and 64-byte signatures
//! - building and signing a native transfer
//! - signing an opaque versioned transaction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use bundler::base58;
use bundler::tx_builder::{build_transfer, sign_versioned};
use bundler::wallet::Keypair;

fn bench_base58(c: &mut Criterion) {
    let mut group = c.benchmark_group("base58");

    for len in [32usize, 64] {
        let bytes: Vec<u8> = (0..len as u8).map(|b| b.wrapping_mul(37)).collect();
        let encoded = base58::encode(&bytes);

        group.bench_with_input(BenchmarkId::new("encode", len), &bytes, |b, bytes| {
            b.iter(|| base58::encode(black_box(bytes)))
        });
        group.bench_with_input(BenchmarkId::new("decode", len), &encoded, |b, encoded| {
            b.iter(|| base58::decode(black_box(encoded)))
        });
    }

    group.finish();
}

fn bench_transfer(c: &mut Criterion) {
    let sender = Keypair::from_seed(&[1u8; 32]);
    let recipient = Keypair::from_seed(&[2u8; 32]).address().to_string();
    let blockhash = [7u8; 32];

    c.bench_function("build_transfer", |b| {
        b.iter(|| {
            build_transfer(
                black_box(&sender),
                black_box(&recipient),
                black_box(10_000_000),
                &blockhash,
            )
        })
    });
}

fn bench_sign_versioned(c: &mut Criterion) {
    let signer = Keypair::from_seed(&[3u8; 32]);
    let mut tx = vec![0x80, 1];
    tx.extend_from_slice(&[0u8; 64]);
    tx.extend_from_slice(&[0xAB; 900]);

    c.bench_function("sign_versioned_1kb", |b| {
        b.iter(|| sign_versioned(black_box(tx.clone()), &signer))
    });
}

criterion_group!(benches, bench_base58, bench_transfer, bench_sign_versioned);
criterion_main!(benches);
