//! Criterion benchmarks for puente-core block copies and transport
//!
//! Run with: cargo bench -p puente-core
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use puente_core::{
    BlockBuffer, BlockLayout, SampleMatrix, block_channel, gather_block, scatter_block,
};

const FRAME_COUNTS: &[usize] = &[64, 128, 256, 512, 1024];
const CHANNELS: usize = 8;

fn test_matrix(channels: usize, frames: usize) -> SampleMatrix {
    let mut m = SampleMatrix::zeroed(channels, frames);
    for c in 0..channels {
        for (j, slot) in m.row_mut(c).iter_mut().enumerate() {
            *slot = ((c * frames + j) as f32).sin() * 0.5;
        }
    }
    m
}

fn bench_copies(c: &mut Criterion) {
    let mut group = c.benchmark_group("strided_copies");

    for &frames in FRAME_COUNTS {
        let matrix = test_matrix(CHANNELS, frames);
        let layout = BlockLayout::new(CHANNELS, frames);

        group.bench_with_input(BenchmarkId::new("gather", frames), &frames, |b, _| {
            let mut block = BlockBuffer::new(layout);
            b.iter(|| gather_block(black_box(&matrix), &mut block));
        });

        group.bench_with_input(BenchmarkId::new("scatter", frames), &frames, |b, _| {
            let mut block = BlockBuffer::new(layout);
            gather_block(&matrix, &mut block);
            let mut out = SampleMatrix::zeroed(CHANNELS, frames);
            b.iter(|| scatter_block(black_box(&block), &mut out));
        });
    }

    group.finish();
}

fn bench_channel(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_channel");

    for &frames in FRAME_COUNTS {
        let block_len = CHANNELS * frames;
        let payload: Vec<f32> = (0..block_len).map(|i| i as f32).collect();

        group.bench_with_input(
            BenchmarkId::new("send_recv_round_trip", frames),
            &frames,
            |b, _| {
                let (tx, rx) = block_channel(block_len);
                let mut out = vec![0.0f32; block_len];
                b.iter(|| {
                    assert!(tx.try_send_block(black_box(&payload)));
                    assert!(rx.try_recv_block(black_box(&mut out)));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_copies, bench_channel);
criterion_main!(benches);
