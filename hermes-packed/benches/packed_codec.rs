//! Packed codec benchmarks
//!
//! Run with: cargo bench -p hermes-packed --bench packed_codec

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use hermes_packed::block::{BlockPackedReaderIterator, BlockPackedWriter};
use hermes_packed::{
    max_value, BulkCodec, DirectPackedReader, DirectReader, Format, OwnedBytes, PackedArray,
    PackedReaderIterator, PackedWriter, DEFAULT_BUFFER_SIZE,
};

fn random_values(bits: u32, count: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(0xbe9c);
    (0..count)
        .map(|_| rng.random::<u64>() & max_value(bits))
        .collect()
}

fn packed_stream(values: &[u64], bits: u32) -> Vec<u8> {
    let mut writer = PackedWriter::new(
        Vec::new(),
        Format::Packed,
        values.len(),
        bits,
        DEFAULT_BUFFER_SIZE,
    )
    .unwrap();
    for &value in values {
        writer.add(value).unwrap();
    }
    writer.finish().unwrap();
    writer.into_inner()
}

fn bench_bulk_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_codec");
    for bits in [4u32, 13, 32] {
        let codec = BulkCodec::of(Format::Packed, bits).unwrap();
        let iterations = 64;
        let values = random_values(bits, iterations * codec.word_value_count());
        let mut blocks = vec![0u64; iterations * codec.word_block_count()];
        codec.encode_words(&values, &mut blocks, iterations);
        let mut decoded = vec![0u64; values.len()];

        group.throughput(Throughput::Elements(values.len() as u64));
        group.bench_with_input(BenchmarkId::new("decode_words", bits), &bits, |b, _| {
            b.iter(|| codec.decode_words(black_box(&blocks), &mut decoded, iterations))
        });
        group.bench_with_input(BenchmarkId::new("encode_words", bits), &bits, |b, _| {
            b.iter(|| codec.encode_words(black_box(&values), &mut blocks, iterations))
        });
    }
    group.finish();
}

fn bench_stream(c: &mut Criterion) {
    let count = 100_000;
    let mut group = c.benchmark_group("stream");
    for bits in [7u32, 24] {
        let values = random_values(bits, count);
        let stream = packed_stream(&values, bits);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("write", bits), &values, |b, values| {
            b.iter(|| {
                let mut writer = PackedWriter::new(
                    Vec::with_capacity(stream.len()),
                    Format::Packed,
                    values.len(),
                    bits,
                    DEFAULT_BUFFER_SIZE,
                )
                .unwrap();
                for &value in values.iter() {
                    writer.add(value).unwrap();
                }
                writer.finish().unwrap();
                writer.into_inner()
            })
        });
        group.bench_with_input(BenchmarkId::new("read", bits), &stream, |b, stream| {
            b.iter(|| {
                let mut iter = PackedReaderIterator::new(
                    stream.as_slice(),
                    Format::Packed,
                    count,
                    bits,
                    DEFAULT_BUFFER_SIZE,
                )
                .unwrap();
                let mut sum = 0u64;
                for _ in 0..count {
                    sum = sum.wrapping_add(iter.next().unwrap());
                }
                black_box(sum)
            })
        });
    }
    group.finish();
}

fn bench_random_access(c: &mut Criterion) {
    let count = 65_536;
    let bits = 20u32;
    let values = random_values(bits, count);
    let stream = packed_stream(&values, bits);

    let mut array = PackedArray::new(count, bits).unwrap();
    for (i, &value) in values.iter().enumerate() {
        array.set(i, value);
    }
    let direct = DirectReader::new(OwnedBytes::new(stream.clone()), count, bits).unwrap();
    let any_width = DirectPackedReader::new(OwnedBytes::new(stream), count, bits).unwrap();

    let mut group = c.benchmark_group("random_access");
    group.throughput(Throughput::Elements(count as u64));
    group.bench_function("packed_array", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for i in 0..count {
                sum = sum.wrapping_add(array.get(black_box(i)));
            }
            sum
        })
    });
    group.bench_function("direct_reader", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for i in 0..count {
                sum = sum.wrapping_add(direct.get(black_box(i)));
            }
            sum
        })
    });
    group.bench_function("direct_packed_reader", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for i in 0..count {
                sum = sum.wrapping_add(any_width.get(black_box(i)));
            }
            sum
        })
    });
    group.finish();
}

fn bench_block_stream(c: &mut Criterion) {
    let count = 100_000usize;
    let mut rng = StdRng::seed_from_u64(0xd0c5);
    let mut next = 0i64;
    let values: Vec<i64> = (0..count)
        .map(|_| {
            next += rng.random_range(0..512i64);
            next
        })
        .collect();

    let mut writer = BlockPackedWriter::new(Vec::new(), 128).unwrap();
    for &value in values.iter() {
        writer.add(value).unwrap();
    }
    writer.finish().unwrap();
    let stream = writer.into_inner();

    let mut group = c.benchmark_group("block_stream");
    group.throughput(Throughput::Elements(count as u64));
    group.bench_function("write", |b| {
        b.iter(|| {
            let mut writer = BlockPackedWriter::new(Vec::with_capacity(stream.len()), 128).unwrap();
            for &value in values.iter() {
                writer.add(value).unwrap();
            }
            writer.finish().unwrap();
            writer.into_inner()
        })
    });
    group.bench_function("iterate", |b| {
        b.iter(|| {
            let mut iter =
                BlockPackedReaderIterator::new(stream.as_slice(), 128, count as u64).unwrap();
            let mut sum = 0i64;
            for _ in 0..count {
                sum = sum.wrapping_add(iter.next().unwrap());
            }
            black_box(sum)
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_bulk_codec,
    bench_stream,
    bench_random_access,
    bench_block_stream
);
criterion_main!(benches);
