//! Benchmarks for the carbonara codecs and aggregation
//!
//! Run with: cargo bench

use carbonara::carbonara::{
    seconds, AggregatedSeries, Aggregation, AggregationMethod, BoundTimeSeries, GroupedSeries, Grouping, TimeSeries,
    POINTS_PER_SPLIT,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn create_test_series(count: usize) -> TimeSeries {
    TimeSeries::from_points((0..count).map(|i| (seconds(i as i64), (i % 97) as f64)))
}

fn bench_raw_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("raw_buffer");

    for size in [100, 1000, 10000] {
        let bound = BoundTimeSeries::from_series(create_test_series(size), None, 0);

        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("serialize_{}", size), |b| b.iter(|| black_box(&bound).serialize()));

        let data = bound.serialize();

        group.bench_function(format!("unserialize_{}", size), |b| {
            b.iter(|| BoundTimeSeries::unserialize(black_box(&data), None, 0).unwrap())
        });
    }

    group.finish();
}

fn bench_chunks(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunks");
    let aggregation = Aggregation::new(AggregationMethod::Mean, seconds(1), None);
    let size = POINTS_PER_SPLIT as usize;
    let series = AggregatedSeries::from_series(aggregation.clone(), create_test_series(size));
    let (key, chunk) = series.split().remove(0);

    group.throughput(Throughput::Elements(size as u64));

    for compressed in [true, false] {
        let name = if compressed { "compressed" } else { "padded" };

        group.bench_function(format!("serialize_{}", name), |b| {
            b.iter(|| black_box(&chunk).serialize(&key, compressed).unwrap())
        });

        let (offset, data) = chunk.serialize(&key, compressed).unwrap();
        let mut stored = vec![0u8; offset];
        stored.extend(data);

        group.bench_function(format!("unserialize_{}", name), |b| {
            b.iter(|| AggregatedSeries::unserialize(black_box(&stored), &key, aggregation.clone()).unwrap())
        });
    }

    group.finish();
}

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");
    let series = create_test_series(86_400);
    let grouped = GroupedSeries::new(&series, Grouping::Fixed(seconds(60)), None).unwrap();

    group.throughput(Throughput::Elements(series.len() as u64));

    group.bench_function("group_by_minute", |b| {
        b.iter(|| GroupedSeries::new(black_box(&series), Grouping::Fixed(seconds(60)), None).unwrap())
    });

    for method in ["mean", "max", "std", "median", "95pct", "rate:mean"] {
        let method = AggregationMethod::from_name(method).unwrap();
        group.bench_function(format!("aggregate_{}", method), |b| {
            b.iter(|| black_box(&grouped).aggregate(&method).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_raw_buffer, bench_chunks, bench_aggregation);
criterion_main!(benches);
