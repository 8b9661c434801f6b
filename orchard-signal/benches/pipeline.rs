use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use orchard_core::{ChannelLayout, EpochMeta, SampleWindow};
use orchard_signal::{EpochBuilder, EpochConfig, FeatureConfig, FeatureExtractor, SourceModel, SourceModelOptions};
use std::sync::Arc;

fn window(layout: ChannelLayout, sample_rate: f64) -> SampleWindow {
    let n = (6.0 * sample_rate) as usize;
    let data = (0..layout.channel_count())
        .map(|ch| {
            (0..n)
                .map(|i| {
                    let t = i as f64 / sample_rate;
                    1e-5 * (std::f64::consts::TAU * 10.0 * t + ch as f64).sin()
                        + 4e-6 * (std::f64::consts::TAU * 50.0 * t).sin()
                })
                .collect()
        })
        .collect();
    SampleWindow {
        data,
        timestamps: (0..n).map(|i| i as f64 / sample_rate).collect(),
        sample_rate,
        layout,
    }
}

fn meta() -> EpochMeta {
    EpochMeta {
        session_id: "bench".into(),
        trial_id: 0,
    }
}

fn bench_epoch_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("epoch_build");
    let builder = EpochBuilder::new(EpochConfig::default());

    for layout in [ChannelLayout::Eight, ChannelLayout::SixtyFour] {
        let w = window(layout, 250.0);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_channels", layout.channel_count())),
            &w,
            |b, w| b.iter(|| builder.build(black_box(w), 1200.0, 1900.0, meta())),
        );
    }
    group.finish();
}

fn bench_feature_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_extract");
    let builder = EpochBuilder::new(EpochConfig::default());

    for layout in [ChannelLayout::Eight, ChannelLayout::SixtyFour] {
        let Ok(model) = SourceModel::build(layout, &SourceModelOptions::default()) else {
            continue;
        };
        let extractor = FeatureExtractor::new(FeatureConfig::default(), Arc::new(model));
        let Ok(epoch) = builder.build(&window(layout, 250.0), 1200.0, 1900.0, meta()) else {
            continue;
        };
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_channels", layout.channel_count())),
            &epoch,
            |b, epoch| b.iter(|| extractor.extract(black_box(epoch))),
        );
    }
    group.finish();
}

fn bench_source_model(c: &mut Criterion) {
    let mut group = c.benchmark_group("source_model_build");
    group.sample_size(10);
    for layout in [ChannelLayout::Four, ChannelLayout::SixtyFour] {
        group.bench_function(format!("{}_channels", layout.channel_count()), |b| {
            b.iter(|| SourceModel::build(black_box(layout), &SourceModelOptions::default()))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_epoch_building,
    bench_feature_extraction,
    bench_source_model
);
criterion_main!(benches);
