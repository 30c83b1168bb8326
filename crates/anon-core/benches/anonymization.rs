//! Benchmarks for risk assessment, generalization, noise and utility
use anon_core::{
    apply_differential_privacy, assess, evaluate, generalize, Attribute, AttributeRole, AttributeType,
    CancellationToken, Dataset, DifferentialPrivacyConfig, Hierarchy, HierarchySet, KAnonymityConfig, RiskConfig,
    UtilityMetric, Value,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

fn population(n: usize) -> Dataset {
    let mut rng = ChaCha20Rng::seed_from_u64(7);
    let schema = vec![
        Attribute::new("age", AttributeRole::QuasiIdentifier, AttributeType::Numeric),
        Attribute::new("zip", AttributeRole::QuasiIdentifier, AttributeType::Categorical),
        Attribute::new("diagnosis", AttributeRole::Sensitive, AttributeType::Categorical),
        Attribute::new("income", AttributeRole::Insensitive, AttributeType::Numeric),
    ];
    let rows = (0..n)
        .map(|_| {
            vec![
                Value::from(rng.gen_range(18..=90i64)),
                Value::from(format!("{:05}", 2100 + rng.gen_range(0..50))),
                Value::from(["flu", "asthma", "diabetes", "migraine"][rng.gen_range(0..4)]),
                Value::from(rng.gen_range(20_000.0..120_000.0)),
            ]
        })
        .collect();
    Dataset::new(schema, rows).unwrap()
}

fn hierarchies() -> HierarchySet {
    HierarchySet::new()
        .with(Hierarchy::numeric_bands("age", vec![5.0, 10.0, 20.0, 40.0]).unwrap())
        .with(Hierarchy::prefix_mask("zip", 5))
}

fn qis() -> Vec<String> {
    vec!["age".to_string(), "zip".to_string()]
}

fn bench_risk(c: &mut Criterion) {
    let mut group = c.benchmark_group("risk_assessment");
    for size in [1_000, 10_000] {
        let data = population(size);
        let config = RiskConfig::new(qis()).with_sensitive_attribute("diagnosis");
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("assess", size), &data, |b, d| {
            b.iter(|| assess(black_box(d), &config))
        });
    }
    group.finish();
}

fn bench_generalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("k_anonymity");
    group.sample_size(20);
    let token = CancellationToken::new();
    let hierarchies = hierarchies();
    for size in [1_000, 10_000] {
        let data = population(size);
        group.throughput(Throughput::Elements(size as u64));
        for k in [5, 20] {
            let config = KAnonymityConfig::new(qis(), k).with_suppression_limit(0.02);
            group.bench_with_input(BenchmarkId::new(format!("k{}", k), size), &data, |b, d| {
                b.iter(|| generalize(black_box(d), &config, &hierarchies, &token))
            });
        }
    }
    group.finish();
}

fn bench_noise(c: &mut Criterion) {
    let data = population(10_000);
    let token = CancellationToken::new();
    let config = DifferentialPrivacyConfig::new(1.0, 1000.0)
        .with_attributes(["income"])
        .with_seed(42);

    let mut group = c.benchmark_group("differential_privacy");
    group.throughput(Throughput::Elements(10_000));
    group.bench_function("laplace_10k", |b| {
        b.iter(|| apply_differential_privacy(black_box(&data), &config, &token))
    });
    group.finish();
}

fn bench_utility(c: &mut Criterion) {
    let data = population(5_000);
    let config = KAnonymityConfig::new(qis(), 5).with_suppression_limit(0.02);
    let (anonymized, _) = generalize(&data, &config, &hierarchies(), &CancellationToken::new())
        .unwrap()
        .completed()
        .unwrap();
    let metrics = UtilityMetric::standard();

    c.bench_function("utility_standard_5k", |b| {
        b.iter(|| evaluate(black_box(&data), black_box(&anonymized), &metrics))
    });
}

criterion_group!(benches, bench_risk, bench_generalization, bench_noise, bench_utility);
criterion_main!(benches);
