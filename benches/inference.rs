//! Inference benchmark: one request's features → risk probability.

use credit_risk::features::CustomerFeatures;
use credit_risk::model::{CreditRiskPipeline, FeatureTable, GradientBoostingParams, PreprocessorSpec};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn customer(i: usize) -> CustomerFeatures {
    let risky = i % 4 == 0;
    CustomerFeatures {
        customer_id: format!("C{i}"),
        total_transactions: if risky { 1 } else { 5 + (i % 9) as u64 },
        total_value: if risky { 30.0 } else { 900.0 + i as f64 },
        avg_value: if risky { 30.0 } else { 150.0 },
        std_value: if risky { 0.0 } else { 40.0 + (i % 5) as f64 },
        unique_products: if risky { 1 } else { 3 },
        most_frequent_channel: format!("ChannelId_{}", 1 + i % 3),
    }
}

fn fitted(n_estimators: usize) -> CreditRiskPipeline {
    let customers: Vec<CustomerFeatures> = (0..200).map(customer).collect();
    let target: Vec<u8> = (0..200).map(|i| u8::from(i % 4 == 0)).collect();
    let params = GradientBoostingParams {
        n_estimators,
        ..Default::default()
    };
    CreditRiskPipeline::fit(
        &PreprocessorSpec::credit_default(),
        &params,
        &FeatureTable::from_customers(&customers),
        &target,
    )
    .unwrap()
}

fn bench_score_one(c: &mut Criterion) {
    let pipeline = fitted(100);
    let request = customer(7);

    c.bench_function("score_one_customer", |b| {
        b.iter(|| black_box(pipeline.score(black_box(&request))).unwrap())
    });
}

fn bench_score_by_trees(c: &mut Criterion) {
    let request = customer(7);
    let mut g = c.benchmark_group("score_by_n_estimators");
    for n in [10, 50, 100, 200] {
        let pipeline = fitted(n);
        g.bench_with_input(BenchmarkId::from_parameter(n), &request, |b, r| {
            b.iter(|| black_box(pipeline.score(black_box(r))).unwrap())
        });
    }
    g.finish();
}

criterion_group!(benches, bench_score_one, bench_score_by_trees);
criterion_main!(benches);
