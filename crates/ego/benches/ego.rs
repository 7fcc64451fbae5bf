use bayesopt_doe::Domain;
use bayesopt_ego::{
    BAYESOPT_LOG, LieStrategy, NextPointsConfig, NextPointsSelector, QEiStrategy,
};
use bayesopt_gp::{GaussianProcess, Kernel, KernelKind, Observation};
use criterion::{Criterion, criterion_group, criterion_main};
use env_logger::{Builder, Env};
use linfa::ParamGuard;
use ndarray::array;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

/// Ackley GP: min f(x)=0 at x=(0, 0, 0)
fn ackley_gp(domain: &Domain<f64>) -> GaussianProcess<f64> {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let xt = domain.sample_uniform(30, &mut rng);
    let observations: Vec<_> = xt
        .rows()
        .into_iter()
        .map(|x| Observation::new(x.to_vec(), argmin_testfunctions::ackley(&x.to_vec())))
        .collect();
    let kernel = Kernel::new(KernelKind::Matern52, 3, &[10., 8.]).expect("Ackley kernel");
    GaussianProcess::construct(kernel, 3, &observations).expect("Ackley GP")
}

fn criterion_ego(c: &mut Criterion) {
    let xlimits = array![[-32.768, 32.768], [-32.768, 32.768], [-32.768, 32.768]];
    let domain = Domain::new(&xlimits).expect("Ackley domain");
    let gp = ackley_gp(&domain);

    let mut group = c.benchmark_group("ego");
    group.sample_size(20);
    let env = Env::new().filter_or(BAYESOPT_LOG, "error");
    let mut builder = Builder::from_env(env);
    let builder = builder.target(env_logger::Target::Stdout);
    builder.try_init().ok();

    group.bench_function("ego ackley constant liar", |b| {
        let config = NextPointsConfig::default()
            .num_to_sample(4)
            .lie_strategy(LieStrategy::Min)
            .seed(42)
            .check()
            .expect("Selector configured");
        let selector = NextPointsSelector::new(config);
        b.iter(|| {
            std::hint::black_box(selector.select_batch(&gp, &domain).expect("Selection"))
        });
    });

    group.bench_function("ego ackley epi", |b| {
        let config = NextPointsConfig::default()
            .num_to_sample(2)
            .qei_strategy(QEiStrategy::Epi)
            .mc_iterations(1000)
            .num_random_samples(50)
            .seed(42)
            .check()
            .expect("Selector configured");
        let selector = NextPointsSelector::new(config);
        b.iter(|| {
            std::hint::black_box(selector.select_batch(&gp, &domain).expect("Selection"))
        });
    });

    group.finish();
}

criterion_group!(benches, criterion_ego);
criterion_main!(benches);
