use bayesopt_doe::Domain;
use bayesopt_gp::{GaussianProcess, Kernel, KernelKind, Observation};
use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::{Array1, Axis};
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

fn griewank(x: &Array1<f64>) -> f64 {
    let dim = x.len();
    let d = Array1::linspace(1., dim as f64, dim).mapv(|v| v.sqrt());
    x.mapv(|v| v * v).sum() / 4000. - (x / &d).mapv(|v| v.cos()).fold(1., |acc, x| acc * x) + 1.0
}

fn criterion_gp(c: &mut Criterion) {
    let dims = [2, 5, 10];
    let nts = [50, 100, 200];

    let mut group = c.benchmark_group("gp");
    group.sample_size(20);
    for (&dim, &nt) in dims.iter().zip(nts.iter()) {
        let domain = Domain::from_bounds(&vec![(-600., 600.); dim]).expect("valid domain");
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let xt = domain.sample_uniform(nt, &mut rng);
        let observations: Vec<_> = xt
            .rows()
            .into_iter()
            .map(|x| Observation::new(x.to_vec(), griewank(&x.to_owned())))
            .collect();
        let kernel = Kernel::new(KernelKind::Matern52, dim, &[1., 300.]).expect("valid kernel");
        let gp = GaussianProcess::construct(kernel.clone(), dim, &observations).expect("GP built");
        let xtest = domain.sample_uniform(10, &mut rng);

        group.bench_function(format!("gp construct {dim}"), |b| {
            b.iter(|| {
                std::hint::black_box(
                    GaussianProcess::construct(kernel.clone(), dim, &observations)
                        .expect("GP built"),
                )
            });
        });
        group.bench_function(format!("gp posterior {dim}"), |b| {
            b.iter(|| std::hint::black_box(gp.posterior_mean_variance(&xtest).expect("posterior")));
        });
        group.bench_function(format!("gp hypothetical {dim}"), |b| {
            let x = xtest.index_axis(Axis(0), 0);
            b.iter(|| {
                std::hint::black_box(
                    gp.with_hypothetical_observation(&x, 0., 0.)
                        .expect("extended GP"),
                )
            });
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_gp);
criterion_main!(benches);
