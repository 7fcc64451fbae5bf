use bayesopt_doe::Domain;
use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::aview1;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

fn criterion_sampling(c: &mut Criterion) {
    let dims = [2, 10, 100];
    let sizes = [100, 1000];

    let mut group = c.benchmark_group("doe");
    group.sample_size(10);
    let arr1 = aview1(&[0., 1.]);
    for dim in dims {
        let domain = Domain::new(&arr1.broadcast((dim, 2)).unwrap()).unwrap();
        for size in sizes {
            group.bench_function(format!("uniform-{dim}-dim-{size}-size"), |b| {
                let mut rng = Xoshiro256Plus::seed_from_u64(42);
                b.iter(|| std::hint::black_box(domain.sample_uniform(size, &mut rng)));
            });
        }
    }
    group.finish();
}

criterion_group!(benches, criterion_sampling);
criterion_main!(benches);
