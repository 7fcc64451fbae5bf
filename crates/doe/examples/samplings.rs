use bayesopt_doe::Domain;
use ndarray::{arr2, array};
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

fn main() {
    let domain = Domain::new(&arr2(&[[0., 1.], [-10., 10.], [5., 5.]])).expect("valid bounds");
    let n = 10;

    println!("Take {n} samples in");
    println!("{}\n", domain.xlimits());

    println!("*** using random sampling");
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let samples = domain.sample_uniform(n, &mut rng);
    println!("{samples}\n");

    let x = array![2., 0., 3.];
    println!("*** clamping {x} into the domain");
    println!("{}", domain.clamp(&x));
}
