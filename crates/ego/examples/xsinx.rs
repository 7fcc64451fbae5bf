use bayesopt_doe::Domain;
use bayesopt_ego::{NextPointsConfig, NextPointsSelector};
use bayesopt_gp::{GaussianProcess, Kernel, KernelKind, Observation};
use linfa::ParamGuard;
use ndarray::array;

fn xsinx(x: f64) -> f64 {
    (x - 3.5) * ((x - 3.5) / std::f64::consts::PI).sin()
}

fn main() {
    let domain = Domain::new(&array![[0., 25.]]).expect("xsinx domain");
    let kernel = Kernel::new(KernelKind::Matern52, 1, &[50., 3.]).expect("kernel");
    let mut observations: Vec<_> = [0., 7., 25.]
        .iter()
        .map(|&x| Observation::new(vec![x], xsinx(x)))
        .collect();

    for i in 0..15 {
        let gp = GaussianProcess::construct(kernel.clone(), 1, &observations)
            .expect("GP construction");
        let config = NextPointsConfig::default()
            .seed(i)
            .check()
            .expect("selector configured");
        let res = NextPointsSelector::new(config)
            .select_batch(&gp, &domain)
            .expect("next point selection");
        let x = res.points[[0, 0]];
        println!("Iter {i}: x = {x:.4} (EI = {:.3e})", res.expected_improvement);
        observations.push(Observation::new(vec![x], xsinx(x)));
    }

    let best = observations
        .iter()
        .min_by(|a, b| a.value.total_cmp(&b.value))
        .expect("observations");
    println!("Minimum xsinx(x) = {} at x = {:?}", best.value, best.point);
}
