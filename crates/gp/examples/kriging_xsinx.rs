use bayesopt_gp::{GaussianProcess, Kernel, KernelKind, Observation};
use ndarray::{arr2, concatenate, Array, Array1, Array2, Axis};

fn xsinx(x: &Array2<f64>) -> Array1<f64> {
    ((x - 3.5) * ((x - 3.5) / std::f64::consts::PI).mapv(|v| v.sin())).remove_axis(Axis(1))
}

fn main() {
    let xt = arr2(&[[0.0], [5.0], [10.0], [15.0], [18.0], [20.0], [25.0]]);
    let yt = xsinx(&xt);
    let observations: Vec<_> = xt
        .rows()
        .into_iter()
        .zip(yt.iter())
        .map(|(x, &y)| Observation::new(x.to_vec(), y))
        .collect();

    println!("Condition GP on 'xsinx' at {}", xt.column(0));
    let kernel = Kernel::new(KernelKind::SquaredExponential, 1, &[100., 4.]).expect("valid kernel");
    let gp = GaussianProcess::construct(kernel, 1, &observations).expect("GP built");

    let xtest = Array::linspace(0., 25., 26).insert_axis(Axis(1));
    let ytest = xsinx(&xtest);
    let (ypred, yvar) = gp.predict_valvar(&xtest).expect("GP prediction");
    let ysigma = yvar.mapv(|v| v.sqrt());

    println!("Compute prediction errors (x, err(x), sigma(x))");
    println!(
        "{}",
        concatenate![
            Axis(1),
            xtest,
            (ypred - ytest).insert_axis(Axis(1)),
            ysigma.insert_axis(Axis(1))
        ]
    );
}
