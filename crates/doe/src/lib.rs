/*!
This library implements the box constrained design space used by the optimizer
together with uniform sampling of points within it.

A design space is defined as a 2D ndarray `(nx, 2)`, specifying lower bound and upper bound
of each `nx` components of the samples `x`. A [`Domain`] validates those bounds once
(finite values, `lower <= upper`, at least one dimension) and then answers membership,
clamping and uniform sampling requests. A dimension with `lower == upper` is fixed:
samples and clamped points always take that exact value.

Example:
```
use bayesopt_doe::Domain;
use ndarray::{arr2, array};
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

// Design space is defined as [5., 10.] x [0., 1.], samples are 2-dimensional.
let domain = Domain::new(&arr2(&[[5., 10.], [0., 1.]])).expect("valid bounds");
assert!(domain.contains(&array![6., 0.5]));
assert_eq!(domain.clamp(&array![12., -1.]), array![10., 0.]);

// Draw five samples with a seeded random generator for reproducibility
let mut rng = Xoshiro256Plus::seed_from_u64(42);
let samples = domain.sample_uniform(5, &mut rng);
assert_eq!(samples.nrows(), 5);
assert!(samples.rows().into_iter().all(|x| domain.contains(&x)));
```
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod domain;
mod errors;

pub use domain::*;
pub use errors::*;
