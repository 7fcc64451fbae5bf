use crate::criteria::{expected_improvement, InfillCriterion, MonteCarloEi, EI};
use crate::errors::{EgoError, Result};
use crate::optimizers::GradientDescentOptimizer;
use crate::solver::ValidNextPointsConfig;
use crate::types::*;
use crate::utils::CancellationToken;
use bayesopt_doe::Domain;
use bayesopt_gp::GaussianProcess;
use log::{debug, info};
use ndarray::{concatenate, Array2, ArrayBase, ArrayView1, Axis, Data, Ix2};
use ndarray_rand::rand::{Rng, SeedableRng};
use ndarray_stats::QuantileExt;
use rand_xoshiro::Xoshiro256Plus;

/// Selection of the next points to evaluate given a GP of the objective function
///
/// Points are chosen to maximize the expected improvement over the best observed value,
/// either jointly (q-EI estimated by Monte Carlo) or one at a time using the
/// constant liar heuristic: once a point is selected, it is added to a copy of the GP
/// as a hypothetical observation of lied value, so that the next point is selected elsewhere.
///
/// The given GP is never modified.
#[derive(Clone, Debug)]
pub struct NextPointsSelector {
    config: ValidNextPointsConfig,
    cancellation: Option<CancellationToken>,
}

impl NextPointsSelector {
    /// Constructor given a validated configuration
    pub fn new(config: ValidNextPointsConfig) -> Self {
        NextPointsSelector {
            config,
            cancellation: None,
        }
    }

    /// Sets a cancellation token checked between multistarts and between selected points
    pub fn cancellation(mut self, token: &CancellationToken) -> Self {
        self.cancellation = Some(token.clone());
        self
    }

    /// Configuration
    pub fn config(&self) -> &ValidNextPointsConfig {
        &self.config
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => Err(EgoError::Cancelled),
            _ => Ok(()),
        }
    }

    fn rng(&self) -> Xoshiro256Plus {
        match self.config.seed {
            Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
            None => Xoshiro256Plus::from_entropy(),
        }
    }

    fn check_inputs(&self, gp: &GaussianProcess<f64>, domain: &Domain<f64>) -> Result<()> {
        if gp.dim() != domain.dim() {
            return Err(EgoError::InvalidConfigError(format!(
                "GP dimension {} does not match domain dimension {}",
                gp.dim(),
                domain.dim()
            )));
        }
        if gp.n_obs() == 0 {
            return Err(EgoError::InvalidConfigError(
                "next points selection requires at least one observation".to_string(),
            ));
        }
        if let Some(pending) = &self.config.points_being_sampled {
            if pending.ncols() != domain.dim() {
                return Err(EgoError::InvalidConfigError(format!(
                    "points being sampled dimension {} does not match domain dimension {}",
                    pending.ncols(),
                    domain.dim()
                )));
            }
        }
        Ok(())
    }

    /// Select `num_to_sample` points in the `domain` given the `gp` of the objective function.
    ///
    /// The reported expected improvement is the one of the whole batch against `gp`:
    /// analytic for a single point, Monte Carlo estimation otherwise.
    pub fn select_batch(
        &self,
        gp: &GaussianProcess<f64>,
        domain: &Domain<f64>,
    ) -> Result<OptimResult> {
        self.check_inputs(gp, domain)?;
        let mut rng = self.rng();
        match self.config.q_ei {
            QEiStrategy::Epi => self.select_jointly(gp, domain, &mut rng),
            QEiStrategy::ConstantLiar => self.select_with_lies(gp, domain, &mut rng),
        }
    }

    /// Maximize `criterion` over `domain` with multistart gradient ascent
    fn maximize_criterion<C: InfillCriterion>(
        &self,
        criterion: &C,
        gp: &GaussianProcess<f64>,
        domain: &Domain<f64>,
        rng: Xoshiro256Plus,
    ) -> Result<AscentResult> {
        let fmin = gp.best_value().ok_or_else(|| {
            EgoError::InvalidConfigError(
                "expected improvement requires at least one observation".to_string(),
            )
        })?;
        let obj = |x: &[f64],
                   gradient: Option<&mut [f64]>,
                   params: &mut InfillObjData<f64>|
         -> f64 {
            if let Some(gradient) = gradient {
                let grad = criterion.grad(x, gp, params.fmin);
                gradient.copy_from_slice(&grad.to_vec());
            }
            criterion.value(x, gp, params.fmin)
        };
        let obj_data = InfillObjData { fmin };
        let mut optimizer = GradientDescentOptimizer::new_with_rng(domain, &obj, &obj_data, rng)
            .num_multistarts(self.config.num_multistarts)
            .num_random_samples(self.config.num_random_samples)
            .params(&self.config.gd_params);
        if let Some(token) = &self.cancellation {
            optimizer = optimizer.cancellation(token);
        }
        optimizer.maximize()
    }

    /// Value assumed at `x` selected but not evaluated yet,
    /// `working_gp` being the GP including previous lies.
    fn lie_value(
        &self,
        gp: &GaussianProcess<f64>,
        working_gp: &GaussianProcess<f64>,
        x: &ArrayView1<f64>,
    ) -> Result<f64> {
        let values = gp.observed_values();
        let no_value = || {
            EgoError::InvalidConfigError(
                "lie value requires at least one observation".to_string(),
            )
        };
        let lie = match &self.config.lie_strategy {
            LieStrategy::Constant(v) => *v,
            LieStrategy::Min => *values.min().map_err(|_| no_value())?,
            LieStrategy::Max => *values.max().map_err(|_| no_value())?,
            LieStrategy::Mean => values.mean().ok_or_else(no_value)?,
            LieStrategy::KrigingBeliever { std_deviation_coef } => {
                let pt = x.to_owned().insert_axis(Axis(0));
                let (pred, var) = working_gp.predict_valvar(&pt)?;
                pred[0] + std_deviation_coef * var[0].sqrt()
            }
        };
        Ok(lie)
    }

    /// Constant liar: points are selected one after the other,
    /// each one maximizing EI of the GP including lies at previously selected points.
    fn select_with_lies(
        &self,
        gp: &GaussianProcess<f64>,
        domain: &Domain<f64>,
        rng: &mut Xoshiro256Plus,
    ) -> Result<OptimResult> {
        let num_to_sample = self.config.num_to_sample;
        let noise = self.config.lie_noise_variance;
        let mut working_gp = gp.clone();
        if let Some(pending) = &self.config.points_being_sampled {
            for x in pending.rows() {
                let lie = self.lie_value(gp, &working_gp, &x)?;
                working_gp = working_gp.with_hypothetical_observation(&x, lie, noise)?;
            }
            debug!("{} pending points lied into the GP", pending.nrows());
        }

        let mut points = Array2::zeros((0, domain.dim()));
        let mut success = true;
        for i in 0..num_to_sample {
            self.check_cancelled()?;
            let sub_rng = Xoshiro256Plus::seed_from_u64(rng.r#gen());
            let res = self.maximize_criterion(&EI, &working_gp, domain, sub_rng)?;
            info!(
                "Point {}/{num_to_sample} selected at {} (EI = {})",
                i + 1,
                res.x_opt,
                res.y_opt
            );
            success &= res.converged;
            if i + 1 < num_to_sample {
                let lie = self.lie_value(gp, &working_gp, &res.x_opt.view())?;
                debug!("Lie {lie} at {}", res.x_opt);
                working_gp = working_gp.with_hypothetical_observation(&res.x_opt, lie, noise)?;
            }
            points = concatenate![Axis(0), points, res.x_opt.insert_axis(Axis(0))];
        }
        let ei = self.joint_expected_improvement(gp, &points, rng)?;
        Ok(OptimResult {
            points,
            expected_improvement: ei,
            optimizer_success: success,
        })
    }

    /// Joint maximization of the q-EI over the product domain,
    /// points being sampled are accounted as fixed points of the batch.
    fn select_jointly(
        &self,
        gp: &GaussianProcess<f64>,
        domain: &Domain<f64>,
        rng: &mut Xoshiro256Plus,
    ) -> Result<OptimResult> {
        let q = self.config.num_to_sample;
        let dim = domain.dim();
        let pending = self.config.points_being_sampled.as_ref();
        self.check_cancelled()?;

        let res = if q == 1 && pending.is_none() {
            let sub_rng = Xoshiro256Plus::seed_from_u64(rng.r#gen());
            self.maximize_criterion(&EI, gp, domain, sub_rng)?
        } else {
            let qei = MonteCarloEi::new(q, self.config.mc_iterations, rng.r#gen());
            let qei = match pending {
                Some(pending) => qei.with_fixed_points(pending),
                None => qei,
            };
            let xlimits = domain.xlimits();
            let product = Domain::new(&Array2::from_shape_fn((q * dim, 2), |(i, j)| {
                xlimits[[i % dim, j]]
            }))?;
            let sub_rng = Xoshiro256Plus::seed_from_u64(rng.r#gen());
            self.maximize_criterion(&qei, gp, &product, sub_rng)?
        };
        info!("Batch of {q} points selected (q-EI = {})", res.y_opt);

        let points = Array2::from_shape_fn((q, dim), |(i, j)| res.x_opt[i * dim + j]);
        let ei = self.joint_expected_improvement(gp, &points, rng)?;
        Ok(OptimResult {
            points,
            expected_improvement: ei,
            optimizer_success: res.converged,
        })
    }

    /// Expected improvement of the selected `points` against `gp`,
    /// points being sampled are part of the evaluated batch.
    fn joint_expected_improvement(
        &self,
        gp: &GaussianProcess<f64>,
        points: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        rng: &mut Xoshiro256Plus,
    ) -> Result<f64> {
        let seed = rng.r#gen();
        match &self.config.points_being_sampled {
            Some(pending) => {
                let batch = concatenate![Axis(0), points.view(), pending.view()];
                expected_improvement(gp, &batch, self.config.mc_iterations, seed)
            }
            None => expected_improvement(gp, points, self.config.mc_iterations, seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizers::GradientDescentParams;
    use crate::solver::NextPointsConfig;
    use approx::assert_abs_diff_eq;
    use bayesopt_gp::{Kernel, KernelKind, Observation};
    use linfa::ParamGuard;
    use ndarray::array;

    fn gp_1d(observations: &[(f64, f64)]) -> GaussianProcess<f64> {
        let kernel = Kernel::new(KernelKind::SquaredExponential, 1, &[1., 0.2]).unwrap();
        let observations: Vec<_> = observations
            .iter()
            .map(|&(x, y)| Observation::new(vec![x], y))
            .collect();
        GaussianProcess::construct(kernel, 1, &observations).unwrap()
    }

    fn fast_config() -> NextPointsConfig {
        NextPointsConfig::default()
            .num_random_samples(50)
            .num_multistarts(3)
            .mc_iterations(2000)
            .seed(42)
    }

    #[test]
    fn test_single_observation_scenario() {
        let gp = gp_1d(&[(0.5, 1.0)]);
        let domain = Domain::new(&array![[0., 1.]]).unwrap();
        let selector = NextPointsSelector::new(fast_config().check().unwrap());
        let res = selector.select_batch(&gp, &domain).unwrap();
        assert_eq!(res.points.dim(), (1, 1));
        assert!(domain.contains(&res.points.row(0)));
        assert!(res.expected_improvement >= 0.);
    }

    #[test]
    fn test_two_points_with_constant_lie() {
        let gp = gp_1d(&[(0.5, 1.0)]);
        let domain = Domain::new(&array![[0., 1.]]).unwrap();
        let config = fast_config()
            .num_to_sample(2)
            .lie_strategy(LieStrategy::Constant(0.0))
            .check()
            .unwrap();
        let res = NextPointsSelector::new(config)
            .select_batch(&gp, &domain)
            .unwrap();
        assert_eq!(res.points.nrows(), 2);
        for x in res.points.rows() {
            assert!(domain.contains(&x));
        }
        assert!(res.expected_improvement >= 0.);
        assert!((res.points[[0, 0]] - res.points[[1, 0]]).abs() > 1e-3);
        // the original GP is left untouched
        assert_eq!(gp.n_obs(), 1);
    }

    #[test]
    fn test_single_point_equals_direct_optimization() {
        let gp = gp_1d(&[(0.1, 0.3), (0.5, -0.2), (0.8, 0.4)]);
        let domain = Domain::new(&array![[0., 1.]]).unwrap();
        let config = fast_config().check().unwrap();
        let res = NextPointsSelector::new(config.clone())
            .select_batch(&gp, &domain)
            .unwrap();

        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let sub_rng = Xoshiro256Plus::seed_from_u64(rng.r#gen());
        let fmin = gp.best_value().unwrap();
        let obj = |x: &[f64],
                   gradient: Option<&mut [f64]>,
                   params: &mut InfillObjData<f64>|
         -> f64 {
            if let Some(gradient) = gradient {
                gradient.copy_from_slice(&EI.grad(x, &gp, params.fmin).to_vec());
            }
            EI.value(x, &gp, params.fmin)
        };
        let obj_data = InfillObjData { fmin };
        let direct = GradientDescentOptimizer::new_with_rng(&domain, &obj, &obj_data, sub_rng)
            .num_multistarts(config.num_multistarts())
            .num_random_samples(config.num_random_samples())
            .params(config.gd_params())
            .maximize()
            .unwrap();

        assert_eq!(res.points.row(0), direct.x_opt);
        assert_abs_diff_eq!(res.expected_improvement, direct.y_opt, epsilon = 1e-12);
        assert_abs_diff_eq!(
            res.expected_improvement,
            EI.value(res.points.as_slice().unwrap(), &gp, fmin),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_lie_strategies() {
        let gp = gp_1d(&[(0.1, 0.3), (0.5, -0.2), (0.8, 0.4)]);
        let x = array![0.3];
        let lie = |strategy| {
            let config = fast_config().lie_strategy(strategy).check().unwrap();
            NextPointsSelector::new(config)
                .lie_value(&gp, &gp, &x.view())
                .unwrap()
        };
        assert_abs_diff_eq!(lie(LieStrategy::Constant(2.)), 2.);
        assert_abs_diff_eq!(lie(LieStrategy::Min), -0.2);
        assert_abs_diff_eq!(lie(LieStrategy::Max), 0.4);
        assert_abs_diff_eq!(lie(LieStrategy::Mean), 0.5 / 3., epsilon = 1e-12);
        let (mean, var) = gp.predict_valvar(&array![[0.3]]).unwrap();
        assert_abs_diff_eq!(
            lie(LieStrategy::KrigingBeliever {
                std_deviation_coef: 0.
            }),
            mean[0]
        );
        assert_abs_diff_eq!(
            lie(LieStrategy::KrigingBeliever {
                std_deviation_coef: -2.
            }),
            mean[0] - 2. * var[0].sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_kriging_believer_batch() {
        let gp = gp_1d(&[(0.1, 0.3), (0.5, -0.2), (0.8, 0.4)]);
        let domain = Domain::new(&array![[0., 1.]]).unwrap();
        let config = fast_config()
            .num_to_sample(3)
            .lie_strategy(LieStrategy::KrigingBeliever {
                std_deviation_coef: 0.,
            })
            .lie_noise_variance(1e-4)
            .check()
            .unwrap();
        let res = NextPointsSelector::new(config)
            .select_batch(&gp, &domain)
            .unwrap();
        assert_eq!(res.points.dim(), (3, 1));
        assert!(res.points.iter().all(|x| (0. ..=1.).contains(x)));
        assert!(res.expected_improvement >= 0.);
    }

    #[test]
    fn test_joint_qei_selection() {
        let kernel = Kernel::new(KernelKind::Matern52, 2, &[1., 0.3]).unwrap();
        let observations = vec![
            Observation::new(vec![0.1, 0.2], 0.3),
            Observation::new(vec![0.5, 0.5], -0.1),
            Observation::new(vec![0.9, 0.1], 0.6),
        ];
        let gp = GaussianProcess::construct(kernel, 2, &observations).unwrap();
        let domain = Domain::new(&array![[0., 1.], [0., 1.]]).unwrap();
        let config = fast_config()
            .num_to_sample(2)
            .qei_strategy(QEiStrategy::Epi)
            .num_random_samples(20)
            .num_multistarts(2)
            .mc_iterations(500)
            .gd_params(GradientDescentParams {
                max_num_steps: 5,
                ..Default::default()
            })
            .points_being_sampled(&array![[0.3, 0.8]])
            .check()
            .unwrap();
        let res = NextPointsSelector::new(config)
            .select_batch(&gp, &domain)
            .unwrap();
        assert_eq!(res.points.dim(), (2, 2));
        for x in res.points.rows() {
            assert!(domain.contains(&x));
        }
        assert!(res.expected_improvement >= 0.);
    }

    #[test]
    fn test_reported_ei_accounts_for_points_being_sampled() {
        let gp = gp_1d(&[(0.1, 0.3), (0.5, -0.2), (0.8, 0.4)]);
        let domain = Domain::new(&array![[0., 1.]]).unwrap();
        let pending = array![[0.45]];
        for strategy in [QEiStrategy::ConstantLiar, QEiStrategy::Epi] {
            let config = fast_config()
                .qei_strategy(strategy)
                .mc_iterations(20000)
                .gd_params(GradientDescentParams {
                    max_num_steps: 5,
                    ..Default::default()
                })
                .points_being_sampled(&pending)
                .check()
                .unwrap();
            let res = NextPointsSelector::new(config)
                .select_batch(&gp, &domain)
                .unwrap();
            let batch = concatenate![Axis(0), res.points.view(), pending.view()];
            let expected = expected_improvement(&gp, &batch, 20000, 3).unwrap();
            assert_abs_diff_eq!(res.expected_improvement, expected, epsilon = 0.01);
        }
    }

    #[test]
    fn test_selection_errors() {
        let gp = gp_1d(&[(0.5, 1.0)]);
        let domain_2d = Domain::new(&array![[0., 1.], [0., 1.]]).unwrap();
        let selector = NextPointsSelector::new(fast_config().check().unwrap());
        let err = selector.select_batch(&gp, &domain_2d).unwrap_err();
        assert!(err.is_configuration_error());

        let kernel = Kernel::new(KernelKind::SquaredExponential, 1, &[1., 0.2]).unwrap();
        let empty = GaussianProcess::construct(kernel, 1, &[]).unwrap();
        let domain = Domain::new(&array![[0., 1.]]).unwrap();
        assert!(selector.select_batch(&empty, &domain).is_err());

        let config = fast_config()
            .points_being_sampled(&array![[0.1, 0.2]])
            .check()
            .unwrap();
        assert!(NextPointsSelector::new(config)
            .select_batch(&gp, &domain)
            .is_err());
    }

    #[test]
    fn test_cancellation() {
        let gp = gp_1d(&[(0.5, 1.0)]);
        let domain = Domain::new(&array![[0., 1.]]).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let res = NextPointsSelector::new(fast_config().num_to_sample(2).check().unwrap())
            .cancellation(&token)
            .select_batch(&gp, &domain);
        assert!(matches!(res, Err(EgoError::Cancelled)));
    }
}
