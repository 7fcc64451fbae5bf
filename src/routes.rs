//! Request handling: payloads are turned into a domain, a GP and a selection configuration.
use crate::errors::{BayesoptError, Result};
use crate::types::*;
use bayesopt_doe::Domain;
use bayesopt_ego::{
    expected_improvement, CancellationToken, LieStrategy, NextPointsConfig, NextPointsSelector,
    QEiStrategy, DEFAULT_MC_ITERATIONS,
};
use bayesopt_gp::{GaussianProcess, Kernel, Observation};
use linfa::ParamGuard;
use log::info;
use ndarray::{concatenate, Array2, Axis};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Next points selection routes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum NextPointsRoute {
    /// Joint maximization of the multi-points expected improvement
    Epi,
    /// Sequential selection with lies at selected points
    #[default]
    ConstantLiar,
    /// Sequential selection lying with the GP posterior mean
    Kriging,
}

impl NextPointsRoute {
    /// Endpoint name reported in responses
    pub fn endpoint(&self) -> &'static str {
        match self {
            NextPointsRoute::Epi => "gp_next_points_epi",
            NextPointsRoute::ConstantLiar => "gp_next_points_constant_liar",
            NextPointsRoute::Kriging => "gp_next_points_kriging",
        }
    }
}

impl fmt::Display for NextPointsRoute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}

/// Endpoint name of GP posterior moments responses
pub const GP_MEAN_VAR_ENDPOINT: &str = "gp_mean_var";
/// Endpoint name of expected improvement responses
pub const GP_EI_ENDPOINT: &str = "gp_ei";

impl DomainInfo {
    /// Validated box domain
    pub fn to_domain(&self) -> Result<Domain<f64>> {
        if self.dim != self.domain_bounds.len() {
            return Err(BayesoptError::InvalidRequest(format!(
                "domain dim {} does not match the number of bounds {}",
                self.dim,
                self.domain_bounds.len()
            )));
        }
        let bounds: Vec<(f64, f64)> = self.domain_bounds.iter().map(|b| (b.min, b.max)).collect();
        Ok(Domain::from_bounds(&bounds)?)
    }
}

impl CovarianceInfo {
    /// Kernel for `dim`-dimensional inputs
    pub fn to_kernel(&self, dim: usize) -> Result<Kernel<f64>> {
        Ok(Kernel::new(self.covariance_type, dim, &self.hyperparameters)?)
    }
}

impl GpHistoricalInfo {
    /// Dimension of sampled points, None when nothing was sampled
    pub fn dim(&self) -> Option<usize> {
        self.points_sampled.first().map(|p| p.point.len())
    }

    /// Observations of the GP
    pub fn observations(&self) -> Vec<Observation<f64>> {
        self.points_sampled
            .iter()
            .map(|p| Observation::new(p.point.clone(), p.value).with_noise(p.value_var))
            .collect()
    }

    /// GP conditioned on the sampled points
    pub fn to_gp(&self, covariance: &CovarianceInfo, dim: usize) -> Result<GaussianProcess<f64>> {
        let kernel = covariance.to_kernel(dim)?;
        Ok(GaussianProcess::construct(kernel, dim, &self.observations())?)
    }
}

/// (n, dim) matrix from rows of points
fn to_points(rows: &[Vec<f64>], dim: usize) -> Result<Array2<f64>> {
    if let Some(row) = rows.iter().find(|row| row.len() != dim) {
        return Err(BayesoptError::InvalidRequest(format!(
            "point of dimension {} given, expected {dim}",
            row.len()
        )));
    }
    let data: Vec<f64> = rows.iter().flatten().cloned().collect();
    Array2::from_shape_vec((rows.len(), dim), data)
        .map_err(|err| BayesoptError::InvalidRequest(err.to_string()))
}

fn to_rows(points: &Array2<f64>) -> Vec<Vec<f64>> {
    points.rows().into_iter().map(|row| row.to_vec()).collect()
}

/// Dimension of the request taken from the sampled points or else the pending or evaluated ones
fn request_dim(history: &GpHistoricalInfo, others: &[&[Vec<f64>]]) -> Result<usize> {
    history
        .dim()
        .or_else(|| others.iter().find_map(|rows| rows.first().map(|r| r.len())))
        .ok_or_else(|| {
            BayesoptError::InvalidRequest(
                "dimension cannot be inferred from the request".to_string(),
            )
        })
}

/// Selection configuration of the given route
pub fn next_points_config(
    route: NextPointsRoute,
    request: &NextPointsRequest,
    dim: usize,
) -> Result<NextPointsConfig> {
    let mut config = NextPointsConfig::default()
        .num_to_sample(request.num_to_sample)
        .mc_iterations(request.mc_iterations.unwrap_or(DEFAULT_MC_ITERATIONS));
    config = match route {
        NextPointsRoute::Epi => config.qei_strategy(QEiStrategy::Epi),
        NextPointsRoute::ConstantLiar => {
            let lie = match request.lie_value {
                Some(value) => LieStrategy::Constant(value),
                None => request.lie_method.unwrap_or_default().into(),
            };
            config
                .qei_strategy(QEiStrategy::ConstantLiar)
                .lie_strategy(lie)
                .lie_noise_variance(request.lie_noise_variance.unwrap_or(0.))
        }
        NextPointsRoute::Kriging => config
            .qei_strategy(QEiStrategy::ConstantLiar)
            .lie_strategy(LieStrategy::KrigingBeliever {
                std_deviation_coef: request.kriging_std_deviation_coef.unwrap_or(0.),
            })
            .lie_noise_variance(request.kriging_noise_variance.unwrap_or(0.)),
    };
    let optim = &request.optimization_info;
    if let Some(num_multistarts) = optim.num_multistarts {
        config = config.num_multistarts(num_multistarts);
    }
    if let Some(num_random_samples) = optim.num_random_samples {
        config = config.num_random_samples(num_random_samples);
    }
    if let Some(params) = &optim.optimization_parameters {
        config = config.gd_params(params.clone());
    }
    if let Some(pending) = &request.points_being_sampled {
        if !pending.is_empty() {
            config = config.points_being_sampled(&to_points(pending, dim)?);
        }
    }
    if let Some(seed) = request.seed {
        config = config.seed(seed);
    }
    Ok(config)
}

/// Next points to sample following the given route
pub fn next_points(
    route: NextPointsRoute,
    request: &NextPointsRequest,
    cancellation: Option<&CancellationToken>,
) -> Result<NextPointsResponse> {
    let domain = request.domain_info.to_domain()?;
    let dim = domain.dim();
    if let Some(sampled_dim) = request.gp_historical_info.dim() {
        if sampled_dim != dim {
            return Err(BayesoptError::InvalidRequest(format!(
                "sampled points dimension {sampled_dim} does not match domain dimension {dim}"
            )));
        }
    }
    let config = next_points_config(route, request, dim)?.check()?;
    let gp = request
        .gp_historical_info
        .to_gp(&request.covariance_info, dim)?;
    info!(
        "{route}: selecting {} points from {} observations",
        config.num_to_sample(),
        gp.n_obs()
    );

    let mut selector = NextPointsSelector::new(config);
    if let Some(token) = cancellation {
        selector = selector.cancellation(token);
    }
    let res = selector.select_batch(&gp, &domain)?;
    Ok(NextPointsResponse {
        endpoint: route.endpoint().to_string(),
        points_to_sample: to_rows(&res.points),
        expected_improvement: res.expected_improvement,
        status: NextPointsStatus {
            optimizer_success: res.optimizer_success,
        },
    })
}

/// GP posterior mean and covariance at the points to evaluate
pub fn gp_mean_var(request: &GpMeanVarRequest) -> Result<GpMeanVarResponse> {
    let dim = request_dim(&request.gp_historical_info, &[&request.points_to_evaluate])?;
    let gp = request
        .gp_historical_info
        .to_gp(&request.covariance_info, dim)?;
    let points = to_points(&request.points_to_evaluate, dim)?;
    let (mean, cov) = gp.posterior_mean_variance(&points)?;
    Ok(GpMeanVarResponse {
        endpoint: GP_MEAN_VAR_ENDPOINT.to_string(),
        mean: mean.to_vec(),
        var: to_rows(&cov),
    })
}

/// Expected improvement of each point to evaluate together with the points being sampled
pub fn gp_ei(request: &GpEiRequest) -> Result<GpEiResponse> {
    let pending_rows = request.points_being_sampled.clone().unwrap_or_default();
    let dim = request_dim(
        &request.gp_historical_info,
        &[&request.points_to_evaluate, &pending_rows],
    )?;
    let gp = request
        .gp_historical_info
        .to_gp(&request.covariance_info, dim)?;
    let points = to_points(&request.points_to_evaluate, dim)?;
    let pending = to_points(&pending_rows, dim)?;
    let mc_iterations = request.mc_iterations.unwrap_or(DEFAULT_MC_ITERATIONS);
    let mut rng = match request.seed {
        Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
        None => Xoshiro256Plus::from_entropy(),
    };

    let expected_improvement = points
        .rows()
        .into_iter()
        .map(|x| {
            let batch = concatenate![Axis(0), x.insert_axis(Axis(0)), pending.view()];
            Ok(expected_improvement(&gp, &batch, mc_iterations, rng.r#gen())?)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(GpEiResponse {
        endpoint: GP_EI_ENDPOINT.to_string(),
        expected_improvement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn request(num_to_sample: usize) -> NextPointsRequest {
        serde_json::from_value(serde_json::json!({
            "num_to_sample": num_to_sample,
            "mc_iterations": 1000,
            "gp_info": {
                "points_sampled": [
                    {"point": [0.1], "value": 0.3, "value_var": 0.0},
                    {"point": [0.5], "value": -0.2, "value_var": 0.01},
                    {"point": [0.8], "value": 0.4}
                ]
            },
            "covariance_info": {
                "covariance_type": "square_exponential",
                "hyperparameters": [1.0, 0.2]
            },
            "domain_info": {"dim": 1, "domain_bounds": [{"min": 0.0, "max": 1.0}]},
            "optimization_info": {
                "num_multistarts": 3,
                "num_random_samples": 50,
                "optimization_parameters": {"max_num_steps": 20}
            },
            "seed": 7
        }))
        .unwrap()
    }

    #[test]
    fn test_request_defaults() {
        let req = request(2);
        assert_eq!(req.gp_historical_info.points_sampled[2].value_var, 0.);
        let config = next_points_config(NextPointsRoute::ConstantLiar, &req, 1)
            .unwrap()
            .check()
            .unwrap();
        assert_eq!(config.lie_strategy(), &LieStrategy::Min);
        assert_eq!(config.num_multistarts(), 3);
        assert_eq!(config.gd_params().max_num_steps, 20);
        assert_eq!(config.gd_params().gamma, 0.7);
    }

    #[test]
    fn test_route_configs() {
        let mut req = request(2);
        req.lie_value = Some(0.);
        req.lie_method = Some(LieMethod::ConstantLiarMax);
        let config = next_points_config(NextPointsRoute::ConstantLiar, &req, 1)
            .unwrap()
            .check()
            .unwrap();
        assert_eq!(config.lie_strategy(), &LieStrategy::Constant(0.));

        req.kriging_noise_variance = Some(1e-3);
        let config = next_points_config(NextPointsRoute::Kriging, &req, 1)
            .unwrap()
            .check()
            .unwrap();
        assert_eq!(
            config.lie_strategy(),
            &LieStrategy::KrigingBeliever {
                std_deviation_coef: 0.
            }
        );
        assert_eq!(config.lie_noise_variance(), 1e-3);

        let config = next_points_config(NextPointsRoute::Epi, &req, 1)
            .unwrap()
            .check()
            .unwrap();
        assert_eq!(config.q_ei(), &QEiStrategy::Epi);
    }

    #[test]
    fn test_next_points_routes() {
        for route in [
            NextPointsRoute::Epi,
            NextPointsRoute::ConstantLiar,
            NextPointsRoute::Kriging,
        ] {
            let res = next_points(route, &request(2), None).unwrap();
            assert_eq!(res.endpoint, route.endpoint());
            assert_eq!(res.points_to_sample.len(), 2);
            assert!(res
                .points_to_sample
                .iter()
                .all(|p| p.len() == 1 && (0. ..=1.).contains(&p[0])));
            assert!(res.expected_improvement >= 0.);
        }
    }

    #[test]
    fn test_invalid_domain_is_rejected() {
        let mut req = request(1);
        req.domain_info.domain_bounds[0] = Bound { min: 1., max: 0. };
        let err = next_points(NextPointsRoute::ConstantLiar, &req, None).unwrap_err();
        assert!(err.is_configuration_error());

        let mut req = request(1);
        req.domain_info.dim = 2;
        assert!(next_points(NextPointsRoute::ConstantLiar, &req, None).is_err());

        let mut req = request(1);
        req.num_to_sample = 0;
        let err = next_points(NextPointsRoute::Epi, &req, None).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_gp_mean_var() {
        let req: GpMeanVarRequest = serde_json::from_value(serde_json::json!({
            "gp_historical_info": {"points_sampled": [{"point": [0.0, 0.0], "value": 1.0}]},
            "covariance_info": {"covariance_type": "matern52", "hyperparameters": [2.0, 1.0]},
            "points_to_evaluate": [[0.0, 0.0], [5.0, 5.0]]
        }))
        .unwrap();
        let res = gp_mean_var(&req).unwrap();
        assert_eq!(res.endpoint, GP_MEAN_VAR_ENDPOINT);
        assert_abs_diff_eq!(res.mean[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(res.var[0][0], 0.0, epsilon = 1e-6);
        // far from data the prior is recovered
        assert_abs_diff_eq!(res.var[1][1], 2.0, epsilon = 1e-3);
        assert_abs_diff_eq!(res.var[0][1], res.var[1][0]);
    }

    #[test]
    fn test_gp_ei() {
        let req: GpEiRequest = serde_json::from_value(serde_json::json!({
            "gp_historical_info": {"points_sampled": [
                {"point": [0.1], "value": 0.3},
                {"point": [0.5], "value": -0.2}
            ]},
            "covariance_info": {"hyperparameters": [1.0, 0.2]},
            "points_to_evaluate": [[0.5], [0.9]],
            "seed": 3
        }))
        .unwrap();
        let res = gp_ei(&req).unwrap();
        assert_eq!(res.expected_improvement.len(), 2);
        assert_abs_diff_eq!(res.expected_improvement[0], 0., epsilon = 1e-6);
        assert!(res.expected_improvement[1] > 0.);

        let mut with_pending = req.clone();
        with_pending.points_being_sampled = Some(vec![vec![0.3]]);
        with_pending.mc_iterations = Some(20_000);
        let pending = gp_ei(&with_pending).unwrap();
        // pending points can only add improvement
        assert!(pending.expected_improvement[1] >= 0.9 * res.expected_improvement[1]);
    }
}
