//! JSON request and response payloads.
use bayesopt_ego::{GradientDescentParams, LieStrategy};
use bayesopt_gp::KernelKind;
use serde::{Deserialize, Serialize};

/// An evaluated point of the objective function
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampledPoint {
    /// Location
    pub point: Vec<f64>,
    /// Objective value
    pub value: f64,
    /// Noise variance of the value
    #[serde(default)]
    pub value_var: f64,
}

/// Evaluations known so far
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GpHistoricalInfo {
    /// Evaluated points
    pub points_sampled: Vec<SampledPoint>,
}

/// GP covariance description
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CovarianceInfo {
    /// Kernel type
    #[serde(default)]
    pub covariance_type: KernelKind,
    /// `[signal_variance, length_scale_1, ..., length_scale_nx]` or `[signal_variance, length_scale]`
    pub hyperparameters: Vec<f64>,
}

/// Bounds of a component
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
}

/// Box domain description
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainInfo {
    /// Dimension of the domain
    pub dim: usize,
    /// Bounds of each component
    pub domain_bounds: Vec<Bound>,
}

/// Criterion maximization settings
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationInfo {
    /// Number of gradient ascents
    pub num_multistarts: Option<usize>,
    /// Number of random samples among which the best starting points are taken
    pub num_random_samples: Option<usize>,
    /// Gradient ascent parameters, missing ones take default values
    pub optimization_parameters: Option<GradientDescentParams>,
}

/// Lie policy named as in the request payloads
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LieMethod {
    /// Minimum observed value
    #[default]
    ConstantLiarMin,
    /// Maximum observed value
    ConstantLiarMax,
    /// Mean of observed values
    ConstantLiarMean,
}

impl From<LieMethod> for LieStrategy {
    fn from(method: LieMethod) -> LieStrategy {
        match method {
            LieMethod::ConstantLiarMin => LieStrategy::Min,
            LieMethod::ConstantLiarMax => LieStrategy::Max,
            LieMethod::ConstantLiarMean => LieStrategy::Mean,
        }
    }
}

fn default_num_to_sample() -> usize {
    1
}

/// Request of the next points to sample
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NextPointsRequest {
    /// Evaluations known so far
    #[serde(alias = "gp_info")]
    pub gp_historical_info: GpHistoricalInfo,
    /// GP covariance
    pub covariance_info: CovarianceInfo,
    /// Domain where to select points
    pub domain_info: DomainInfo,
    /// Criterion maximization settings
    #[serde(default)]
    pub optimization_info: OptimizationInfo,
    /// Number of points to select
    #[serde(default = "default_num_to_sample")]
    pub num_to_sample: usize,
    /// Number of Monte Carlo draws of multi-points expected improvement
    pub mc_iterations: Option<usize>,
    /// Constant lie value, takes precedence over `lie_method`
    pub lie_value: Option<f64>,
    /// Lie policy used when no `lie_value` is given
    pub lie_method: Option<LieMethod>,
    /// Noise variance of lies
    pub lie_noise_variance: Option<f64>,
    /// Noise variance of kriging believer lies
    pub kriging_noise_variance: Option<f64>,
    /// Number of posterior standard deviations added to kriging believer lies
    pub kriging_std_deviation_coef: Option<f64>,
    /// Points pending evaluation
    pub points_being_sampled: Option<Vec<Vec<f64>>>,
    /// Random generator seed
    pub seed: Option<u64>,
}

/// Status of the criterion maximization
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NextPointsStatus {
    /// False when a gradient ascent ran out of steps
    pub optimizer_success: bool,
}

/// Selected points
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NextPointsResponse {
    /// Route which handled the request
    pub endpoint: String,
    /// Points to evaluate next
    pub points_to_sample: Vec<Vec<f64>>,
    /// Expected improvement of the whole batch
    pub expected_improvement: f64,
    /// Optimization status
    pub status: NextPointsStatus,
}

/// Request of GP posterior moments
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpMeanVarRequest {
    /// Evaluations known so far
    #[serde(alias = "gp_info")]
    pub gp_historical_info: GpHistoricalInfo,
    /// GP covariance
    pub covariance_info: CovarianceInfo,
    /// Points where to compute posterior moments
    pub points_to_evaluate: Vec<Vec<f64>>,
}

/// GP posterior moments
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpMeanVarResponse {
    /// Route which handled the request
    pub endpoint: String,
    /// Posterior mean at each point
    pub mean: Vec<f64>,
    /// Posterior covariance matrix
    pub var: Vec<Vec<f64>>,
}

/// Request of expected improvement values
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpEiRequest {
    /// Evaluations known so far
    #[serde(alias = "gp_info")]
    pub gp_historical_info: GpHistoricalInfo,
    /// GP covariance
    pub covariance_info: CovarianceInfo,
    /// Points which expected improvement is computed one at a time
    pub points_to_evaluate: Vec<Vec<f64>>,
    /// Points pending evaluation, part of every evaluated batch
    pub points_being_sampled: Option<Vec<Vec<f64>>>,
    /// Number of Monte Carlo draws when batches hold several points
    pub mc_iterations: Option<usize>,
    /// Random generator seed
    pub seed: Option<u64>,
}

/// Expected improvement values
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpEiResponse {
    /// Route which handled the request
    pub endpoint: String,
    /// Expected improvement for each point to evaluate
    pub expected_improvement: Vec<f64>,
}
