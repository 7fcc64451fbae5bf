//! Next points selection configuration.
use crate::errors::{EgoError, Result};
use crate::optimizers::GradientDescentParams;
use crate::types::*;
use linfa::ParamGuard;
use ndarray::{Array2, ArrayBase, Data, Ix2};

use serde::{Deserialize, Serialize};

/// Default number of Monte Carlo draws used to estimate multi-points expected improvement
pub const DEFAULT_MC_ITERATIONS: usize = 10_000;

/// Validated next points selection configuration
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ValidNextPointsConfig {
    /// Number of points to select
    pub(crate) num_to_sample: usize,
    /// Multipoint strategy used to select several points at once
    pub(crate) q_ei: QEiStrategy,
    /// Value assumed at selected points (constant liar strategy)
    pub(crate) lie_strategy: LieStrategy,
    /// Noise variance of lied observations
    pub(crate) lie_noise_variance: f64,
    /// Number of gradient ascents run to maximize the infill criterion
    pub(crate) num_multistarts: usize,
    /// Number of random samples among which the best starting points are taken
    pub(crate) num_random_samples: usize,
    /// Gradient ascent parameters
    pub(crate) gd_params: GradientDescentParams,
    /// Number of Monte Carlo draws of multi-points expected improvement
    pub(crate) mc_iterations: usize,
    /// Points already being evaluated, accounted as pending observations
    pub(crate) points_being_sampled: Option<Array2<f64>>,
    /// A random generator seed used to get reproductible results.
    pub(crate) seed: Option<u64>,
}

impl Default for ValidNextPointsConfig {
    fn default() -> Self {
        ValidNextPointsConfig {
            num_to_sample: 1,
            q_ei: QEiStrategy::default(),
            lie_strategy: LieStrategy::default(),
            lie_noise_variance: 0.,
            num_multistarts: 5,
            num_random_samples: 300,
            gd_params: GradientDescentParams::default(),
            mc_iterations: DEFAULT_MC_ITERATIONS,
            points_being_sampled: None,
            seed: None,
        }
    }
}

impl ValidNextPointsConfig {
    /// Number of points to select
    pub fn num_to_sample(&self) -> usize {
        self.num_to_sample
    }

    /// Multipoint strategy
    pub fn q_ei(&self) -> &QEiStrategy {
        &self.q_ei
    }

    /// Lie strategy
    pub fn lie_strategy(&self) -> &LieStrategy {
        &self.lie_strategy
    }

    /// Noise variance of lied observations
    pub fn lie_noise_variance(&self) -> f64 {
        self.lie_noise_variance
    }

    /// Number of gradient ascents
    pub fn num_multistarts(&self) -> usize {
        self.num_multistarts
    }

    /// Number of random samples used to select starting points
    pub fn num_random_samples(&self) -> usize {
        self.num_random_samples
    }

    /// Gradient ascent parameters
    pub fn gd_params(&self) -> &GradientDescentParams {
        &self.gd_params
    }

    /// Number of Monte Carlo draws
    pub fn mc_iterations(&self) -> usize {
        self.mc_iterations
    }

    /// Points being evaluated
    pub fn points_being_sampled(&self) -> Option<&Array2<f64>> {
        self.points_being_sampled.as_ref()
    }

    /// Random generator seed
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

/// Next points selection configuration builder
#[derive(Clone, Debug, Default)]
pub struct NextPointsConfig(ValidNextPointsConfig);

impl NextPointsConfig {
    /// Sets the number of points to select
    pub fn num_to_sample(mut self, num_to_sample: usize) -> Self {
        self.0.num_to_sample = num_to_sample;
        self
    }

    /// Sets the multipoint strategy
    pub fn qei_strategy(mut self, q_ei: QEiStrategy) -> Self {
        self.0.q_ei = q_ei;
        self
    }

    /// Sets the value assumed at selected points not evaluated yet
    pub fn lie_strategy(mut self, lie_strategy: LieStrategy) -> Self {
        self.0.lie_strategy = lie_strategy;
        self
    }

    /// Sets the noise variance of lied observations
    pub fn lie_noise_variance(mut self, lie_noise_variance: f64) -> Self {
        self.0.lie_noise_variance = lie_noise_variance;
        self
    }

    /// Sets the number of gradient ascents (best result taken)
    pub fn num_multistarts(mut self, num_multistarts: usize) -> Self {
        self.0.num_multistarts = num_multistarts;
        self
    }

    /// Sets the number of random samples among which starting points are the best ones
    pub fn num_random_samples(mut self, num_random_samples: usize) -> Self {
        self.0.num_random_samples = num_random_samples;
        self
    }

    /// Sets gradient ascent parameters
    pub fn gd_params(mut self, gd_params: GradientDescentParams) -> Self {
        self.0.gd_params = gd_params;
        self
    }

    /// Sets the number of Monte Carlo draws of multi-points expected improvement
    pub fn mc_iterations(mut self, mc_iterations: usize) -> Self {
        self.0.mc_iterations = mc_iterations;
        self
    }

    /// Sets points being evaluated (n, nx)
    pub fn points_being_sampled(mut self, points: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Self {
        self.0.points_being_sampled = Some(points.to_owned());
        self
    }

    /// Sets a random generator seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.0.seed = Some(seed);
        self
    }
}

impl From<ValidNextPointsConfig> for NextPointsConfig {
    fn from(valid: ValidNextPointsConfig) -> Self {
        NextPointsConfig(valid)
    }
}

impl ParamGuard for NextPointsConfig {
    type Checked = ValidNextPointsConfig;
    type Error = EgoError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let config = &self.0;
        for (name, value) in [
            ("num_to_sample", config.num_to_sample),
            ("num_multistarts", config.num_multistarts),
            ("num_random_samples", config.num_random_samples),
            ("mc_iterations", config.mc_iterations),
        ] {
            if value == 0 {
                return Err(EgoError::InvalidConfigError(format!(
                    "`{name}` should be greater than 0"
                )));
            }
        }
        if !config.lie_noise_variance.is_finite() || config.lie_noise_variance < 0. {
            return Err(EgoError::InvalidConfigError(format!(
                "`lie_noise_variance` should be finite and non negative, got {}",
                config.lie_noise_variance
            )));
        }
        match config.lie_strategy {
            LieStrategy::Constant(v) if !v.is_finite() => {
                return Err(EgoError::InvalidConfigError(format!(
                    "lie value should be finite, got {v}"
                )));
            }
            LieStrategy::KrigingBeliever { std_deviation_coef }
                if !std_deviation_coef.is_finite() =>
            {
                return Err(EgoError::InvalidConfigError(format!(
                    "kriging standard deviation coefficient should be finite, got {std_deviation_coef}"
                )));
            }
            _ => (),
        }
        if let Some(points) = &config.points_being_sampled {
            if points.iter().any(|v| !v.is_finite()) {
                return Err(EgoError::InvalidConfigError(
                    "points being sampled should be finite".to_string(),
                ));
            }
        }
        config.gd_params.check()?;
        Ok(config)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_config_defaults() {
        let config = NextPointsConfig::default().check().unwrap();
        assert_eq!(config.num_to_sample(), 1);
        assert_eq!(config.num_multistarts(), 5);
        assert_eq!(config.num_random_samples(), 300);
        assert_eq!(config.mc_iterations(), 10_000);
        assert_eq!(config.gd_params().max_num_steps, 40);
        assert_eq!(config.lie_strategy(), &LieStrategy::Min);
        assert_eq!(config.q_ei(), &QEiStrategy::ConstantLiar);
        assert_eq!(config.seed(), None);
    }

    #[test]
    fn test_config_check() {
        assert!(NextPointsConfig::default().num_to_sample(0).check().is_err());
        assert!(NextPointsConfig::default().mc_iterations(0).check().is_err());
        assert!(NextPointsConfig::default()
            .lie_noise_variance(-1.)
            .check()
            .is_err());
        assert!(NextPointsConfig::default()
            .lie_strategy(LieStrategy::Constant(f64::NAN))
            .check()
            .is_err());
        assert!(NextPointsConfig::default()
            .points_being_sampled(&array![[f64::INFINITY]])
            .check()
            .is_err());
        let config = NextPointsConfig::default()
            .num_to_sample(3)
            .qei_strategy(QEiStrategy::Epi)
            .seed(42)
            .check()
            .unwrap();
        assert_eq!(config.num_to_sample(), 3);
        assert_eq!(config.seed(), Some(42));
    }

    #[test]
    fn test_config_serde() {
        let config = NextPointsConfig::default()
            .lie_strategy(LieStrategy::KrigingBeliever {
                std_deviation_coef: 1.,
            })
            .check()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: ValidNextPointsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
