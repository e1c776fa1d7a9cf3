//! Robust cost functions (M-estimators) for outlier-robust least squares.
//!
//! This module is independent of the camera geometry. Optimizers that consume
//! reprojection residuals first estimate the residual scale with a
//! [`ScaleEstimator`], then down-weight each normalized residual with a
//! [`WeightFunction`].

use std::fmt;

/// Estimates the scale (spread) of a set of residuals.
pub trait ScaleEstimator: fmt::Debug + Send + Sync {
    /// Computes the scale of `errors`. The slice may be reordered.
    fn compute(&self, errors: &mut [f32]) -> f32;
}

/// Always reports a scale of one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitScaleEstimator;

impl ScaleEstimator for UnitScaleEstimator {
    fn compute(&self, _errors: &mut [f32]) -> f32 {
        1.0
    }
}

/// Scale from the median absolute deviation, `1.48 * median(|e|)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MadScaleEstimator;

impl MadScaleEstimator {
    /// Makes the MAD a consistent estimator of the standard deviation of a
    /// normal distribution.
    pub const NORMALIZER: f32 = 1.48;
}

impl ScaleEstimator for MadScaleEstimator {
    fn compute(&self, errors: &mut [f32]) -> f32 {
        if errors.is_empty() {
            return 1.0;
        }
        for error in errors.iter_mut() {
            *error = error.abs();
        }
        let middle = errors.len() / 2;
        let (_, median, _) = errors.select_nth_unstable_by(middle, f32::total_cmp);
        Self::NORMALIZER * *median
    }
}

/// Scale as the root mean square of the residuals.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalDistributionScaleEstimator;

impl ScaleEstimator for NormalDistributionScaleEstimator {
    fn compute(&self, errors: &mut [f32]) -> f32 {
        if errors.is_empty() {
            return 1.0;
        }
        let sum_squared: f32 = errors.iter().map(|e| e * e).sum();
        (sum_squared / errors.len() as f32).sqrt()
    }
}

/// Weight applied to a residual already divided by the scale.
pub trait WeightFunction: fmt::Debug + Send + Sync {
    fn weight(&self, x: f32) -> f32;

    /// Sets the tuning parameter. Functions without one ignore it.
    fn configure(&mut self, _param: f32) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnitWeightFunction;

impl WeightFunction for UnitWeightFunction {
    fn weight(&self, _x: f32) -> f32 {
        1.0
    }
}

/// Tukey's biweight: `(1 - (x / b)²)²` for `|x| <= b`, zero beyond.
#[derive(Debug, Clone, Copy)]
pub struct TukeyWeightFunction {
    b_square: f32,
}

impl TukeyWeightFunction {
    /// 95% efficiency on normally distributed residuals.
    pub const DEFAULT_B: f32 = 4.6851;

    pub fn new(b: f32) -> Self {
        TukeyWeightFunction { b_square: b * b }
    }
}

impl Default for TukeyWeightFunction {
    fn default() -> Self {
        Self::new(Self::DEFAULT_B)
    }
}

impl WeightFunction for TukeyWeightFunction {
    fn weight(&self, x: f32) -> f32 {
        let x_square = x * x;
        if x_square <= self.b_square {
            let tmp = 1.0 - x_square / self.b_square;
            tmp * tmp
        } else {
            0.0
        }
    }

    fn configure(&mut self, param: f32) {
        self.b_square = param * param;
    }
}

/// Huber weight: one for `|x| < k`, `k / |x|` beyond.
#[derive(Debug, Clone, Copy)]
pub struct HuberWeightFunction {
    k: f32,
}

impl HuberWeightFunction {
    pub const DEFAULT_K: f32 = 1.345;

    pub fn new(k: f32) -> Self {
        HuberWeightFunction { k }
    }
}

impl Default for HuberWeightFunction {
    fn default() -> Self {
        Self::new(Self::DEFAULT_K)
    }
}

impl WeightFunction for HuberWeightFunction {
    fn weight(&self, x: f32) -> f32 {
        let abs_x = x.abs();
        if abs_x < self.k {
            1.0
        } else {
            self.k / abs_x
        }
    }

    fn configure(&mut self, param: f32) {
        self.k = param;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unit_estimators() {
        assert_eq!(UnitScaleEstimator.compute(&mut [3.0, -7.0]), 1.0);
        assert_eq!(UnitWeightFunction.weight(100.0), 1.0);
    }

    #[test]
    fn test_mad_scale() {
        let mut errors = [1.0, -2.0, 3.0, -4.0, 100.0];
        let scale = MadScaleEstimator.compute(&mut errors);
        assert_relative_eq!(scale, 1.48 * 3.0);
        assert_eq!(MadScaleEstimator.compute(&mut []), 1.0);
    }

    #[test]
    fn test_normal_distribution_scale() {
        let mut errors = [3.0, -4.0];
        let scale = NormalDistributionScaleEstimator.compute(&mut errors);
        assert_relative_eq!(scale, (12.5f32).sqrt());
        assert_eq!(NormalDistributionScaleEstimator.compute(&mut []), 1.0);
    }

    #[test]
    fn test_tukey_weight() {
        let mut tukey = TukeyWeightFunction::default();
        assert_eq!(tukey.weight(0.0), 1.0);
        assert_relative_eq!(tukey.weight(2.0), {
            let t = 1.0 - 4.0 / (4.6851f32 * 4.6851);
            t * t
        });
        assert_eq!(tukey.weight(5.0), 0.0);
        assert_eq!(tukey.weight(-5.0), 0.0);

        tukey.configure(10.0);
        assert!(tukey.weight(5.0) > 0.0);
    }

    #[test]
    fn test_huber_weight() {
        let mut huber = HuberWeightFunction::default();
        assert_eq!(huber.weight(1.0), 1.0);
        assert_relative_eq!(huber.weight(-2.69), 0.5);

        huber.configure(3.0);
        assert_eq!(huber.weight(2.69), 1.0);
        assert_relative_eq!(huber.weight(6.0), 0.5);
    }

    #[test]
    fn test_weight_functions_as_trait_objects() {
        let functions: Vec<Box<dyn WeightFunction>> = vec![
            Box::new(UnitWeightFunction),
            Box::new(TukeyWeightFunction::default()),
            Box::new(HuberWeightFunction::default()),
        ];
        for function in &functions {
            assert_eq!(function.weight(0.0), 1.0);
        }
    }
}
