//! Normal fits, the dashboard density curve and Monte-Carlo sampling.

use crate::error::SurveyError;
use rand::Rng;
use serde::Serialize;
use std::f64::consts::PI;

/// Mean and sample standard deviation of a selection.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct NormalFit {
    pub mean: f64,
    pub std_dev: f64,
}

/// Fits a normal distribution using the sample standard deviation (n - 1).
///
/// A selection with fewer than two values, or with no spread, has no fit.
pub fn fit_normal(values: &[f64]) -> Result<NormalFit, SurveyError> {
    if values.len() < 2 {
        return Err(SurveyError::InsufficientData(format!(
            "a normal fit needs at least 2 values, got {}",
            values.len()
        )));
    }
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let variance = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / (count - 1.0);
    let std_dev = variance.sqrt();
    if !std_dev.is_finite() || std_dev <= 0.0 {
        return Err(SurveyError::InsufficientData(format!(
            "values have no spread (standard deviation {})",
            std_dev
        )));
    }
    Ok(NormalFit { mean, std_dev })
}

/// Evaluates `π·σ·exp(−½((x−μ)/σ)²)` at every `x`.
///
/// This is the scaled curve the survey dashboard has always drawn, not the
/// normalized Gaussian density.
pub fn normal_density(xs: &[f64], mean: f64, std_dev: f64) -> Vec<f64> {
    xs.iter()
        .map(|x| PI * std_dev * (-0.5 * ((x - mean) / std_dev).powi(2)).exp())
        .collect()
}

/// Draws `n` values from Normal(mean, std_dev) with the Box-Muller transform.
pub fn sample_normal<R: Rng + ?Sized>(rng: &mut R, fit: NormalFit, n: usize) -> Vec<f64> {
    (0..n)
        .map(|_| {
            // 1 - [0, 1) keeps ln away from zero
            let u1: f64 = 1.0 - rng.gen::<f64>();
            let u2: f64 = rng.gen::<f64>();
            let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
            fit.mean + fit.std_dev * z
        })
        .collect()
}

/// Sorted non-negative samples paired with their density.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DistributionSeries {
    pub x: Vec<f64>,
    pub density: Vec<f64>,
}

impl DistributionSeries {
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }
}

/// Samples a normal fitted to `values`, sorts ascending, drops everything
/// before the first non-negative sample and evaluates the density curve.
/// Returns an empty series when `values` has no fit.
pub fn sample_distribution<R: Rng + ?Sized>(values: &[f64], n: usize, rng: &mut R) -> DistributionSeries {
    let Ok(fit) = fit_normal(values) else {
        return DistributionSeries::default();
    };
    let mut samples = sample_normal(rng, fit, n);
    samples.sort_by(f64::total_cmp);
    let first = samples.partition_point(|sample| *sample < 0.0);
    samples.drain(..first);
    let density = normal_density(&samples, fit.mean, fit.std_dev);
    DistributionSeries { x: samples, density }
}
