//! Ordinary least squares over ordered score sequences, plus the small
//! statistics helpers shared by the experience log, the parameter
//! controller, and the forecaster.

use serde::{Deserialize, Serialize};

/// Slopes within this band classify as stable.
pub const SLOPE_TOLERANCE: f32 = 0.01;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

impl TrendDirection {
    #[must_use]
    pub fn from_slope(slope: f32) -> Self {
        if slope > SLOPE_TOLERANCE {
            Self::Improving
        } else if slope < -SLOPE_TOLERANCE {
            Self::Declining
        } else {
            Self::Stable
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Declining => "declining",
            Self::Stable => "stable",
        }
    }
}

/// Least-squares line over `(index, value)` pairs with its goodness of fit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LinearFit {
    pub slope: f32,
    pub intercept: f32,
    pub r_squared: f32,
}

impl LinearFit {
    #[must_use]
    pub fn predict(&self, x: f32) -> f32 {
        self.intercept + self.slope * x
    }

    #[must_use]
    pub fn direction(&self) -> TrendDirection {
        TrendDirection::from_slope(self.slope)
    }
}

/// Fits a line over the ordered values with x = position index. Returns
/// `None` below two points, where a slope is undefined.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn linear_fit(values: &[f32]) -> Option<LinearFit> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let count = n as f64;
    let mean_x = (count - 1.0) / 2.0;
    let mean_y = values.iter().map(|&v| f64::from(v)).sum::<f64>() / count;

    let mut covariance = 0.0_f64;
    let mut variance_x = 0.0_f64;
    for (index, &value) in values.iter().enumerate() {
        let dx = index as f64 - mean_x;
        covariance += dx * (f64::from(value) - mean_y);
        variance_x += dx * dx;
    }

    if variance_x == 0.0 {
        return None;
    }

    let slope = covariance / variance_x;
    let intercept = mean_y - slope * mean_x;

    let mut residual = 0.0_f64;
    let mut total = 0.0_f64;
    for (index, &value) in values.iter().enumerate() {
        let predicted = intercept + slope * index as f64;
        residual += (f64::from(value) - predicted).powi(2);
        total += (f64::from(value) - mean_y).powi(2);
    }

    // A flat series fits itself perfectly.
    let r_squared = if total == 0.0 {
        1.0
    } else {
        (1.0 - residual / total).clamp(0.0, 1.0)
    };

    Some(LinearFit {
        slope: slope as f32,
        intercept: intercept as f32,
        r_squared: r_squared as f32,
    })
}

#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let sum = values.iter().map(|&v| f64::from(v)).sum::<f64>();
    Some((sum / values.len() as f64) as f32)
}

/// Population variance, matching the reference implementation's estimator.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn variance(values: &[f32]) -> Option<f32> {
    let mean_value = f64::from(mean(values)?);
    let sum = values
        .iter()
        .map(|&v| (f64::from(v) - mean_value).powi(2))
        .sum::<f64>();
    Some((sum / values.len() as f64) as f32)
}

#[must_use]
pub fn std_dev(values: &[f32]) -> Option<f32> {
    variance(values).map(f32::sqrt)
}

/// Pearson correlation coefficient. `None` when either side is constant
/// or the series lengths differ.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn pearson(xs: &[f32], ys: &[f32]) -> Option<f32> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }

    let mean_x = f64::from(mean(xs)?);
    let mean_y = f64::from(mean(ys)?);

    let mut covariance = 0.0_f64;
    let mut variance_x = 0.0_f64;
    let mut variance_y = 0.0_f64;
    for (&x, &y) in xs.iter().zip(ys) {
        let dx = f64::from(x) - mean_x;
        let dy = f64::from(y) - mean_y;
        covariance += dx * dy;
        variance_x += dx * dx;
        variance_y += dy * dy;
    }

    if variance_x == 0.0 || variance_y == 0.0 {
        return None;
    }

    Some((covariance / (variance_x.sqrt() * variance_y.sqrt())) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn must_some<T>(value: Option<T>) -> T {
        match value {
            Some(inner) => inner,
            None => panic!("expected Some(..), got None"),
        }
    }

    #[test]
    fn perfect_line_has_unit_r_squared() {
        let fit = must_some(linear_fit(&[0.1, 0.2, 0.3, 0.4]));
        assert!((fit.slope - 0.1).abs() < 1e-6);
        assert!((fit.r_squared - 1.0).abs() < 1e-6);
        assert_eq!(fit.direction(), TrendDirection::Improving);
    }

    #[test]
    fn flat_series_is_stable_with_full_confidence() {
        let fit = must_some(linear_fit(&[0.5, 0.5, 0.5]));
        assert!(fit.slope.abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-6);
        assert_eq!(fit.direction(), TrendDirection::Stable);
    }

    #[test]
    fn declining_series_classifies_as_declining() {
        let fit = must_some(linear_fit(&[0.9, 0.7, 0.5, 0.3]));
        assert_eq!(fit.direction(), TrendDirection::Declining);
    }

    #[test]
    fn single_point_has_no_fit() {
        assert!(linear_fit(&[0.5]).is_none());
    }

    #[test]
    fn prediction_extends_the_line() {
        let fit = must_some(linear_fit(&[0.2, 0.4, 0.6]));
        assert!((fit.predict(3.0) - 0.8).abs() < 1e-5);
    }

    #[test]
    fn pearson_detects_inverse_relation() {
        let coefficient = must_some(pearson(&[1.0, 2.0, 3.0, 4.0], &[0.9, 0.7, 0.5, 0.3]));
        assert!((coefficient + 1.0).abs() < 1e-5);
    }

    #[test]
    fn pearson_is_none_for_constant_series() {
        assert!(pearson(&[1.0, 1.0, 1.0], &[0.2, 0.5, 0.8]).is_none());
    }

    #[test]
    fn variance_matches_population_estimator() {
        let value = must_some(variance(&[1.0, 3.0]));
        assert!((value - 1.0).abs() < 1e-6);
    }
}
