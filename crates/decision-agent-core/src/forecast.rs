//! Performance forecasting, optimization suggestions, and action planning
//! over the experience log's score history.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::agent::Goals;
use crate::clamp_unit;
use crate::experience::ExperienceLog;
use crate::params::ParameterName;
use crate::trend::{linear_fit, mean, std_dev, TrendDirection};

/// Forecasts below this many observations are refused as unreliable.
pub const MIN_DATA_POINTS: usize = 10;
/// Optimization suggestions below this confidence are suppressed.
pub const CONFIDENCE_FLOOR: f32 = 0.7;

const FORECAST_HORIZON_DAYS: u32 = 30;
const HIGH_VARIABILITY_STD: f32 = 0.1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    Performance,
    Cost,
    Satisfaction,
    Efficiency,
}

impl TrendMetric {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Cost => "cost",
            Self::Satisfaction => "satisfaction",
            Self::Efficiency => "efficiency",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "performance" => Some(Self::Performance),
            "cost" => Some(Self::Cost),
            "satisfaction" => Some(Self::Satisfaction),
            "efficiency" => Some(Self::Efficiency),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ForecastTrend {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

impl From<TrendDirection> for ForecastTrend {
    fn from(direction: TrendDirection) -> Self {
        match direction {
            TrendDirection::Improving => Self::Improving,
            TrendDirection::Declining => Self::Declining,
            TrendDirection::Stable => Self::Stable,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendPrediction {
    pub metric: TrendMetric,
    pub current_value: f32,
    pub predicted_value: f32,
    pub confidence: f32,
    pub direction: TrendDirection,
    pub horizon_days: u32,
    pub contributing_factors: Vec<String>,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizationSuggestion {
    pub area: String,
    pub description: String,
    pub expected_improvement: f32,
    pub confidence: f32,
    pub parameters_involved: Vec<ParameterName>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    High,
    Medium,
    Low,
}

impl ActionPriority {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    fn lead_time(self) -> Duration {
        match self {
            Self::High => Duration::days(7),
            Self::Medium => Duration::days(14),
            Self::Low => Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedAction {
    pub action: String,
    pub priority: ActionPriority,
    pub expected_impact: f32,
    #[serde(with = "time::serde::rfc3339")]
    pub target_date: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionPlan {
    pub primary_goal: String,
    pub actions: Vec<PlannedAction>,
    pub success_metrics: Vec<String>,
    pub risk_mitigation: Vec<String>,
    pub success_probability: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceForecast {
    pub metric: TrendMetric,
    pub horizon_days: u32,
    pub current_value: f32,
    pub forecast_value: f32,
    pub trend: ForecastTrend,
    pub confidence: f32,
    pub confidence_interval: (f32, f32),
    pub key_drivers: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Extrapolates the performance score series one step past its end.
/// Returns no predictions below [`MIN_DATA_POINTS`] observations; the
/// other metrics have no recorded series to extrapolate.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn predict_trends(log: &ExperienceLog) -> Vec<TrendPrediction> {
    let scores = log.scores();
    if scores.len() < MIN_DATA_POINTS {
        return Vec::new();
    }

    let Some(fit) = linear_fit(&scores) else {
        return Vec::new();
    };
    let current = scores.last().copied().unwrap_or(0.5);
    let predicted = clamp_unit(fit.predict(scores.len() as f32));
    let direction = fit.direction();

    let mut factors = Vec::new();
    if std_dev(&scores).is_some_and(|std| std > HIGH_VARIABILITY_STD) {
        factors.push("high_variability".to_string());
    }
    if let Some(average) = mean(&scores) {
        if average > 0.8 {
            factors.push("high_performance_baseline".to_string());
        } else if average < 0.6 {
            factors.push("low_performance_baseline".to_string());
        }
    }

    let reasoning = format!(
        "Performance is {} over the last {} decisions (fit confidence {:.2})",
        direction.as_str(),
        scores.len(),
        fit.r_squared,
    );

    vec![TrendPrediction {
        metric: TrendMetric::Performance,
        current_value: current,
        predicted_value: predicted,
        confidence: fit.r_squared,
        direction,
        horizon_days: FORECAST_HORIZON_DAYS,
        contributing_factors: factors,
        reasoning,
    }]
}

/// Rule-based improvement suggestions over the current metric state.
/// Missing accuracy falls back to the mean of the last ten performance
/// scores; the other metrics assume their nominal baselines.
#[must_use]
pub fn suggest_optimizations(
    log: &ExperienceLog,
    current_state: &std::collections::BTreeMap<String, f32>,
) -> Vec<OptimizationSuggestion> {
    let scores = log.scores();
    let recent_start = scores.len().saturating_sub(10);
    let recent_mean = mean(&scores[recent_start..]).unwrap_or(0.5);

    let accuracy = current_state.get("accuracy").copied().unwrap_or(recent_mean);
    let efficiency = current_state.get("efficiency").copied().unwrap_or(0.85);
    let cost_optimization = current_state
        .get("cost_optimization")
        .copied()
        .unwrap_or(0.75);
    let satisfaction = current_state.get("satisfaction").copied().unwrap_or(0.80);

    let mut suggestions = Vec::new();

    if accuracy < 0.95 {
        suggestions.push(OptimizationSuggestion {
            area: "accuracy".to_string(),
            description: "Tighten benefit calculation margins to recover accuracy".to_string(),
            expected_improvement: 0.95 - accuracy,
            confidence: 0.8,
            parameters_involved: vec![
                ParameterName::VacationBenefitFactor,
                ParameterName::SafetyMargin,
            ],
        });
    }
    if efficiency < 0.8 {
        suggestions.push(OptimizationSuggestion {
            area: "efficiency".to_string(),
            description: "Raise the optimization weight to shorten processing".to_string(),
            expected_improvement: 0.8 - efficiency,
            confidence: 0.7,
            parameters_involved: vec![ParameterName::OptimizationFactor],
        });
    }
    if cost_optimization < 0.7 {
        suggestions.push(OptimizationSuggestion {
            area: "cost_optimization".to_string(),
            description: "Rebalance the company and employee cost split".to_string(),
            expected_improvement: 0.7 - cost_optimization,
            confidence: 0.75,
            parameters_involved: vec![
                ParameterName::CompanyCostPercentage,
                ParameterName::EmployeeCostPercentage,
            ],
        });
    }
    if satisfaction < 0.8 {
        suggestions.push(OptimizationSuggestion {
            area: "satisfaction".to_string(),
            description: "Increase the vacation benefit factor within bounds".to_string(),
            expected_improvement: 0.8 - satisfaction,
            confidence: 0.8,
            parameters_involved: vec![
                ParameterName::VacationBenefitFactor,
                ParameterName::EmployeeCostPercentage,
            ],
        });
    }

    suggestions.retain(|suggestion| suggestion.confidence >= CONFIDENCE_FLOOR);
    suggestions
}

/// Builds the action plan for the configured goals. The first goal that
/// matches decides the plan's shape.
#[must_use]
pub fn plan_actions(goals: &Goals, now: OffsetDateTime) -> ActionPlan {
    let (primary_goal, actions): (&str, Vec<(&str, ActionPriority, f32)>) =
        if goals.target_accuracy > 0.95 {
            (
                "achieve_high_accuracy",
                vec![
                    ("Calibrate safety margins against recent feedback", ActionPriority::High, 0.10),
                    ("Expand the experience log with validated outcomes", ActionPriority::Medium, 0.05),
                ],
            )
        } else if goals.cost_optimization {
            (
                "optimize_costs",
                vec![
                    ("Shift the cost split toward the optimized bound", ActionPriority::High, 0.08),
                    ("Review strategy cost multipliers quarterly", ActionPriority::Low, 0.04),
                ],
            )
        } else if goals.employee_satisfaction {
            (
                "improve_satisfaction",
                vec![
                    ("Raise the vacation benefit factor within bounds", ActionPriority::High, 0.09),
                    ("Survey satisfaction after each adaptation cycle", ActionPriority::Medium, 0.05),
                ],
            )
        } else {
            (
                "maintain_performance",
                vec![
                    ("Hold stable parameters at current values", ActionPriority::Medium, 0.05),
                    ("Re-forecast performance monthly", ActionPriority::Low, 0.03),
                ],
            )
        };

    let total_impact: f32 = actions.iter().map(|(_, _, impact)| impact).sum();
    let actions: Vec<PlannedAction> = actions
        .into_iter()
        .map(|(action, priority, expected_impact)| PlannedAction {
            action: action.to_string(),
            priority,
            expected_impact,
            target_date: now + priority.lead_time(),
        })
        .collect();

    ActionPlan {
        primary_goal: primary_goal.to_string(),
        actions,
        success_metrics: vec![
            "performance_score_trend".to_string(),
            "adaptation_acceptance_rate".to_string(),
            "feedback_accuracy".to_string(),
        ],
        risk_mitigation: vec![
            "Bounded parameter adjustments only".to_string(),
            "Rate-limited adaptation windows".to_string(),
            "Stability gates on converged parameters".to_string(),
        ],
        success_probability: (0.7 + total_impact).min(0.95),
    }
}

/// Forecasts a metric over the given horizon. Only the performance metric
/// has a recorded series; everything else, and any series shorter than
/// [`MIN_DATA_POINTS`], yields the neutral insufficient-data forecast.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn forecast_performance(
    log: &ExperienceLog,
    metric: TrendMetric,
    horizon_days: u32,
) -> PerformanceForecast {
    let scores = log.scores();
    if metric != TrendMetric::Performance || scores.len() < MIN_DATA_POINTS {
        return insufficient_data_forecast(metric, horizon_days);
    }

    let Some(fit) = linear_fit(&scores) else {
        return insufficient_data_forecast(metric, horizon_days);
    };

    let current = scores.last().copied().unwrap_or(0.5);
    let forecast = clamp_unit(fit.predict(scores.len() as f32 - 1.0 + horizon_days as f32));
    let direction = fit.direction();

    let mut key_drivers = Vec::new();
    if std_dev(&scores).is_some_and(|std| std > HIGH_VARIABILITY_STD) {
        key_drivers.push("score_variability".to_string());
    }
    key_drivers.push(match direction {
        TrendDirection::Improving => "positive_momentum".to_string(),
        TrendDirection::Declining => "negative_momentum".to_string(),
        TrendDirection::Stable => "steady_state".to_string(),
    });

    let mut recommendations = Vec::new();
    match direction {
        TrendDirection::Improving => {
            recommendations.push("Maintain current parameter settings".to_string());
        }
        TrendDirection::Declining => {
            recommendations.push("Review recent parameter adaptations".to_string());
            if current - forecast > 0.1 {
                recommendations
                    .push("Prefer the conservative strategy until the trend recovers".to_string());
            }
        }
        TrendDirection::Stable => {
            recommendations.push("Apply pending optimization suggestions".to_string());
        }
    }

    PerformanceForecast {
        metric,
        horizon_days,
        current_value: current,
        forecast_value: forecast,
        trend: direction.into(),
        confidence: fit.r_squared,
        confidence_interval: (clamp_unit(forecast * 0.95), clamp_unit(forecast * 1.05)),
        key_drivers,
        recommendations,
    }
}

fn insufficient_data_forecast(metric: TrendMetric, horizon_days: u32) -> PerformanceForecast {
    PerformanceForecast {
        metric,
        horizon_days,
        current_value: 0.5,
        forecast_value: 0.5,
        trend: ForecastTrend::InsufficientData,
        confidence: 0.0,
        confidence_interval: (0.4, 0.6),
        key_drivers: vec!["data_insufficient".to_string()],
        recommendations: vec!["Collect more outcome data before acting on forecasts".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::experience::OutcomeRecord;
    use crate::parse_rfc3339_utc;
    use crate::reasoning::{DecisionRecord, Strategy};
    use std::collections::BTreeMap;
    use time::Duration;

    fn must_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    fn fixture_now() -> OffsetDateTime {
        must_ok(parse_rfc3339_utc("2026-08-25T12:00:00Z"))
    }

    fn log_with_accuracies(accuracies: &[f32]) -> ExperienceLog {
        let mut log = ExperienceLog::new();
        let start = must_ok(parse_rfc3339_utc("2026-08-01T00:00:00Z"));
        for (index, accuracy) in accuracies.iter().enumerate() {
            let context = RequestContext {
                employee_count: 100 + u32::try_from(index).unwrap_or(0),
                data_quality_score: 1.0,
                ..RequestContext::default()
            };
            let outcome = OutcomeRecord {
                accuracy: Some(*accuracy),
                total_value: Some(1000.0),
                target_value: Some(1000.0),
                ..OutcomeRecord::default()
            };
            let decision = DecisionRecord {
                strategy: Strategy::Optimized,
                parameters: BTreeMap::new(),
            };
            let _ = log.store(
                context,
                decision,
                outcome,
                None,
                start + Duration::days(i64::try_from(index).unwrap_or(0)),
            );
        }
        log
    }

    #[test]
    fn sparse_log_yields_no_trend_predictions() {
        let log = log_with_accuracies(&[0.9, 0.91, 0.92]);
        assert!(predict_trends(&log).is_empty());
    }

    #[test]
    fn improving_series_predicts_improvement() {
        let accuracies: Vec<f32> = (0..12).map(|i| 0.5 + 0.03 * i as f32).collect();
        let log = log_with_accuracies(&accuracies);

        let predictions = predict_trends(&log);
        assert_eq!(predictions.len(), 1);
        let prediction = &predictions[0];
        assert_eq!(prediction.metric, TrendMetric::Performance);
        assert_eq!(prediction.direction, TrendDirection::Improving);
        assert!(prediction.predicted_value >= prediction.current_value);
        assert!(prediction.confidence > 0.5);
    }

    #[test]
    fn low_accuracy_state_triggers_accuracy_suggestion() {
        let log = ExperienceLog::new();
        let mut state = BTreeMap::new();
        let _ = state.insert("accuracy".to_string(), 0.85_f32);

        let suggestions = suggest_optimizations(&log, &state);
        assert!(suggestions.iter().any(|s| s.area == "accuracy"));
        let accuracy = suggestions
            .iter()
            .find(|s| s.area == "accuracy")
            .map(|s| s.parameters_involved.clone())
            .unwrap_or_default();
        assert!(accuracy.contains(&ParameterName::VacationBenefitFactor));
        assert!(accuracy.contains(&ParameterName::SafetyMargin));
    }

    #[test]
    fn healthy_state_yields_no_suggestions() {
        let log = ExperienceLog::new();
        let mut state = BTreeMap::new();
        let _ = state.insert("accuracy".to_string(), 0.99_f32);
        let _ = state.insert("efficiency".to_string(), 0.9_f32);
        let _ = state.insert("cost_optimization".to_string(), 0.8_f32);
        let _ = state.insert("satisfaction".to_string(), 0.9_f32);

        assert!(suggest_optimizations(&log, &state).is_empty());
    }

    #[test]
    fn high_accuracy_goal_drives_the_plan() {
        let goals = Goals {
            target_accuracy: 0.99,
            cost_optimization: true,
            employee_satisfaction: true,
        };
        let plan = plan_actions(&goals, fixture_now());

        assert_eq!(plan.primary_goal, "achieve_high_accuracy");
        assert_eq!(plan.actions.len(), 2);
        assert!(plan.success_probability <= 0.95);
        assert!(plan.success_probability >= 0.7);

        let high = plan
            .actions
            .iter()
            .find(|action| action.priority == ActionPriority::High);
        assert!(high.is_some_and(|action| action.target_date
            == fixture_now() + Duration::days(7)));
    }

    #[test]
    fn cost_goal_without_accuracy_target_plans_cost_work() {
        let goals = Goals {
            target_accuracy: 0.9,
            cost_optimization: true,
            employee_satisfaction: true,
        };
        let plan = plan_actions(&goals, fixture_now());
        assert_eq!(plan.primary_goal, "optimize_costs");
    }

    #[test]
    fn short_series_forecasts_insufficient_data() {
        let log = log_with_accuracies(&[0.9, 0.9]);
        let forecast = forecast_performance(&log, TrendMetric::Performance, 30);

        assert_eq!(forecast.trend, ForecastTrend::InsufficientData);
        assert_eq!(forecast.forecast_value, 0.5);
        assert_eq!(forecast.key_drivers, vec!["data_insufficient".to_string()]);
    }

    #[test]
    fn unrecorded_metric_forecasts_insufficient_data() {
        let accuracies: Vec<f32> = (0..12).map(|_| 0.9).collect();
        let log = log_with_accuracies(&accuracies);
        let forecast = forecast_performance(&log, TrendMetric::Cost, 30);
        assert_eq!(forecast.trend, ForecastTrend::InsufficientData);
    }

    #[test]
    fn flat_series_forecasts_stable_within_band() {
        let accuracies: Vec<f32> = (0..12).map(|_| 0.9).collect();
        let log = log_with_accuracies(&accuracies);
        let forecast = forecast_performance(&log, TrendMetric::Performance, 30);

        assert_eq!(forecast.trend, ForecastTrend::Stable);
        assert!(forecast.confidence_interval.0 <= forecast.forecast_value);
        assert!(forecast.confidence_interval.1 >= forecast.forecast_value);
    }
}
