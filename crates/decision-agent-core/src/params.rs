//! Bounded adaptive parameters nudged from feedback.
//!
//! Two invariants hold at all times: a parameter's current value stays
//! inside its declared bounds (enforced on every write), and no parameter
//! accrues more than [`MAX_ADAPTATIONS_PER_WINDOW`] adaptations within any
//! trailing [`ADAPTATION_WINDOW_DAYS`]-day window. A parameter whose recent
//! values have converged is held stable and adapts no further, which keeps
//! the loop from oscillating.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::context::{FeedbackReport, ImpactFactor};
use crate::experience::ExperienceLog;
use crate::trend::{linear_fit, mean, pearson, variance, TrendDirection};
use crate::{clamp, clamp_unit};

pub const MAX_ADAPTATIONS_PER_WINDOW: usize = 3;
pub const ADAPTATION_WINDOW_DAYS: i64 = 7;
/// Deltas at or below this magnitude are discarded as no-ops.
pub const MIN_ADJUSTMENT: f32 = 0.001;

const HISTORY_RETENTION: usize = 100;
const STABILITY_SAMPLE: usize = 10;
const MIN_SAMPLES_FOR_STABILITY: usize = 3;
const CORRELATION_MIN_EXPERIENCES: usize = 10;
const SIGNIFICANT_CORRELATION: f32 = 0.3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum ParameterName {
    CompanyCostPercentage,
    EmployeeCostPercentage,
    VacationBenefitFactor,
    TerminationCutoffDay,
    SafetyMargin,
    OptimizationFactor,
}

impl ParameterName {
    pub const ALL: [Self; 6] = [
        Self::CompanyCostPercentage,
        Self::EmployeeCostPercentage,
        Self::VacationBenefitFactor,
        Self::TerminationCutoffDay,
        Self::SafetyMargin,
        Self::OptimizationFactor,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompanyCostPercentage => "company_cost_percentage",
            Self::EmployeeCostPercentage => "employee_cost_percentage",
            Self::VacationBenefitFactor => "vacation_benefit_factor",
            Self::TerminationCutoffDay => "termination_cutoff_day",
            Self::SafetyMargin => "safety_margin",
            Self::OptimizationFactor => "optimization_factor",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "company_cost_percentage" => Some(Self::CompanyCostPercentage),
            "employee_cost_percentage" => Some(Self::EmployeeCostPercentage),
            "vacation_benefit_factor" => Some(Self::VacationBenefitFactor),
            "termination_cutoff_day" => Some(Self::TerminationCutoffDay),
            "safety_margin" => Some(Self::SafetyMargin),
            "optimization_factor" => Some(Self::OptimizationFactor),
            _ => None,
        }
    }
}

/// A bounded tunable value with its learning configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    pub name: ParameterName,
    current_value: f32,
    pub min_value: f32,
    pub max_value: f32,
    pub learning_rate: f32,
    pub adaptation_speed: f32,
    pub stability_threshold: f32,
    pub description: String,
    pub impact_factors: Vec<ImpactFactor>,
}

impl Parameter {
    #[must_use]
    pub fn current_value(&self) -> f32 {
        self.current_value
    }

    /// Writes a new value, clamped into the declared bounds. This is the
    /// single mutation path, so the bounds invariant holds by
    /// construction.
    pub fn set_value(&mut self, value: f32) {
        self.current_value = clamp(value, self.min_value, self.max_value);
    }
}

/// One applied adaptation, retained per parameter for audit and the
/// stability calculation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdaptationRecord {
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
    pub value: f32,
    pub performance_score: f32,
    pub feedback: FeedbackReport,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdaptationResult {
    pub parameter: ParameterName,
    pub old_value: f32,
    pub new_value: f32,
    pub adjustment: f32,
    pub confidence: f32,
    pub reasoning: String,
    pub expected_impact: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationDirection {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Correlation {
    pub coefficient: f32,
    pub strength: f32,
    pub direction: CorrelationDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizationProposal {
    pub parameter: ParameterName,
    pub current_value: f32,
    pub suggested_value: f32,
    pub confidence: f32,
    pub reasoning: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StabilityDetail {
    pub current_value: f32,
    pub stability_score: f32,
    pub is_stable: bool,
    pub recent_changes: usize,
    pub performance_impact: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StabilityReport {
    pub total_parameters: usize,
    pub stable_parameters: usize,
    pub unstable_parameters: usize,
    pub details: BTreeMap<ParameterName, StabilityDetail>,
}

/// Maps a feedback signal to a signed delta expressed as a multiple of the
/// parameter's learning rate. Rules are consulted in declaration order and
/// the first match wins for a given parameter.
struct AdaptationRule {
    parameter: ParameterName,
    signal: fn(&FeedbackReport) -> Option<f32>,
}

fn low_accuracy(feedback: &FeedbackReport) -> bool {
    feedback.accuracy.is_some_and(|value| value < 0.9)
}

fn very_high_accuracy(feedback: &FeedbackReport) -> bool {
    feedback.accuracy.is_some_and(|value| value > 0.98)
}

fn cost_pressure(feedback: &FeedbackReport) -> bool {
    feedback.cost_optimization.is_some_and(|value| value > 0.5)
}

fn low_employee_satisfaction(feedback: &FeedbackReport) -> bool {
    feedback
        .employee_satisfaction
        .is_some_and(|value| value < 0.7)
}

const ADAPTATION_RULES: &[AdaptationRule] = &[
    AdaptationRule {
        parameter: ParameterName::VacationBenefitFactor,
        signal: |f| low_accuracy(f).then_some(0.1),
    },
    AdaptationRule {
        parameter: ParameterName::SafetyMargin,
        signal: |f| low_accuracy(f).then_some(0.05),
    },
    AdaptationRule {
        parameter: ParameterName::SafetyMargin,
        signal: |f| very_high_accuracy(f).then_some(-0.02),
    },
    AdaptationRule {
        parameter: ParameterName::CompanyCostPercentage,
        signal: |f| cost_pressure(f).then_some(-0.05),
    },
    AdaptationRule {
        parameter: ParameterName::OptimizationFactor,
        signal: |f| cost_pressure(f).then_some(0.1),
    },
    AdaptationRule {
        parameter: ParameterName::EmployeeCostPercentage,
        signal: |f| low_employee_satisfaction(f).then_some(-0.05),
    },
    AdaptationRule {
        parameter: ParameterName::VacationBenefitFactor,
        signal: |f| low_employee_satisfaction(f).then_some(0.1),
    },
];

/// The tracked parameter set with its adaptation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterSet {
    parameters: BTreeMap<ParameterName, Parameter>,
    history: BTreeMap<ParameterName, Vec<AdaptationRecord>>,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::defaults()
    }
}

impl ParameterSet {
    /// Built-in parameter configuration, used on first start and as the
    /// fallback when persisted state is missing or corrupt.
    #[must_use]
    pub fn defaults() -> Self {
        let parameters = [
            Parameter {
                name: ParameterName::CompanyCostPercentage,
                current_value: 0.80,
                min_value: 0.70,
                max_value: 0.90,
                learning_rate: 0.01,
                adaptation_speed: 0.1,
                stability_threshold: 0.95,
                description: "Share of total cost borne by the company".to_string(),
                impact_factors: vec![
                    ImpactFactor::CostOptimization,
                    ImpactFactor::EmployeeSatisfaction,
                ],
            },
            Parameter {
                name: ParameterName::EmployeeCostPercentage,
                current_value: 0.20,
                min_value: 0.10,
                max_value: 0.30,
                learning_rate: 0.01,
                adaptation_speed: 0.1,
                stability_threshold: 0.95,
                description: "Share of total cost borne by the employee".to_string(),
                impact_factors: vec![
                    ImpactFactor::EmployeeSatisfaction,
                    ImpactFactor::CostOptimization,
                ],
            },
            Parameter {
                name: ParameterName::VacationBenefitFactor,
                current_value: 3.5,
                min_value: 2.0,
                max_value: 5.0,
                learning_rate: 0.05,
                adaptation_speed: 0.2,
                stability_threshold: 0.90,
                description: "Multiplier for vacation benefit calculation".to_string(),
                impact_factors: vec![
                    ImpactFactor::EmployeeSatisfaction,
                    ImpactFactor::Compliance,
                ],
            },
            Parameter {
                name: ParameterName::TerminationCutoffDay,
                current_value: 15.0,
                min_value: 10.0,
                max_value: 20.0,
                learning_rate: 0.1,
                adaptation_speed: 0.3,
                stability_threshold: 0.85,
                description: "Day of month for the termination cutoff".to_string(),
                impact_factors: vec![ImpactFactor::Compliance, ImpactFactor::BusinessRules],
            },
            Parameter {
                name: ParameterName::SafetyMargin,
                current_value: 0.1,
                min_value: 0.05,
                max_value: 0.2,
                learning_rate: 0.02,
                adaptation_speed: 0.15,
                stability_threshold: 0.90,
                description: "Safety margin applied to calculations".to_string(),
                impact_factors: vec![ImpactFactor::RiskMitigation, ImpactFactor::Compliance],
            },
            Parameter {
                name: ParameterName::OptimizationFactor,
                current_value: 0.8,
                min_value: 0.5,
                max_value: 1.0,
                learning_rate: 0.03,
                adaptation_speed: 0.2,
                stability_threshold: 0.85,
                description: "Weight given to optimization over safety".to_string(),
                impact_factors: vec![ImpactFactor::Efficiency, ImpactFactor::CostOptimization],
            },
        ]
        .into_iter()
        .map(|parameter| (parameter.name, parameter))
        .collect();

        Self {
            parameters,
            history: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn from_parts(
        parameters: BTreeMap<ParameterName, Parameter>,
        history: BTreeMap<ParameterName, Vec<AdaptationRecord>>,
    ) -> Self {
        let mut set = Self {
            parameters,
            history,
        };
        // Re-clamp on load so a hand-edited snapshot cannot smuggle an
        // out-of-bounds value past the invariant.
        for parameter in set.parameters.values_mut() {
            parameter.set_value(parameter.current_value);
        }
        set
    }

    #[must_use]
    pub fn parameters(&self) -> &BTreeMap<ParameterName, Parameter> {
        &self.parameters
    }

    #[must_use]
    pub fn history(&self) -> &BTreeMap<ParameterName, Vec<AdaptationRecord>> {
        &self.history
    }

    #[must_use]
    pub fn get(&self, name: ParameterName) -> Option<f32> {
        self.parameters
            .get(&name)
            .map(Parameter::current_value)
    }

    #[must_use]
    pub fn get_all(&self) -> BTreeMap<ParameterName, f32> {
        self.parameters
            .iter()
            .map(|(name, parameter)| (*name, parameter.current_value()))
            .collect()
    }

    /// Adapts eligible parameters from feedback. A parameter adapts only
    /// when it is under the trailing-window rate limit, the feedback
    /// touches one of its impact factors (or carries a generic
    /// performance signal), and the parameter has not converged.
    pub fn update_from_feedback(
        &mut self,
        feedback: &FeedbackReport,
        log: &ExperienceLog,
        now: OffsetDateTime,
    ) -> Vec<AdaptationResult> {
        let mut results = Vec::new();

        for name in ParameterName::ALL {
            if !self.should_adapt(name, feedback, now) {
                continue;
            }
            if let Some(result) = self.adapt(name, feedback, log, now) {
                tracing::info!(
                    parameter = result.parameter.as_str(),
                    old = result.old_value,
                    new = result.new_value,
                    "adapted parameter"
                );
                results.push(result);
            }
        }

        results
    }

    /// Correlates each parameter's historical value (drawn from past
    /// decisions) with the recording experience's performance score.
    /// Requires at least ten experiences; fewer yield an empty map.
    #[must_use]
    pub fn analyze_correlations(&self, log: &ExperienceLog) -> BTreeMap<ParameterName, Correlation> {
        if log.len() < CORRELATION_MIN_EXPERIENCES {
            return BTreeMap::new();
        }

        let mut correlations = BTreeMap::new();
        for name in ParameterName::ALL {
            let mut values = Vec::new();
            let mut scores = Vec::new();
            for experience in log.experiences() {
                if let Some(value) = experience.decision.parameters.get(name.as_str()) {
                    values.push(*value);
                    scores.push(experience.performance_score);
                }
            }

            if let Some(coefficient) = pearson(&values, &scores) {
                let _ = correlations.insert(
                    name,
                    Correlation {
                        coefficient,
                        strength: coefficient.abs(),
                        direction: if coefficient > 0.0 {
                            CorrelationDirection::Positive
                        } else {
                            CorrelationDirection::Negative
                        },
                    },
                );
            }
        }

        correlations
    }

    /// Proposes nudges for parameters whose history correlates with
    /// performance, plus a small upward nudge when the recent performance
    /// trend is declining. Proposals below [`MIN_ADJUSTMENT`] are
    /// suppressed.
    #[must_use]
    pub fn suggest_optimization(&self, log: &ExperienceLog) -> Vec<OptimizationProposal> {
        let correlations = self.analyze_correlations(log);

        let scores = log.scores();
        let recent = if scores.len() > 20 {
            &scores[scores.len() - 20..]
        } else {
            &scores[..]
        };
        let declining = linear_fit(recent)
            .map(|fit| fit.direction())
            == Some(TrendDirection::Declining);

        let mut proposals = Vec::new();
        for (name, parameter) in &self.parameters {
            let current = parameter.current_value();
            let mut suggested = current;
            let mut reasoning = Vec::new();
            let mut confidence = 0.5_f32;

            if let Some(correlation) = correlations.get(name) {
                if correlation.strength > SIGNIFICANT_CORRELATION {
                    suggested = match correlation.direction {
                        CorrelationDirection::Positive => {
                            (current * 1.05).min(parameter.max_value)
                        }
                        CorrelationDirection::Negative => {
                            (current * 0.95).max(parameter.min_value)
                        }
                    };
                    reasoning.push(match correlation.direction {
                        CorrelationDirection::Positive => {
                            "Positive correlation with performance".to_string()
                        }
                        CorrelationDirection::Negative => {
                            "Negative correlation with performance".to_string()
                        }
                    });
                    confidence = correlation.strength;
                }
            }

            if declining {
                suggested = (current * 1.02).min(parameter.max_value);
                reasoning.push("Declining performance requires adjustment".to_string());
                confidence = 0.7;
            }

            if (suggested - current).abs() < MIN_ADJUSTMENT {
                continue;
            }

            proposals.push(OptimizationProposal {
                parameter: *name,
                current_value: current,
                suggested_value: suggested,
                confidence,
                reasoning,
            });
        }

        proposals
    }

    #[must_use]
    pub fn stability_report(&self, now: OffsetDateTime) -> StabilityReport {
        let mut details = BTreeMap::new();
        let mut stable = 0;

        for (name, parameter) in &self.parameters {
            let score = self.stability_score(*name);
            let is_stable = self.is_stable(*name);
            if is_stable {
                stable += 1;
            }

            let _ = details.insert(
                *name,
                StabilityDetail {
                    current_value: parameter.current_value(),
                    stability_score: score,
                    is_stable,
                    recent_changes: self.adaptations_within(*name, now, 30),
                    performance_impact: self.performance_impact(*name),
                },
            );
        }

        StabilityReport {
            total_parameters: self.parameters.len(),
            stable_parameters: stable,
            unstable_parameters: self.parameters.len() - stable,
            details,
        }
    }

    /// `max(0, 1 − 10×variance)` over the last ten recorded values. A
    /// parameter with fewer than two recorded values scores 1.0.
    #[must_use]
    pub fn stability_score(&self, name: ParameterName) -> f32 {
        let values = self.recent_history_values(name);
        if values.len() < 2 {
            return 1.0;
        }
        variance(&values).map_or(1.0, |v| (1.0 - v * 10.0).max(0.0))
    }

    /// A parameter is stable once enough history exists for convergence to
    /// be observable and its stability score clears the declared
    /// threshold. Sparse history is treated as not-yet-converged so that
    /// fresh parameters can adapt at all.
    #[must_use]
    pub fn is_stable(&self, name: ParameterName) -> bool {
        let values = self.recent_history_values(name);
        if values.len() < MIN_SAMPLES_FOR_STABILITY {
            return false;
        }

        let threshold = self
            .parameters
            .get(&name)
            .map_or(0.9, |parameter| parameter.stability_threshold);
        self.stability_score(name) > threshold
    }

    #[must_use]
    pub fn adaptations_within(&self, name: ParameterName, now: OffsetDateTime, days: i64) -> usize {
        let cutoff = now - Duration::days(days);
        self.history.get(&name).map_or(0, |records| {
            records
                .iter()
                .filter(|record| record.recorded_at >= cutoff)
                .count()
        })
    }

    fn should_adapt(&self, name: ParameterName, feedback: &FeedbackReport, now: OffsetDateTime) -> bool {
        if self.adaptations_within(name, now, ADAPTATION_WINDOW_DAYS)
            >= MAX_ADAPTATIONS_PER_WINDOW
        {
            return false;
        }

        let relevant = self.parameters.get(&name).is_some_and(|parameter| {
            parameter
                .impact_factors
                .iter()
                .any(|factor| feedback.references(*factor))
        }) || feedback.has_performance_signal();
        if !relevant {
            return false;
        }

        !self.is_stable(name)
    }

    fn adapt(
        &mut self,
        name: ParameterName,
        feedback: &FeedbackReport,
        log: &ExperienceLog,
        now: OffsetDateTime,
    ) -> Option<AdaptationResult> {
        let parameter = self.parameters.get(&name)?;
        let multiplier = ADAPTATION_RULES
            .iter()
            .filter(|rule| rule.parameter == name)
            .find_map(|rule| (rule.signal)(feedback))?;
        let adjustment = parameter.learning_rate * multiplier;

        // Inclusive comparison: the safety margin's low-accuracy delta
        // (0.02 x 0.05) lands exactly on the floor in f32 and must not
        // apply.
        if adjustment.abs() <= MIN_ADJUSTMENT {
            return None;
        }

        let old_value = parameter.current_value();
        let confidence = self.adaptation_confidence(name, feedback, log);
        let parameter = self.parameters.get_mut(&name)?;
        parameter.set_value(old_value + adjustment);
        let new_value = parameter.current_value();

        let reasoning = adaptation_reasoning(name, old_value, new_value, feedback);
        let record = AdaptationRecord {
            recorded_at: now,
            value: new_value,
            performance_score: feedback.accuracy.unwrap_or(0.5),
            feedback: feedback.clone(),
            reason: reasoning.clone(),
        };

        let records = self.history.entry(name).or_default();
        records.push(record);
        if records.len() > HISTORY_RETENTION {
            let excess = records.len() - HISTORY_RETENTION;
            records.drain(..excess);
        }

        Some(AdaptationResult {
            parameter: name,
            old_value,
            new_value,
            adjustment,
            confidence,
            reasoning,
            expected_impact: expected_impact(name, new_value),
        })
    }

    fn adaptation_confidence(
        &self,
        name: ParameterName,
        feedback: &FeedbackReport,
        log: &ExperienceLog,
    ) -> f32 {
        let mut confidence = 0.5_f32;

        if let Some(accuracy) = feedback.accuracy {
            confidence += (accuracy - 0.5) * 0.3;
        }

        let recent: Vec<f32> = log
            .experiences()
            .iter()
            .rev()
            .take(50)
            .filter(|exp| exp.decision.parameters.contains_key(name.as_str()))
            .take(10)
            .map(|exp| exp.performance_score)
            .collect();
        if let Some(average) = mean(&recent) {
            confidence += (average - 0.5) * 0.2;
        }

        clamp_unit(confidence)
    }

    fn recent_history_values(&self, name: ParameterName) -> Vec<f32> {
        self.history.get(&name).map_or_else(Vec::new, |records| {
            let start = records.len().saturating_sub(STABILITY_SAMPLE);
            records[start..].iter().map(|record| record.value).collect()
        })
    }

    fn performance_impact(&self, name: ParameterName) -> f32 {
        let records = match self.history.get(&name) {
            Some(records) if records.len() >= 2 => records,
            _ => return 0.0,
        };
        let start = records.len().saturating_sub(STABILITY_SAMPLE);
        let values: Vec<f32> = records[start..].iter().map(|r| r.value).collect();
        let scores: Vec<f32> = records[start..].iter().map(|r| r.performance_score).collect();
        pearson(&values, &scores).unwrap_or(0.0)
    }
}

fn adaptation_reasoning(
    name: ParameterName,
    old_value: f32,
    new_value: f32,
    feedback: &FeedbackReport,
) -> String {
    let mut parts = Vec::new();

    if let Some(accuracy) = feedback.accuracy {
        if accuracy < 0.9 {
            parts.push(format!(
                "Low accuracy ({:.1}%) requires parameter adjustment",
                accuracy * 100.0
            ));
        } else if accuracy > 0.98 {
            parts.push(format!(
                "High accuracy ({:.1}%) allows for optimization",
                accuracy * 100.0
            ));
        }
    }

    let increased = new_value > old_value;
    match name {
        ParameterName::VacationBenefitFactor => parts.push(
            if increased {
                "Increasing vacation benefit factor to improve employee satisfaction"
            } else {
                "Decreasing vacation benefit factor for cost optimization"
            }
            .to_string(),
        ),
        ParameterName::CompanyCostPercentage => parts.push(
            if increased {
                "Increasing company cost share to improve employee satisfaction"
            } else {
                "Decreasing company cost share for cost optimization"
            }
            .to_string(),
        ),
        ParameterName::SafetyMargin => parts.push(
            if increased {
                "Widening safety margin to protect accuracy"
            } else {
                "Narrowing safety margin to recover efficiency"
            }
            .to_string(),
        ),
        _ => parts.push(format!(
            "Adjusting {} from feedback signals",
            name.as_str()
        )),
    }

    parts.join(". ") + "."
}

fn expected_impact(name: ParameterName, new_value: f32) -> BTreeMap<String, f32> {
    let entries: &[(&str, f32)] = match name {
        ParameterName::CompanyCostPercentage => &[
            ("cost_optimization", -0.5),
            ("employee_satisfaction", 0.3),
        ],
        ParameterName::EmployeeCostPercentage => &[
            ("cost_optimization", 0.4),
            ("employee_satisfaction", -0.5),
        ],
        ParameterName::VacationBenefitFactor => &[
            ("employee_satisfaction", 0.2),
            ("cost_optimization", -0.1),
        ],
        ParameterName::SafetyMargin => &[("risk_mitigation", 0.8), ("efficiency", -0.3)],
        _ => &[],
    };

    entries
        .iter()
        .map(|(factor, weight)| ((*factor).to_string(), new_value * weight))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_rfc3339_utc;
    use proptest::prelude::*;

    fn must_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    fn fixture_now() -> OffsetDateTime {
        must_ok(parse_rfc3339_utc("2026-08-25T12:00:00Z"))
    }

    fn accuracy_feedback(accuracy: f32) -> FeedbackReport {
        FeedbackReport {
            accuracy: Some(accuracy),
            ..FeedbackReport::default()
        }
    }

    #[test]
    fn low_accuracy_adapts_vacation_factor_only() {
        // Scenario: accuracy 0.85 against factory defaults. The vacation
        // benefit delta (0.05 x 0.1) survives the no-op gate; the safety
        // margin delta (0.02 x 0.05) does not.
        let mut set = ParameterSet::defaults();
        let log = ExperienceLog::new();

        let results = set.update_from_feedback(&accuracy_feedback(0.85), &log, fixture_now());

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].parameter, ParameterName::VacationBenefitFactor);
        assert!((results[0].old_value - 3.5).abs() < 1e-6);
        assert!((results[0].new_value - 3.505).abs() < 1e-4);
        assert!(results[0].new_value >= 2.0 && results[0].new_value <= 5.0);
    }

    #[test]
    fn floor_boundary_delta_is_discarded() {
        // In f32 the safety margin's low-accuracy delta rounds to exactly
        // the no-op floor, so it must be dropped, not applied.
        let mut set = ParameterSet::defaults();
        let log = ExperienceLog::new();

        let delta = 0.02_f32 * 0.05_f32;
        assert!(delta <= MIN_ADJUSTMENT);

        let results = set.update_from_feedback(&accuracy_feedback(0.85), &log, fixture_now());
        assert!(results
            .iter()
            .all(|result| result.parameter != ParameterName::SafetyMargin));
        assert_eq!(set.get(ParameterName::SafetyMargin), Some(0.1));
    }

    #[test]
    fn cost_pressure_moves_cost_split_and_optimization() {
        let mut set = ParameterSet::defaults();
        let log = ExperienceLog::new();
        let feedback = FeedbackReport {
            cost_optimization: Some(0.8),
            ..FeedbackReport::default()
        };

        let results = set.update_from_feedback(&feedback, &log, fixture_now());

        let parameters: Vec<ParameterName> = results.iter().map(|r| r.parameter).collect();
        assert!(parameters.contains(&ParameterName::OptimizationFactor));
        // The company cost delta (0.01 x 0.05) is below the no-op floor.
        assert!(!parameters.contains(&ParameterName::CompanyCostPercentage));
    }

    #[test]
    fn rate_limit_blocks_fourth_adaptation_in_window() {
        let mut set = ParameterSet::defaults();
        let log = ExperienceLog::new();
        let now = fixture_now();

        for hour in 0..3 {
            let at = now + Duration::hours(hour);
            let results = set.update_from_feedback(&accuracy_feedback(0.85), &log, at);
            assert_eq!(results.len(), 1, "adaptation {hour} should apply");
        }

        let blocked = set.update_from_feedback(&accuracy_feedback(0.85), &log, now + Duration::hours(3));
        assert!(blocked.is_empty());
        assert_eq!(
            set.adaptations_within(ParameterName::VacationBenefitFactor, now + Duration::hours(3), 7),
            3
        );
    }

    #[test]
    fn rate_limit_window_slides() {
        let mut set = ParameterSet::defaults();
        let log = ExperienceLog::new();
        let now = fixture_now();

        for day in 0..3 {
            let results =
                set.update_from_feedback(&accuracy_feedback(0.85), &log, now + Duration::days(day));
            assert_eq!(results.len(), 1);
        }

        let name = ParameterName::VacationBenefitFactor;
        assert_eq!(set.adaptations_within(name, now + Duration::days(2), 7), 3);
        // Eight days after the first adaptation only the later two remain
        // in the trailing window.
        assert_eq!(set.adaptations_within(name, now + Duration::days(8), 7), 2);
        assert_eq!(set.adaptations_within(name, now + Duration::days(20), 7), 0);
    }

    #[test]
    fn irrelevant_feedback_adapts_nothing() {
        let mut set = ParameterSet::defaults();
        let log = ExperienceLog::new();
        let results = set.update_from_feedback(&FeedbackReport::default(), &log, fixture_now());
        assert!(results.is_empty());
    }

    #[test]
    fn converged_parameter_is_held_stable() {
        let mut set = ParameterSet::defaults();
        let now = fixture_now();
        // Three old identical values: zero variance, past the threshold.
        let records: Vec<AdaptationRecord> = (0..3)
            .map(|index| AdaptationRecord {
                recorded_at: now - Duration::days(30 + index),
                value: 3.5,
                performance_score: 0.9,
                feedback: FeedbackReport::default(),
                reason: "converged".to_string(),
            })
            .collect();
        let _ = set.history.insert(ParameterName::VacationBenefitFactor, records);

        assert!(set.is_stable(ParameterName::VacationBenefitFactor));

        let log = ExperienceLog::new();
        let results = set.update_from_feedback(&accuracy_feedback(0.85), &log, now);
        assert!(results
            .iter()
            .all(|r| r.parameter != ParameterName::VacationBenefitFactor));
    }

    #[test]
    fn sparse_history_is_not_stable() {
        let set = ParameterSet::defaults();
        assert!(!set.is_stable(ParameterName::VacationBenefitFactor));
        assert_eq!(set.stability_score(ParameterName::VacationBenefitFactor), 1.0);
    }

    #[test]
    fn set_value_clamps_to_bounds() {
        let mut set = ParameterSet::defaults();
        if let Some(parameter) = set.parameters.get_mut(&ParameterName::SafetyMargin) {
            parameter.set_value(9.0);
            assert!((parameter.current_value() - 0.2).abs() < 1e-6);
            parameter.set_value(-1.0);
            assert!((parameter.current_value() - 0.05).abs() < 1e-6);
        }
    }

    #[test]
    fn reload_reclamps_out_of_bounds_snapshot_values() {
        let mut parameters = ParameterSet::defaults().parameters.clone();
        if let Some(parameter) = parameters.get_mut(&ParameterName::SafetyMargin) {
            parameter.current_value = 5.0;
        }
        let set = ParameterSet::from_parts(parameters, BTreeMap::new());
        assert_eq!(set.get(ParameterName::SafetyMargin), Some(0.2));
    }

    #[test]
    fn correlations_require_ten_experiences() {
        let set = ParameterSet::defaults();
        let log = ExperienceLog::new();
        assert!(set.analyze_correlations(&log).is_empty());
    }

    #[test]
    fn stability_report_counts_add_up() {
        let set = ParameterSet::defaults();
        let report = set.stability_report(fixture_now());
        assert_eq!(report.total_parameters, 6);
        assert_eq!(
            report.stable_parameters + report.unstable_parameters,
            report.total_parameters
        );
    }

    proptest! {
        /// Bounds hold for every parameter under any feedback sequence.
        #[test]
        fn values_stay_in_bounds_under_arbitrary_feedback(
            signals in proptest::collection::vec(
                (0.0_f32..=1.0, 0.0_f32..=1.0, 0.0_f32..=1.0),
                1..24
            )
        ) {
            let mut set = ParameterSet::defaults();
            let log = ExperienceLog::new();
            let start = must_ok(parse_rfc3339_utc("2026-01-01T00:00:00Z"));

            for (index, (accuracy, cost, satisfaction)) in signals.iter().enumerate() {
                let feedback = FeedbackReport {
                    accuracy: Some(*accuracy),
                    cost_optimization: Some(*cost),
                    employee_satisfaction: Some(*satisfaction),
                    ..FeedbackReport::default()
                };
                let at = start + Duration::hours(i64::try_from(index).unwrap_or(0) * 6);
                let _ = set.update_from_feedback(&feedback, &log, at);

                for parameter in set.parameters().values() {
                    prop_assert!(parameter.current_value() >= parameter.min_value);
                    prop_assert!(parameter.current_value() <= parameter.max_value);
                }

                for name in ParameterName::ALL {
                    prop_assert!(
                        set.adaptations_within(name, at, ADAPTATION_WINDOW_DAYS)
                            <= MAX_ADAPTATIONS_PER_WINDOW
                    );
                }
            }
        }
    }
}
