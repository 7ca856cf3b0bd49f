//! Situation analysis and strategy selection.
//!
//! A request context is first analyzed into a complexity score, a risk
//! level, and qualitative factors. Strategies from a fixed catalog are then
//! filtered against that analysis, scored against similar past experiences,
//! and the best-scoring option is selected with a calibrated confidence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::context::{RequestContext, TimeConstraint};
use crate::experience::ExperienceLog;
use crate::trend::mean;
use crate::{clamp_unit, AgentError};

const COMPLEXITY_INNOVATION_FLOOR: f32 = 0.3;
const HIGH_RISK_TOLERANCE: f32 = 0.6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Conservative,
    Optimized,
    Adaptive,
    Innovative,
}

impl Strategy {
    pub const ALL: [Self; 4] = [
        Self::Conservative,
        Self::Optimized,
        Self::Adaptive,
        Self::Innovative,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Optimized => "optimized",
            Self::Adaptive => "adaptive",
            Self::Innovative => "innovative",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "conservative" => Some(Self::Conservative),
            "optimized" => Some(Self::Optimized),
            "adaptive" => Some(Self::Adaptive),
            "innovative" => Some(Self::Innovative),
            _ => None,
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Conservative => "Proven rules with strict validation and wide safety margins",
            Self::Optimized => "Efficiency-first processing tuned by historical outcomes",
            Self::Adaptive => "Sophisticated context-sensitive processing with dynamic adjustment",
            Self::Innovative => "Exploratory processing with novel parameter combinations",
        }
    }

    /// Appetite for risk, on the unit scale.
    #[must_use]
    pub fn risk_tolerance(self) -> f32 {
        match self {
            Self::Conservative => 0.2,
            Self::Optimized => 0.5,
            Self::Adaptive => 0.7,
            Self::Innovative => 0.8,
        }
    }

    #[must_use]
    pub fn innovation_level(self) -> f32 {
        match self {
            Self::Conservative => 0.1,
            Self::Optimized => 0.6,
            Self::Adaptive => 0.8,
            Self::Innovative => 0.9,
        }
    }

    /// Strategy-specific parameter overrides layered over the controller
    /// snapshot when a decision is recorded.
    #[must_use]
    pub fn overrides(self) -> BTreeMap<String, f32> {
        let entries: &[(&str, f32)] = match self {
            Self::Conservative => &[
                ("safety_margin", 0.1),
                ("rule_strictness", 1.0),
                ("adaptation_factor", 0.5),
            ],
            Self::Optimized => &[
                ("optimization_factor", 0.8),
                ("learning_rate", 0.1),
                ("historical_weight", 0.7),
            ],
            Self::Adaptive => &[
                ("adaptation_factor", 0.9),
                ("context_sensitivity", 0.7),
                ("dynamic_adjustment", 0.8),
            ],
            Self::Innovative => &[
                ("creativity_factor", 0.9),
                ("exploration_rate", 0.7),
                ("novelty_weight", 0.8),
            ],
        };
        entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), *value))
            .collect()
    }

    fn performance_bonus(self) -> f32 {
        match self {
            Self::Conservative | Self::Innovative => 0.1,
            Self::Optimized => 0.15,
            Self::Adaptive => 0.2,
        }
    }

    fn time_multiplier(self) -> f32 {
        match self {
            Self::Conservative => 0.8,
            Self::Optimized => 1.0,
            Self::Adaptive => 1.2,
            Self::Innovative => 1.5,
        }
    }

    fn cost_multiplier(self) -> f32 {
        match self {
            Self::Conservative => 1.0,
            Self::Optimized => 0.9,
            Self::Adaptive => 1.1,
            Self::Innovative => 1.3,
        }
    }

    fn risks(self) -> Vec<String> {
        let entries: &[&str] = match self {
            Self::Conservative => &["slower_processing", "missed_optimization"],
            Self::Optimized => &["moderate_complexity"],
            Self::Adaptive => &["complexity_overhead", "tuning_sensitivity"],
            Self::Innovative => &["unproven_approach", "higher_variance"],
        };
        entries.iter().map(|entry| (*entry).to_string()).collect()
    }

    fn benefits(self) -> Vec<String> {
        let entries: &[&str] = match self {
            Self::Conservative => &["low_risk", "predictable_outcome"],
            Self::Optimized => &["cost_efficiency", "proven_performance"],
            Self::Adaptive => &["context_fit", "dynamic_response"],
            Self::Innovative => &["breakthrough_potential", "novel_insights"],
        };
        entries.iter().map(|entry| (*entry).to_string()).collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Coarse classification of the request scale and shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SituationKind {
    LargeScaleComplex,
    LargeScaleStandard,
    MediumScale,
    SmallScale,
}

impl SituationKind {
    #[must_use]
    pub fn classify(context: &RequestContext) -> Self {
        if context.employee_count > 1500 {
            if context.data_quality_score < 0.8 {
                Self::LargeScaleComplex
            } else {
                Self::LargeScaleStandard
            }
        } else if context.employee_count > 500 {
            Self::MediumScale
        } else {
            Self::SmallScale
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LargeScaleComplex => "large_scale_complex",
            Self::LargeScaleStandard => "large_scale_standard",
            Self::MediumScale => "medium_scale",
            Self::SmallScale => "small_scale",
        }
    }
}

/// The strategy and effective parameters a decision was made with, as
/// recorded into the experience log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRecord {
    pub strategy: Strategy,
    pub parameters: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub situation: SituationKind,
    pub complexity: f32,
    pub risk_level: RiskLevel,
    pub key_factors: BTreeMap<String, f32>,
    pub constraints: Vec<String>,
    pub opportunities: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionOption {
    pub strategy: Strategy,
    pub description: String,
    pub expected_performance: f32,
    pub confidence: f32,
    pub risks: Vec<String>,
    pub benefits: Vec<String>,
    pub parameters: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictedOutcome {
    pub estimated_accuracy: f32,
    pub confidence: f32,
    pub estimated_time_secs: f32,
    pub estimated_cost: f32,
    pub risk_category: RiskLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionResult {
    pub selected: DecisionOption,
    pub score: f32,
    pub confidence: f32,
    pub reasoning: String,
    pub predicted_outcome: PredictedOutcome,
    pub risk_assessment: BTreeMap<String, f32>,
    pub alternatives: Vec<DecisionOption>,
}

/// Scores the request context into complexity, risk, and the qualitative
/// factors the option generator keys off.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn analyze_situation(context: &RequestContext) -> AnalysisResult {
    let scale = (context.employee_count as f32 / 2000.0).min(1.0);
    let quality_gap = 1.0 - context.data_quality_score;
    let conflicts = context.rule_conflicts.len() as f32;
    let urgent = context.time_constraint == TimeConstraint::Urgent;
    let budget_limited = context.budget_limit > 0.0 && context.budget_limit < 1_000_000.0;

    let complexity = clamp_unit(
        scale * 0.3
            + quality_gap * 0.25
            + conflicts * 0.2
            + f32::from(u8::from(urgent)) * 0.15
            + f32::from(u8::from(budget_limited)) * 0.1,
    );

    let risk_flags = usize::from(context.data_quality_score < 0.8)
        + usize::from(context.employee_count > 1000)
        + usize::from(budget_limited)
        + usize::from(urgent);
    let risk_level = match risk_flags {
        0 | 1 => RiskLevel::Low,
        2 => RiskLevel::Medium,
        _ => RiskLevel::High,
    };

    let budget_pressure = if context.budget_limit > 0.0 {
        1.0 - (context.budget_limit / 2_000_000.0).min(1.0)
    } else {
        0.0
    };

    let mut key_factors = BTreeMap::new();
    let _ = key_factors.insert("scale".to_string(), scale);
    let _ = key_factors.insert("data_quality".to_string(), context.data_quality_score);
    let _ = key_factors.insert("budget_pressure".to_string(), budget_pressure);
    let _ = key_factors.insert(
        "time_pressure".to_string(),
        if urgent { 0.8 } else { 0.2 },
    );
    let _ = key_factors.insert(
        "rule_complexity".to_string(),
        (context.business_rules.len() as f32 / 10.0).min(1.0),
    );

    let mut constraints = Vec::new();
    if budget_limited {
        constraints.push("budget_limited".to_string());
    }
    if urgent {
        constraints.push("time_critical".to_string());
    }
    if context.data_quality_score < 0.8 {
        constraints.push("data_quality_issues".to_string());
    }
    if context.compliance_required {
        constraints.push("strict_compliance".to_string());
    }

    let mut opportunities = Vec::new();
    if context.data_quality_score > 0.9 {
        opportunities.push("high_quality_data".to_string());
    }
    if context.employee_count > 1000 {
        opportunities.push("economies_of_scale".to_string());
    }
    if context.historical_data_available {
        opportunities.push("historical_learning".to_string());
    }
    if context.flexible_parameters {
        opportunities.push("parameter_optimization".to_string());
    }

    let mut recommendations = Vec::new();
    if complexity > 0.7 {
        recommendations.push("Use conservative processing for this complex situation".to_string());
    }
    if risk_level == RiskLevel::High {
        recommendations.push("Apply additional validation before committing results".to_string());
    }
    if opportunities.contains(&"historical_learning".to_string()) {
        recommendations.push("Leverage similar past experiences for calibration".to_string());
    }
    if constraints.contains(&"data_quality_issues".to_string()) {
        recommendations.push("Flag low-confidence inputs for manual review".to_string());
    }

    AnalysisResult {
        situation: SituationKind::classify(context),
        complexity,
        risk_level,
        key_factors,
        constraints,
        opportunities,
        recommendations,
    }
}

/// Builds the viable strategy options for an analyzed situation.
///
/// Risk-tolerant strategies are excluded in high-risk situations, highly
/// innovative ones in trivially simple situations, and the innovative
/// strategy whenever strict compliance is constrained.
#[must_use]
pub fn generate_options(
    analysis: &AnalysisResult,
    context: &RequestContext,
    log: &ExperienceLog,
    similarity_threshold: f32,
    max_similar: usize,
) -> Vec<DecisionOption> {
    let strict_compliance = analysis
        .constraints
        .iter()
        .any(|constraint| constraint == "strict_compliance");

    let mut options = Vec::new();
    for strategy in Strategy::ALL {
        if analysis.risk_level == RiskLevel::High && strategy.risk_tolerance() > HIGH_RISK_TOLERANCE
        {
            continue;
        }
        if analysis.complexity < COMPLEXITY_INNOVATION_FLOOR
            && strategy.innovation_level() > 0.7
        {
            continue;
        }
        if strict_compliance && strategy == Strategy::Innovative {
            continue;
        }

        let mut expected_performance = 0.7 + strategy.performance_bonus();
        if analysis.risk_level == RiskLevel::High {
            expected_performance += if strategy.risk_tolerance() <= 0.4 {
                0.1
            } else {
                -0.1
            };
        }
        expected_performance += (context.data_quality_score - 0.5) * 0.2;
        expected_performance = clamp_unit(expected_performance);

        let mut confidence = 0.8;
        if strategy == Strategy::Conservative {
            confidence += 0.1;
        }
        if strategy == Strategy::Innovative {
            confidence -= 0.2;
        }
        confidence -= analysis.complexity * 0.3;
        if let Some(history) =
            strategy_history(strategy, context, log, similarity_threshold, max_similar)
        {
            confidence += (history - 0.5) * 0.4;
        }
        confidence = clamp_unit(confidence);

        let mut risks = strategy.risks();
        let mut benefits = strategy.benefits();
        if analysis.risk_level == RiskLevel::High {
            risks.push("high_risk_environment".to_string());
        } else if analysis.risk_level == RiskLevel::Low {
            benefits.push("favorable_environment".to_string());
        }

        options.push(DecisionOption {
            strategy,
            description: strategy.description().to_string(),
            expected_performance,
            confidence,
            risks,
            benefits,
            parameters: strategy.overrides(),
        });
    }

    options
}

/// Scores the options and selects the best one.
///
/// # Errors
/// Returns [`AgentError::NoViableOptions`] when the option list is empty.
pub fn evaluate_and_select(
    options: Vec<DecisionOption>,
    analysis: &AnalysisResult,
    context: &RequestContext,
    log: &ExperienceLog,
    similarity_threshold: f32,
    max_similar: usize,
) -> Result<DecisionResult, AgentError> {
    if options.is_empty() {
        return Err(AgentError::NoViableOptions);
    }

    let mut scored: Vec<(f32, DecisionOption)> = options
        .into_iter()
        .map(|option| {
            let fit = situation_fit(&option, analysis);
            let history =
                strategy_history(option.strategy, context, log, similarity_threshold, max_similar)
                    .unwrap_or(0.5);
            let score = option.expected_performance * 0.4
                + option.confidence * 0.3
                + fit * 0.2
                + history * 0.1;
            (score, option)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut confidence = if scored.len() == 1 {
        scored[0].1.confidence
    } else {
        0.5 + (scored[0].0 - scored[1].0) * 0.5
    };
    confidence -= analysis.complexity * 0.2;
    if analysis.risk_level == RiskLevel::High {
        confidence -= 0.1;
    }
    let confidence = clamp_unit(confidence);

    let mut iter = scored.into_iter();
    let (score, selected) = match iter.next() {
        Some(first) => first,
        None => return Err(AgentError::NoViableOptions),
    };
    let alternatives: Vec<DecisionOption> = iter.map(|(_, option)| option).collect();

    let reasoning = format!(
        "Selected {} strategy (score {:.2}) for a {} situation with {} risk",
        selected.strategy.as_str(),
        score,
        analysis.situation.as_str(),
        analysis.risk_level.as_str(),
    );

    let predicted_outcome = predict_outcome(&selected, context);
    let risk_assessment = assess_risks(&selected, analysis, context);

    Ok(DecisionResult {
        selected,
        score,
        confidence,
        reasoning,
        predicted_outcome,
        risk_assessment,
        alternatives,
    })
}

/// Mean performance of similar past experiences that used the strategy.
fn strategy_history(
    strategy: Strategy,
    context: &RequestContext,
    log: &ExperienceLog,
    similarity_threshold: f32,
    max_similar: usize,
) -> Option<f32> {
    let similar = log.retrieve_similar(context, similarity_threshold, max_similar);
    let scores: Vec<f32> = similar
        .iter()
        .filter(|hit| hit.experience.decision.strategy == strategy)
        .map(|hit| hit.experience.performance_score)
        .collect();
    mean(&scores)
}

fn situation_fit(option: &DecisionOption, analysis: &AnalysisResult) -> f32 {
    let mut fit = 0.5_f32;
    if analysis.risk_level == RiskLevel::High
        && option.benefits.iter().any(|benefit| benefit == "low_risk")
    {
        fit += 0.3;
    }
    if analysis.risk_level == RiskLevel::Low
        && option
            .benefits
            .iter()
            .any(|benefit| benefit == "breakthrough_potential")
    {
        fit += 0.2;
    }
    if analysis.complexity > 0.7 && option.description.contains("ophisticated") {
        fit += 0.2;
    }
    clamp_unit(fit)
}

#[allow(clippy::cast_precision_loss)]
fn predict_outcome(option: &DecisionOption, context: &RequestContext) -> PredictedOutcome {
    let scale_factor = 1.0 + context.employee_count as f32 / 1000.0 * 0.5;
    let risk_category = match option.risks.len() {
        0..=1 => RiskLevel::Low,
        2 => RiskLevel::Medium,
        _ => RiskLevel::High,
    };

    PredictedOutcome {
        estimated_accuracy: option.expected_performance,
        confidence: option.confidence,
        estimated_time_secs: 60.0 * scale_factor * option.strategy.time_multiplier(),
        estimated_cost: 1000.0 * option.strategy.cost_multiplier(),
        risk_category,
    }
}

fn assess_risks(
    option: &DecisionOption,
    analysis: &AnalysisResult,
    context: &RequestContext,
) -> BTreeMap<String, f32> {
    let budget_pressure = analysis
        .key_factors
        .get("budget_pressure")
        .copied()
        .unwrap_or(0.0);

    let mut assessment = BTreeMap::new();
    let _ = assessment.insert(
        "performance_risk".to_string(),
        1.0 - option.expected_performance,
    );
    let _ = assessment.insert(
        "time_risk".to_string(),
        if context.time_constraint == TimeConstraint::Urgent {
            0.2
        } else {
            0.1
        },
    );
    let _ = assessment.insert("cost_risk".to_string(), budget_pressure * 0.3);
    let _ = assessment.insert(
        "compliance_risk".to_string(),
        if context.compliance_required { 0.1 } else { 0.05 },
    );
    assessment
}
