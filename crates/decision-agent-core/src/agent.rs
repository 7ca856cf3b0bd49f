//! The orchestrating agent.
//!
//! [`DecisionAgent`] wires the experience log, the parameter controller,
//! the reasoning functions, and the forecaster behind a single entry point,
//! and owns the [`StateStore`] handle that persists full state snapshots.
//! Persistence failures after a mutation are logged and swallowed so a
//! broken backend degrades durability, not decisions.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::context::{FeedbackReport, RequestContext};
use crate::experience::{
    ExperienceLog, OutcomeRecord, TrendReport, DEFAULT_MAX_RESULTS, DEFAULT_SIMILARITY_THRESHOLD,
};
use crate::forecast::{
    self, ActionPlan, OptimizationSuggestion, PerformanceForecast, TrendMetric, TrendPrediction,
};
use crate::params::{
    AdaptationResult, OptimizationProposal, ParameterName, ParameterSet, StabilityReport,
};
use crate::reasoning::{
    analyze_situation, evaluate_and_select, generate_options, AnalysisResult, DecisionRecord,
    DecisionResult,
};
use crate::store::{
    AdaptationHistorySnapshot, ExperienceLogSnapshot, ParameterSetSnapshot, StateStore,
};
use crate::trend::{mean, TrendDirection};
use crate::{clamp_unit, now_utc, AgentError};

/// Targets the agent plans toward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goals {
    pub target_accuracy: f32,
    pub cost_optimization: bool,
    pub employee_satisfaction: bool,
}

impl Default for Goals {
    fn default() -> Self {
        Self {
            target_accuracy: 0.99,
            cost_optimization: true,
            employee_satisfaction: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub goals: Goals,
    pub similarity_threshold: f32,
    pub max_similar_results: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            goals: Goals::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_similar_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// The decision portion of a processed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentDecision {
    /// Fingerprint of the recorded experience, used to attach feedback.
    pub experience_id: String,
    pub analysis: AnalysisResult,
    pub result: DecisionResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentResponse {
    pub decision: AgentDecision,
    pub predictions: Vec<TrendPrediction>,
    pub optimizations: Vec<OptimizationSuggestion>,
    pub action_plan: ActionPlan,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub confidence: f32,
    pub elapsed_secs: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentStatus {
    pub total_experiences: usize,
    pub total_insights: usize,
    pub total_adaptations: usize,
    pub stable_parameters: usize,
    pub average_performance: Option<f32>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_adaptation_at: Option<OffsetDateTime>,
    pub recent_trend: Option<TrendDirection>,
    pub parameters: BTreeMap<ParameterName, f32>,
}

pub struct DecisionAgent<S: StateStore> {
    config: AgentConfig,
    store: S,
    log: ExperienceLog,
    params: ParameterSet,
}

impl<S: StateStore> DecisionAgent<S> {
    /// Builds an agent over the given backend, restoring persisted state.
    /// Missing or unreadable snapshots fall back to defaults with a
    /// warning.
    pub fn new(store: S, config: AgentConfig) -> Self {
        let log = match store.load_experience_log() {
            Ok(Some(snapshot)) => ExperienceLog::from_parts(snapshot.experiences, snapshot.insights),
            Ok(None) => ExperienceLog::new(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to load experience log, starting empty");
                ExperienceLog::new()
            }
        };

        let parameters = match store.load_parameter_set() {
            Ok(Some(snapshot)) => Some(snapshot.parameters),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load parameters, using defaults");
                None
            }
        };
        let history = match store.load_adaptation_history() {
            Ok(Some(snapshot)) => Some(snapshot.history),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load adaptation history, starting empty");
                None
            }
        };
        let params = match parameters {
            Some(parameters) => {
                ParameterSet::from_parts(parameters, history.unwrap_or_default())
            }
            None => ParameterSet::defaults(),
        };

        Self {
            config,
            store,
            log,
            params,
        }
    }

    /// Runs the full decision pipeline for one request: analyze, generate
    /// and select a strategy, record the projected outcome as an
    /// experience, then forecast and plan.
    ///
    /// # Errors
    /// Returns [`AgentError::Validation`] for a malformed context payload
    /// and [`AgentError::NoViableOptions`] when no strategy survives the
    /// exclusion rules.
    pub fn process_request(&mut self, context_value: &Value) -> Result<AgentResponse, AgentError> {
        let started = Instant::now();
        let context = RequestContext::from_value(context_value)?;
        let now = now_utc();

        let analysis = analyze_situation(&context);
        let options = generate_options(
            &analysis,
            &context,
            &self.log,
            self.config.similarity_threshold,
            self.config.max_similar_results,
        );
        let result = evaluate_and_select(
            options,
            &analysis,
            &context,
            &self.log,
            self.config.similarity_threshold,
            self.config.max_similar_results,
        )?;

        // Effective decision parameters: controller snapshot with the
        // strategy's overrides layered on top. Correlation analysis later
        // reads the controller values back out of these records.
        let mut parameters: BTreeMap<String, f32> = self
            .params
            .get_all()
            .into_iter()
            .map(|(name, value)| (name.as_str().to_string(), value))
            .collect();
        parameters.extend(result.selected.parameters.clone());

        let outcome = self.project_outcome(&context, &result);
        let decision = DecisionRecord {
            strategy: result.selected.strategy,
            parameters,
        };
        let experience_id = self.log.store(context, decision, outcome, None, now);
        self.persist_experience_log();

        let predictions = forecast::predict_trends(&self.log);
        let mut state = BTreeMap::new();
        let _ = state.insert(
            "accuracy".to_string(),
            result.predicted_outcome.estimated_accuracy,
        );
        let optimizations = forecast::suggest_optimizations(&self.log, &state);
        let action_plan = forecast::plan_actions(&self.config.goals, now);

        let insights: Vec<String> = self
            .log
            .all_insights()
            .iter()
            .map(|insight| insight.description.clone())
            .collect();
        let recommendations = analysis.recommendations.clone();

        let prediction_confidence =
            mean(&predictions.iter().map(|p| p.confidence).collect::<Vec<_>>()).unwrap_or(0.5);
        let optimization_confidence = mean(
            &optimizations
                .iter()
                .map(|s| s.confidence)
                .collect::<Vec<_>>(),
        )
        .unwrap_or(0.5);
        let confidence = clamp_unit(
            result.confidence * 0.5
                + prediction_confidence * 0.3
                + optimization_confidence * 0.2,
        );

        tracing::info!(
            experience = %experience_id,
            strategy = result.selected.strategy.as_str(),
            confidence,
            "processed request"
        );

        Ok(AgentResponse {
            decision: AgentDecision {
                experience_id,
                analysis,
                result,
            },
            predictions,
            optimizations,
            action_plan,
            insights,
            recommendations,
            confidence,
            elapsed_secs: started.elapsed().as_secs_f32(),
        })
    }

    /// Attaches observed feedback to a recorded experience and lets the
    /// parameter controller adapt, then persists all state.
    ///
    /// # Errors
    /// Returns [`AgentError::Validation`] for a malformed feedback payload
    /// or an unknown experience id.
    pub fn learn_from_feedback(
        &mut self,
        experience_id: &str,
        feedback_value: &Value,
    ) -> Result<Vec<AdaptationResult>, AgentError> {
        let feedback = FeedbackReport::from_value(feedback_value)?;
        let now = now_utc();

        self.log
            .learn_from_feedback(experience_id, feedback.clone(), now)?;
        let adaptations = self.params.update_from_feedback(&feedback, &self.log, now);

        self.persist_experience_log();
        self.persist_parameters();

        Ok(adaptations)
    }

    #[must_use]
    pub fn status(&self) -> AgentStatus {
        let now = now_utc();
        let stability = self.params.stability_report(now);
        let last_adaptation_at = self
            .params
            .history()
            .values()
            .flat_map(|records| records.iter().map(|record| record.recorded_at))
            .max();

        AgentStatus {
            total_experiences: self.log.len(),
            total_insights: self.log.all_insights().len(),
            total_adaptations: self
                .params
                .history()
                .values()
                .map(Vec::len)
                .sum(),
            stable_parameters: stability.stable_parameters,
            average_performance: mean(&self.log.scores()),
            last_adaptation_at,
            recent_trend: self
                .log
                .analyze_trend(30, now)
                .and_then(|report| report.direction),
            parameters: self.params.get_all(),
        }
    }

    #[must_use]
    pub fn analyze_trend(&self, window_days: u32) -> Option<TrendReport> {
        self.log.analyze_trend(window_days, now_utc())
    }

    #[must_use]
    pub fn forecast(&self, metric: TrendMetric, horizon_days: u32) -> PerformanceForecast {
        forecast::forecast_performance(&self.log, metric, horizon_days)
    }

    #[must_use]
    pub fn plan(&self) -> ActionPlan {
        forecast::plan_actions(&self.config.goals, now_utc())
    }

    #[must_use]
    pub fn optimization_proposals(&self) -> Vec<OptimizationProposal> {
        self.params.suggest_optimization(&self.log)
    }

    #[must_use]
    pub fn stability_report(&self) -> StabilityReport {
        self.params.stability_report(now_utc())
    }

    #[must_use]
    pub fn experience_log(&self) -> &ExperienceLog {
        &self.log
    }

    #[must_use]
    pub fn parameter_set(&self) -> &ParameterSet {
        &self.params
    }

    /// Projects the decision's predicted outcome into a recordable outcome,
    /// scaled by the current parameter values relative to their defaults.
    fn project_outcome(&self, context: &RequestContext, result: &DecisionResult) -> OutcomeRecord {
        let vacation_factor = self
            .params
            .get(ParameterName::VacationBenefitFactor)
            .unwrap_or(3.5);
        let company_share = self
            .params
            .get(ParameterName::CompanyCostPercentage)
            .unwrap_or(0.8);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let processing_time_secs =
            Some(result.predicted_outcome.estimated_time_secs.max(0.0) as u32);

        OutcomeRecord {
            accuracy: Some(result.predicted_outcome.estimated_accuracy),
            total_value: Some(context.calculated_value * (vacation_factor / 3.5)),
            target_value: Some(context.calculated_value),
            employee_count: Some(context.employee_count),
            processing_time_secs,
            cost: Some(result.predicted_outcome.estimated_cost * (company_share / 0.8)),
            risk_level: Some(result.predicted_outcome.risk_category),
            extra: serde_json::Map::new(),
        }
    }

    fn persist_experience_log(&self) {
        let snapshot = ExperienceLogSnapshot {
            experiences: self.log.experiences().to_vec(),
            insights: self.log.all_insights().to_vec(),
        };
        if let Err(err) = self.store.save_experience_log(&snapshot) {
            tracing::warn!(error = %err, "failed to persist experience log");
        }
    }

    fn persist_parameters(&self) {
        let parameters = ParameterSetSnapshot {
            parameters: self.params.parameters().clone(),
        };
        if let Err(err) = self.store.save_parameter_set(&parameters) {
            tracing::warn!(error = %err, "failed to persist parameters");
        }

        let history = AdaptationHistorySnapshot {
            history: self.params.history().clone(),
        };
        if let Err(err) = self.store.save_adaptation_history(&history) {
            tracing::warn!(error = %err, "failed to persist adaptation history");
        }
    }
}
