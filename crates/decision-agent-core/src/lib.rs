//! Experience-driven decision agent core.
//!
//! Given a description of the current situation the agent retrieves similar
//! past situations, generates candidate strategies, scores and selects one,
//! records the outcome, and on later feedback nudges a set of bounded
//! tunable parameters. Historical performance is extrapolated into
//! short-term forecasts, optimization suggestions, and action plans.
//!
//! Components, leaves first:
//! - [`experience::ExperienceLog`]: durable log of past (context, decision,
//!   outcome, feedback) records with similarity retrieval and insights.
//! - [`params::ParameterSet`]: bounded, named tunable values adapted from
//!   feedback under rate-limit and stability gates.
//! - [`reasoning`]: situation analysis, option generation, selection.
//! - [`forecast`]: trend fitting, optimization suggestions, action plans.
//! - [`agent::DecisionAgent`]: the orchestrating entry point, owning the
//!   [`store::StateStore`] handle that persists full snapshots.

pub mod agent;
pub mod context;
pub mod experience;
pub mod forecast;
pub mod params;
pub mod reasoning;
pub mod similarity;
pub mod store;
pub mod trend;

use time::{Duration, OffsetDateTime, UtcOffset};

pub use agent::{AgentConfig, AgentDecision, AgentResponse, AgentStatus, DecisionAgent, Goals};
pub use context::{FeedbackReport, ImpactFactor, RequestContext, TimeConstraint};
pub use experience::{Experience, ExperienceLog, Insight, InsightKind, TrendReport};
pub use forecast::{
    ActionPlan, ActionPriority, ForecastTrend, OptimizationSuggestion, PerformanceForecast,
    PlannedAction, TrendMetric, TrendPrediction,
};
pub use params::{
    AdaptationRecord, AdaptationResult, Correlation, CorrelationDirection, OptimizationProposal,
    Parameter, ParameterName, ParameterSet, StabilityDetail, StabilityReport,
};
pub use reasoning::{
    AnalysisResult, DecisionOption, DecisionRecord, DecisionResult, PredictedOutcome, RiskLevel,
    SituationKind, Strategy,
};
pub use store::{
    AdaptationHistorySnapshot, ExperienceLogSnapshot, InMemoryStateStore, ParameterSetSnapshot,
    StateStore,
};
pub use trend::{LinearFit, TrendDirection};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum AgentError {
    #[error("validation error: {0}")]
    Validation(String),
    /// The caller asked for a selection over an empty candidate list. This
    /// is programmer error, not a data-sparsity condition.
    #[error("no viable decision options were supplied")]
    NoViableOptions,
    #[error("storage error: {0}")]
    Storage(String),
}

#[must_use]
pub fn clamp_unit(value: f32) -> f32 {
    value.min(1.0).max(0.0)
}

#[must_use]
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.min(max).max(min)
}

/// Parses an RFC3339 timestamp and requires UTC (`Z`) offset.
///
/// # Errors
/// Returns [`AgentError::Validation`] when parsing fails or the input
/// timestamp is not UTC.
pub fn parse_rfc3339_utc(value: &str) -> Result<OffsetDateTime, AgentError> {
    let parsed = OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .map_err(|err| AgentError::Validation(format!("invalid RFC3339 timestamp: {err}")))?;

    if parsed.offset() != UtcOffset::UTC {
        return Err(AgentError::Validation(
            "timestamp MUST use UTC offset Z".to_string(),
        ));
    }

    Ok(parsed)
}

/// Formats a timestamp as RFC3339 after normalizing to UTC.
///
/// # Errors
/// Returns [`AgentError::Validation`] when formatting fails.
pub fn format_rfc3339(value: OffsetDateTime) -> Result<String, AgentError> {
    value
        .to_offset(UtcOffset::UTC)
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|err| AgentError::Validation(format!("failed to format RFC3339 timestamp: {err}")))
}

#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(UtcOffset::UTC)
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn days_since(earlier: OffsetDateTime, later: OffsetDateTime) -> f32 {
    if later <= earlier {
        return 0.0;
    }

    let elapsed = later - earlier;
    elapsed.whole_seconds() as f32 / Duration::DAY.whole_seconds() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn must_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    #[test]
    fn clamp_unit_bounds_both_sides() {
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(-0.3), 0.0);
        assert_eq!(clamp_unit(0.42), 0.42);
    }

    #[test]
    fn rfc3339_round_trip_stays_utc() {
        let parsed = must_ok(parse_rfc3339_utc("2026-08-25T09:30:00Z"));
        let formatted = must_ok(format_rfc3339(parsed));
        assert_eq!(formatted, "2026-08-25T09:30:00Z");
    }

    #[test]
    fn non_utc_timestamp_is_rejected() {
        assert!(parse_rfc3339_utc("2026-08-25T09:30:00+02:00").is_err());
    }

    #[test]
    fn days_since_is_zero_for_reversed_order() {
        let earlier = must_ok(parse_rfc3339_utc("2026-08-20T00:00:00Z"));
        let later = must_ok(parse_rfc3339_utc("2026-08-22T12:00:00Z"));
        assert_eq!(days_since(later, earlier), 0.0);
        assert!((days_since(earlier, later) - 2.5).abs() < 1e-6);
    }
}
