//! Append-only log of past decisions and their observed outcomes, with
//! similarity retrieval and opportunistic insight extraction.
//!
//! Records are never deleted within a process lifetime; the only in-place
//! mutation is the feedback-triggered performance score recomputation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};
use ulid::Ulid;

use crate::context::{FeedbackReport, RequestContext};
use crate::reasoning::{DecisionRecord, RiskLevel};
use crate::trend::{linear_fit, mean, std_dev, TrendDirection};
use crate::{clamp_unit, AgentError};

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;
pub const DEFAULT_MAX_RESULTS: usize = 10;

const HIGH_PERFORMANCE_SCORE: f32 = 0.9;
const LOW_SATISFACTION_SCORE: f32 = 0.5;

/// Result metrics reported by the (external) execution of a decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OutcomeRecord {
    pub accuracy: Option<f32>,
    pub total_value: Option<f32>,
    pub target_value: Option<f32>,
    pub employee_count: Option<u32>,
    pub processing_time_secs: Option<u32>,
    pub cost: Option<f32>,
    pub risk_level: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// A recorded (context, decision, outcome[, feedback]) tuple with its
/// derived performance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experience {
    pub id: Ulid,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
    pub fingerprint: String,
    pub context: RequestContext,
    pub decision: DecisionRecord,
    pub outcome: OutcomeRecord,
    pub performance_score: f32,
    pub feedback: Option<FeedbackReport>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    HighPerformance,
    LowSatisfaction,
}

impl InsightKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HighPerformance => "high_performance",
            Self::LowSatisfaction => "low_satisfaction",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "high_performance" => Some(Self::HighPerformance),
            "low_satisfaction" => Some(Self::LowSatisfaction),
            _ => None,
        }
    }
}

/// Observation emitted when an experience or feedback crosses a
/// significance threshold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Insight {
    pub kind: InsightKind,
    pub description: String,
    pub confidence: f32,
    pub evidence_count: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    pub parameters_affected: Vec<String>,
}

/// A retrieval hit: an experience and its similarity to the query context.
#[derive(Debug, Clone, Copy)]
pub struct SimilarExperience<'a> {
    pub similarity: f32,
    pub experience: &'a Experience,
}

/// Windowed performance summary over recent experiences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendReport {
    pub period_days: u32,
    pub total_experiences: usize,
    pub average_performance: f32,
    pub performance_std: f32,
    pub direction: Option<TrendDirection>,
    pub best_performance: f32,
    pub worst_performance: f32,
    pub improvement_rate: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ExperienceLog {
    experiences: Vec<Experience>,
    insights: Vec<Insight>,
}

impl ExperienceLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_parts(experiences: Vec<Experience>, insights: Vec<Insight>) -> Self {
        Self {
            experiences,
            insights,
        }
    }

    #[must_use]
    pub fn experiences(&self) -> &[Experience] {
        &self.experiences
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.experiences.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiences.is_empty()
    }

    /// Performance scores in insertion order, the series the forecaster
    /// fits its trend lines over.
    #[must_use]
    pub fn scores(&self) -> Vec<f32> {
        self.experiences
            .iter()
            .map(|exp| exp.performance_score)
            .collect()
    }

    /// Appends an experience and returns its fingerprint id. Storing the
    /// same context twice yields two distinct entries under one
    /// fingerprint.
    pub fn store(
        &mut self,
        context: RequestContext,
        decision: DecisionRecord,
        outcome: OutcomeRecord,
        feedback: Option<FeedbackReport>,
        now: OffsetDateTime,
    ) -> String {
        let fingerprint = context.fingerprint();
        let performance_score = performance_score(&outcome, feedback.as_ref());
        let tags = derive_tags(&context, &decision, &outcome);

        let experience = Experience {
            id: Ulid::new(),
            recorded_at: now,
            fingerprint: fingerprint.clone(),
            context,
            decision,
            outcome,
            performance_score,
            feedback,
            tags,
        };

        if performance_score > HIGH_PERFORMANCE_SCORE {
            self.insights.push(Insight {
                kind: InsightKind::HighPerformance,
                description: format!(
                    "High performance achieved with {} strategy",
                    experience.decision.strategy.as_str()
                ),
                confidence: 0.8,
                evidence_count: 1,
                last_updated: now,
                parameters_affected: experience.decision.parameters.keys().cloned().collect(),
            });
        }

        tracing::debug!(
            fingerprint = %fingerprint,
            score = performance_score,
            "stored experience"
        );

        self.experiences.push(experience);
        fingerprint
    }

    /// Ranks stored experiences by similarity to the query context. The
    /// vocabulary is rebuilt against the current corpus on every call.
    /// Entries below the threshold are dropped; ties in similarity break
    /// on performance score. An empty log yields an empty list.
    #[must_use]
    pub fn retrieve_similar(
        &self,
        context: &RequestContext,
        threshold: f32,
        max_results: usize,
    ) -> Vec<SimilarExperience<'_>> {
        if self.experiences.is_empty() {
            return Vec::new();
        }

        let corpus: Vec<String> = self
            .experiences
            .iter()
            .map(|exp| exp.context.to_terms())
            .collect();
        let scores = crate::similarity::similarity_scores(&corpus, &context.to_terms());

        let mut hits: Vec<SimilarExperience<'_>> = scores
            .iter()
            .zip(&self.experiences)
            .filter(|(similarity, _)| **similarity >= threshold)
            .map(|(&similarity, experience)| SimilarExperience {
                similarity,
                experience,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.experience
                        .performance_score
                        .partial_cmp(&a.experience.performance_score)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });
        hits.truncate(max_results);
        hits
    }

    /// Merges feedback into the identified experience and recomputes its
    /// performance score in place.
    ///
    /// # Errors
    /// Returns [`AgentError::Validation`] when no experience carries the
    /// given fingerprint.
    pub fn learn_from_feedback(
        &mut self,
        experience_id: &str,
        feedback: FeedbackReport,
        now: OffsetDateTime,
    ) -> Result<(), AgentError> {
        let experience = self
            .experiences
            .iter_mut()
            .find(|exp| exp.fingerprint == experience_id)
            .ok_or_else(|| {
                AgentError::Validation(format!("experience {experience_id} not found"))
            })?;

        experience.performance_score = performance_score(&experience.outcome, Some(&feedback));
        let low_satisfaction = feedback
            .satisfaction
            .is_some_and(|value| value < LOW_SATISFACTION_SCORE);
        let strategy = experience.decision.strategy;
        let parameters: Vec<String> = experience.decision.parameters.keys().cloned().collect();
        experience.feedback = Some(feedback);

        if low_satisfaction {
            self.insights.push(Insight {
                kind: InsightKind::LowSatisfaction,
                description: format!(
                    "Low satisfaction reported for {} strategy",
                    strategy.as_str()
                ),
                confidence: 0.7,
                evidence_count: 1,
                last_updated: now,
                parameters_affected: parameters,
            });
        }

        Ok(())
    }

    #[must_use]
    pub fn insights(&self, kind: Option<InsightKind>) -> Vec<&Insight> {
        self.insights
            .iter()
            .filter(|insight| kind.map_or(true, |wanted| insight.kind == wanted))
            .collect()
    }

    #[must_use]
    pub fn all_insights(&self) -> &[Insight] {
        &self.insights
    }

    /// Summarizes performance over the trailing window. `None` when the
    /// window holds no experiences; that is data sparsity, not an error.
    #[must_use]
    pub fn analyze_trend(&self, window_days: u32, now: OffsetDateTime) -> Option<TrendReport> {
        let cutoff = now - Duration::days(i64::from(window_days));
        let mut recent: Vec<&Experience> = self
            .experiences
            .iter()
            .filter(|exp| exp.recorded_at >= cutoff)
            .collect();
        recent.sort_by_key(|exp| exp.recorded_at);

        let scores: Vec<f32> = recent.iter().map(|exp| exp.performance_score).collect();
        let average = mean(&scores)?;

        Some(TrendReport {
            period_days: window_days,
            total_experiences: scores.len(),
            average_performance: average,
            performance_std: std_dev(&scores).unwrap_or(0.0),
            direction: linear_fit(&scores).map(|fit| fit.direction()),
            best_performance: scores.iter().copied().fold(f32::MIN, f32::max),
            worst_performance: scores.iter().copied().fold(f32::MAX, f32::min),
            improvement_rate: improvement_rate(&scores),
        })
    }

    /// Mean parameter values across high-performing experiences, reported
    /// only where at least three samples back the estimate.
    #[must_use]
    pub fn suggest_parameter_targets(&self) -> BTreeMap<String, f32> {
        let mut samples: BTreeMap<String, Vec<f32>> = BTreeMap::new();
        for experience in &self.experiences {
            if experience.performance_score <= 0.8 {
                continue;
            }
            for (name, value) in &experience.decision.parameters {
                samples.entry(name.clone()).or_default().push(*value);
            }
        }

        samples
            .into_iter()
            .filter_map(|(name, values)| {
                if values.len() >= 3 {
                    mean(&values).map(|target| (name, target))
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Weighted outcome/feedback score, always clamped to [0, 1].
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn performance_score(outcome: &OutcomeRecord, feedback: Option<&FeedbackReport>) -> f32 {
    let mut score = 0.0_f32;

    if let Some(accuracy) = outcome.accuracy {
        score += accuracy * 0.4;
    }

    if let (Some(total), Some(target)) = (outcome.total_value, outcome.target_value) {
        if target > 0.0 {
            score += (total / target).min(1.0) * 0.3;
        }
    }

    if let Some(count) = outcome.employee_count {
        // Scale bonus, capped so volume alone cannot dominate the score.
        score += (count as f32 / 10_000.0).min(0.1);
    }

    if let Some(feedback) = feedback {
        if let Some(satisfaction) = feedback.satisfaction {
            score += satisfaction * 0.2;
        }
        if let Some(quality) = feedback.quality_rating {
            score += quality * 0.1;
        }
    }

    clamp_unit(score)
}

fn derive_tags(
    context: &RequestContext,
    decision: &DecisionRecord,
    outcome: &OutcomeRecord,
) -> Vec<String> {
    let mut tags = Vec::new();

    if context.employee_count > 1000 {
        tags.push("large_scale".to_string());
    } else if context.employee_count > 500 {
        tags.push("medium_scale".to_string());
    } else {
        tags.push("small_scale".to_string());
    }

    tags.push(format!("strategy_{}", decision.strategy.as_str()));

    if let Some(accuracy) = outcome.accuracy {
        if accuracy > 0.95 {
            tags.push("high_accuracy".to_string());
        } else if accuracy > 0.90 {
            tags.push("medium_accuracy".to_string());
        } else {
            tags.push("low_accuracy".to_string());
        }
    }

    tags
}

fn improvement_rate(ordered_scores: &[f32]) -> f32 {
    if ordered_scores.len() < 2 {
        return 0.0;
    }

    let midpoint = ordered_scores.len() / 2;
    let first = mean(&ordered_scores[..midpoint]).unwrap_or(0.0);
    let second = mean(&ordered_scores[midpoint..]).unwrap_or(0.0);

    if first > 0.0 {
        (second - first) / first
    } else {
        0.0
    }
}
