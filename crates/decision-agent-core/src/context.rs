//! Typed boundary records for the loosely structured context and feedback
//! payloads collaborators supply, validated once at the boundary. Unknown
//! keys survive in a catch-all extension map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::AgentError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeConstraint {
    #[default]
    Normal,
    Urgent,
}

impl TimeConstraint {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Urgent => "urgent",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "normal" => Some(Self::Normal),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Feedback signals a tunable parameter declares sensitivity to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum ImpactFactor {
    CostOptimization,
    EmployeeSatisfaction,
    Compliance,
    BusinessRules,
    RiskMitigation,
    Efficiency,
}

impl ImpactFactor {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CostOptimization => "cost_optimization",
            Self::EmployeeSatisfaction => "employee_satisfaction",
            Self::Compliance => "compliance",
            Self::BusinessRules => "business_rules",
            Self::RiskMitigation => "risk_mitigation",
            Self::Efficiency => "efficiency",
        }
    }
}

/// Structured description of the decision situation supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RequestContext {
    pub employee_count: u32,
    pub data_quality_score: f32,
    pub budget_limit: f32,
    pub time_constraint: TimeConstraint,
    pub compliance_required: bool,
    pub business_rules: Map<String, Value>,
    pub rule_conflicts: Vec<String>,
    pub historical_data_available: bool,
    pub flexible_parameters: bool,
    /// Benefit value precomputed by the upstream calculation collaborator.
    pub calculated_value: f32,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl RequestContext {
    /// Decodes and validates a context payload from JSON.
    ///
    /// Unrecognized keys are preserved in [`RequestContext::extra`].
    ///
    /// # Errors
    /// Returns [`AgentError::Validation`] when the payload is not an object
    /// or a recognized field has the wrong shape or range.
    pub fn from_value(value: &Value) -> Result<Self, AgentError> {
        let object = value
            .as_object()
            .ok_or_else(|| AgentError::Validation("context MUST be a JSON object".to_string()))?;

        let mut context = Self {
            data_quality_score: 1.0,
            ..Self::default()
        };

        for (key, entry) in object {
            match key.as_str() {
                "employee_count" => context.employee_count = parse_count(key, entry)?,
                "data_quality_score" => {
                    context.data_quality_score = parse_unit_fraction(key, entry)?;
                }
                "budget_limit" => context.budget_limit = parse_non_negative(key, entry)?,
                "time_constraint" => {
                    let raw = entry.as_str().ok_or_else(|| {
                        AgentError::Validation("time_constraint MUST be a string".to_string())
                    })?;
                    context.time_constraint = TimeConstraint::parse(raw).ok_or_else(|| {
                        AgentError::Validation(format!("unknown time_constraint: {raw}"))
                    })?;
                }
                "compliance_required" => context.compliance_required = parse_bool(key, entry)?,
                "business_rules" => {
                    context.business_rules = entry
                        .as_object()
                        .ok_or_else(|| {
                            AgentError::Validation("business_rules MUST be an object".to_string())
                        })?
                        .clone();
                }
                "rule_conflicts" => {
                    let items = entry.as_array().ok_or_else(|| {
                        AgentError::Validation("rule_conflicts MUST be an array".to_string())
                    })?;
                    context.rule_conflicts = items
                        .iter()
                        .map(|item| {
                            item.as_str().map(str::to_string).ok_or_else(|| {
                                AgentError::Validation(
                                    "rule_conflicts entries MUST be strings".to_string(),
                                )
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                }
                "historical_data_available" => {
                    context.historical_data_available = parse_bool(key, entry)?;
                }
                "flexible_parameters" => context.flexible_parameters = parse_bool(key, entry)?,
                "calculated_value" => context.calculated_value = parse_non_negative(key, entry)?,
                _ => {
                    let _ = context.extra.insert(key.clone(), entry.clone());
                }
            }
        }

        Ok(context)
    }

    /// Deterministic, order-independent identifier for this context.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        fingerprint_value(&value)
    }

    /// Flattens the context into whitespace-separated `key: value` terms for
    /// similarity encoding. Nested maps embed as JSON, lists as item counts.
    #[must_use]
    pub fn to_terms(&self) -> String {
        let mut parts = vec![
            format!("employee_count: {}", self.employee_count),
            format!("data_quality_score: {}", self.data_quality_score),
            format!("budget_limit: {}", self.budget_limit),
            format!("time_constraint: {}", self.time_constraint.as_str()),
            format!("compliance_required: {}", self.compliance_required),
            format!("calculated_value: {}", self.calculated_value),
        ];

        if !self.business_rules.is_empty() {
            parts.push(format!(
                "business_rules: {}",
                Value::Object(self.business_rules.clone())
            ));
        }
        if !self.rule_conflicts.is_empty() {
            parts.push(format!("rule_conflicts: {} items", self.rule_conflicts.len()));
        }
        for (key, value) in &self.extra {
            match value {
                Value::String(text) => parts.push(format!("{key}: {text}")),
                Value::Number(number) => parts.push(format!("{key}: {number}")),
                Value::Bool(flag) => parts.push(format!("{key}: {flag}")),
                Value::Object(_) => parts.push(format!("{key}: {value}")),
                Value::Array(items) => parts.push(format!("{key}: {} items", items.len())),
                Value::Null => {}
            }
        }

        parts.join(" ")
    }
}

/// Feedback a caller reports after observing a decision's real outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FeedbackReport {
    /// Overall calculation accuracy, reported under `performance.accuracy`.
    pub accuracy: Option<f32>,
    pub satisfaction: Option<f32>,
    pub cost_optimization: Option<f32>,
    pub employee_satisfaction: Option<f32>,
    pub quality_rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl FeedbackReport {
    /// Decodes and validates a feedback payload from JSON. Accuracy is read
    /// from the nested `performance` envelope the collaborators emit.
    ///
    /// # Errors
    /// Returns [`AgentError::Validation`] when the payload is not an object
    /// or a recognized metric is outside [0, 1].
    pub fn from_value(value: &Value) -> Result<Self, AgentError> {
        let object = value
            .as_object()
            .ok_or_else(|| AgentError::Validation("feedback MUST be a JSON object".to_string()))?;

        let mut feedback = Self::default();

        for (key, entry) in object {
            match key.as_str() {
                "performance" => {
                    let performance = entry.as_object().ok_or_else(|| {
                        AgentError::Validation("performance MUST be an object".to_string())
                    })?;
                    if let Some(accuracy) = performance.get("accuracy") {
                        feedback.accuracy = Some(parse_unit_fraction("accuracy", accuracy)?);
                    }
                }
                "satisfaction" => feedback.satisfaction = Some(parse_unit_fraction(key, entry)?),
                "cost_optimization" => {
                    feedback.cost_optimization = Some(parse_unit_fraction(key, entry)?);
                }
                "employee_satisfaction" => {
                    feedback.employee_satisfaction = Some(parse_unit_fraction(key, entry)?);
                }
                "quality_rating" => {
                    feedback.quality_rating = Some(parse_unit_fraction(key, entry)?);
                }
                _ => {
                    let _ = feedback.extra.insert(key.clone(), entry.clone());
                }
            }
        }

        Ok(feedback)
    }

    /// True when the feedback carries a generic performance signal.
    #[must_use]
    pub fn has_performance_signal(&self) -> bool {
        self.accuracy.is_some()
    }

    /// True when the feedback touches the given impact factor.
    #[must_use]
    pub fn references(&self, factor: ImpactFactor) -> bool {
        match factor {
            ImpactFactor::CostOptimization => self.cost_optimization.is_some(),
            ImpactFactor::EmployeeSatisfaction => self.employee_satisfaction.is_some(),
            _ => self.extra.contains_key(factor.as_str()),
        }
    }
}

/// Hashes the canonical (key-sorted) rendering of a JSON value with FNV-1a.
/// Stable across processes, unlike the platform-randomized hashers.
#[must_use]
pub fn fingerprint_value(value: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical);

    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in canonical.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }

    format!("{hash:016x}")
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (index, key) in keys.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).unwrap_or_default());
                out.push(':');
                if let Some(entry) = map.get(*key) {
                    write_canonical(entry, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn parse_count(key: &str, value: &Value) -> Result<u32, AgentError> {
    let raw = value
        .as_u64()
        .ok_or_else(|| AgentError::Validation(format!("{key} MUST be a non-negative integer")))?;
    u32::try_from(raw)
        .map_err(|_| AgentError::Validation(format!("{key} exceeds the supported range")))
}

#[allow(clippy::cast_possible_truncation)]
fn parse_unit_fraction(key: &str, value: &Value) -> Result<f32, AgentError> {
    let raw = value
        .as_f64()
        .ok_or_else(|| AgentError::Validation(format!("{key} MUST be a number")))?;
    if !(0.0..=1.0).contains(&raw) {
        return Err(AgentError::Validation(format!(
            "{key} MUST be in [0.0, 1.0]"
        )));
    }
    Ok(raw as f32)
}

#[allow(clippy::cast_possible_truncation)]
fn parse_non_negative(key: &str, value: &Value) -> Result<f32, AgentError> {
    let raw = value
        .as_f64()
        .ok_or_else(|| AgentError::Validation(format!("{key} MUST be a number")))?;
    if raw < 0.0 {
        return Err(AgentError::Validation(format!("{key} MUST be >= 0")));
    }
    Ok(raw as f32)
}

fn parse_bool(key: &str, value: &Value) -> Result<bool, AgentError> {
    value
        .as_bool()
        .ok_or_else(|| AgentError::Validation(format!("{key} MUST be a boolean")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn must_ok<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok(..), got error: {err}"),
        }
    }

    #[test]
    fn context_decodes_recognized_fields_and_keeps_extras() {
        let context = must_ok(RequestContext::from_value(&json!({
            "employee_count": 1792,
            "data_quality_score": 0.95,
            "time_constraint": "urgent",
            "region": "south"
        })));

        assert_eq!(context.employee_count, 1792);
        assert_eq!(context.time_constraint, TimeConstraint::Urgent);
        assert_eq!(context.extra.get("region"), Some(&json!("south")));
    }

    #[test]
    fn context_rejects_out_of_range_quality() {
        let result = RequestContext::from_value(&json!({ "data_quality_score": 1.4 }));
        assert!(result.is_err());
    }

    #[test]
    fn fingerprint_is_insertion_order_independent() {
        let first = must_ok(RequestContext::from_value(&json!({
            "employee_count": 100,
            "alpha": 1,
            "beta": 2
        })));
        let second = must_ok(RequestContext::from_value(&json!({
            "beta": 2,
            "employee_count": 100,
            "alpha": 1
        })));

        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn fingerprint_differs_on_value_change() {
        let first = must_ok(RequestContext::from_value(&json!({ "employee_count": 100 })));
        let second = must_ok(RequestContext::from_value(&json!({ "employee_count": 101 })));
        assert_ne!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn feedback_reads_nested_performance_accuracy() {
        let feedback = must_ok(FeedbackReport::from_value(&json!({
            "performance": { "accuracy": 0.85 },
            "compliance": 0.4
        })));

        assert_eq!(feedback.accuracy, Some(0.85));
        assert!(feedback.has_performance_signal());
        assert!(feedback.references(ImpactFactor::Compliance));
        assert!(!feedback.references(ImpactFactor::CostOptimization));
    }

    #[test]
    fn terms_include_scalars_and_collection_sizes() {
        let context = must_ok(RequestContext::from_value(&json!({
            "employee_count": 12,
            "rule_conflicts": ["a", "b"],
            "notes": ["x", "y", "z"]
        })));

        let terms = context.to_terms();
        assert!(terms.contains("employee_count: 12"));
        assert!(terms.contains("rule_conflicts: 2 items"));
        assert!(terms.contains("notes: 3 items"));
    }
}
