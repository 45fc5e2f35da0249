//! Raw judge verdicts: wire schema, parsing, and range validation.
//!
//! A [`RawVerdict`] still speaks in positional labels (A/B). It lives only
//! between acquisition and label mapping and is deliberately not serializable.

use serde::Deserialize;
use serde_json::{json, Value};

// =============================================================================
// Constants
// =============================================================================

pub const CRITERION_SCORE_MIN: f64 = 60.0;
pub const CRITERION_SCORE_MAX: f64 = 95.0;
pub const CONFIDENCE_MIN: f64 = 50.0;
pub const CONFIDENCE_MAX: f64 = 100.0;
pub const MIN_REASONING_CHARS: usize = 50;
pub const MAX_ADVANTAGES: usize = 3;

/// Name of the single synthetic criterion used by heuristic verdicts.
pub const FALLBACK_CRITERION: &str = "fallback";

/// Schema name sent with structured-output requests.
pub const VERDICT_SCHEMA_NAME: &str = "structured_judgment";

// =============================================================================
// Criteria
// =============================================================================

/// The five fixed evaluation criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Criterion {
    AccuracyCompleteness,
    StructuredDataUtilization,
    PrecisionSpecificity,
    LogicalFlowOrganization,
    ContextualUnderstanding,
}

impl Criterion {
    pub const ALL: [Criterion; 5] = [
        Criterion::AccuracyCompleteness,
        Criterion::StructuredDataUtilization,
        Criterion::PrecisionSpecificity,
        Criterion::LogicalFlowOrganization,
        Criterion::ContextualUnderstanding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::AccuracyCompleteness => "accuracy_completeness",
            Criterion::StructuredDataUtilization => "structured_data_utilization",
            Criterion::PrecisionSpecificity => "precision_specificity",
            Criterion::LogicalFlowOrganization => "logical_flow_organization",
            Criterion::ContextualUnderstanding => "contextual_understanding",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Criterion::AccuracyCompleteness => {
                "How well the response addresses all aspects of the task"
            }
            Criterion::StructuredDataUtilization => {
                "Understanding of complex relationships and hierarchies"
            }
            Criterion::PrecisionSpecificity => "References to specific values and parameters",
            Criterion::LogicalFlowOrganization => "Organization and logical reasoning quality",
            Criterion::ContextualUnderstanding => "Awareness of interconnected contexts",
        }
    }
}

/// Validated per-criterion scores for one labeled side, each in `[60, 95]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CriterionScoreSet {
    pub accuracy_completeness: u8,
    pub structured_data_utilization: u8,
    pub precision_specificity: u8,
    pub logical_flow_organization: u8,
    pub contextual_understanding: u8,
}

impl CriterionScoreSet {
    pub fn get(&self, criterion: Criterion) -> u8 {
        match criterion {
            Criterion::AccuracyCompleteness => self.accuracy_completeness,
            Criterion::StructuredDataUtilization => self.structured_data_utilization,
            Criterion::PrecisionSpecificity => self.precision_specificity,
            Criterion::LogicalFlowOrganization => self.logical_flow_organization,
            Criterion::ContextualUnderstanding => self.contextual_understanding,
        }
    }

    /// Same score on every criterion.
    pub fn uniform(score: u8) -> Self {
        Self {
            accuracy_completeness: score,
            structured_data_utilization: score,
            precision_specificity: score,
            logical_flow_organization: score,
            contextual_understanding: score,
        }
    }
}

// =============================================================================
// Raw verdict
// =============================================================================

/// Positional winner as the judge sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawWinner {
    A,
    B,
    Tie,
}

impl RawWinner {
    pub const ALL: [RawWinner; 3] = [RawWinner::A, RawWinner::B, RawWinner::Tie];

    /// Exact schema literals only; `"tie"` or `" A"` are rejected.
    fn parse(raw: &str) -> Result<Self, VerdictError> {
        match raw {
            "A" => Ok(RawWinner::A),
            "B" => Ok(RawWinner::B),
            "TIE" => Ok(RawWinner::Tie),
            other => Err(VerdictError::InvalidWinner(other.to_string())),
        }
    }
}

/// Criterion scores carried by a verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum VerdictCriteria {
    /// The five fixed criteria for both labels.
    Standard {
        a: CriterionScoreSet,
        b: CriterionScoreSet,
    },
    /// Heuristic verdicts: one synthetic criterion holding the overall scores.
    Fallback,
}

/// A verdict in positional (A/B) terms.
#[derive(Debug, Clone, PartialEq)]
pub struct RawVerdict {
    pub winner: RawWinner,
    pub a_overall: f64,
    pub b_overall: f64,
    pub confidence: f64,
    pub reasoning: String,
    pub advantages: Vec<String>,
    pub criteria: VerdictCriteria,
}

// =============================================================================
// Parsing and validation
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VerdictError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid winner: {0:?}")]
    InvalidWinner(String),
    #[error("{field} out of range [{min}, {max}]: {value}")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{field} must be an integer: {value}")]
    NotInteger { field: String, value: f64 },
    #[error("reasoning too short: {0} chars (min {MIN_REASONING_CHARS})")]
    ReasoningTooShort(usize),
    #[error("too many advantages: {0} (max {MAX_ADVANTAGES})")]
    TooManyAdvantages(usize),
}

#[derive(Debug, Deserialize)]
struct CriterionScoresJson {
    accuracy_completeness: f64,
    structured_data_utilization: f64,
    precision_specificity: f64,
    logical_flow_organization: f64,
    contextual_understanding: f64,
}

#[derive(Debug, Deserialize)]
struct VerdictJson {
    winner: String,
    response_a_scores: CriterionScoresJson,
    response_b_scores: CriterionScoresJson,
    response_a_overall: f64,
    response_b_overall: f64,
    confidence: f64,
    reasoning: String,
    main_advantages: Vec<String>,
}

/// Parse and validate a judge reply.
///
/// Tolerates prose around the JSON object: each top-level `{...}` in the
/// reply is tried in order and the first one shaped like a verdict is used.
/// Every range and length constraint of the verdict schema is enforced here;
/// downstream code relies on it.
pub fn parse_verdict(raw: &str) -> Result<RawVerdict, VerdictError> {
    let parsed = deserialize_verdict(raw)?;

    let winner = RawWinner::parse(&parsed.winner)?;
    let a = validate_scores("response_a_scores", &parsed.response_a_scores)?;
    let b = validate_scores("response_b_scores", &parsed.response_b_scores)?;
    let a_overall = check_int_range(
        "response_a_overall",
        parsed.response_a_overall,
        CRITERION_SCORE_MIN,
        CRITERION_SCORE_MAX,
    )?;
    let b_overall = check_int_range(
        "response_b_overall",
        parsed.response_b_overall,
        CRITERION_SCORE_MIN,
        CRITERION_SCORE_MAX,
    )?;
    let confidence = check_int_range(
        "confidence",
        parsed.confidence,
        CONFIDENCE_MIN,
        CONFIDENCE_MAX,
    )?;

    let reasoning_chars = parsed.reasoning.chars().count();
    if reasoning_chars < MIN_REASONING_CHARS {
        return Err(VerdictError::ReasoningTooShort(reasoning_chars));
    }
    if parsed.main_advantages.len() > MAX_ADVANTAGES {
        return Err(VerdictError::TooManyAdvantages(
            parsed.main_advantages.len(),
        ));
    }

    Ok(RawVerdict {
        winner,
        a_overall,
        b_overall,
        confidence,
        reasoning: parsed.reasoning,
        advantages: parsed.main_advantages,
        criteria: VerdictCriteria::Standard { a, b },
    })
}

fn validate_scores(
    side: &str,
    scores: &CriterionScoresJson,
) -> Result<CriterionScoreSet, VerdictError> {
    let check = |name: &str, value: f64| -> Result<u8, VerdictError> {
        check_int_range(
            &format!("{side}.{name}"),
            value,
            CRITERION_SCORE_MIN,
            CRITERION_SCORE_MAX,
        )
        .map(|v| v as u8)
    };
    Ok(CriterionScoreSet {
        accuracy_completeness: check("accuracy_completeness", scores.accuracy_completeness)?,
        structured_data_utilization: check(
            "structured_data_utilization",
            scores.structured_data_utilization,
        )?,
        precision_specificity: check("precision_specificity", scores.precision_specificity)?,
        logical_flow_organization: check(
            "logical_flow_organization",
            scores.logical_flow_organization,
        )?,
        contextual_understanding: check(
            "contextual_understanding",
            scores.contextual_understanding,
        )?,
    })
}

fn check_int_range(field: &str, value: f64, min: f64, max: f64) -> Result<f64, VerdictError> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(VerdictError::NotInteger {
            field: field.to_string(),
            value,
        });
    }
    if !(min..=max).contains(&value) {
        return Err(VerdictError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(value)
}

fn deserialize_verdict(raw: &str) -> Result<VerdictJson, VerdictError> {
    let mut first_error = None;
    for candidate in json_objects(raw) {
        match serde_json::from_str::<VerdictJson>(candidate) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    let err = match first_error {
        Some(e) => e,
        None => match serde_json::from_str::<VerdictJson>(raw.trim()) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => e,
        },
    };
    Err(VerdictError::Parse(err.to_string()))
}

/// Top-level balanced `{...}` spans, in order of appearance.
///
/// Quotes only count inside an object, so prose between objects cannot
/// open a string.
fn json_objects(raw: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut start = 0usize;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in raw.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&raw[start..=i]);
                }
            }
            _ => {}
        }
    }
    spans
}

// =============================================================================
// Schema
// =============================================================================

/// JSON schema sent to the judge for structured output.
pub fn verdict_schema() -> Value {
    let mut criterion_props = serde_json::Map::new();
    for criterion in Criterion::ALL {
        criterion_props.insert(
            criterion.as_str().to_string(),
            json!({
                "type": "integer",
                "minimum": CRITERION_SCORE_MIN as i64,
                "maximum": CRITERION_SCORE_MAX as i64,
                "description": criterion.description(),
            }),
        );
    }
    let criterion_names: Vec<&str> = Criterion::ALL.iter().map(|c| c.as_str()).collect();
    let scores = json!({
        "type": "object",
        "properties": Value::Object(criterion_props),
        "required": criterion_names,
        "additionalProperties": false,
    });
    let overall = json!({
        "type": "integer",
        "minimum": CRITERION_SCORE_MIN as i64,
        "maximum": CRITERION_SCORE_MAX as i64,
    });

    json!({
        "type": "object",
        "properties": {
            "winner": {
                "type": "string",
                "enum": ["A", "B", "TIE"],
                "description": "Which response is better: A, B, or TIE",
            },
            "response_a_scores": scores.clone(),
            "response_b_scores": scores,
            "response_a_overall": overall.clone(),
            "response_b_overall": overall,
            "confidence": {
                "type": "integer",
                "minimum": CONFIDENCE_MIN as i64,
                "maximum": CONFIDENCE_MAX as i64,
                "description": "Confidence in this judgment (50-100)",
            },
            "reasoning": {
                "type": "string",
                "minLength": MIN_REASONING_CHARS,
                "description": "Detailed explanation of the judgment specific to this test case",
            },
            "main_advantages": {
                "type": "array",
                "items": { "type": "string" },
                "maxItems": MAX_ADVANTAGES,
                "description": "Top 2-3 specific advantages of the winning response",
            },
        },
        "required": [
            "winner",
            "response_a_scores",
            "response_b_scores",
            "response_a_overall",
            "response_b_overall",
            "confidence",
            "reasoning",
            "main_advantages",
        ],
        "additionalProperties": false,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const REASONING: &str =
        "Response B cites the exact thresholds from the data and follows the dependency order.";

    fn verdict_json(winner: &str, a_overall: f64, confidence: f64) -> String {
        json!({
            "winner": winner,
            "response_a_scores": {
                "accuracy_completeness": 70,
                "structured_data_utilization": 72,
                "precision_specificity": 68,
                "logical_flow_organization": 75,
                "contextual_understanding": 71
            },
            "response_b_scores": {
                "accuracy_completeness": 85,
                "structured_data_utilization": 88,
                "precision_specificity": 84,
                "logical_flow_organization": 86,
                "contextual_understanding": 83
            },
            "response_a_overall": a_overall,
            "response_b_overall": 86,
            "confidence": confidence,
            "reasoning": REASONING,
            "main_advantages": ["cites thresholds", "ordered steps"]
        })
        .to_string()
    }

    #[test]
    fn test_parse_valid_verdict() {
        let verdict = parse_verdict(&verdict_json("B", 71.0, 80.0)).unwrap();
        assert_eq!(verdict.winner, RawWinner::B);
        assert_eq!(verdict.a_overall, 71.0);
        assert_eq!(verdict.b_overall, 86.0);
        assert_eq!(verdict.confidence, 80.0);
        assert_eq!(verdict.advantages.len(), 2);
        match verdict.criteria {
            VerdictCriteria::Standard { a, b } => {
                assert_eq!(a.get(Criterion::PrecisionSpecificity), 68);
                assert_eq!(b.get(Criterion::StructuredDataUtilization), 88);
            }
            VerdictCriteria::Fallback => panic!("expected standard criteria"),
        }
    }

    #[test]
    fn test_parse_with_surrounding_text() {
        let raw = format!(
            "Here is my judgment:\n{}\nLet me know if you need more.",
            verdict_json("TIE", 80.0, 60.0)
        );
        let verdict = parse_verdict(&raw).unwrap();
        assert_eq!(verdict.winner, RawWinner::Tie);
    }

    #[test]
    fn test_winner_must_be_an_exact_literal() {
        for winner in ["tie", " TIE ", "a", "B "] {
            assert_eq!(
                parse_verdict(&verdict_json(winner, 80.0, 60.0)).unwrap_err(),
                VerdictError::InvalidWinner(winner.to_string()),
                "{winner:?}"
            );
        }
    }

    #[test]
    fn test_missing_advantages_is_rejected() {
        let mut value: Value = serde_json::from_str(&verdict_json("A", 80.0, 70.0)).unwrap();
        value.as_object_mut().unwrap().remove("main_advantages");
        assert!(matches!(
            parse_verdict(&value.to_string()).unwrap_err(),
            VerdictError::Parse(_)
        ));
    }

    #[test]
    fn test_skips_braced_prose_before_verdict() {
        let raw = format!(
            "I weighed {{latency}} first, then {{\"note\": 1}}.\n{}",
            verdict_json("B", 72.0, 75.0)
        );
        let verdict = parse_verdict(&raw).unwrap();
        assert_eq!(verdict.winner, RawWinner::B);
        assert_eq!(verdict.a_overall, 72.0);
    }

    #[test]
    fn test_braces_inside_strings_do_not_end_object() {
        let raw = verdict_json("A", 80.0, 60.0).replace(
            REASONING,
            "Response A uses {placeholders} correctly and closes every } in the config sample.",
        );
        assert!(parse_verdict(&raw).is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_overall() {
        let err = parse_verdict(&verdict_json("A", 97.0, 80.0)).unwrap_err();
        assert!(matches!(err, VerdictError::OutOfRange { ref field, .. } if field == "response_a_overall"));
    }

    #[test]
    fn test_rejects_low_confidence_and_fractional_scores() {
        assert!(matches!(
            parse_verdict(&verdict_json("A", 80.0, 40.0)).unwrap_err(),
            VerdictError::OutOfRange { .. }
        ));
        assert!(matches!(
            parse_verdict(&verdict_json("A", 80.5, 70.0)).unwrap_err(),
            VerdictError::NotInteger { .. }
        ));
    }

    #[test]
    fn test_rejects_short_reasoning() {
        let raw = verdict_json("A", 80.0, 70.0).replace(REASONING, "Too short.");
        assert_eq!(
            parse_verdict(&raw).unwrap_err(),
            VerdictError::ReasoningTooShort(10)
        );
    }

    #[test]
    fn test_rejects_too_many_advantages() {
        let raw = verdict_json("A", 80.0, 70.0).replace(
            r#"["cites thresholds","ordered steps"]"#,
            r#"["one","two","three","four"]"#,
        );
        assert_eq!(
            parse_verdict(&raw).unwrap_err(),
            VerdictError::TooManyAdvantages(4)
        );
    }

    #[test]
    fn test_rejects_unknown_winner_and_missing_fields() {
        assert!(matches!(
            parse_verdict(&verdict_json("C", 80.0, 70.0)).unwrap_err(),
            VerdictError::InvalidWinner(_)
        ));
        assert!(matches!(
            parse_verdict(r#"{"winner": "A"}"#).unwrap_err(),
            VerdictError::Parse(_)
        ));
        assert!(matches!(
            parse_verdict("no json here").unwrap_err(),
            VerdictError::Parse(_)
        ));
    }

    #[test]
    fn test_schema_lists_every_criterion() {
        let schema = verdict_schema();
        let required = schema["properties"]["response_a_scores"]["required"]
            .as_array()
            .unwrap();
        assert_eq!(required.len(), 5);
        assert_eq!(schema["properties"]["confidence"]["minimum"], 50);
        assert_eq!(schema["properties"]["main_advantages"]["maxItems"], 3);
    }
}
