//! Prompt templates for the responder and the judge.
//!
//! Provider-agnostic; the oracles turn a [`PromptInstance`] into chat messages.

use crate::gateway::Message;

// =============================================================================
// Prompt instances
// =============================================================================

/// Rendered prompt ready for an LLM.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptInstance {
    pub template_slug: String,
    pub system: String,
    pub user: String,
}

impl PromptInstance {
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }

    /// Stable content hash, used to correlate trace lines with prompts.
    pub fn content_hash(&self) -> String {
        blake3::hash(format!("{}\n{}", self.system, self.user).as_bytes())
            .to_hex()
            .to_string()
    }
}

/// Substitute `{name}` placeholders in a single pass.
///
/// Values are never rescanned, so a response that happens to contain
/// `{response_b}` is embedded verbatim.
fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

// =============================================================================
// Judge template
// =============================================================================

/// A pairwise judge template with placeholders.
#[derive(Debug, Clone, Copy)]
pub struct JudgeTemplate {
    pub slug: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

impl JudgeTemplate {
    /// Render with the responses already in A/B order. Labels are generic;
    /// nothing in the output names the format that produced a response.
    pub fn render(
        &self,
        scenario_id: &str,
        task: &str,
        rubric: &[String],
        response_a: &str,
        response_b: &str,
    ) -> PromptInstance {
        let factors = if rubric.is_empty() {
            "- (none specified)".to_string()
        } else {
            rubric
                .iter()
                .map(|factor| format!("- {}", factor.trim()))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let user = fill(
            self.user,
            &[
                ("scenario_id", scenario_id),
                ("task", task.trim()),
                ("factors", &factors),
                ("response_a", response_a.trim()),
                ("response_b", response_b.trim()),
            ],
        );

        PromptInstance {
            template_slug: self.slug.to_string(),
            system: self.system.trim().to_string(),
            user: user.trim().to_string(),
        }
    }
}

pub const JUDGE_PROMPT_V1: JudgeTemplate = JudgeTemplate {
    slug: "format_judge_v1",
    system: r#"You are an expert evaluator assessing AI response quality. Compare two responses to the same task and determine which demonstrates better understanding and utilization of the provided information. Judge only the content of the responses; their order carries no meaning."#,
    user: r#"EVALUATION CONTEXT: Test case "{scenario_id}"
TASK: {task}

KEY EVALUATION FACTORS:
{factors}

Response A:
{response_a}

Response B:
{response_b}

EVALUATION CRITERIA:
Score both responses on each criterion (60-95 scale):

1. **Accuracy & Completeness**: How well each addresses all aspects of the task
2. **Structured Data Utilization**: How well each demonstrates understanding of complex relationships
3. **Precision & Specificity**: Which references specific values/parameters more effectively
4. **Logical Flow & Organization**: Which is better organized with clearer reasoning
5. **Contextual Understanding**: Which shows better awareness of interconnected contexts

SCORING GUIDANCE:
- Use realistic score ranges (most scores 70-90, exceptional cases can go 60-69 or 91-95)
- Focus on concrete, observable differences between responses
- Confidence should reflect how clear the differences are (50-100)
- Provide specific examples from the responses in your reasoning (at least 50 characters)
- List at most 3 main advantages of the winning response

Return only a JSON object with: winner ("A", "B" or "TIE"), response_a_scores, response_b_scores, response_a_overall, response_b_overall, confidence, reasoning, main_advantages.
Your response will be validated for proper structure and scoring ranges."#,
};

pub const JUDGE_PROMPTS: &[JudgeTemplate] = &[JUDGE_PROMPT_V1];
pub const DEFAULT_JUDGE_PROMPT: JudgeTemplate = JUDGE_PROMPT_V1;

pub fn judge_prompt_by_slug(slug: &str) -> Option<JudgeTemplate> {
    JUDGE_PROMPTS.iter().find(|t| t.slug == slug).copied()
}

// =============================================================================
// Responder
// =============================================================================

pub const RESPONDER_SYSTEM_PROMPT: &str = "You are an expert AI assistant designed for research evaluation. \
Follow instructions precisely and provide detailed, accurate responses. \
When analyzing structured data, pay careful attention to hierarchical relationships, \
dependencies, and organizational patterns.";

/// Wrap a rendered data prompt for the responder model.
pub fn responder_prompt(rendered: &str) -> PromptInstance {
    PromptInstance {
        template_slug: "responder_v1".to_string(),
        system: RESPONDER_SYSTEM_PROMPT.to_string(),
        user: rendered.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
