//! Randomized A/B assignment and judge prompt construction.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::prompts::{JudgeTemplate, PromptInstance, DEFAULT_JUDGE_PROMPT};

/// The two renderings' responses for one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePair {
    pub format_one_text: String,
    pub format_two_text: String,
}

impl CandidatePair {
    pub fn new(format_one_text: impl Into<String>, format_two_text: impl Into<String>) -> Self {
        Self {
            format_one_text: format_one_text.into(),
            format_two_text: format_two_text.into(),
        }
    }
}

/// Outcome of the coin flip for one comparison.
///
/// Consumed only by label mapping; intentionally not serializable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    format_one_is_a: bool,
}

impl Assignment {
    pub fn new(format_one_is_a: bool) -> Self {
        Self { format_one_is_a }
    }

    pub fn format_one_is_a(&self) -> bool {
        self.format_one_is_a
    }

    /// `(response_a, response_b)` for this assignment.
    pub fn order<'a>(&self, pair: &'a CandidatePair) -> (&'a str, &'a str) {
        if self.format_one_is_a {
            (&pair.format_one_text, &pair.format_two_text)
        } else {
            (&pair.format_two_text, &pair.format_one_text)
        }
    }
}

/// Everything the judge sees for one comparison, plus the labeled texts the
/// heuristic fallback scores when the judge cannot be used.
#[derive(Debug, Clone)]
pub struct JudgePrompt {
    pub scenario_id: String,
    pub prompt: PromptInstance,
    response_a: String,
    response_b: String,
}

impl JudgePrompt {
    pub fn response_a(&self) -> &str {
        &self.response_a
    }

    pub fn response_b(&self) -> &str {
        &self.response_b
    }
}

/// Render the judge prompt for a fixed assignment.
pub fn build_judge_prompt(
    template: &JudgeTemplate,
    scenario_id: &str,
    task: &str,
    rubric: &[String],
    pair: &CandidatePair,
    assignment: Assignment,
) -> JudgePrompt {
    let (response_a, response_b) = assignment.order(pair);
    JudgePrompt {
        scenario_id: scenario_id.to_string(),
        prompt: template.render(scenario_id, task, rubric, response_a, response_b),
        response_a: response_a.to_string(),
        response_b: response_b.to_string(),
    }
}

/// Owns the assignment RNG for one pipeline.
///
/// Seeded once at construction; every draw advances the same stream, so a run
/// over the same ordered scenarios with the same seed reproduces its
/// assignments exactly.
#[derive(Debug, Clone)]
pub struct AssignmentBuilder {
    rng: StdRng,
    seed: Option<u64>,
    template: JudgeTemplate,
}

impl AssignmentBuilder {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            seed,
            template: DEFAULT_JUDGE_PROMPT,
        }
    }

    pub fn with_template(mut self, template: JudgeTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn template(&self) -> &JudgeTemplate {
        &self.template
    }

    /// One fair coin flip. Drawn even when both texts are identical.
    pub fn draw(&mut self) -> Assignment {
        Assignment::new(self.rng.gen::<bool>())
    }

    /// Pre-draw `n` assignments in order, for dispatching comparisons concurrently.
    pub fn draw_many(&mut self, n: usize) -> Vec<Assignment> {
        (0..n).map(|_| self.draw()).collect()
    }

    /// Draw an assignment and render the prompt for it.
    pub fn build(
        &mut self,
        scenario_id: &str,
        task: &str,
        rubric: &[String],
        pair: &CandidatePair,
    ) -> (JudgePrompt, Assignment) {
        let assignment = self.draw();
        let prompt = self.render(scenario_id, task, rubric, pair, assignment);
        (prompt, assignment)
    }

    /// Render for an assignment drawn earlier with [`Self::draw_many`].
    pub fn render(
        &self,
        scenario_id: &str,
        task: &str,
        rubric: &[String],
        pair: &CandidatePair,
        assignment: Assignment,
    ) -> JudgePrompt {
        build_judge_prompt(&self.template, scenario_id, task, rubric, pair, assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flips(builder: &mut AssignmentBuilder, n: usize) -> Vec<bool> {
        builder
            .draw_many(n)
            .into_iter()
            .map(|a| a.format_one_is_a())
            .collect()
    }

    #[test]
    fn same_seed_reproduces_sequence() {
        let mut first = AssignmentBuilder::new(Some(42));
        let mut second = AssignmentBuilder::new(Some(42));
        assert_eq!(flips(&mut first, 64), flips(&mut second, 64));
    }

    #[test]
    fn builders_do_not_share_state() {
        let mut a = AssignmentBuilder::new(Some(7));
        let mut b = AssignmentBuilder::new(Some(7));
        let _ = flips(&mut a, 10);
        let from_b = flips(&mut b, 10);
        let mut c = AssignmentBuilder::new(Some(7));
        assert_eq!(from_b, flips(&mut c, 10));
    }

    #[test]
    fn draws_are_roughly_fair() {
        let mut builder = AssignmentBuilder::new(Some(1234));
        let heads = flips(&mut builder, 2000).into_iter().filter(|b| *b).count();
        assert!((850..=1150).contains(&heads), "heads = {heads}");
    }

    #[test]
    fn build_places_texts_by_assignment() {
        let pair = CandidatePair::new("indented answer", "markup answer");
        let builder = AssignmentBuilder::new(Some(0));

        let p = builder.render("s1", "task", &[], &pair, Assignment::new(true));
        assert_eq!(p.response_a(), "indented answer");
        assert!(p.prompt.user.contains("Response A:\nindented answer"));

        let p = builder.render("s1", "task", &[], &pair, Assignment::new(false));
        assert_eq!(p.response_a(), "markup answer");
        assert_eq!(p.response_b(), "indented answer");
        assert!(p.prompt.user.contains("Response B:\nindented answer"));
    }

    #[test]
    fn identical_texts_still_consume_a_draw() {
        let pair = CandidatePair::new("same", "same");
        let mut builder = AssignmentBuilder::new(Some(99));
        let mut reference = AssignmentBuilder::new(Some(99));
        let (_, assignment) = builder.build("s", "t", &[], &pair);
        assert_eq!(assignment, reference.draw());
        assert_eq!(builder.draw(), reference.draw());
    }

    #[test]
    fn prompt_never_names_formats() {
        let pair = CandidatePair::new("alpha", "beta");
        let mut builder = AssignmentBuilder::new(Some(3));
        let (p, _) = builder.build("s", "t", &["factor".to_string()], &pair);
        let text = format!("{}\n{}", p.prompt.system, p.prompt.user).to_lowercase();
        assert!(!text.contains("format_one"));
        assert!(!text.contains("format_two"));
        assert!(!text.contains("markup"));
        assert!(!text.contains("indented"));
    }
}
