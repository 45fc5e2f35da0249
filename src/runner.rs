//! Evaluation run: render both formats, collect responses, judge, summarize.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::analysis::{aggregate, AnalysisError, StatisticalReport};
use crate::config::EvaluationConfig;
use crate::gateway::ProviderError;
use crate::judge::{judge_pair, AssignmentBuilder, CandidatePair, JudgeCall, JudgmentResult};
use crate::oracle::{JudgeOracle, ResponderOracle};
use crate::prompts::{JudgeTemplate, DEFAULT_JUDGE_PROMPT};
use crate::render::Format;
use crate::report::{EvaluationReport, FailedScenario, ReportMetadata, ResponseRecord};
use crate::scenario::Scenario;
use crate::trace::{now_epoch_ms, JudgmentTrace, TraceSink};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("no scenarios selected")]
    NoScenarios,
    #[error("all {0} scenarios failed to produce responses")]
    AllScenariosFailed(usize),
    #[error("analysis error: {0}")]
    Analysis(#[from] AnalysisError),
}

pub struct Evaluator {
    responder: Arc<dyn ResponderOracle>,
    judge: Arc<dyn JudgeOracle>,
    config: EvaluationConfig,
    template: JudgeTemplate,
    trace: Option<Arc<dyn TraceSink>>,
}

struct Judged {
    index: usize,
    template_slug: String,
    prompt_hash: String,
    result: JudgmentResult,
    call: JudgeCall,
}

impl Evaluator {
    pub fn new(
        responder: Arc<dyn ResponderOracle>,
        judge: Arc<dyn JudgeOracle>,
        config: EvaluationConfig,
    ) -> Self {
        Self {
            responder,
            judge,
            config,
            template: DEFAULT_JUDGE_PROMPT,
            trace: None,
        }
    }

    pub fn with_template(mut self, template: JudgeTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_trace(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Run every scenario, in order.
    ///
    /// Assignments for all scenarios are drawn before any call goes out, so a
    /// seeded run is reproducible whatever the concurrency or failures.
    /// A scenario whose responses cannot be produced is recorded in
    /// `failed_scenarios` and skipped; judge failures never fail a scenario.
    pub async fn run(
        &self,
        scenarios: &[Scenario],
        categories: Option<&HashMap<String, String>>,
    ) -> Result<EvaluationReport, RunError> {
        if scenarios.is_empty() {
            return Err(RunError::NoScenarios);
        }

        let mut builder = AssignmentBuilder::new(self.config.seed).with_template(self.template);
        let assignments = builder.draw_many(scenarios.len());
        let concurrency = self.config.concurrency.max(1);

        info!(
            scenarios = scenarios.len(),
            response_model = self.responder.model(),
            judge_model = self.judge.model(),
            seed = ?self.config.seed,
            concurrency,
            "Starting evaluation"
        );

        let generated: Vec<(usize, Result<ResponseRecord, ProviderError>)> =
            stream::iter(scenarios.iter().enumerate())
                .map(|(index, scenario)| async move { (index, self.respond(scenario).await) })
                .buffered(concurrency)
                .collect()
                .await;

        let mut responses = Vec::new();
        let mut pending = Vec::new();
        let mut failed_scenarios = Vec::new();
        for (index, outcome) in generated {
            let scenario = &scenarios[index];
            match outcome {
                Ok(record) => {
                    pending.push(index);
                    responses.push(record);
                }
                Err(err) => {
                    warn!(
                        scenario_id = %scenario.id,
                        error = %err,
                        code = err.code(),
                        "Response generation failed; skipping scenario"
                    );
                    failed_scenarios.push(FailedScenario {
                        scenario_id: scenario.id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        if responses.is_empty() {
            return Err(RunError::AllScenariosFailed(failed_scenarios.len()));
        }
        info!(
            generated = responses.len(),
            failed = failed_scenarios.len(),
            "Response generation complete"
        );

        let builder = &builder;
        let assignments = &assignments;
        let judged: Vec<Judged> = stream::iter(pending.iter().copied().zip(&responses))
            .map(|(index, record)| {
                let scenario = &scenarios[index];
                let assignment = assignments[index];
                let pair = CandidatePair::new(
                    record.format_one_response.as_str(),
                    record.format_two_response.as_str(),
                );
                let prompt = builder.render(
                    &scenario.id,
                    &scenario.task,
                    &scenario.rubric,
                    &pair,
                    assignment,
                );
                async move {
                    let (result, call) = judge_pair(self.judge.as_ref(), &prompt, assignment).await;
                    debug!(
                        scenario_id = %result.scenario_id,
                        winner = result.winner.as_str(),
                        mode = call.mode,
                        "Scenario judged"
                    );
                    Judged {
                        index,
                        template_slug: prompt.prompt.template_slug.clone(),
                        prompt_hash: prompt.prompt.content_hash(),
                        result,
                        call,
                    }
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        // Judgments are already paid for; a broken trace must not lose them.
        if let Some(sink) = &self.trace {
            let mut dropped = 0usize;
            for entry in &judged {
                if let Err(err) = sink.record(self.trace_row(entry)) {
                    if dropped == 0 {
                        warn!(
                            scenario_id = %entry.result.scenario_id,
                            error = %err,
                            "Trace write failed; continuing without it"
                        );
                    }
                    dropped += 1;
                }
            }
            if dropped > 0 {
                warn!(dropped, total = judged.len(), "Trace rows dropped");
            }
        }

        let judgments: Vec<JudgmentResult> = judged.into_iter().map(|j| j.result).collect();
        let summary = aggregate(&judgments, categories, self.config.fallback_criteria)?;
        if summary.fallback_count > 0 {
            warn!(
                fallback_count = summary.fallback_count,
                total = judgments.len(),
                "Some judgments used the heuristic fallback"
            );
        }

        let (statistics, statistics_note) = if self.config.statistics {
            match StatisticalReport::from_results(&judgments, self.config.seed.is_some()) {
                Ok(report) => (Some(report), None),
                Err(err @ AnalysisError::InsufficientData { .. }) => {
                    warn!(error = %err, "Skipping statistical analysis");
                    (None, Some(err.to_string()))
                }
                Err(err) => return Err(err.into()),
            }
        } else {
            (None, Some("statistics disabled".to_string()))
        };

        info!(
            judged = judgments.len(),
            format_one_wins = summary.outcomes.format_one_wins,
            format_two_wins = summary.outcomes.format_two_wins,
            ties = summary.outcomes.ties,
            advantage = summary.scores.advantage,
            "Evaluation complete"
        );

        Ok(EvaluationReport {
            metadata: ReportMetadata::new(
                self.responder.model(),
                self.judge.model(),
                self.config.seed,
                scenarios.iter().map(|s| s.id.clone()).collect(),
            ),
            responses,
            judgments,
            failed_scenarios,
            summary,
            statistics,
            statistics_note,
        })
    }

    async fn respond(&self, scenario: &Scenario) -> Result<ResponseRecord, ProviderError> {
        let format_one_prompt = Format::Indented.render(&scenario.task, &scenario.data);
        let format_two_prompt = Format::Markup.render(&scenario.task, &scenario.data);
        debug!(
            scenario_id = %scenario.id,
            format_one_chars = format_one_prompt.chars().count(),
            format_two_chars = format_two_prompt.chars().count(),
            "Rendered prompts"
        );

        let (one, two) = try_join(
            self.responder.respond(&scenario.id, &format_one_prompt),
            self.responder.respond(&scenario.id, &format_two_prompt),
        )
        .await?;

        Ok(ResponseRecord::new(
            &scenario.id,
            format_one_prompt,
            format_two_prompt,
            one.content,
            two.content,
        ))
    }

    fn trace_row(&self, entry: &Judged) -> JudgmentTrace {
        let result = &entry.result;
        JudgmentTrace {
            timestamp_ms: now_epoch_ms(),
            scenario_index: entry.index,
            scenario_id: result.scenario_id.clone(),
            judge_model: self.judge.model().to_string(),
            template_slug: entry.template_slug.clone(),
            prompt_hash: entry.prompt_hash.clone(),
            mode: entry.call.mode.to_string(),
            fallback_reason: result.fallback.as_ref().map(|note| note.reason.clone()),
            winner: result.winner,
            format_one_score: result.format_one_score,
            format_two_score: result.format_two_score,
            confidence: result.confidence,
            input_tokens: entry.call.usage.input_tokens,
            output_tokens: entry.call.usage.output_tokens,
            cost_nanodollars: entry.call.usage.cost_nanodollars,
        }
    }
}
