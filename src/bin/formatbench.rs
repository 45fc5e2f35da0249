#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use formatbench::analysis::{
    aggregate, inter_rater_reliability, AggregateSummary, AnalysisError, FallbackCriteriaPolicy,
    ReliabilityReport, StatisticalReport,
};
use formatbench::config::EvaluationConfig;
use formatbench::gateway::{ChatGateway, ProviderGateway, TallyUsageSink};
use formatbench::oracle::ChatOracle;
use formatbench::prompts::{
    judge_prompt_by_slug, JudgeTemplate, DEFAULT_JUDGE_PROMPT, JUDGE_PROMPTS,
};
use formatbench::report::{load_judgments, write_report};
use formatbench::runner::Evaluator;
use formatbench::scenario::{ScenarioCatalog, ScenarioFilter};
use formatbench::trace::JsonlTraceSink;

const DEFAULT_CATALOG: &str = "scenarios/catalog.json";

#[derive(Parser)]
#[command(
    name = "formatbench",
    version,
    about = "Judge-scored comparison of indented-text and markup-tag data renderings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an evaluation (LLM calls) and write the JSON report
    Run {
        #[arg(long, default_value = DEFAULT_CATALOG)]
        catalog: PathBuf,
        /// JSON run configuration; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Response model (OpenRouter id)
        #[arg(long)]
        model: Option<String>,
        /// Judge model; defaults to the response model
        #[arg(long)]
        judge: Option<String>,
        /// Judge prompt template slug
        #[arg(long, default_value = DEFAULT_JUDGE_PROMPT.slug)]
        judge_template: String,
        /// Run only the first N selected scenarios
        #[arg(long)]
        cases: Option<usize>,
        /// Run a single scenario by id
        #[arg(long, conflicts_with_all = ["category", "cases"])]
        single: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        concurrency: Option<usize>,
        /// Report path; defaults to a name derived from the models and time
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        no_stats: bool,
        #[arg(long, value_enum)]
        fallback_criteria: Option<CliFallbackCriteria>,
        /// Write a JSONL judgment trace
        #[arg(long)]
        trace: Option<PathBuf>,
    },
    /// List scenario ids and categories
    ListCases {
        #[arg(long, default_value = DEFAULT_CATALOG)]
        catalog: PathBuf,
    },
    /// Recompute summary and statistics from a saved report (no LLM calls)
    Analyze {
        #[arg(long)]
        report: PathBuf,
        /// Catalog for the per-category breakdown
        #[arg(long)]
        catalog: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "exclude")]
        fallback_criteria: CliFallbackCriteria,
        /// JSON array of per-case score rows, one column per judge
        #[arg(long)]
        reliability: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// CLI-facing fallback criteria policy (clap::ValueEnum).
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliFallbackCriteria {
    Exclude,
    Include,
}

impl From<CliFallbackCriteria> for FallbackCriteriaPolicy {
    fn from(value: CliFallbackCriteria) -> Self {
        match value {
            CliFallbackCriteria::Exclude => FallbackCriteriaPolicy::Exclude,
            CliFallbackCriteria::Include => FallbackCriteriaPolicy::Include,
        }
    }
}

#[derive(Serialize)]
struct AnalysisOutput {
    source_report_id: Uuid,
    summary: AggregateSummary,
    statistics: Option<StatisticalReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statistics_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inter_rater_reliability: Option<ReliabilityReport>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            catalog,
            config,
            model,
            judge,
            judge_template,
            cases,
            single,
            category,
            seed,
            concurrency,
            output,
            no_stats,
            fallback_criteria,
            trace,
        } => {
            let mut config = match config {
                Some(path) => EvaluationConfig::load(path)?,
                None => EvaluationConfig::default(),
            };
            if let Some(model) = model {
                config.response_model = model;
            }
            if judge.is_some() {
                config.judge_model = judge;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            if let Some(policy) = fallback_criteria {
                config.fallback_criteria = policy.into();
            }
            if no_stats {
                config.statistics = false;
            }
            config.validate()?;
            let template = resolve_template(&judge_template)?;

            let catalog = ScenarioCatalog::load(&catalog)?;
            let scenarios = catalog.select(&ScenarioFilter {
                single,
                category,
                limit: cases,
            })?;

            let usage = Arc::new(TallyUsageSink::new());
            let gateway: Arc<dyn ChatGateway> = Arc::new(ProviderGateway::from_env(usage.clone())?);
            let run_id = Uuid::new_v4();
            let responder = ChatOracle::new(gateway.clone(), config.response_model.clone())
                .temperature(config.response_temperature)
                .max_tokens(config.max_response_tokens)
                .run_id(run_id);
            let judge = ChatOracle::new(gateway, config.judge_model().to_string())
                .temperature(config.judge_temperature)
                .max_tokens(config.max_judge_tokens)
                .run_id(run_id);

            let (trace_sink, trace_worker) = match trace {
                Some(path) => {
                    let (sink, worker) = JsonlTraceSink::new(path)?;
                    (Some(sink), Some(worker))
                }
                None => (None, None),
            };

            let mut evaluator = Evaluator::new(Arc::new(responder), Arc::new(judge), config)
                .with_template(template);
            if let Some(sink) = &trace_sink {
                evaluator = evaluator.with_trace(Arc::new(sink.clone()));
            }

            let result = evaluator
                .run(&scenarios, Some(&catalog.category_map()))
                .await;

            drop(evaluator);
            drop(trace_sink);
            if let Some(worker) = trace_worker {
                worker.join()?;
            }

            let mut report = result?;
            report.metadata.report_id = run_id;
            report.metadata.usage = Some(usage.totals());

            let path = write_report(&report, output.as_deref())?;
            info!(path = %path.display(), "Report written");
            println!("{}", path.display());
        }
        Commands::ListCases { catalog } => {
            let catalog = ScenarioCatalog::load(&catalog)?;
            for scenario in catalog.scenarios() {
                println!("{}\t{}", scenario.id, scenario.category);
            }
        }
        Commands::Analyze {
            report,
            catalog,
            fallback_criteria,
            reliability,
            out,
        } => {
            let saved = load_judgments(&report)?;
            let categories = match catalog {
                Some(path) => Some(ScenarioCatalog::load(path)?.category_map()),
                None => None,
            };
            let summary = aggregate(
                &saved.judgments,
                categories.as_ref(),
                fallback_criteria.into(),
            )?;

            let (statistics, statistics_note) = match StatisticalReport::from_results(
                &saved.judgments,
                saved.metadata.seed.is_some(),
            ) {
                Ok(statistics) => (Some(statistics), None),
                Err(err @ AnalysisError::InsufficientData { .. }) => {
                    warn!(error = %err, "Skipping statistical analysis");
                    (None, Some(err.to_string()))
                }
                Err(err) => return Err(err.into()),
            };

            let reliability = match reliability {
                Some(path) => {
                    let matrix: Vec<Vec<f64>> = read_json(&path)?;
                    Some(inter_rater_reliability(&matrix)?)
                }
                None => None,
            };
            // Reliability rides inside the statistics when there are any.
            let (statistics, inter_rater_reliability) = match (statistics, reliability) {
                (Some(statistics), Some(reliability)) => {
                    (Some(statistics.with_reliability(reliability)), None)
                }
                other => other,
            };

            let output = AnalysisOutput {
                source_report_id: saved.metadata.report_id,
                summary,
                statistics,
                statistics_note,
                inter_rater_reliability,
            };
            let json = serde_json::to_string_pretty(&output)?;
            match out {
                Some(path) => std::fs::write(path, json)?,
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_template(slug: &str) -> Result<JudgeTemplate, String> {
    judge_prompt_by_slug(slug).ok_or_else(|| {
        let known: Vec<&str> = JUDGE_PROMPTS.iter().map(|t| t.slug).collect();
        format!(
            "unknown judge template {slug:?} (available: {})",
            known.join(", ")
        )
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
