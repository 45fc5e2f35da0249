//! Model-calling capabilities consumed by the pipeline.
//!
//! The pipeline only sees the [`ResponderOracle`] and [`JudgeOracle`] traits;
//! [`ChatOracle`] implements both on top of a [`ChatGateway`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gateway::{Attribution, ChatGateway, ChatModel, ChatRequest, ProviderError};
use crate::judge::JudgePrompt;
use crate::judge::VERDICT_SCHEMA_NAME;
use crate::prompts::responder_prompt;

/// Token and cost accounting for one oracle call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_nanodollars: i64,
}

#[derive(Debug, Clone)]
pub struct OracleReply {
    pub content: String,
    pub usage: OracleUsage,
}

/// Produces the free-text response to one rendered data prompt.
#[async_trait]
pub trait ResponderOracle: Send + Sync {
    fn model(&self) -> &str;

    async fn respond(&self, scenario_id: &str, prompt: &str)
        -> Result<OracleReply, ProviderError>;
}

/// Asks a model for a verdict matching `schema`.
///
/// Returns the raw reply; parsing and validation belong to acquisition.
#[async_trait]
pub trait JudgeOracle: Send + Sync {
    fn model(&self) -> &str;

    async fn judge(
        &self,
        prompt: &JudgePrompt,
        schema: &serde_json::Value,
    ) -> Result<OracleReply, ProviderError>;
}

/// OpenRouter-backed oracle.
#[derive(Clone)]
pub struct ChatOracle {
    gateway: Arc<dyn ChatGateway>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    run_id: Option<Uuid>,
}

impl ChatOracle {
    pub fn new(gateway: Arc<dyn ChatGateway>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
            temperature: 0.0,
            max_tokens: 2048,
            run_id: None,
        }
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    fn attribution(&self, caller: &'static str, scenario_id: &str) -> Attribution {
        let attribution = Attribution::new(caller).with_scenario(scenario_id);
        match self.run_id {
            Some(run_id) => attribution.with_run(run_id),
            None => attribution,
        }
    }

    async fn send(&self, request: ChatRequest) -> Result<OracleReply, ProviderError> {
        let response = self.gateway.chat(request).await?;
        Ok(OracleReply {
            content: response.content,
            usage: OracleUsage {
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
                cost_nanodollars: response.cost_nanodollars,
            },
        })
    }
}

#[async_trait]
impl ResponderOracle for ChatOracle {
    fn model(&self) -> &str {
        &self.model
    }

    async fn respond(
        &self,
        scenario_id: &str,
        prompt: &str,
    ) -> Result<OracleReply, ProviderError> {
        let request = ChatRequest::new(
            ChatModel::openrouter(&self.model),
            responder_prompt(prompt).to_messages(),
            self.attribution("oracle::respond", scenario_id),
        )
        .temperature(self.temperature)
        .max_tokens(self.max_tokens);

        let reply = self.send(request).await?;
        if reply.content.trim().is_empty() {
            return Err(ProviderError::api("empty response content", true));
        }
        Ok(reply)
    }
}

#[async_trait]
impl JudgeOracle for ChatOracle {
    fn model(&self) -> &str {
        &self.model
    }

    async fn judge(
        &self,
        prompt: &JudgePrompt,
        schema: &serde_json::Value,
    ) -> Result<OracleReply, ProviderError> {
        let request = ChatRequest::new(
            ChatModel::openrouter(&self.model),
            prompt.prompt.to_messages(),
            self.attribution("oracle::judge", &prompt.scenario_id),
        )
        .temperature(self.temperature)
        .max_tokens(self.max_tokens)
        .json_schema(VERDICT_SCHEMA_NAME, schema.clone());

        self.send(request).await
    }
}
