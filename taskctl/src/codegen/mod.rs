//! The code generator & cache. Synthesizes source for a task via the LLM
//! broker, post-processes the completion into clean source, and stores
//! the result through the registry's dedup-enforcing cache write.
//!
//! Grounded in `broker::Broker` for the actual LLM round trip (codegen
//! goes through the same HIGH-priority admission path as any other
//! completion) and `registry::Registry::find_cached_code`/
//! `create_cached_code` for the cache contract.

mod postprocess;
mod prompt;

pub use postprocess::{filter_wrong_language_blocks, strip_code_fences, strip_unused_heavy_imports};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::broker::{Broker, Priority};
use crate::domain::{CachedCode, Language};
use crate::error::{Error, Result};
use crate::llm::{CompletionRequest, Message};
use crate::registry::{default_domain, Registry};
use crate::tools::ToolExecutor;

use prompt::build_prompt;

/// Per-call timeout for a codegen completion; calls out code
/// generation as the context that raises the per-LLM-call timeout from
/// its 30s default up to 10 minutes.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub task_name: String,
    pub description: String,
    pub language: Language,
    pub context: HashMap<String, Value>,
    pub tags: Vec<String>,
    /// Fed back into the prompt on a router-driven repair retry after a
    /// `CodeError`.
    pub previous_error: Option<String>,
}

impl GenerateRequest {
    pub fn new(task_name: impl Into<String>, description: impl Into<String>, language: Language) -> Self {
        Self {
            task_name: task_name.into(),
            description: description.into(),
            language,
            context: HashMap::new(),
            tags: Vec::new(),
            previous_error: None,
        }
    }

    pub fn with_context_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_previous_error(mut self, error: impl Into<String>) -> Self {
        self.previous_error = Some(error.into());
        self
    }
}

pub struct CodeGenerator {
    registry: Arc<Registry>,
    broker: Arc<Broker>,
    tools: Arc<ToolExecutor>,
    domain: String,
}

impl CodeGenerator {
    pub fn new(registry: Arc<Registry>, broker: Arc<Broker>, tools: Arc<ToolExecutor>) -> Self {
        Self { registry, broker, tools, domain: default_domain().to_string() }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// the `Generate`: a cache hit short-circuits generation entirely
    /// unless this call is itself a repair retry (`previous_error` set),
    /// in which case the broken cached entry must not be handed back.
    pub async fn generate(&self, request: GenerateRequest) -> Result<CachedCode> {
        if request.previous_error.is_none()
            && let Some(cached) = self.registry.find_cached_code(&self.domain, &request.task_name)?
        {
            debug!(task_name = %request.task_name, "CodeGenerator::generate: cache hit");
            return Ok(cached);
        }

        let prompt = build_prompt(&request, &self.tools.definitions());
        let completion_request = CompletionRequest {
            system_prompt: prompt,
            messages: vec![Message::user(request.description.clone())],
            tools: vec![],
            max_tokens: 4096,
        };

        let ticket_id = self.broker.enqueue(completion_request, Priority::High, "codegen").await?;
        let response = self
            .broker
            .await_completion(&ticket_id, GENERATION_TIMEOUT, CancellationToken::new())
            .await?;
        let raw = response.content.ok_or_else(|| {
            Error::code_error(request.task_name.clone(), request.language.as_str(), "empty completion from generator")
        })?;

        let fenced = strip_code_fences(&raw);
        let filtered = filter_wrong_language_blocks(&fenced, request.language);
        let source = if request.language == Language::Python {
            strip_unused_heavy_imports(&filtered)
        } else {
            filtered
        };

        if source.trim().is_empty() {
            return Err(Error::code_error(
                request.task_name.clone(),
                request.language.as_str(),
                "generated source was empty after post-processing",
            ));
        }

        let code = CachedCode::new(request.task_name.clone(), request.language, source)
            .with_description(request.description.clone())
            .with_tags(request.tags.clone());
        let stored = self.registry.create_cached_code(&self.domain, code)?;
        info!(task_name = %request.task_name, id = %stored.id, "CodeGenerator::generate: stored");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use taskstore::Store;

    use super::*;
    use crate::broker::BrokerConfig;
    use crate::llm::client::mock::MockLlmClient;
    use crate::llm::{StopReason, TokenUsage};

    fn response(text: &str) -> crate::llm::CompletionResponse {
        crate::llm::CompletionResponse {
            content: Some(text.to_string()),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }

    fn generator(responses: Vec<crate::llm::CompletionResponse>) -> CodeGenerator {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let registry = Arc::new(Registry::new(store.clone()));
        let client = Arc::new(MockLlmClient::new(responses));
        let broker = Broker::new(BrokerConfig::default(), client, store);
        CodeGenerator::new(registry, broker, Arc::new(ToolExecutor::empty()))
    }

    #[tokio::test]
    async fn generates_and_caches_new_source() {
        let generator = generator(vec![response("```python\nprint('hi')\n```")]);
        let request = GenerateRequest::new("greet", "print a greeting", Language::Python);
        let code = generator.generate(request).await.unwrap();
        assert_eq!(code.source, "print('hi')");
        assert!(code.executable);
    }

    #[tokio::test]
    async fn second_call_hits_cache_without_another_completion() {
        let generator = generator(vec![response("```python\nprint('hi')\n```")]);
        let first = generator.generate(GenerateRequest::new("greet", "print a greeting", Language::Python)).await.unwrap();
        let second = generator.generate(GenerateRequest::new("greet", "print a greeting", Language::Python)).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn repair_retry_bypasses_cache_and_posts_previous_error() {
        let generator = generator(vec![
            response("```python\nraise NameError('n')\n```"),
            response("```python\nprint('fixed')\n```"),
        ]);
        let first = generator
            .generate(GenerateRequest::new("compute", "compute something", Language::Python))
            .await
            .unwrap();
        assert!(first.source.contains("NameError"));

        let repaired = generator
            .generate(
                GenerateRequest::new("compute", "compute something", Language::Python)
                    .with_previous_error("NameError: n is not defined"),
            )
            .await
            .unwrap();
        assert_eq!(repaired.source, "print('fixed')");
    }

    #[tokio::test]
    async fn empty_completion_is_a_code_error() {
        let generator = generator(vec![response("")]);
        let err = generator
            .generate(GenerateRequest::new("noop", "do nothing useful", Language::Python))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CodeError { .. }));
    }
}
