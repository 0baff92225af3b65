//! Answer synthesis.
//!
//! Builds one grounded prompt from the retrieved chunks and the verbatim
//! question, calls the generative model once and attaches cited sources.

use crate::rag::types::{RagAnswer, SourceRef};
use crate::router::{Intent, RetrievalPlan};
use crate::vector_index::SearchHit;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use umrah_core::{AppError, AppResult, GenerationSettings, RetrievalSettings};
use umrah_llm::{LlmClient, LlmRequest};
use umrah_prompt::{defaults, BuiltPrompt, PromptLibrary};

/// Turns search hits into a cited answer.
pub struct Synthesizer {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLibrary>,
    generation: GenerationSettings,
    source_cap: usize,
    excerpt_chars: usize,
    ungrounded_fallback: bool,
}

impl Synthesizer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLibrary>,
        generation: GenerationSettings,
        retrieval: &RetrievalSettings,
    ) -> Self {
        Self {
            llm,
            prompts,
            generation,
            source_cap: retrieval.source_cap,
            excerpt_chars: retrieval.excerpt_chars,
            ungrounded_fallback: retrieval.ungrounded_fallback,
        }
    }

    /// Answer `question` from `hits`.
    ///
    /// Zero hits is a valid outcome and yields [`RagAnswer::no_matching_data`]
    /// without calling the model.
    ///
    /// # Errors
    /// `AppError::GenerativeModel` or `AppError::Timeout` when the model call
    /// fails and the ungrounded fallback is disabled (or fails as well).
    pub async fn synthesize(
        &self,
        question: &str,
        plan: &RetrievalPlan,
        hits: &[SearchHit],
    ) -> AppResult<RagAnswer> {
        if hits.is_empty() {
            tracing::info!(intent = %plan.intent, filter = %plan.filter, "No chunks matched");
            return Ok(RagAnswer::no_matching_data(question, plan.intent));
        }

        let context = build_context(hits);
        let prompt = self.render(plan.template_id, question, &context)?;

        match self.generate(&prompt).await {
            Ok(answer) => Ok(RagAnswer {
                answer,
                sources: self.map_sources(hits),
                intent: plan.intent,
                ungrounded: false,
                no_match: false,
            }),
            Err(e) if self.ungrounded_fallback && is_model_failure(&e) => {
                tracing::warn!("Grounded generation failed, answering without context: {}", e);
                self.answer_ungrounded(question, plan.intent).await
            }
            Err(e) => Err(e),
        }
    }

    /// Ask the model the raw question with no retrieved context.
    pub async fn answer_ungrounded(&self, question: &str, intent: Intent) -> AppResult<RagAnswer> {
        let prompt = self.render(defaults::UNGROUNDED, question, "")?;
        let answer = self.generate(&prompt).await?;
        Ok(RagAnswer {
            answer,
            sources: Vec::new(),
            intent,
            ungrounded: true,
            no_match: false,
        })
    }

    fn render(&self, template_id: &str, question: &str, context: &str) -> AppResult<BuiltPrompt> {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context.to_string());
        self.prompts.render(template_id, &vars)
    }

    async fn generate(&self, prompt: &BuiltPrompt) -> AppResult<String> {
        let mut request = LlmRequest::new(&prompt.user, &self.generation.model)
            .with_max_tokens(self.generation.max_tokens)
            .with_temperature(self.generation.temperature);
        if let Some(system) = &prompt.system {
            request = request.with_system(system);
        }

        tracing::debug!(
            provider = self.llm.provider_name(),
            template = %prompt.template_id,
            "Calling generative model"
        );

        let secs = self.generation.timeout_secs;
        let response = tokio::time::timeout(Duration::from_secs(secs), self.llm.complete(&request))
            .await
            .map_err(|_| AppError::Timeout {
                operation: "generative model call".to_string(),
                secs,
            })??;

        let answer = response.content.trim();
        if answer.is_empty() {
            return Err(AppError::GenerativeModel(
                "Model returned an empty answer".to_string(),
            ));
        }
        Ok(answer.to_string())
    }

    fn map_sources(&self, hits: &[SearchHit]) -> Vec<SourceRef> {
        hits.iter()
            .take(self.source_cap)
            .map(|hit| SourceRef {
                excerpt: excerpt(&hit.text, self.excerpt_chars),
                metadata: hit.metadata.clone(),
            })
            .collect()
    }
}

fn is_model_failure(e: &AppError) -> bool {
    matches!(e, AppError::GenerativeModel(_) | AppError::Timeout { .. })
}

/// Retrieved chunk texts joined by blank lines, in rank order.
fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| hit.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// First `max_chars` characters, with `...` appended when truncated.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;
    use crate::router::plan;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use umrah_llm::{LlmResponse, LlmUsage};

    /// Records prompts; fails when `fail` is set.
    struct Recording {
        fail: bool,
        prompts: Mutex<Vec<String>>,
    }

    impl Recording {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for Recording {
        fn provider_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            if self.fail {
                return Err(AppError::GenerativeModel("503 Service Unavailable".to_string()));
            }
            Ok(LlmResponse {
                content: " Tawaf is seven circuits around the Kaaba. ".to_string(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
                done: true,
            })
        }
    }

    fn hit(text: &str, seq: usize) -> SearchHit {
        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), "ritual_guide".into());
        metadata.insert("section".to_string(), "tawaf".into());
        SearchHit {
            text: text.to_string(),
            metadata,
            score: 1.0 - seq as f32 * 0.1,
            seq,
        }
    }

    fn synthesizer(llm: Arc<Recording>, fallback: bool) -> Synthesizer {
        let retrieval = RetrievalSettings {
            ungrounded_fallback: fallback,
            excerpt_chars: 20,
            ..RetrievalSettings::default()
        };
        Synthesizer::new(
            llm,
            Arc::new(PromptLibrary::builtin()),
            GenerationSettings::default(),
            &retrieval,
        )
    }

    #[tokio::test]
    async fn test_grounded_prompt_and_source_cap() {
        let llm = Recording::new(false);
        let synth = synthesizer(llm.clone(), false);
        let hits: Vec<SearchHit> = (0..5).map(|i| hit(&format!("Passage {}", i), i)).collect();
        let question = "What is Tawaf?";

        let answer = synth.synthesize(question, &plan(question), &hits).await.unwrap();

        assert_eq!(answer.answer, "Tawaf is seven circuits around the Kaaba.");
        assert_eq!(answer.sources.len(), 3);
        assert_eq!(answer.sources[0].excerpt, "Passage 0");
        assert!(!answer.ungrounded);

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Passage 0\n\nPassage 1"));
        assert!(prompts[0].contains("Question: What is Tawaf?"));
    }

    #[tokio::test]
    async fn test_no_hits_skips_model() {
        let llm = Recording::new(false);
        let synth = synthesizer(llm.clone(), false);
        let question = "Hotels with a Kaaba view in Madinah";

        let answer = synth.synthesize(question, &plan(question), &[]).await.unwrap();

        assert!(answer.no_match);
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_is_surfaced() {
        let synth = synthesizer(Recording::new(true), false);
        let question = "What is Tawaf?";
        let err = synth
            .synthesize(question, &plan(question), &[hit("Tawaf", 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GenerativeModel(_)));
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        assert_eq!(excerpt("short", 20), "short");
        assert_eq!(excerpt("Masjid al-Ḥaram is the largest", 15), "Masjid al-Ḥaram...");
        assert_eq!(excerpt("exactly ten", 11), "exactly ten");
    }
}
