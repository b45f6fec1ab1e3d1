//! Support pipeline - classify, generate, deliver
//!
//! Stateless per call. Classification uses the similarity matcher when
//! sample embeddings are loaded, otherwise the prompt classifier. Generation
//! and delivery contain their own failures, so the only error a call can
//! return is an embedding failure on the similarity path.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::artifacts::{MacroBook, ModelConfig};
use crate::classifier::{Classification, ClassificationMethod, PromptClassifier};
use crate::delivery::{DeliveryAdapter, DeliveryOutcome, MessagingTransport, ReplyOptions};
use crate::generator::{GeneratedReply, ReplySource, ResponseGenerator};
use crate::intent::Intent;
use crate::llm::{LlmBackend, LlmError, SamplingParams};
use crate::samples::{load_sample_embeddings, SampleEmbedding};
use crate::settings::PylonSettings;
use crate::similarity::SimilarityMatcher;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Embedding classification failed: {0}")]
    Classification(#[from] LlmError),
}

/// Everything one `handle` call did
#[derive(Debug, Clone, PartialEq)]
pub struct HandledQuery {
    pub intent: Intent,
    pub response: String,
    pub classified_by: ClassificationMethod,
    pub reply_source: ReplySource,
    pub delivery: DeliveryOutcome,
}

impl HandledQuery {
    pub fn into_pair(self) -> (Intent, String) {
        (self.intent, self.response)
    }
}

pub struct SupportPipeline {
    similarity: Option<SimilarityMatcher>,
    classifier: PromptClassifier,
    generator: ResponseGenerator,
    delivery: DeliveryAdapter,
}

impl SupportPipeline {
    /// Wire the components from already-loaded artifacts
    ///
    /// `samples` of `None` or an empty set disables the similarity path.
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        transport: Arc<dyn MessagingTransport>,
        admin_id: impl Into<String>,
        config: ModelConfig,
        macros: MacroBook,
        samples: Option<Vec<SampleEmbedding>>,
        sampling: SamplingParams,
    ) -> Self {
        let similarity = samples
            .filter(|s| !s.is_empty())
            .map(|s| SimilarityMatcher::new(backend.clone(), s));

        Self {
            similarity,
            classifier: PromptClassifier::new(backend.clone(), config.intents, sampling),
            generator: ResponseGenerator::new(backend, Arc::new(macros), sampling),
            delivery: DeliveryAdapter::new(transport, admin_id),
        }
    }

    /// Load every artifact named by the settings and wire the pipeline
    ///
    /// Missing model config or macros are fatal; missing sample embeddings
    /// are not.
    pub fn from_settings(
        settings: &PylonSettings,
        backend: Arc<dyn LlmBackend>,
        transport: Arc<dyn MessagingTransport>,
    ) -> Result<Self> {
        let config = ModelConfig::load(&settings.paths.model_config).context("Loading intents")?;
        let macros = MacroBook::load(&settings.paths.macros).context("Loading macros")?;
        let samples = load_sample_embeddings(&settings.paths.sample_embeddings)?;

        info!(
            "Pipeline ready: {} intents, {} macros, similarity {}",
            config.intents.len(),
            macros.len(),
            if samples.is_some() { "enabled" } else { "disabled" }
        );

        Ok(Self::new(
            backend,
            transport,
            settings.messaging.admin_id(),
            config,
            macros,
            samples,
            settings.llm.sampling(),
        ))
    }

    pub fn similarity_enabled(&self) -> bool {
        self.similarity.is_some()
    }

    /// Resolve the intent: similarity when samples exist, prompt otherwise
    pub fn classify(&self, query: &str) -> Result<Classification, PipelineError> {
        match &self.similarity {
            Some(matcher) => {
                let found = matcher.match_query(query)?;
                Ok(Classification {
                    intent: found.intent,
                    method: ClassificationMethod::Similarity,
                })
            }
            None => Ok(self.classifier.classify(query)),
        }
    }

    pub fn generate(&self, intent: Intent, query: &str) -> GeneratedReply {
        self.generator.generate(intent, query)
    }

    pub fn handle(&self, query: &str, conversation_id: &str) -> Result<HandledQuery, PipelineError> {
        let classification = self.classify(query)?;
        let reply = self.generate(classification.intent, query);
        let delivery = self
            .delivery
            .deliver(conversation_id, &reply.text, &ReplyOptions::default());

        info!(
            "Handled query for {}: intent={} via {:?}, reply={:?}",
            conversation_id, classification.intent, classification.method, reply.source
        );

        Ok(HandledQuery {
            intent: classification.intent,
            response: reply.text,
            classified_by: classification.method,
            reply_source: reply.source,
            delivery,
        })
    }
}
