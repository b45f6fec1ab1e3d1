//! Macro-augmented response generator
//!
//! Looks up the canned macro for an intent, asks the model to expand it into
//! a friendly 150-200 word reply, and degrades to the macro itself when the
//! model fails or answers with nothing. Never returns an error.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::artifacts::{MacroBook, GENERIC_REPLY};
use crate::intent::Intent;
use crate::llm::{ChatMessage, ChatRequest, LlmBackend, SamplingParams};

/// Requested reply length; advisory, the model is asked but not policed
pub const MIN_REPLY_WORDS: usize = 150;
pub const MAX_REPLY_WORDS: usize = 200;

const AGENT_PERSONA: &str = "You are a helpful customer support agent.";

/// Where the reply text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    /// Model expansion of the macro
    Model,
    /// Macro for the intent, used as-is
    Macro,
    /// Generic reply; the intent has no macro
    Generic,
}

impl ReplySource {
    pub fn is_fallback(&self) -> bool {
        !matches!(self, ReplySource::Model)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReply {
    pub text: String,
    pub source: ReplySource,
}

impl GeneratedReply {
    pub fn word_count(&self) -> usize {
        word_count(&self.text)
    }

    pub fn within_word_band(&self) -> bool {
        (MIN_REPLY_WORDS..=MAX_REPLY_WORDS).contains(&self.word_count())
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub struct ResponseGenerator {
    backend: Arc<dyn LlmBackend>,
    macros: Arc<MacroBook>,
    sampling: SamplingParams,
}

impl ResponseGenerator {
    pub fn new(backend: Arc<dyn LlmBackend>, macros: Arc<MacroBook>, sampling: SamplingParams) -> Self {
        Self {
            backend,
            macros,
            sampling,
        }
    }

    /// Expansion prompt carrying the query, the intent and the macro
    pub fn expansion_prompt(intent: Intent, query: &str, macro_text: &str) -> String {
        format!(
            "{} A user asked: '{}'. The intent is '{}'. \
             Here is a suggested response: '{}'. \
             Please write a detailed, helpful, and friendly reply in more than {} words, \
             but less than {} words, expanding on the macro if possible. \
             Please do not include any other text in your response.",
            AGENT_PERSONA, query, intent, macro_text, MIN_REPLY_WORDS, MAX_REPLY_WORDS
        )
    }

    pub fn generate(&self, intent: Intent, query: &str) -> GeneratedReply {
        let fallback = self.fallback(intent);

        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(AGENT_PERSONA),
                ChatMessage::user(Self::expansion_prompt(intent, query, &fallback.text)),
            ],
            sampling: self.sampling,
        };

        match self.backend.chat(&request) {
            Ok(response) => match response.trimmed() {
                Some(text) => {
                    let reply = GeneratedReply {
                        text: text.to_string(),
                        source: ReplySource::Model,
                    };
                    let words = reply.word_count();
                    if reply.within_word_band() {
                        debug!("Generated {} word reply for {}", words, intent);
                    } else {
                        warn!(
                            "Generated reply for {} is {} words, outside {}-{}",
                            intent, words, MIN_REPLY_WORDS, MAX_REPLY_WORDS
                        );
                    }
                    reply
                }
                None => {
                    warn!("Model returned an empty reply for {}, using macro", intent);
                    fallback
                }
            },
            Err(e) => {
                warn!("Error with model response generation: {}", e);
                fallback
            }
        }
    }

    /// Static reply for the intent
    pub fn fallback(&self, intent: Intent) -> GeneratedReply {
        match self.macros.lookup(intent) {
            Some(text) => GeneratedReply {
                text: text.to_string(),
                source: ReplySource::Macro,
            },
            None => GeneratedReply {
                text: GENERIC_REPLY.to_string(),
                source: ReplySource::Generic,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::Macro;
    use crate::llm::{FakeLlmBackend, LlmError, LlmResponse};

    const REFUND_MACRO: &str = "We're sorry to hear that. Please share your order number so we can process your refund.";

    fn generator(backend: FakeLlmBackend) -> (Arc<FakeLlmBackend>, ResponseGenerator) {
        let backend = Arc::new(backend);
        let macros = Arc::new(MacroBook::new(vec![Macro {
            intent: Intent::RefundRequest,
            response: REFUND_MACRO.to_string(),
        }]));
        let generator = ResponseGenerator::new(backend.clone(), macros, SamplingParams::default());
        (backend, generator)
    }

    #[test]
    fn test_model_reply_is_trimmed() {
        let (_, g) = generator(FakeLlmBackend::always_reply("\n  Happy to help with your refund!  \n"));
        let reply = g.generate(Intent::RefundRequest, "I want a refund");
        assert_eq!(reply.text, "Happy to help with your refund!");
        assert_eq!(reply.source, ReplySource::Model);
        assert!(!reply.within_word_band());
    }

    #[test]
    fn test_prompt_embeds_query_intent_and_macro() {
        let (backend, g) = generator(FakeLlmBackend::always_reply("ok"));
        g.generate(Intent::RefundRequest, "I want a refund for my last purchase.");

        let calls = backend.chat_calls();
        assert_eq!(calls[0].messages[0], ChatMessage::system(AGENT_PERSONA));
        let prompt = &calls[0].messages[1].content;
        assert!(prompt.contains("'I want a refund for my last purchase.'"));
        assert!(prompt.contains("The intent is 'refund_request'"));
        assert!(prompt.contains(REFUND_MACRO));
        assert!(prompt.contains("more than 150 words"));
        assert!(prompt.contains("less than 200 words"));
    }

    #[test]
    fn test_model_failure_returns_macro() {
        let (_, g) = generator(FakeLlmBackend::always_error(LlmError::HttpError("503".into())));
        let reply = g.generate(Intent::RefundRequest, "refund?");
        assert_eq!(reply.text, REFUND_MACRO);
        assert_eq!(reply.source, ReplySource::Macro);
        assert!(reply.source.is_fallback());
    }

    #[test]
    fn test_model_failure_without_macro_returns_generic() {
        let (backend, g) = generator(FakeLlmBackend::always_error(LlmError::Timeout(60)));
        let reply = g.generate(Intent::BugReport, "The app crashes");
        assert_eq!(reply.text, GENERIC_REPLY);
        assert_eq!(reply.source, ReplySource::Generic);

        // The generic reply still goes into the prompt
        assert!(backend.chat_calls()[0].messages[1].content.contains(GENERIC_REPLY));
    }

    #[test]
    fn test_empty_model_reply_returns_macro() {
        let (_, g) = generator(FakeLlmBackend::replies(vec![Ok(LlmResponse::text("   "))]));
        let reply = g.generate(Intent::RefundRequest, "refund");
        assert_eq!(reply.source, ReplySource::Macro);
        assert!(!reply.text.is_empty());
    }

    #[test]
    fn test_word_band() {
        let text = vec!["word"; 175].join(" ");
        let (_, g) = generator(FakeLlmBackend::always_reply(text));
        let reply = g.generate(Intent::RefundRequest, "refund");
        assert_eq!(reply.word_count(), 175);
        assert!(reply.within_word_band());

        assert_eq!(word_count("  one\ttwo\nthree  "), 3);
    }

    #[test]
    fn test_blank_macro_and_empty_model_reply_give_generic() {
        let macros = MacroBook::parse(r#"{"macros": [{"intent": "refund_request", "response": ""}]}"#).unwrap();
        let g = ResponseGenerator::new(
            Arc::new(FakeLlmBackend::replies(vec![Ok(LlmResponse::empty())])),
            Arc::new(macros),
            SamplingParams::default(),
        );

        let reply = g.generate(Intent::RefundRequest, "I want a refund");
        assert_eq!(reply.text, GENERIC_REPLY);
        assert_eq!(reply.source, ReplySource::Generic);
    }
}
