//! Prompt-based intent classifier
//!
//! Asks the model for a single label. Any failure, an empty reply or a reply
//! that is not one of the configured labels drops to the keyword heuristic,
//! then to the default intent.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::intent::{keyword_match, Intent};
use crate::llm::{ChatMessage, ChatRequest, LlmBackend, SamplingParams};

/// Which tier produced the intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationMethod {
    /// Nearest precomputed sample
    Similarity,
    /// Model reply parsed as a label
    Model,
    /// Keyword heuristic after a model failure
    Keyword,
    /// Nothing matched
    Default,
}

/// Resolved intent plus the tier that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub method: ClassificationMethod,
}

pub struct PromptClassifier {
    backend: Arc<dyn LlmBackend>,
    intents: Vec<Intent>,
    sampling: SamplingParams,
}

impl PromptClassifier {
    pub fn new(backend: Arc<dyn LlmBackend>, intents: Vec<Intent>, sampling: SamplingParams) -> Self {
        Self {
            backend,
            intents,
            sampling,
        }
    }

    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }

    /// System instruction enumerating the labels in configured order
    pub fn system_prompt(&self) -> String {
        let labels: Vec<&str> = self.intents.iter().map(Intent::as_label).collect();
        format!(
            "Classify the following customer support query into one of the intents: {}. \
             Respond ONLY with the intent label.",
            labels.join(", ")
        )
    }

    pub fn classify(&self, query: &str) -> Classification {
        let request = ChatRequest {
            messages: vec![ChatMessage::system(self.system_prompt()), ChatMessage::user(query)],
            sampling: self.sampling,
        };

        match self.backend.chat(&request) {
            Ok(response) => match response.trimmed() {
                Some(label) => match label.parse::<Intent>() {
                    Ok(intent) => {
                        debug!("Model classified query as {}", intent);
                        return Classification {
                            intent,
                            method: ClassificationMethod::Model,
                        };
                    }
                    Err(e) => warn!("Model returned an unusable label: {}", e),
                },
                None => warn!("Model returned an empty classification"),
            },
            Err(e) => warn!("Error with model intent classification: {}", e),
        }

        self.heuristic(query)
    }

    /// Keyword tier, then the default intent
    pub fn heuristic(&self, query: &str) -> Classification {
        match keyword_match(query, &self.intents) {
            Some(intent) => Classification {
                intent,
                method: ClassificationMethod::Keyword,
            },
            None => Classification {
                intent: Intent::DEFAULT,
                method: ClassificationMethod::Default,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FakeLlmBackend, LlmError, LlmResponse};

    fn classifier(backend: FakeLlmBackend) -> (Arc<FakeLlmBackend>, PromptClassifier) {
        let backend = Arc::new(backend);
        let classifier = PromptClassifier::new(backend.clone(), Intent::ALL.to_vec(), SamplingParams::default());
        (backend, classifier)
    }

    #[test]
    fn test_model_label_is_used() {
        let (_, c) = classifier(FakeLlmBackend::always_reply("  password_reset\n"));
        let result = c.classify("I forgot my password.");
        assert_eq!(result.intent, Intent::PasswordReset);
        assert_eq!(result.method, ClassificationMethod::Model);
    }

    #[test]
    fn test_request_shape() {
        let (backend, c) = classifier(FakeLlmBackend::always_reply("bug_report"));
        c.classify("I found a bug in your app.");

        let calls = backend.chat_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].messages.len(), 2);
        assert_eq!(calls[0].messages[0].role, "system");
        assert!(calls[0].messages[0].content.contains("invoice_request, refund_request"));
        assert!(calls[0].messages[0].content.ends_with("Respond ONLY with the intent label."));
        assert_eq!(calls[0].messages[1], ChatMessage::user("I found a bug in your app."));
        assert_eq!(calls[0].sampling, SamplingParams::default());
    }

    #[test]
    fn test_model_error_falls_back_to_keywords() {
        let (_, c) = classifier(FakeLlmBackend::always_error(LlmError::HttpError("API error".into())));
        let result = c.classify("I want a refund for my last purchase.");
        assert_eq!(result.intent, Intent::RefundRequest);
        assert_eq!(result.method, ClassificationMethod::Keyword);
    }

    #[test]
    fn test_model_error_without_keyword_is_default() {
        let (_, c) = classifier(FakeLlmBackend::always_error(LlmError::Timeout(60)));
        let result = c.classify("I have a question.");
        assert_eq!(result.intent, Intent::GeneralInquiry);
        assert_eq!(result.method, ClassificationMethod::Default);
    }

    #[test]
    fn test_empty_reply_falls_back() {
        let (_, c) = classifier(FakeLlmBackend::replies(vec![Ok(LlmResponse::empty())]));
        let result = c.classify("My payment failed.");
        assert_eq!(result.intent, Intent::PaymentIssue);
        assert_eq!(result.method, ClassificationMethod::Keyword);
    }

    #[test]
    fn test_unknown_label_falls_back() {
        let (_, c) = classifier(FakeLlmBackend::always_reply("The intent is: refund"));
        let result = c.classify("Cancel my subscription.");
        assert_eq!(result.intent, Intent::SubscriptionCancellation);
        assert_eq!(result.method, ClassificationMethod::Keyword);
    }

    #[test]
    fn test_heuristic_scans_configured_intents_only() {
        let backend = Arc::new(FakeLlmBackend::always_error(LlmError::Disabled));
        let c = PromptClassifier::new(backend, vec![Intent::GeneralInquiry], SamplingParams::default());
        assert_eq!(c.classify("refund please").intent, Intent::GeneralInquiry);
        assert_eq!(c.system_prompt().matches('_').count(), 1);
    }
}
