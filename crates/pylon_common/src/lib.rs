//! Pylon Common - intent classification and reply drafting for support messages
//!
//! Pipeline: classify (embedding similarity or model prompt) -> expand the
//! intent's macro with the model -> deliver to the conversation. Every model
//! or messaging failure degrades to the next cheaper tier.

pub mod artifacts;
pub mod classifier;
pub mod delivery;
pub mod generator;
pub mod intent;
pub mod llm;
pub mod pipeline;
pub mod samples;
pub mod settings;
pub mod similarity;

pub use artifacts::{MacroBook, ModelConfig, GENERIC_REPLY};
pub use classifier::{Classification, ClassificationMethod, PromptClassifier};
pub use delivery::{
    DeliveryAdapter, DeliveryOutcome, IntercomClient, MessageKind, MessagingTransport,
    RecordingTransport, ReplyOptions, SenderRole,
};
pub use generator::{GeneratedReply, ReplySource, ResponseGenerator};
pub use intent::Intent;
pub use llm::{FakeLlmBackend, HttpOpenAiBackend, LlmBackend, LlmError};
pub use pipeline::{HandledQuery, PipelineError, SupportPipeline};
pub use settings::PylonSettings;
pub use similarity::SimilarityMatcher;
