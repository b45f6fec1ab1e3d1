//! Startup artifacts - intent enumeration and canned macros
//!
//! Both are loaded once when the pipeline is built and never mutated.
//! A missing or malformed file is fatal for the process.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::intent::Intent;

/// Reply used when no macro exists for an intent
pub const GENERIC_REPLY: &str = "Thank you for contacting support. How can we help you?";

/// Model configuration: the ordered intent enumeration
///
/// Order matters: it is the order intents are listed in the classification
/// prompt and the order the keyword heuristic scans them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub intents: Vec<Intent>,
}

impl ModelConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read model config {}", path.display()))?;
        let config: ModelConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse model config {}", path.display()))?;

        if config.intents.is_empty() {
            anyhow::bail!("Model config {} lists no intents", path.display());
        }

        Ok(config)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            intents: Intent::ALL.to_vec(),
        }
    }
}

/// One canned reply
#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub intent: Intent,
    pub response: String,
}

#[derive(Deserialize)]
struct RawMacroFile {
    macros: Vec<RawMacro>,
}

#[derive(Deserialize)]
struct RawMacro {
    intent: String,
    response: String,
}

/// The macro set; may omit intents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroBook {
    macros: Vec<Macro>,
}

impl MacroBook {
    pub fn new(macros: Vec<Macro>) -> Self {
        Self { macros }
    }

    /// Load `{"macros": [{"intent", "response"}]}`
    ///
    /// Entries whose label is not a known intent could never be looked up,
    /// so they are dropped with a warning. Blank responses are dropped the
    /// same way so the generic reply applies.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read macros {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse macros {}", path.display()))
    }

    pub fn parse(json: &str) -> Result<Self> {
        let raw: RawMacroFile = serde_json::from_str(json)?;

        let macros = raw
            .macros
            .into_iter()
            .filter_map(|m| match m.intent.parse::<Intent>() {
                Ok(intent) if m.response.trim().is_empty() => {
                    warn!("Skipping macro for {}: empty response", intent);
                    None
                }
                Ok(intent) => Some(Macro {
                    intent,
                    response: m.response,
                }),
                Err(e) => {
                    warn!("Skipping macro: {}", e);
                    None
                }
            })
            .collect();

        Ok(Self { macros })
    }

    /// First non-blank macro for the intent
    pub fn lookup(&self, intent: Intent) -> Option<&str> {
        self.macros
            .iter()
            .find(|m| m.intent == intent && !m.response.trim().is_empty())
            .map(|m| m.response.as_str())
    }

    /// Macro text, or the generic reply when the intent has none
    pub fn reply_for(&self, intent: Intent) -> &str {
        self.lookup(intent).unwrap_or(GENERIC_REPLY)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_model_config_keeps_file_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"intents": ["payment_issue", "refund_request", "general_inquiry"]}}"#).unwrap();

        let config = ModelConfig::load(file.path()).unwrap();
        assert_eq!(
            config.intents,
            vec![Intent::PaymentIssue, Intent::RefundRequest, Intent::GeneralInquiry]
        );
    }

    #[test]
    fn test_model_config_rejects_unknown_intent() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"intents": ["refund_request", "time_travel"]}}"#).unwrap();
        assert!(ModelConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_model_config_rejects_empty_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"intents": []}}"#).unwrap();
        assert!(ModelConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_model_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read model config"));
    }

    #[test]
    fn test_macro_lookup_and_generic_fallback() {
        let book = MacroBook::parse(
            r#"{"macros": [
                {"intent": "refund_request", "response": "We can help with your refund."},
                {"intent": "refund_request", "response": "Shadowed duplicate."}
            ]}"#,
        )
        .unwrap();

        assert_eq!(book.lookup(Intent::RefundRequest), Some("We can help with your refund."));
        assert_eq!(book.lookup(Intent::BugReport), None);
        assert_eq!(book.reply_for(Intent::BugReport), GENERIC_REPLY);
    }

    #[test]
    fn test_macro_with_unknown_intent_is_skipped() {
        let book = MacroBook::parse(
            r#"{"macros": [
                {"intent": "mystery", "response": "??"},
                {"intent": "bug_report", "response": "Thanks for the report."}
            ]}"#,
        )
        .unwrap();

        assert_eq!(book.len(), 1);
        assert_eq!(book.reply_for(Intent::BugReport), "Thanks for the report.");
    }

    #[test]
    fn test_blank_macro_counts_as_missing() {
        let book = MacroBook::parse(
            r#"{"macros": [
                {"intent": "refund_request", "response": ""},
                {"intent": "bug_report", "response": "  \n "}
            ]}"#,
        )
        .unwrap();
        assert!(book.is_empty());
        assert_eq!(book.reply_for(Intent::RefundRequest), GENERIC_REPLY);

        let built = MacroBook::new(vec![
            Macro {
                intent: Intent::BugReport,
                response: " ".to_string(),
            },
            Macro {
                intent: Intent::BugReport,
                response: "Thanks for the report.".to_string(),
            },
        ]);
        assert_eq!(built.lookup(Intent::BugReport), Some("Thanks for the report."));
    }

    #[test]
    fn test_macro_file_without_macros_key_is_error() {
        assert!(MacroBook::parse(r#"{"replies": []}"#).is_err());
    }
}
