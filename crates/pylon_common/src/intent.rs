//! Support intents - the closed set of categories a query resolves to
//!
//! Every label, keyword phrase and macro key derives from one exhaustive
//! match, so adding an intent is a compile error until all mappings exist.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Customer-support intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    InvoiceRequest,
    RefundRequest,
    EmailChange,
    PasswordReset,
    AccountClosure,
    FeatureRequest,
    BugReport,
    SubscriptionUpgrade,
    SubscriptionCancellation,
    DeliveryStatus,
    PaymentIssue,
    /// Catch-all when nothing else applies
    GeneralInquiry,
}

impl Intent {
    /// All intents in canonical order
    pub const ALL: [Intent; 12] = [
        Intent::InvoiceRequest,
        Intent::RefundRequest,
        Intent::EmailChange,
        Intent::PasswordReset,
        Intent::AccountClosure,
        Intent::FeatureRequest,
        Intent::BugReport,
        Intent::SubscriptionUpgrade,
        Intent::SubscriptionCancellation,
        Intent::DeliveryStatus,
        Intent::PaymentIssue,
        Intent::GeneralInquiry,
    ];

    /// Label used when every other strategy comes up empty
    pub const DEFAULT: Intent = Intent::GeneralInquiry;

    /// Wire label (e.g. "refund_request")
    pub fn as_label(&self) -> &'static str {
        match self {
            Intent::InvoiceRequest => "invoice_request",
            Intent::RefundRequest => "refund_request",
            Intent::EmailChange => "email_change",
            Intent::PasswordReset => "password_reset",
            Intent::AccountClosure => "account_closure",
            Intent::FeatureRequest => "feature_request",
            Intent::BugReport => "bug_report",
            Intent::SubscriptionUpgrade => "subscription_upgrade",
            Intent::SubscriptionCancellation => "subscription_cancellation",
            Intent::DeliveryStatus => "delivery_status",
            Intent::PaymentIssue => "payment_issue",
            Intent::GeneralInquiry => "general_inquiry",
        }
    }

    /// Phrase searched for by the keyword heuristic (label with spaces)
    pub fn keyword_phrase(&self) -> &'static str {
        match self {
            Intent::InvoiceRequest => "invoice request",
            Intent::RefundRequest => "refund request",
            Intent::EmailChange => "email change",
            Intent::PasswordReset => "password reset",
            Intent::AccountClosure => "account closure",
            Intent::FeatureRequest => "feature request",
            Intent::BugReport => "bug report",
            Intent::SubscriptionUpgrade => "subscription upgrade",
            Intent::SubscriptionCancellation => "subscription cancellation",
            Intent::DeliveryStatus => "delivery status",
            Intent::PaymentIssue => "payment issue",
            Intent::GeneralInquiry => "general inquiry",
        }
    }

    /// Single-word and short cues tried after the full phrase
    pub fn keyword_cues(&self) -> &'static [&'static str] {
        match self {
            Intent::InvoiceRequest => &["invoice", "receipt", "billing statement"],
            Intent::RefundRequest => &["refund", "money back"],
            Intent::EmailChange => &["email", "e-mail"],
            Intent::PasswordReset => &["password"],
            Intent::AccountClosure => &["close my account", "delete my account", "deactivate"],
            Intent::FeatureRequest => &["feature"],
            Intent::BugReport => &["bug", "crash", "glitch"],
            Intent::SubscriptionUpgrade => &["upgrade", "premium"],
            Intent::SubscriptionCancellation => &["cancel"],
            Intent::DeliveryStatus => &["where is my order", "delivery", "shipment", "tracking"],
            Intent::PaymentIssue => &["payment", "charged"],
            Intent::GeneralInquiry => &[],
        }
    }

    fn phrase_in(&self, lower_query: &str) -> bool {
        lower_query.contains(self.keyword_phrase())
    }

    fn cue_in(&self, lower_query: &str) -> bool {
        self.keyword_cues().iter().any(|cue| lower_query.contains(cue))
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Error for a label outside the intent set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown intent label: '{0}'")]
pub struct UnknownIntent(pub String);

impl FromStr for Intent {
    type Err = UnknownIntent;

    /// Exact label match after trimming; no fuzzy matching
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        Intent::ALL
            .iter()
            .copied()
            .find(|intent| intent.as_label() == label)
            .ok_or_else(|| UnknownIntent(label.to_string()))
    }
}

/// Keyword heuristic, case-insensitive, in two passes over the given order:
/// first intent whose full phrase occurs in the query, otherwise first
/// intent with a matching cue. A phrase anywhere beats every cue.
pub fn keyword_match(query: &str, intents: &[Intent]) -> Option<Intent> {
    let lower = query.to_lowercase();
    intents
        .iter()
        .copied()
        .find(|intent| intent.phrase_in(&lower))
        .or_else(|| intents.iter().copied().find(|intent| intent.cue_in(&lower)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip_through_from_str() {
        for intent in Intent::ALL {
            assert_eq!(intent.as_label().parse::<Intent>(), Ok(intent));
        }
    }

    #[test]
    fn test_keyword_phrase_is_label_with_spaces() {
        for intent in Intent::ALL {
            assert_eq!(intent.keyword_phrase(), intent.as_label().replace('_', " "));
        }
    }

    #[test]
    fn test_from_str_trims_but_is_exact() {
        assert_eq!(" refund_request\n".parse::<Intent>(), Ok(Intent::RefundRequest));
        assert!("Refund_Request".parse::<Intent>().is_err());
        assert!("refund".parse::<Intent>().is_err());
        assert!("".parse::<Intent>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case_label() {
        let json = serde_json::to_string(&Intent::SubscriptionCancellation).unwrap();
        assert_eq!(json, "\"subscription_cancellation\"");

        let parsed: Intent = serde_json::from_str("\"bug_report\"").unwrap();
        assert_eq!(parsed, Intent::BugReport);
    }

    #[test]
    fn test_keyword_match_first_in_order_wins() {
        let query = "Billing: PAYMENT ISSUE and a refund request";
        assert_eq!(keyword_match(query, &Intent::ALL), Some(Intent::RefundRequest));

        let reversed: Vec<Intent> = Intent::ALL.iter().rev().copied().collect();
        assert_eq!(keyword_match(query, &reversed), Some(Intent::PaymentIssue));
    }

    #[test]
    fn test_keyword_match_uses_cues() {
        assert_eq!(
            keyword_match("I want a refund for my last purchase.", &Intent::ALL),
            Some(Intent::RefundRequest)
        );
        assert_eq!(keyword_match("Cancel my subscription.", &Intent::ALL), Some(Intent::SubscriptionCancellation));
        assert_eq!(keyword_match("Where is my order?", &Intent::ALL), Some(Intent::DeliveryStatus));
    }

    #[test]
    fn test_phrase_beats_earlier_cue() {
        // "invoice" is a cue for an earlier intent; the payment phrase still wins
        assert_eq!(
            keyword_match("I have a payment issue with my invoice", &Intent::ALL),
            Some(Intent::PaymentIssue)
        );
        assert_eq!(
            keyword_match("Need a refund, also this is a bug report", &Intent::ALL),
            Some(Intent::BugReport)
        );
        assert_eq!(keyword_match("My invoice payment failed", &Intent::ALL), Some(Intent::InvoiceRequest));
    }

    #[test]
    fn test_keyword_match_no_hit() {
        assert_eq!(keyword_match("I have a question.", &Intent::ALL), None);
        assert_eq!(keyword_match("", &Intent::ALL), None);
    }

    #[test]
    fn test_general_inquiry_has_no_cues() {
        assert!(Intent::GeneralInquiry.keyword_cues().is_empty());
        for intent in Intent::ALL {
            for cue in intent.keyword_cues() {
                assert_eq!(*cue, cue.to_lowercase(), "cue for {} must be lowercase", intent);
            }
        }
    }

    #[test]
    fn test_keyword_match_respects_configured_subset() {
        let query = "please file a bug report";
        assert_eq!(keyword_match(query, &[Intent::BugReport]), Some(Intent::BugReport));
        assert_eq!(keyword_match(query, &[Intent::PaymentIssue]), None);
    }
}
