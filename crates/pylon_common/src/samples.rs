//! Sample queries and their embedding cache
//!
//! Sample queries are labeled examples. The offline `generate` step builds
//! them from per-intent templates, and `embed` turns them into the sample
//! embeddings the similarity matcher reads at serving time.

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::intent::Intent;
use crate::llm::LlmBackend;

/// Labeled example query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleQuery {
    pub query: String,
    pub intent: Intent,
}

/// Sample query with its precomputed embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleEmbedding {
    pub embedding: Vec<f32>,
    pub intent: Intent,
    pub query: String,
}

pub fn load_sample_queries(path: &Path) -> Result<Vec<SampleQuery>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sample queries {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse sample queries {}", path.display()))
}

pub fn save_sample_queries(path: &Path, samples: &[SampleQuery]) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(samples).context("Failed to serialize sample queries")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

fn dedup_key(query: &str, intent: Intent) -> (String, Intent) {
    (query.trim().to_lowercase(), intent)
}

/// Drop repeated samples, keyed on trimmed lowercase query plus intent.
/// First occurrence wins and order is kept.
pub fn dedup_samples(samples: Vec<SampleQuery>) -> Vec<SampleQuery> {
    let mut seen = HashSet::new();
    samples
        .into_iter()
        .filter(|s| seen.insert(dedup_key(&s.query, s.intent)))
        .collect()
}

/// Per-intent sample counts in canonical intent order
pub fn intent_breakdown(samples: &[SampleQuery]) -> Vec<(Intent, usize)> {
    Intent::ALL
        .iter()
        .map(|&intent| (intent, samples.iter().filter(|s| s.intent == intent).count()))
        .collect()
}

/// `data/sample_queries.json` -> `data/sample_queries_backup.json`
pub fn backup_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sample_queries".to_string());
    path.with_file_name(format!("{}_backup.json", stem))
}

/// Copy an existing sample file next to itself before it is regenerated.
/// Returns the old queries; a missing file has none.
pub fn backup_sample_queries(path: &Path) -> Result<Vec<SampleQuery>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let existing = load_sample_queries(path)?;
    let backup = backup_path(path);
    save_sample_queries(&backup, &existing)?;
    info!("Backed up {} old queries to {}", existing.len(), backup.display());
    Ok(existing)
}

// ============================================================================
// Sample generation
// ============================================================================

/// Size of a generated sample set unless told otherwise
pub const DEFAULT_SAMPLE_TARGET: usize = 2000;

/// Placeholder words and their alternatives, applied key by key in this order
const SUBSTITUTIONS: &[(&str, &[&str])] = &[
    ("invoice", &["invoice", "bill", "statement", "receipt"]),
    ("order", &["order", "purchase", "item", "package"]),
    ("account", &["account", "profile", "user account"]),
    ("email", &["email", "e-mail", "mail address"]),
    ("password", &["password", "passcode", "login password"]),
    ("subscription", &["subscription", "plan", "membership"]),
    ("feature", &["feature", "option", "functionality"]),
    ("payment", &["payment", "transaction", "charge", "billing"]),
    ("delivery", &["delivery", "shipment", "package", "order"]),
    ("bug", &["bug", "issue", "problem", "error"]),
    ("support", &["support", "helpdesk", "customer service"]),
];

const PREFIXES: [&str; 5] = ["", "Hi, ", "Hello, ", "Hey team, ", "Greetings, "];
const SUFFIXES: [&str; 5] = ["", " Thanks!", " Please help.", " ASAP.", " Thank you."];

/// Surface variations applied to every generated query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    Original,
    Lower,
    Upper,
    Capitalize,
    QuestionToBang,
    PeriodToBang,
}

impl Mutation {
    const ALL: [Mutation; 6] = [
        Mutation::Original,
        Mutation::Lower,
        Mutation::Upper,
        Mutation::Capitalize,
        Mutation::QuestionToBang,
        Mutation::PeriodToBang,
    ];

    fn apply(self, text: &str) -> String {
        match self {
            Mutation::Original => text.to_string(),
            Mutation::Lower => text.to_lowercase(),
            Mutation::Upper => text.to_uppercase(),
            Mutation::Capitalize => {
                let mut chars = text.chars();
                match chars.next() {
                    Some(first) => {
                        let mut out: String = first.to_uppercase().collect();
                        out.push_str(&chars.as_str().to_lowercase());
                        out
                    }
                    None => String::new(),
                }
            }
            Mutation::QuestionToBang => text.replace('?', "!"),
            Mutation::PeriodToBang => text.replace('.', "!"),
        }
    }
}

/// Seed phrasings per intent
pub fn intent_templates(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::InvoiceRequest => &[
            "Can I get a copy of my invoice?",
            "Please send me my latest invoice.",
            "Where can I download my billing statement?",
            "I need an invoice for my last payment.",
            "Could you email me my invoice?",
            "How do I get a receipt for my purchase?",
            "Send me the invoice for last month.",
            "I want to see my previous invoices.",
            "Can you provide my billing history?",
            "Where is my invoice for the last order?",
        ],
        Intent::RefundRequest => &[
            "I want a refund for my last purchase.",
            "Can I get my money back?",
            "I was charged incorrectly, please refund.",
            "How do I request a refund?",
            "Refund the payment for my last order.",
            "I need a refund for a duplicate charge.",
            "Please process my refund.",
            "I want to return my order and get a refund.",
            "How long does a refund take?",
            "Refund my recent transaction.",
        ],
        Intent::EmailChange => &[
            "How do I change my email address?",
            "I want to update my email.",
            "My email is wrong, how do I fix it?",
            "Can you change my account email?",
            "I need to use a new email address.",
            "Update my contact email, please.",
            "Change my email to john@example.com.",
            "I want to register a different email.",
            "How do I update my login email?",
            "Switch my account to a new email.",
        ],
        Intent::PasswordReset => &[
            "I forgot my password.",
            "How do I reset my password?",
            "Send me a password reset link.",
            "I can't log in, need to reset password.",
            "Help me recover my password.",
            "I want to change my password.",
            "Forgot my login password.",
            "Reset my account password.",
            "How do I get a new password?",
            "I need to update my password.",
        ],
        Intent::AccountClosure => &[
            "Please close my account.",
            "How do I delete my account?",
            "I want to deactivate my profile.",
            "Remove my account from your system.",
            "Delete my user account.",
            "I no longer need my account, please close it.",
            "Terminate my account.",
            "How do I permanently delete my account?",
            "Please remove all my data and close my account.",
            "I want to opt out and close my account.",
        ],
        Intent::FeatureRequest => &[
            "Can you add this feature?",
            "I have a suggestion for a new feature.",
            "It would be great if you could add...",
            "Is it possible to implement this feature?",
            "I'd like to request a new functionality.",
            "Can you improve the app with this feature?",
            "Please consider adding this option.",
            "Feature request: dark mode.",
            "Can you add multi-language support?",
            "I want a new feature for notifications.",
        ],
        Intent::BugReport => &[
            "I found a bug in your app.",
            "The app crashes when I try to login.",
            "There's an error on the payment page.",
            "I encountered a glitch in the system.",
            "Something isn't working as expected.",
            "I think I discovered a bug.",
            "The app freezes on startup.",
            "Unexpected error message appears.",
            "The download button doesn't work.",
            "I can't submit my form due to a bug.",
        ],
        Intent::SubscriptionUpgrade => &[
            "I want to upgrade my subscription.",
            "How do I get more features?",
            "Can I switch to a higher plan?",
            "Upgrade my account, please.",
            "I want to access premium features.",
            "How do I upgrade my subscription?",
            "Upgrade to the pro plan.",
            "I want to unlock advanced features.",
            "Can I get a business subscription?",
            "How do I move to a better plan?",
        ],
        Intent::SubscriptionCancellation => &[
            "Cancel my subscription.",
            "I want to stop my subscription.",
            "How do I cancel my plan?",
            "Please cancel my account renewal.",
            "I don't want to be billed again.",
            "End my subscription, please.",
            "How do I turn off auto-renewal?",
            "Cancel my premium plan.",
            "I want to unsubscribe from your service.",
            "Stop my monthly subscription.",
        ],
        Intent::DeliveryStatus => &[
            "Where is my order?",
            "What's the status of my delivery?",
            "Has my package shipped yet?",
            "When will my order arrive?",
            "Track my shipment.",
            "I haven't received my order.",
            "Where is my package?",
            "Order tracking shows no update.",
            "My delivery is late.",
            "Can you check my order status?",
        ],
        Intent::PaymentIssue => &[
            "My payment failed.",
            "Why was my payment declined?",
            "I can't complete my payment.",
            "There was an error processing my payment.",
            "My card was charged but order not placed.",
            "Payment didn't go through.",
            "Payment page is not loading.",
            "I was double charged.",
            "How do I fix a payment error?",
            "My payment is pending.",
        ],
        Intent::GeneralInquiry => &[
            "I have a question.",
            "Can you help me with something?",
            "I need assistance.",
            "How do I use your service?",
            "What are your business hours?",
            "Can I speak to a representative?",
            "How do I contact support?",
            "Where can I find your FAQ?",
            "Do you offer live chat?",
            "What services do you provide?",
        ],
    }
}

/// Every way of filling the placeholders a template contains.
/// A template without placeholders yields itself.
pub fn template_combinations(template: &str) -> Vec<String> {
    let mut combos = vec![template.to_string()];
    for &(key, options) in SUBSTITUTIONS.iter().filter(|(key, _)| template.contains(key)) {
        combos = combos
            .iter()
            .flat_map(|partial| options.iter().map(move |option| partial.replace(key, option)))
            .collect();
    }
    combos
}

/// One random template per sample, placeholders filled at random
fn random_samples<R: Rng + ?Sized>(rng: &mut R, intent: Intent, count: usize) -> Vec<SampleQuery> {
    let templates = intent_templates(intent);
    let mut samples = Vec::with_capacity(count);

    for _ in 0..count {
        let Some(template) = templates.choose(rng) else {
            break;
        };
        let mut query = template.to_string();
        for &(key, options) in SUBSTITUTIONS {
            if query.contains(key) {
                if let Some(option) = options.choose(rng) {
                    query = query.replace(key, option);
                }
            }
        }
        samples.push(SampleQuery { query, intent });
    }

    samples
}

/// Exhaustive template x placeholder x prefix x suffix x mutation expansion
fn combinatorial_samples(intent: Intent) -> Vec<SampleQuery> {
    let mut samples = Vec::new();
    for template in intent_templates(intent) {
        for combo in template_combinations(template) {
            for prefix in PREFIXES {
                for suffix in SUFFIXES {
                    let base = format!("{}{}{}", prefix, combo, suffix);
                    let base = base.trim();
                    for mutation in Mutation::ALL {
                        samples.push(SampleQuery {
                            query: mutation.apply(base),
                            intent,
                        });
                    }
                }
            }
        }
    }
    samples
}

/// Up to `needed` mutated copies of `samples` that are not already present
fn mutation_padding(samples: &[SampleQuery], needed: usize) -> Vec<SampleQuery> {
    let mut seen: HashSet<(String, Intent)> =
        samples.iter().map(|s| dedup_key(&s.query, s.intent)).collect();
    let mut extra = Vec::new();

    for sample in samples {
        for mutation in Mutation::ALL {
            if extra.len() >= needed {
                return extra;
            }
            let query = mutation.apply(&sample.query);
            if seen.insert(dedup_key(&query, sample.intent)) {
                extra.push(SampleQuery {
                    query,
                    intent: sample.intent,
                });
            }
        }
    }

    extra
}

/// Build a deduplicated sample set of `target` queries for `intents`
///
/// Random template fills, the full combinatorial expansion and `existing`
/// are merged and deduplicated. A surplus is shuffled and cut to `target`;
/// a shortfall is padded with mutations of what is there, which may still
/// end short. With a seeded `rng` the output is reproducible.
pub fn generate_sample_queries<R: Rng + ?Sized>(
    rng: &mut R,
    intents: &[Intent],
    existing: &[SampleQuery],
    target: usize,
) -> Vec<SampleQuery> {
    let per_intent = target.checked_div(intents.len()).unwrap_or(0);

    let mut queries = Vec::new();
    for &intent in intents {
        queries.extend(random_samples(rng, intent, per_intent));
    }
    for &intent in intents {
        queries.extend(combinatorial_samples(intent));
    }
    queries.extend(existing.iter().cloned());

    let mut unique = dedup_samples(queries);
    info!("Generated {} unique candidate samples", unique.len());

    if unique.len() > target {
        unique.shuffle(rng);
        unique.truncate(target);
    } else if unique.len() < target {
        let extra = mutation_padding(&unique, target - unique.len());
        unique.extend(extra);
    }

    unique
}

/// Load the embedding cache if it exists
///
/// A missing file means the similarity path is disabled, which is not an
/// error. An empty array is returned as `None` for the same reason.
pub fn load_sample_embeddings(path: &Path) -> Result<Option<Vec<SampleEmbedding>>> {
    if !path.exists() {
        info!("No sample embeddings at {}, using prompt classification", path.display());
        return Ok(None);
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sample embeddings {}", path.display()))?;
    let samples: Vec<SampleEmbedding> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse sample embeddings {}", path.display()))?;

    if samples.is_empty() {
        return Ok(None);
    }

    info!("Loaded {} sample embeddings from {}", samples.len(), path.display());
    Ok(Some(samples))
}

pub fn save_sample_embeddings(path: &Path, samples: &[SampleEmbedding]) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string(samples).context("Failed to serialize sample embeddings")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Embed every sample in order. Offline tool: the first failure aborts.
pub fn precompute_sample_embeddings(
    backend: &dyn LlmBackend,
    samples: &[SampleQuery],
) -> Result<Vec<SampleEmbedding>> {
    samples
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            let embedding = backend
                .embed(&sample.query)
                .with_context(|| format!("Failed to embed sample {} ('{}')", i, sample.query))?;
            Ok(SampleEmbedding {
                embedding,
                intent: sample.intent,
                query: sample.query.clone(),
            })
        })
        .collect()
}
