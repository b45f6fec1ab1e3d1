//! Command implementations for pylonctl

use anyhow::{Context, Result};
use pylon_common::samples::{
    backup_sample_queries, dedup_samples, generate_sample_queries, intent_breakdown, load_sample_queries,
    precompute_sample_embeddings, save_sample_embeddings, save_sample_queries,
};
use pylon_common::{
    FakeLlmBackend, HttpOpenAiBackend, Intent, IntercomClient, LlmBackend, LlmError, MessagingTransport,
    PylonSettings, RecordingTransport, SupportPipeline,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub fn load_settings(path: Option<&Path>) -> Result<PylonSettings> {
    match path {
        Some(path) => PylonSettings::load_from(path),
        None => PylonSettings::load(),
    }
}

/// Model backend: HTTP unless offline; a missing API token is fatal
pub fn build_backend(settings: &PylonSettings, offline: bool) -> Result<Arc<dyn LlmBackend>> {
    if offline {
        warn!("Offline mode: model calls are disabled");
        return Ok(Arc::new(FakeLlmBackend::always_error(LlmError::Disabled)));
    }

    let backend = HttpOpenAiBackend::new(&settings.llm).context("Failed to set up model API client")?;
    Ok(Arc::new(backend))
}

/// Messaging transport: Intercom unless offline
pub fn build_transport(settings: &PylonSettings, offline: bool) -> Result<Arc<dyn MessagingTransport>> {
    if offline {
        return Ok(Arc::new(RecordingTransport::new()));
    }

    if settings.messaging.access_token().is_none() {
        warn!(
            "{} is not set; replies will not be delivered",
            settings.messaging.access_token_env
        );
    }

    let client = IntercomClient::new(&settings.messaging).context("Failed to set up messaging client")?;
    Ok(Arc::new(client))
}

pub fn build_pipeline(settings: &PylonSettings, offline: bool) -> Result<SupportPipeline> {
    let backend = build_backend(settings, offline)?;
    let transport = build_transport(settings, offline)?;
    SupportPipeline::from_settings(settings, backend, transport)
}

pub fn ask(settings: &PylonSettings, offline: bool, query: &str, conversation_id: &str) -> Result<()> {
    let pipeline = build_pipeline(settings, offline)?;
    let handled = pipeline.handle(query, conversation_id)?;

    let output = serde_json::json!({
        "intent": handled.intent,
        "response": handled.response,
        "classified_by": format!("{:?}", handled.classified_by),
        "reply_source": format!("{:?}", handled.reply_source),
        "delivered": handled.delivery.is_sent(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn generate(settings: &PylonSettings, output: Option<PathBuf>, target: usize, seed: Option<u64>) -> Result<()> {
    let path = output.unwrap_or_else(|| settings.paths.sample_queries.clone());
    let existing = backup_sample_queries(&path)?;
    if !existing.is_empty() {
        println!("Backed up {} old queries", existing.len());
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let samples = generate_sample_queries(&mut rng, &Intent::ALL, &existing, target);
    save_sample_queries(&path, &samples)?;

    println!("Generated {} unique sample queries in {}", samples.len(), path.display());
    println!("Breakdown by intent:");
    for (intent, count) in intent_breakdown(&samples) {
        println!("  {}: {}", intent, count);
    }
    Ok(())
}

pub fn dedup(settings: &PylonSettings, input: Option<PathBuf>) -> Result<()> {
    let path = input.unwrap_or_else(|| settings.paths.sample_queries.clone());
    let samples = load_sample_queries(&path)?;
    let before = samples.len();

    let unique = dedup_samples(samples);
    save_sample_queries(&path, &unique)?;

    println!("Deduplicated: {} -> {} unique queries.", before, unique.len());
    Ok(())
}

pub fn embed(
    settings: &PylonSettings,
    offline: bool,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    dedup: bool,
) -> Result<()> {
    if offline {
        anyhow::bail!("Embedding samples needs the model API; drop --offline");
    }

    let input = input.unwrap_or_else(|| settings.paths.sample_queries.clone());
    let output = output.unwrap_or_else(|| settings.paths.sample_embeddings.clone());

    let mut samples = load_sample_queries(&input)?;
    if dedup {
        let before = samples.len();
        samples = dedup_samples(samples);
        info!("Deduplicated {} -> {} samples", before, samples.len());
    }

    let backend = build_backend(settings, offline)?;
    info!("Embedding {} samples from {}", samples.len(), input.display());
    let embedded = precompute_sample_embeddings(backend.as_ref(), &samples)?;
    save_sample_embeddings(&output, &embedded)?;

    println!("Wrote {} sample embeddings to {}", embedded.len(), output.display());
    Ok(())
}
