//! Knowledge base seeding.
//!
//! Reads solved problems from a JSON array or a JSON Lines file, embeds
//! their questions in batches and upserts them into the knowledge store.
//! GSM8K rows (`{"question", "answer"}`) load unchanged because `answer` is
//! accepted as an alias for `solution`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::app::App;
use crate::models::KbEntry;

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    id: Option<u64>,
    question: String,
    #[serde(alias = "answer")]
    solution: String,
}

/// Options for [`run_ingest`].
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Drop and recreate the collection before loading.
    pub recreate: bool,
    /// Overrides `[embedding].batch_size`.
    pub batch_size: Option<usize>,
    /// Parse and count only.
    pub dry_run: bool,
}

/// Parse a JSON array or JSON Lines document into entries.
///
/// Records without an `id` get their zero-based position. Two records that
/// end up with the same id, explicit or positional, are an error.
pub fn parse_records(content: &str) -> Result<Vec<KbEntry>> {
    let raw: Vec<(usize, RawRecord)> = if content.trim_start().starts_with('[') {
        let records: Vec<RawRecord> =
            serde_json::from_str(content).context("Failed to parse JSON array")?;
        records.into_iter().enumerate().collect()
    } else {
        let mut records = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: RawRecord = serde_json::from_str(line)
                .with_context(|| format!("Failed to parse line {}", line_no + 1))?;
            records.push(record);
        }
        records.into_iter().enumerate().collect()
    };

    let mut entries = Vec::with_capacity(raw.len());
    let mut seen: HashMap<u64, usize> = HashMap::with_capacity(raw.len());
    for (position, record) in raw {
        if record.question.trim().is_empty() {
            bail!("Record {} has an empty question", position + 1);
        }
        let id = record.id.unwrap_or(position as u64);
        if let Some(first) = seen.insert(id, position) {
            bail!(
                "Records {} and {} share id {}",
                first + 1,
                position + 1,
                id
            );
        }
        entries.push(KbEntry {
            id,
            question: record.question,
            solution: record.solution,
        });
    }
    Ok(entries)
}

/// Recreate the collection with the configured vector size and cosine distance.
pub async fn run_init(app: &App) -> Result<()> {
    let dims = app.embedder.dims();
    if dims == 0 {
        bail!("Embedding provider is disabled; cannot size the collection");
    }
    app.store.recreate(dims).await?;
    println!("kb init");
    println!("  collection: {}", app.config.knowledge_store.collection);
    println!("  dims: {}", dims);
    println!("ok");
    Ok(())
}

/// Load `path` into the knowledge store.
pub async fn run_ingest(app: &App, path: &Path, options: &IngestOptions) -> Result<usize> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let entries = parse_records(&content)?;

    if options.dry_run {
        println!("kb ingest {} (dry-run)", path.display());
        println!("  records found: {}", entries.len());
        return Ok(0);
    }

    if entries.is_empty() {
        println!("kb ingest {}", path.display());
        println!("  no records");
        return Ok(0);
    }

    let dims = app.embedder.dims();
    if options.recreate {
        app.store.recreate(dims).await?;
    }

    let batch_size = options
        .batch_size
        .unwrap_or(app.config.embedding.batch_size)
        .max(1);
    let total = entries.len();
    let mut ingested = 0;

    for batch in entries.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|e| e.question.clone()).collect();
        let vectors = app.embedder.embed(&texts).await?;

        if let Some(v) = vectors.iter().find(|v| v.len() != dims) {
            bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                dims,
                v.len()
            );
        }

        let points: Vec<(KbEntry, Vec<f32>)> = batch.iter().cloned().zip(vectors).collect();
        app.store.upsert(&points).await?;
        ingested += points.len();
        println!("  ingested {}/{}", ingested, total);
    }

    println!("kb ingest {}", path.display());
    println!("  records: {}", total);
    println!("  upserted: {}", ingested);
    println!("  collection size: {}", app.store.count().await?);
    println!("ok");
    Ok(ingested)
}
