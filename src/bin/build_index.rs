use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use interview_coach::{
    config::{self, get_config},
    embedding::get_embedding_client,
    ingest::{chunk_text, read_document_text},
    logging,
    qdrant::{KnowledgePoint, QdrantService, compute_chunk_hash},
};
use walkdir::WalkDir;

/// Embed a directory of interview guides into the knowledge collection used for answers.
///
/// Point ids are derived from each chunk's hash, so running it again over the same files
/// overwrites the existing points rather than duplicating them.
#[derive(Parser)]
#[command(name = "build-index")]
struct Cli {
    /// Directory scanned recursively for `.txt`, `.md` and `.pdf` files.
    root: PathBuf,
    /// Collection to write to (defaults to `QDRANT_COLLECTION_NAME`).
    #[arg(long)]
    collection: Option<String>,
    /// Number of chunks embedded per provider request.
    #[arg(long, default_value_t = 32)]
    batch_size: usize,
    /// Chunk and dedupe only; skip embedding and upload.
    #[arg(long)]
    dry_run: bool,
}

const SUPPORTED_EXTENSIONS: [&str; 4] = ["txt", "md", "markdown", "pdf"];

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn collect_documents(root: &Path) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if entry.file_type().is_file() && is_supported(entry.path()) {
            documents.push(entry.into_path());
        }
    }
    Ok(documents)
}

struct PendingChunk {
    text: String,
    chunk_hash: String,
    source_uri: String,
    doc_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_config();
    let config = get_config();
    logging::init_tracing(config);

    if cli.batch_size == 0 {
        bail!("--batch-size must be greater than zero");
    }
    let collection = cli
        .collection
        .clone()
        .unwrap_or_else(|| config.qdrant_collection_name.clone());

    let documents = collect_documents(&cli.root)?;
    if documents.is_empty() {
        bail!("No .txt, .md or .pdf files found under {}", cli.root.display());
    }
    tracing::info!(documents = documents.len(), root = %cli.root.display(), "Collected knowledge documents");

    let mut seen = HashSet::new();
    let mut pending = Vec::new();
    let mut skipped_duplicates = 0_usize;
    for path in &documents {
        let text = match read_document_text(path).await {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "Skipping unreadable document");
                continue;
            }
        };
        let chunks = chunk_text(&text, config.cv_chunk_size, config.cv_chunk_overlap)
            .with_context(|| format!("Failed to chunk {}", path.display()))?;
        let doc_id = uuid::Uuid::new_v4().to_string();
        for chunk in chunks {
            let chunk_hash = compute_chunk_hash(&chunk);
            if !seen.insert(chunk_hash.clone()) {
                skipped_duplicates += 1;
                continue;
            }
            pending.push(PendingChunk {
                text: chunk,
                chunk_hash,
                source_uri: path.display().to_string(),
                doc_id: doc_id.clone(),
            });
        }
    }
    tracing::info!(chunks = pending.len(), skipped_duplicates, "Prepared chunks");

    if cli.dry_run {
        println!(
            "{} chunks ready ({} duplicates skipped); dry run, nothing uploaded",
            pending.len(),
            skipped_duplicates
        );
        return Ok(());
    }

    let store = QdrantService::new(&config.qdrant_url, config.qdrant_api_key.clone())
        .context("Failed to construct Qdrant client")?;
    store
        .create_collection_if_not_exists(&collection, config.embedding_dimension as u64)
        .await
        .with_context(|| format!("Failed to ensure collection {collection}"))?;

    let embedder = get_embedding_client(config);
    let mut inserted = 0_usize;
    for batch in pending.chunks(cli.batch_size) {
        let vectors = embedder
            .generate_embeddings(batch.iter().map(|chunk| chunk.text.clone()).collect())
            .await
            .context("Embedding request failed")?;
        if vectors.len() != batch.len() {
            bail!(
                "Embedding provider returned {} vectors for {} chunks",
                vectors.len(),
                batch.len()
            );
        }
        if let Some(vector) = vectors.iter().find(|v| v.len() != config.embedding_dimension) {
            bail!(
                "Embedding dimension {} does not match EMBEDDING_DIMENSION={}",
                vector.len(),
                config.embedding_dimension
            );
        }

        let points = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| KnowledgePoint {
                text: chunk.text.clone(),
                chunk_hash: chunk.chunk_hash.clone(),
                source_uri: Some(chunk.source_uri.clone()),
                doc_id: chunk.doc_id.clone(),
                vector,
            })
            .collect();
        let summary = store
            .index_points(&collection, points)
            .await
            .with_context(|| format!("Failed to upsert into {collection}"))?;
        inserted += summary.inserted;
        tracing::debug!(inserted, "Uploaded batch");
    }

    println!(
        "Indexed {inserted} chunks from {} documents into '{collection}' ({skipped_duplicates} duplicates skipped)",
        documents.len()
    );
    Ok(())
}
