//! Embedding backfill for foods that do not yet have a vector.
//!
//! Idempotent and resumable: only rows with a NULL embedding are selected,
//! each successful write is committed on its own, and an interrupted run
//! picks up where it left off. A provider failure aborts the pass naming the
//! food that failed; earlier writes stay.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};

pub async fn run_embed_pending(config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        anyhow::bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = embedding::create_embedding_provider(&config.embedding)?;
    let pool = db::connect(config).await?;

    let embedded = backfill(&pool, provider.as_ref()).await?;

    println!("embed pending");
    println!("  embedded: {}", embedded);
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Clear every stored vector and re-embed all foods. Useful after switching
/// embedding models or dimensions.
pub async fn run_embed_rebuild(config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        anyhow::bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = embedding::create_embedding_provider(&config.embedding)?;
    let pool = db::connect(config).await?;

    sqlx::query("UPDATE foods SET embedding = NULL")
        .execute(&pool)
        .await?;
    println!("embed rebuild: cleared existing embeddings");

    let embedded = backfill(&pool, provider.as_ref()).await?;

    println!("embed rebuild");
    println!("  embedded: {}", embedded);
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Embed every food with a NULL embedding, one request per food, in id
/// order. Returns the number of rows written.
pub async fn backfill(pool: &SqlitePool, provider: &dyn EmbeddingProvider) -> Result<u64> {
    let rows = sqlx::query("SELECT id, name FROM foods WHERE embedding IS NULL ORDER BY id")
        .fetch_all(pool)
        .await?;

    let mut embedded = 0u64;
    for row in &rows {
        let id: i64 = row.get("id");
        let name: String = row.get("name");

        println!("generating embedding for {}", name);

        let vector = provider
            .embed(&name)
            .await
            .with_context(|| format!("failed to generate embedding for {:?}", name))?;

        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE foods SET embedding = ?, updated_at = ? WHERE id = ?")
            .bind(embedding::vec_to_blob(&vector))
            .bind(now)
            .bind(id)
            .execute(pool)
            .await
            .with_context(|| format!("failed to store embedding for {:?}", name))?;

        embedded += 1;
    }

    Ok(embedded)
}
