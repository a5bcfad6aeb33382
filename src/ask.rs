//! The `curb ask` command: one retrieval + synthesis round trip from the CLI.

use anyhow::Result;

use crate::answer;
use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::retrieve::{self, Retrieval};

pub async fn run_ask(config: &Config, query: &str) -> Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("query must not be empty");
    }

    let embedder = embedding::create_embedding_provider(&config.embedding)?;
    let chat = embedding::create_chat_provider(&config.chat)?;
    let pool = db::connect(config).await?;

    println!("generating embedding for {:?}", query);
    let result = retrieve::retrieve(&pool, embedder.as_ref(), config.retrieval.top_k, query).await;

    let response = match result {
        Ok(Retrieval::NoMatches) => {
            println!("no database results found");
            answer::NO_MATCHES_ANSWER.to_string()
        }
        Ok(Retrieval::Matches(trucks)) => {
            println!("retrieving chat response...");
            answer::synthesize(chat.as_ref(), &trucks, query).await?
        }
        Err(e) => {
            pool.close().await;
            return Err(e);
        }
    };

    pool.close().await;
    println!("{}", response);
    Ok(())
}
