//! Stats command handler.
//!
//! Reads the persisted index without building anything.

use clap::Args;
use umrah_core::{config::AppConfig, AppError, AppResult};
use umrah_knowledge::VectorIndex;

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let path = config.index_file();
        let index = VectorIndex::restore(&path).map_err(|e| {
            if e.is_index_not_found() {
                AppError::Knowledge(format!(
                    "No index at {}. Run 'umrah build' first.",
                    path.display()
                ))
            } else {
                e
            }
        })?;
        let stats = index.stats();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Index:       {}", path.display());
        println!("Embeddings:  {}", stats.fingerprint);
        println!("Chunks:      {}", stats.chunk_count);
        for (doc_type, count) in &stats.by_type {
            println!("  {:<18} {}", doc_type, count);
        }

        Ok(())
    }
}
