//! Build command handler.

use super::build_engine;
use clap::Args;
use umrah_core::{config::AppConfig, AppResult};
use umrah_knowledge::{IndexOrigin, IngestReport};

/// Ingest source records and persist the index
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Rebuild even if a snapshot exists
    #[arg(long)]
    pub force: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BuildCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing build command (force: {})", self.force);

        let engine = build_engine(config)?;
        let index_path = config.index_file();

        let report = if self.force {
            Some(engine.rebuild().await?)
        } else {
            match engine.initialize().await?.origin {
                IndexOrigin::Built(report) => Some(report),
                IndexOrigin::Restored => None,
            }
        };

        if self.json {
            let output = serde_json::json!({
                "index": index_path.display().to_string(),
                "built": report.is_some(),
                "report": report,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        match report {
            Some(report) => print_report(&report, &index_path.display().to_string()),
            None => println!(
                "Index already present at {} (use --force to rebuild)",
                index_path.display()
            ),
        }

        Ok(())
    }
}

fn print_report(report: &IngestReport, index: &str) {
    println!("Built index at {}", index);
    println!(
        "  Records:   {} received, {} rejected",
        report.records_received, report.rejected
    );
    println!("  Documents: {}", report.documents);
    println!(
        "  Chunks:    {} embedded of {}",
        report.embedded, report.chunks
    );
    if report.embedding_failures > 0 {
        println!("  Skipped:   {} chunks failed to embed", report.embedding_failures);
    }
}
