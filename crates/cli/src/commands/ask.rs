//! Ask command handler.

use super::build_engine;
use clap::Args;
use umrah_core::{config::AppConfig, AppResult};
use umrah_knowledge::RagAnswer;

/// Ask a question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Number of chunks to retrieve
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Answer without context if the grounded model call fails
    #[arg(long)]
    pub allow_ungrounded: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let mut config = config.clone();
        if let Some(top_k) = self.top_k {
            config.retrieval.top_k = top_k;
        }
        if self.allow_ungrounded {
            config.retrieval.ungrounded_fallback = true;
        }
        config.validate()?;

        let engine = build_engine(&config)?;
        let answer = engine.ask(&self.question).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&answer)?);
        } else {
            print_answer(&answer);
        }

        Ok(())
    }
}

fn print_answer(answer: &RagAnswer) {
    println!("{}", answer.answer);

    if answer.ungrounded {
        println!();
        println!("(Answered without the knowledge base; no sources were used.)");
        return;
    }

    if answer.sources.is_empty() {
        return;
    }

    println!();
    println!("Sources:");
    for (i, source) in answer.sources.iter().enumerate() {
        println!("  [{}] {}", i + 1, source.attribution());
        println!("      {}", source.excerpt.replace('\n', " "));
    }
}
