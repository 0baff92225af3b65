//! Route command handler: shows intent, filter and template for a question.

use clap::Args;
use umrah_core::AppResult;

/// Show how a question would be routed
#[derive(Args, Debug)]
pub struct RouteCommand {
    /// The question to classify
    pub question: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RouteCommand {
    pub fn execute(&self) -> AppResult<()> {
        let plan = umrah_knowledge::plan(&self.question);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            println!("Intent:   {}", plan.intent);
            println!("Filter:   {}", plan.filter);
            println!("Template: {}", plan.template_id);
        }

        Ok(())
    }
}
