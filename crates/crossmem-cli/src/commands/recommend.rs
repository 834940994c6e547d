use clap::Parser;
use crossmem::MemoryEngine;

use crate::error::CliResult;
use crate::output::{OutputFormat, print_json};

#[derive(Parser)]
pub struct RecommendCommand {
    #[clap(help = "Session identifier")]
    pub session: String,
}

impl RecommendCommand {
    pub async fn execute(&self, engine: &MemoryEngine, format: OutputFormat) -> CliResult<()> {
        let model = engine.recommend_model_for_context(&self.session).await?;
        let profile = engine.model_profile(&model);

        match format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "session_id": self.session,
                "model": model,
                "profile": profile,
            }))?,
            OutputFormat::Table => {
                println!("Recommended model for {}: {model}", self.session);
                println!(
                    "Context window: {} tokens, tools: {}, images: {}",
                    profile.context_window, profile.supports_tools, profile.supports_images
                );
            }
        }

        Ok(())
    }
}
