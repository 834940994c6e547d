use clap::Parser;
use crossmem::MemoryEngine;

use crate::error::CliResult;
use crate::output::{OutputFormat, print_json};

#[derive(Parser)]
pub struct SimilarityCommand {
    #[clap(help = "First session")]
    pub a: String,

    #[clap(help = "Second session")]
    pub b: String,
}

impl SimilarityCommand {
    pub async fn execute(&self, engine: &MemoryEngine, format: OutputFormat) -> CliResult<()> {
        let similarity = engine.calculate_context_similarity(&self.a, &self.b).await;

        match format {
            OutputFormat::Json => print_json(&similarity)?,
            OutputFormat::Table => {
                println!(
                    "Similarity of {} and {}: {:.2}",
                    self.a, self.b, similarity.similarity_score
                );
                println!("Shared topics: {}", list_or_dash(&similarity.shared_topics));
                println!("Common tools: {}", list_or_dash(&similarity.common_tools));
            }
        }

        Ok(())
    }
}

fn list_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(", ")
    }
}
