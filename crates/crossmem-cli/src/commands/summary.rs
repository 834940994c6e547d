use clap::{Parser, Subcommand};
use crossmem::MemoryEngine;
use crossmem::memory::types::ContextSummary;

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp, print_json};

#[derive(Parser)]
pub struct SummaryCommand {
    #[clap(subcommand)]
    pub command: SummarySubcommand,
}

#[derive(Subcommand)]
pub enum SummarySubcommand {
    #[clap(about = "Summarize one model's entries in a session")]
    Create(CreateArgs),

    #[clap(about = "List stored summaries of a session")]
    List(ListArgs),
}

#[derive(Parser)]
pub struct CreateArgs {
    #[clap(help = "Session identifier")]
    pub session: String,

    #[clap(long, short, help = "Model whose entries are summarized")]
    pub model: String,
}

#[derive(Parser)]
pub struct ListArgs {
    #[clap(help = "Session identifier")]
    pub session: String,
}

impl SummaryCommand {
    pub fn is_read_only(&self) -> bool {
        matches!(self.command, SummarySubcommand::List(_))
    }

    pub async fn execute(&self, engine: &MemoryEngine, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            SummarySubcommand::Create(args) => {
                let summary = engine
                    .create_context_summary(&args.session, &args.model)
                    .await;
                match format {
                    OutputFormat::Json => print_json(&summary)?,
                    OutputFormat::Table => {
                        if summary.is_empty() {
                            println!(
                                "Nothing to summarize for {} in {}.",
                                args.model, args.session
                            );
                        } else {
                            print_summary(&summary);
                        }
                    }
                }
            }
            SummarySubcommand::List(args) => {
                let summaries = engine.get_context_summaries(&args.session).await;
                match format {
                    OutputFormat::Json => print_json(&summaries)?,
                    OutputFormat::Table => {
                        if summaries.is_empty() {
                            println!("No summaries for {}.", args.session);
                        }
                        for summary in &summaries {
                            print_summary(summary);
                            println!();
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

fn print_summary(summary: &ContextSummary) {
    println!(
        "Summary of {} / {} ({} key points, {} tokens, {})",
        summary.session_id,
        summary.original_model,
        summary.key_points.len(),
        summary.token_count,
        format_timestamp(&summary.created_at)
    );
    for point in &summary.key_points {
        println!("  - {point}");
    }
}
