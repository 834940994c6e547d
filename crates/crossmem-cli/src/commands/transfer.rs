use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use crossmem::MemoryEngine;

use crate::error::CliResult;
use crate::output::{OutputFormat, print_json};

#[derive(Parser)]
pub struct TransferCommand {
    #[clap(subcommand)]
    pub command: TransferSubcommand,
}

#[derive(Subcommand)]
pub enum TransferSubcommand {
    #[clap(about = "Copy a session's context from one model to another")]
    Run(TransferArgs),

    #[clap(about = "Show what a transfer would copy without copying")]
    Preview(TransferArgs),
}

#[derive(Parser)]
pub struct TransferArgs {
    #[clap(help = "Session identifier")]
    pub session: String,

    #[clap(long, help = "Model the context is copied from")]
    pub from: String,

    #[clap(long, help = "Model the context is copied to")]
    pub to: String,
}

impl TransferCommand {
    pub fn is_read_only(&self) -> bool {
        matches!(self.command, TransferSubcommand::Preview(_))
    }

    pub async fn execute(&self, engine: &MemoryEngine, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            TransferSubcommand::Run(args) => Self::run(engine, args, format).await,
            TransferSubcommand::Preview(args) => Self::preview(engine, args, format).await,
        }
    }

    async fn run(engine: &MemoryEngine, args: &TransferArgs, format: OutputFormat) -> CliResult<()> {
        let result = engine
            .transfer_context_to_model(&args.session, &args.from, &args.to)
            .await?;

        match format {
            OutputFormat::Json => print_json(&result)?,
            OutputFormat::Table => {
                println!("{}", result.message);
                if result.success {
                    println!(
                        "Copied {} entries ({} tokens) in {}ms{}",
                        result.transferred_entries.len(),
                        result.total_tokens,
                        result.elapsed_ms,
                        if result.compression_applied {
                            ", compressed"
                        } else {
                            ""
                        }
                    );
                }
            }
        }

        if result.success {
            Ok(())
        } else {
            Err(result.message.into())
        }
    }

    async fn preview(
        engine: &MemoryEngine,
        args: &TransferArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let preview = engine
            .preview_context_transfer(&args.session, &args.from, &args.to)
            .await?;

        match format {
            OutputFormat::Json => print_json(&preview)?,
            OutputFormat::Table => {
                println!(
                    "Transfer preview: {} from {} to {}",
                    preview.session_id, preview.source_model, preview.target_model
                );
                println!("==============================\n");

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Property", "Value"]);

                table.add_row(["Source entries", &preview.source_entries.to_string()]);
                table.add_row(["Source tokens", &preview.source_tokens.to_string()]);
                table.add_row(["Entries to copy", &preview.entries_to_transfer.to_string()]);
                table.add_row(["Tokens to copy", &preview.tokens_to_transfer.to_string()]);
                table.add_row(["Summarized entries", &preview.excluded_entries.to_string()]);
                table.add_row(["Summary tokens", &preview.summary_tokens.to_string()]);
                table.add_row(["Budget", &preview.budget.to_string()]);
                table.add_row([
                    "Target context window",
                    &preview.target_context_window.to_string(),
                ]);
                table.add_row(["Target tools", &preview.target_supports_tools.to_string()]);
                table.add_row(["Target images", &preview.target_supports_images.to_string()]);
                println!("{table}");

                if !preview.type_distribution.is_empty() {
                    let types: Vec<String> = preview
                        .type_distribution
                        .iter()
                        .map(|(name, count)| format!("{name}: {count}"))
                        .collect();
                    println!("\nBy type: {}", types.join(", "));
                }
                if !preview.priority_distribution.is_empty() {
                    let priorities: Vec<String> = preview
                        .priority_distribution
                        .iter()
                        .map(|(name, count)| format!("{name}: {count}"))
                        .collect();
                    println!("By priority: {}", priorities.join(", "));
                }
            }
        }

        Ok(())
    }
}
