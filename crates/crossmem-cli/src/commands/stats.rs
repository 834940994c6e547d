use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use crossmem::MemoryEngine;

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp, print_json};

#[derive(Parser)]
pub struct StatsCommand {}

impl StatsCommand {
    pub async fn execute(&self, engine: &MemoryEngine, format: OutputFormat) -> CliResult<()> {
        let stats = engine.get_memory_stats().await;
        let config = engine.get_memory_config().await;

        match format {
            OutputFormat::Json => print_json(&stats)?,
            OutputFormat::Table => {
                println!("Crossmem Statistics");
                println!("======================\n");

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Metric", "Value"]);

                table.add_row(["Entries", &stats.total_entries.to_string()]);
                table.add_row(["Tokens", &stats.total_tokens.to_string()]);
                table.add_row(["Sessions", &stats.sessions_count.to_string()]);
                table.add_row(["Models", &stats.models_count.to_string()]);
                table.add_row([
                    "Memory",
                    &format!(
                        "{:.2} MB of {} MB",
                        stats.memory_usage_mb, config.max_memory_mb
                    ),
                ]);
                table.add_row([
                    "Last GC",
                    &stats
                        .last_gc_run
                        .as_ref()
                        .map(format_timestamp)
                        .unwrap_or_else(|| "never".to_string()),
                ]);

                println!("{table}");
            }
        }

        Ok(())
    }
}
