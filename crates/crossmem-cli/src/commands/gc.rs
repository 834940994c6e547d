use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use crossmem::MemoryEngine;

use crate::error::CliResult;
use crate::output::{OutputFormat, format_size, print_json};

#[derive(Parser)]
pub struct GcCommand {}

impl GcCommand {
    pub async fn execute(&self, engine: &MemoryEngine, format: OutputFormat) -> CliResult<()> {
        let report = engine.run_gc().await;

        match format {
            OutputFormat::Json => print_json(&report)?,
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Step", "Result"]);

                table.add_row(["Decayed", &report.decayed.to_string()]);
                table.add_row([
                    "Evicted below threshold",
                    &report.evicted_by_relevance.to_string(),
                ]);
                table.add_row([
                    "Evicted for memory",
                    &report.evicted_by_pressure.to_string(),
                ]);
                table.add_row([
                    "Usage",
                    &format!(
                        "{} -> {}",
                        format_size(report.usage_bytes_before),
                        format_size(report.usage_bytes_after)
                    ),
                ]);
                println!("{table}");
                println!(
                    "\nGarbage collection removed {} entries in {}ms.",
                    report.total_evicted(),
                    report.duration_ms
                );
            }
        }

        Ok(())
    }
}
