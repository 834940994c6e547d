use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use crossmem::MemoryEngine;
use crossmem::storage::filter::EntryFilter;

use crate::error::CliResult;
use crate::output::{OutputFormat, print_json, truncate_string};

#[derive(Parser)]
pub struct SessionCommand {
    #[clap(subcommand)]
    pub command: SessionSubcommand,
}

#[derive(Subcommand)]
pub enum SessionSubcommand {
    #[clap(about = "List known sessions")]
    List,

    #[clap(about = "Delete every entry and summary of a session")]
    Clear(ClearArgs),

    #[clap(about = "Move several sessions into one")]
    Merge(MergeArgs),

    #[clap(about = "Fetch the context a model would get when joining a session")]
    Retrieve(RetrieveArgs),
}

#[derive(Parser)]
pub struct ClearArgs {
    #[clap(help = "Session identifier")]
    pub session: String,
}

#[derive(Parser)]
pub struct MergeArgs {
    #[clap(required = true, help = "Sessions to merge")]
    pub sources: Vec<String>,

    #[clap(long, help = "Session that receives the entries")]
    pub into: String,
}

#[derive(Parser)]
pub struct RetrieveArgs {
    #[clap(help = "Session identifier")]
    pub session: String,

    #[clap(long, short, help = "Model joining the session")]
    pub model: String,

    #[clap(long, help = "Token budget for the returned context")]
    pub max_tokens: Option<usize>,
}

impl SessionCommand {
    pub fn is_read_only(&self) -> bool {
        matches!(self.command, SessionSubcommand::List)
    }

    pub async fn execute(&self, engine: &MemoryEngine, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            SessionSubcommand::List => Self::list(engine, format).await,
            SessionSubcommand::Clear(args) => Self::clear(engine, args, format).await,
            SessionSubcommand::Merge(args) => Self::merge(engine, args, format).await,
            SessionSubcommand::Retrieve(args) => Self::retrieve(engine, args, format).await,
        }
    }

    async fn list(engine: &MemoryEngine, format: OutputFormat) -> CliResult<()> {
        let mut rows = Vec::new();
        for session_id in engine.session_ids().await {
            let entries = engine
                .list_memories(&EntryFilter::new().with_session(&session_id))
                .await;
            let mut models: Vec<String> = entries.iter().map(|e| e.model.clone()).collect();
            models.sort();
            models.dedup();
            let tokens: usize = entries.iter().map(|e| e.token_count).sum();
            rows.push((session_id, entries.len(), tokens, models));
        }

        match format {
            OutputFormat::Json => {
                let output: Vec<_> = rows
                    .iter()
                    .map(|(session_id, entries, tokens, models)| {
                        serde_json::json!({
                            "session_id": session_id,
                            "entries": entries,
                            "tokens": tokens,
                            "models": models,
                        })
                    })
                    .collect();
                print_json(&output)?;
            }
            OutputFormat::Table => {
                if rows.is_empty() {
                    println!("No sessions found.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Session", "Entries", "Tokens", "Models"]);
                for (session_id, entries, tokens, models) in &rows {
                    table.add_row([
                        session_id.clone(),
                        entries.to_string(),
                        tokens.to_string(),
                        models.join(", "),
                    ]);
                }
                println!("{table}");
            }
        }

        Ok(())
    }

    async fn clear(engine: &MemoryEngine, args: &ClearArgs, format: OutputFormat) -> CliResult<()> {
        let removed = engine.clear_session_memory(&args.session).await;

        match format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "session_id": args.session,
                "removed": removed,
            }))?,
            OutputFormat::Table => {
                println!("Cleared session {} ({removed} entries).", args.session);
            }
        }

        Ok(())
    }

    async fn merge(engine: &MemoryEngine, args: &MergeArgs, format: OutputFormat) -> CliResult<()> {
        let moved = engine
            .merge_session_memories(&args.sources, &args.into)
            .await?;

        match format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "sources": args.sources,
                "target": args.into,
                "moved": moved,
            }))?,
            OutputFormat::Table => {
                println!(
                    "Merged {} into {} ({moved} entries moved).",
                    args.sources.join(", "),
                    args.into
                );
            }
        }

        Ok(())
    }

    async fn retrieve(
        engine: &MemoryEngine,
        args: &RetrieveArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let entries = engine
            .retrieve_memory_for_model(&args.session, &args.model, args.max_tokens)
            .await;

        match format {
            OutputFormat::Json => print_json(&entries)?,
            OutputFormat::Table => {
                if entries.is_empty() {
                    println!("No context available for {} in {}.", args.model, args.session);
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Model", "Priority", "Tokens", "Content"]);
                for entry in &entries {
                    table.add_row([
                        entry.model.clone(),
                        entry.priority.to_string(),
                        entry.token_count.to_string(),
                        truncate_string(&entry.content, 60),
                    ]);
                }
                println!("{table}");

                let tokens: usize = entries.iter().map(|e| e.token_count).sum();
                println!("\nTotal: {} entries, {tokens} tokens", entries.len());
            }
        }

        Ok(())
    }
}
