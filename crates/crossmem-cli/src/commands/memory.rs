use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use crossmem::MemoryEngine;
use crossmem::memory::types::{MemoryEntry, MemoryPriority, MemoryType, NewMemoryEntry};
use crossmem::storage::filter::EntryFilter;
use uuid::Uuid;

use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, format_timestamp, print_json, truncate_string};

#[derive(Parser)]
pub struct MemoryCommand {
    #[clap(subcommand)]
    pub command: MemorySubcommand,
}

#[derive(Subcommand)]
pub enum MemorySubcommand {
    #[clap(about = "Store a memory entry")]
    Add(AddArgs),

    #[clap(about = "List memory entries without marking them as read")]
    List(ListArgs),

    #[clap(about = "Show memory details")]
    Show(ShowArgs),

    #[clap(about = "Search memory content and metadata")]
    Search(SearchArgs),

    #[clap(about = "Set the relevance score of an entry")]
    Relevance(RelevanceArgs),
}

#[derive(Parser)]
pub struct AddArgs {
    #[clap(help = "Session identifier")]
    pub session: String,

    #[clap(help = "Model the entry was recorded under")]
    pub model: String,

    #[clap(help = "Memory content text")]
    pub text: String,

    #[clap(
        long,
        short,
        default_value = "conversation",
        help = "Memory type (conversation, work_context, tool_usage, system_prompt, project_metadata)"
    )]
    pub r#type: String,

    #[clap(long, short, help = "Priority (critical, high, medium, low)")]
    pub priority: Option<String>,

    #[clap(long = "meta", help = "Metadata as key=value, repeatable")]
    pub metadata: Vec<String>,
}

#[derive(Parser)]
pub struct ListArgs {
    #[clap(
        long,
        short,
        default_value = "20",
        help = "Maximum number of entries to display"
    )]
    pub limit: usize,

    #[clap(long, help = "Filter by session")]
    pub session: Option<String>,

    #[clap(long, short, help = "Filter by model")]
    pub model: Option<String>,

    #[clap(long, short, help = "Filter by memory type")]
    pub r#type: Option<String>,

    #[clap(long, short, help = "Filter by priority")]
    pub priority: Option<String>,

    #[clap(long, help = "Only entries with at least this relevance")]
    pub min_relevance: Option<f32>,

    #[clap(long, short, help = "Only entries matching this text")]
    pub query: Option<String>,
}

#[derive(Parser)]
pub struct ShowArgs {
    #[clap(help = "Memory ID (UUID format)")]
    pub id: String,
}

#[derive(Parser)]
pub struct SearchArgs {
    #[clap(help = "Text to search for")]
    pub query: String,

    #[clap(long, help = "Restrict to one session")]
    pub session: Option<String>,

    #[clap(long, short, help = "Maximum number of results")]
    pub limit: Option<usize>,
}

#[derive(Parser)]
pub struct RelevanceArgs {
    #[clap(help = "Memory ID (UUID format)")]
    pub id: String,

    #[clap(help = "New relevance score in [0, 1]")]
    pub score: f32,
}

impl MemoryCommand {
    /// Whether the command leaves the store unchanged
    pub fn is_read_only(&self) -> bool {
        matches!(self.command, MemorySubcommand::List(_))
    }

    pub async fn execute(&self, engine: &MemoryEngine, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            MemorySubcommand::Add(args) => Self::add(engine, args, format).await,
            MemorySubcommand::List(args) => Self::list(engine, args, format).await,
            MemorySubcommand::Show(args) => Self::show(engine, args, format).await,
            MemorySubcommand::Search(args) => Self::search(engine, args, format).await,
            MemorySubcommand::Relevance(args) => Self::relevance(engine, args, format).await,
        }
    }

    async fn add(engine: &MemoryEngine, args: &AddArgs, format: OutputFormat) -> CliResult<()> {
        let memory_type: MemoryType = args.r#type.parse()?;
        let mut fields = NewMemoryEntry::new(&args.session, &args.model, memory_type, &args.text);
        if let Some(ref priority) = args.priority {
            fields = fields.with_priority(priority.parse()?);
        }
        for pair in &args.metadata {
            let (key, value) = parse_metadata(pair)?;
            fields = fields.with_metadata(key, value);
        }

        let entry = engine.store_memory_entry(fields).await?;

        match format {
            OutputFormat::Json => print_json(&entry)?,
            OutputFormat::Table => {
                println!("Memory stored successfully.");
                println!("ID: {}", entry.id);
                println!(
                    "Priority: {}, tokens: {}, relevance: {:.2}",
                    entry.priority, entry.token_count, entry.relevance_score
                );
            }
        }

        Ok(())
    }

    async fn list(engine: &MemoryEngine, args: &ListArgs, format: OutputFormat) -> CliResult<()> {
        let mut filter = EntryFilter::new();
        if let Some(ref session) = args.session {
            filter = filter.with_session(session);
        }
        if let Some(ref model) = args.model {
            filter = filter.with_model(model);
        }
        if let Some(ref memory_type) = args.r#type {
            filter = filter.with_memory_types(vec![memory_type.parse::<MemoryType>()?]);
        }
        if let Some(ref priority) = args.priority {
            filter = filter.with_priorities(vec![priority.parse::<MemoryPriority>()?]);
        }
        if let Some(min_relevance) = args.min_relevance {
            filter = filter.with_min_relevance(min_relevance);
        }
        if let Some(ref query) = args.query {
            filter = filter.with_query(query);
        }

        let mut entries = engine.list_memories(&filter).await;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(args.limit);

        match format {
            OutputFormat::Json => print_json(&entries)?,
            OutputFormat::Table => {
                if entries.is_empty() {
                    println!("No memories found.");
                    return Ok(());
                }
                println!("{}", entry_table(&entries));
                println!("\nTotal: {} memories", entries.len());
            }
        }

        Ok(())
    }

    async fn show(engine: &MemoryEngine, args: &ShowArgs, format: OutputFormat) -> CliResult<()> {
        let id = parse_id(&args.id)?;
        let entry = engine.get_memory(id).await?;

        match format {
            OutputFormat::Json => print_json(&entry)?,
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Property", "Value"]);

                table.add_row(["ID", &entry.id.to_string()]);
                table.add_row(["Session", &entry.session_id]);
                table.add_row(["Model", &entry.model]);
                table.add_row(["Type", entry.memory_type.as_str()]);
                table.add_row(["Priority", entry.priority.as_str()]);
                table.add_row(["Content", &entry.content]);
                table.add_row(["Tokens", &entry.token_count.to_string()]);
                table.add_row(["Relevance", &format!("{:.4}", entry.relevance_score)]);
                table.add_row(["Created", &entry.created_at.to_rfc3339()]);
                table.add_row(["Last Accessed", &entry.accessed_at.to_rfc3339()]);
                table.add_row(["Access Count", &entry.access_count.to_string()]);

                let mut metadata: Vec<_> = entry.metadata.iter().collect();
                metadata.sort();
                for (key, value) in metadata {
                    table.add_row([format!("meta.{key}"), value.clone()]);
                }

                println!("{table}");
            }
        }

        Ok(())
    }

    async fn search(engine: &MemoryEngine, args: &SearchArgs, format: OutputFormat) -> CliResult<()> {
        let hits = engine
            .search_memories(&args.query, args.session.as_deref(), args.limit)
            .await;

        match format {
            OutputFormat::Json => print_json(&hits)?,
            OutputFormat::Table => {
                if hits.is_empty() {
                    println!("No memories match \"{}\".", args.query);
                    return Ok(());
                }
                println!("{}", entry_table(&hits));
                println!("\nFound: {} memories", hits.len());
            }
        }

        Ok(())
    }

    async fn relevance(
        engine: &MemoryEngine,
        args: &RelevanceArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let id = parse_id(&args.id)?;
        engine.update_memory_relevance(id, args.score).await?;

        match format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "id": args.id,
                "relevance_score": args.score.clamp(0.0, 1.0),
            }))?,
            OutputFormat::Table => {
                println!(
                    "Relevance of {} set to {:.2}.",
                    args.id,
                    args.score.clamp(0.0, 1.0)
                );
            }
        }

        Ok(())
    }
}

fn entry_table(entries: &[MemoryEntry]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header([
            "ID",
            "Session",
            "Model",
            "Content",
            "Type",
            "Priority",
            "Tokens",
            "Relevance",
            "Created",
        ]);

    for entry in entries {
        table.add_row([
            truncate_string(&entry.id.to_string(), 8),
            truncate_string(&entry.session_id, 16),
            truncate_string(&entry.model, 20),
            truncate_string(&entry.content, 50),
            entry.memory_type.to_string(),
            entry.priority.to_string(),
            entry.token_count.to_string(),
            format!("{:.2}", entry.relevance_score),
            format_timestamp(&entry.created_at),
        ]);
    }
    table
}

pub(crate) fn parse_id(id: &str) -> CliResult<Uuid> {
    Uuid::parse_str(id).map_err(|e| CliError(format!("Invalid UUID format: {e}")))
}

fn parse_metadata(pair: &str) -> CliResult<(&str, &str)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(format!("Invalid metadata \"{pair}\", expected key=value").into()),
    }
}
