use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use crossmem::config::Config;

use crate::error::CliResult;
use crate::output::{OutputFormat, print_json};

#[derive(Parser)]
pub struct ConfigCommand {
    #[clap(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    #[clap(about = "Show the effective configuration")]
    Show,

    #[clap(about = "Show where configuration and data are read from")]
    Path,
}

impl ConfigCommand {
    pub async fn execute(
        &self,
        config_path: Option<&Path>,
        data_dir: Option<PathBuf>,
        format: OutputFormat,
    ) -> CliResult<()> {
        let mut config = Config::load(config_path)?;
        if let Some(data_dir) = data_dir {
            config.storage.data_dir = data_dir;
        }

        match &self.command {
            ConfigSubcommand::Show => match format {
                OutputFormat::Json => print_json(&config)?,
                OutputFormat::Table => print!("{}", toml::to_string_pretty(&config)?),
            },
            ConfigSubcommand::Path => {
                let config_file = config_path
                    .map(Path::to_path_buf)
                    .or_else(Config::default_path);
                match format {
                    OutputFormat::Json => print_json(&serde_json::json!({
                        "config": config_file,
                        "snapshot": config.snapshot_path(),
                    }))?,
                    OutputFormat::Table => {
                        match config_file {
                            Some(path) => println!("Config:   {}", path.display()),
                            None => println!("Config:   (defaults)"),
                        }
                        println!("Snapshot: {}", config.snapshot_path().display());
                    }
                }
            }
        }

        Ok(())
    }
}
