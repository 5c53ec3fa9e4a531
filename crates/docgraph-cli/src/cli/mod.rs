pub mod build;
pub mod delete_app;
pub mod stats;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docgraph_core::RedbStorage;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "docgraph")]
#[command(version, about = "Build and link a code graph from parser declarations")]
pub struct Cli {
    /// Path to docgraph.toml
    #[arg(long, global = true, env = "DOCGRAPH_CONFIG", default_value = "docgraph.toml")]
    pub config: PathBuf,

    /// Path to data directory
    #[arg(long, global = true, env = "DOCGRAPH_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build one application from a JSONL declaration stream
    Build(BuildArgs),
    /// Graph statistics
    Stats(StatsArgs),
    /// Delete an application's nodes, edges and metrics
    DeleteApp(DeleteAppArgs),
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Application key
    #[arg(long, env = "DOCGRAPH_APP_KEY")]
    pub app: String,

    /// JSONL declarations. Reads stdin when omitted or `-`.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// JSON array of library nodes used for enrichment
    #[arg(long, env = "DOCGRAPH_LIBRARY")]
    pub library: Option<PathBuf>,

    /// JSON array of catalog tables used by the SQL detector
    #[arg(long, env = "DOCGRAPH_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Application config entry used to resolve `${key}` placeholders (repeatable)
    #[arg(long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
    pub properties: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Show the last build metrics of this application
    #[arg(long, env = "DOCGRAPH_APP_KEY")]
    pub app: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DeleteAppArgs {
    /// Application key
    #[arg(long, env = "DOCGRAPH_APP_KEY")]
    pub app: String,
}

fn parse_property(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Open (or create) the graph database under `data_dir`.
pub fn open_store(data_dir: &Path) -> Result<RedbStorage> {
    std::fs::create_dir_all(data_dir).with_context(|| format!("creating {}", data_dir.display()))?;
    let path = data_dir.join("docgraph.redb");
    RedbStorage::open(&path).with_context(|| format!("opening {}", path.display()))
}
