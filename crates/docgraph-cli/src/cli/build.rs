use crate::apps;
use crate::cli::{open_store, BuildArgs};
use crate::config::DocgraphConfig;
use crate::ingest::JsonlSource;
use anyhow::{Context, Result};
use docgraph_core::{
    collect_declarations, BuildEngine, DataCatalog, GraphStore, InMemoryCatalog, InMemoryLibraryIndex,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run(args: BuildArgs, data_dir: &Path, config_path: &Path) -> Result<()> {
    let config = DocgraphConfig::load_or_default(config_path)?;
    let store: Arc<dyn GraphStore> = Arc::new(open_store(data_dir)?);

    let app = apps::find_or_register(store.as_ref(), &args.app)?.with_config(args.properties.into_iter().collect());

    let catalog: Arc<dyn DataCatalog> = match &args.catalog {
        Some(path) => {
            let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            Arc::new(InMemoryCatalog::from_json(&json)?)
        }
        None => Arc::new(InMemoryCatalog::default()),
    };

    let mut engine = BuildEngine::new(store, config.builder, config.linker, catalog);
    if let Some(path) = &args.library {
        let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        engine = engine.with_library(Arc::new(InMemoryLibraryIndex::from_json(&json)?));
    }

    let input = args.input.filter(|p| p.as_os_str() != "-");
    let source = JsonlSource::new(input);
    let decls = collect_declarations(&source).await?;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling build");
            flag.store(true, Ordering::Relaxed);
        }
    });

    info!("Building {} from {} declarations", app.key, decls.len());
    let result = tokio::task::spawn_blocking(move || engine.build(&app, decls, &cancel)).await??;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
