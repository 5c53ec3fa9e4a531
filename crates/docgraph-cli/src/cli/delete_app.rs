use crate::apps;
use crate::cli::{open_store, DeleteAppArgs};
use anyhow::{bail, Result};
use docgraph_core::{BuildEngine, BuilderConfig, GraphStore, InMemoryCatalog, LinkerConfig};
use std::path::Path;
use std::sync::Arc;

pub async fn run(args: DeleteAppArgs, data_dir: &Path) -> Result<()> {
    let store: Arc<dyn GraphStore> = Arc::new(open_store(data_dir)?);
    let Some(app) = apps::find(store.as_ref(), &args.app)? else {
        bail!("unknown application `{}`", args.app);
    };

    let engine = BuildEngine::new(
        store.clone(),
        BuilderConfig::default(),
        LinkerConfig::default(),
        Arc::new(InMemoryCatalog::default()),
    );
    let removed = engine.delete_application(app.id)?;
    apps::forget(store.as_ref(), &args.app)?;

    println!("Deleted {} ({}): {} nodes removed", app.key, app.id, removed);
    Ok(())
}
