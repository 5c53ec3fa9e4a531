//! Application keys are mapped to stable ids in the store's metadata table.

use anyhow::{Context, Result};
use docgraph_core::{Application, GraphStore};
use uuid::Uuid;

const APP_KEY_PREFIX: &str = "application:";

fn metadata_key(key: &str) -> String {
    format!("{}{}", APP_KEY_PREFIX, key)
}

/// The registered application for `key`, if any.
pub fn find(store: &dyn GraphStore, key: &str) -> Result<Option<Application>> {
    let Some(bytes) = store.get_metadata(&metadata_key(key))? else {
        return Ok(None);
    };
    let id = std::str::from_utf8(&bytes)
        .ok()
        .and_then(|s| Uuid::parse_str(s).ok())
        .with_context(|| format!("corrupt application id for {}", key))?;
    Ok(Some(Application::new(key).with_id(id)))
}

/// The registered application for `key`, registering a new id on first use.
pub fn find_or_register(store: &dyn GraphStore, key: &str) -> Result<Application> {
    if let Some(app) = find(store, key)? {
        return Ok(app);
    }
    let app = Application::new(key);
    store.put_metadata(&metadata_key(key), app.id.to_string().as_bytes())?;
    tracing::info!("Registered application {} as {}", key, app.id);
    Ok(app)
}

pub fn forget(store: &dyn GraphStore, key: &str) -> Result<()> {
    store.delete_metadata(&metadata_key(key))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgraph_core::MemoryStorage;

    #[test]
    fn test_register_is_stable() {
        let store = MemoryStorage::new();
        assert!(find(&store, "shop").unwrap().is_none());

        let first = find_or_register(&store, "shop").unwrap();
        let second = find_or_register(&store, "shop").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.key, "shop");
        assert_ne!(find_or_register(&store, "billing").unwrap().id, first.id);

        forget(&store, "shop").unwrap();
        assert!(find(&store, "shop").unwrap().is_none());
    }
}
