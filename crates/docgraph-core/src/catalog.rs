//! Database table catalog consulted by the SQL detector.

use crate::error::Result;
use crate::types::{Node, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A table known to the catalog and the graph node standing for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    /// FQN of the DB_TABLE node.
    pub node_fqn: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>, node_fqn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            node_fqn: node_fqn.into(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// `schema.name`, or just the name.
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

pub trait DataCatalog: Send + Sync {
    /// Look up a table as written in SQL (`orders`, `public.orders`, `"Orders"`).
    fn resolve_table(&self, name: &str) -> Option<TableRef>;

    fn list_tables(&self) -> Vec<TableRef>;
}

/// Catalog held in memory, matching names case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    tables: Vec<TableRef>,
    by_name: HashMap<String, usize>,
}

impl InMemoryCatalog {
    pub fn new(tables: Vec<TableRef>) -> Self {
        let mut catalog = Self::default();
        for table in tables {
            catalog.insert(table);
        }
        catalog
    }

    /// Catalog made of the DB_TABLE and DB_VIEW nodes among `nodes`.
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        Self::new(
            nodes
                .into_iter()
                .filter(|n| matches!(n.kind, NodeKind::DbTable | NodeKind::DbView))
                .map(|n| TableRef::new(n.name.clone(), n.fqn.clone()))
                .collect(),
        )
    }

    /// Parse a JSON array of [`TableRef`]s.
    pub fn from_json(json: &str) -> Result<Self> {
        let tables: Vec<TableRef> = serde_json::from_str(json)?;
        Ok(Self::new(tables))
    }

    pub fn insert(&mut self, table: TableRef) {
        let pos = self.tables.len();
        self.by_name.entry(table.qualified_name().to_lowercase()).or_insert(pos);
        self.by_name.entry(table.name.to_lowercase()).or_insert(pos);
        self.tables.push(table);
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn unquote(name: &str) -> String {
    name.trim()
        .split('.')
        .map(|part| part.trim_matches(|c| c == '"' || c == '`' || c == '[' || c == ']'))
        .collect::<Vec<_>>()
        .join(".")
        .to_lowercase()
}

impl DataCatalog for InMemoryCatalog {
    fn resolve_table(&self, name: &str) -> Option<TableRef> {
        let key = unquote(name);
        let hit = self.by_name.get(&key).or_else(|| {
            let unqualified = key.rsplit('.').next().unwrap_or(&key);
            self.by_name.get(unqualified)
        })?;
        self.tables.get(*hit).cloned()
    }

    fn list_tables(&self) -> Vec<TableRef> {
        self.tables.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_resolve_variants() {
        let catalog = InMemoryCatalog::new(vec![
            TableRef::new("orders", "db.public.orders").with_schema("public"),
            TableRef::new("Customers", "db.customers"),
        ]);
        assert_eq!(catalog.resolve_table("ORDERS").unwrap().node_fqn, "db.public.orders");
        assert_eq!(catalog.resolve_table("public.orders").unwrap().node_fqn, "db.public.orders");
        assert_eq!(catalog.resolve_table("\"customers\"").unwrap().node_fqn, "db.customers");
        assert_eq!(catalog.resolve_table("sales.customers").unwrap().name, "Customers");
        assert!(catalog.resolve_table("missing").is_none());
        assert_eq!(catalog.list_tables().len(), 2);
    }

    #[test]
    fn test_from_json_and_nodes() {
        let catalog = InMemoryCatalog::from_json(r#"[{"name": "orders", "node_fqn": "db.orders"}]"#).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(InMemoryCatalog::from_json("{").is_err());

        let app = Uuid::now_v7();
        let nodes = vec![
            Node::new(app, "db.orders", "orders", NodeKind::DbTable, "sql"),
            Node::new(app, "com.a.Order", "Order", NodeKind::Class, "kotlin"),
        ];
        let catalog = InMemoryCatalog::from_nodes(&nodes);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.resolve_table("orders").is_some());
    }
}
