use crate::types::{Node, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which step of [`NodeIndex::resolve_type`] matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Exact,
    Import,
    Package,
    SimpleName,
}

impl Resolution {
    /// Confidence a detector assigns to an edge resolved this way.
    pub fn confidence(&self) -> f32 {
        match self {
            Resolution::Exact => 0.95,
            Resolution::Import => 0.9,
            Resolution::Package => 0.75,
            Resolution::SimpleName => 0.45,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Exact => "exact",
            Resolution::Import => "import",
            Resolution::Package => "package",
            Resolution::SimpleName => "simple_name",
        }
    }
}

/// Read-only lookup structure over the nodes of one link pass.
///
/// Nodes are kept in FQN order so that every "first match" is stable.
#[derive(Debug, Default)]
pub struct NodeIndex {
    nodes: Vec<Node>,
    by_id: HashMap<NodeId, usize>,
    by_fqn: HashMap<String, usize>,
    by_simple: HashMap<String, Vec<usize>>,
    by_base_fqn: HashMap<String, Vec<usize>>,
}

impl NodeIndex {
    pub fn new(mut nodes: Vec<Node>) -> Self {
        nodes.sort_by(|a, b| a.fqn.cmp(&b.fqn).then(a.id.cmp(&b.id)));

        let mut index = NodeIndex {
            nodes: Vec::with_capacity(nodes.len()),
            ..Default::default()
        };
        for node in nodes {
            index.insert(node);
        }
        index
    }

    fn insert(&mut self, node: Node) {
        let pos = self.nodes.len();
        self.by_id.insert(node.id, pos);
        self.by_fqn.entry(node.fqn.clone()).or_insert(pos);

        if node.fqn.contains('(') {
            self.by_base_fqn
                .entry(node.base_fqn().to_string())
                .or_default()
                .push(pos);
        } else if !is_virtual(&node.fqn) && node.kind != NodeKind::Package {
            self.by_simple
                .entry(node.simple_name().to_string())
                .or_default()
                .push(pos);
        }
        self.nodes.push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn by_id(&self, id: NodeId) -> Option<&Node> {
        self.by_id.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn by_fqn(&self, fqn: &str) -> Option<&Node> {
        self.by_fqn.get(fqn).map(|&i| &self.nodes[i])
    }

    /// Non-callable nodes whose last FQN segment is `name`.
    pub fn by_simple(&self, name: &str) -> Vec<&Node> {
        self.lookup(&self.by_simple, name)
    }

    /// Callables whose FQN without the parameter list is `base`; all
    /// overloads of one method.
    pub fn by_base_fqn(&self, base: &str) -> Vec<&Node> {
        self.lookup(&self.by_base_fqn, base)
    }

    fn lookup(&self, map: &HashMap<String, Vec<usize>>, key: &str) -> Vec<&Node> {
        map.get(key)
            .map(|ids| ids.iter().map(|&i| &self.nodes[i]).collect())
            .unwrap_or_default()
    }

    pub fn find_by_kind(&self, kind: NodeKind) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.kind == kind).collect()
    }

    pub fn find_annotated_with(&self, annotation: &str) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.has_annotation(annotation)).collect()
    }

    /// Resolve a type name as written in source.
    ///
    /// Tries the exact FQN, an import ending in `.Simple`, `pkg.Simple` and
    /// finally the first node with that simple name.
    pub fn resolve_type(&self, name: &str, imports: &[String], pkg: Option<&str>) -> Option<(&Node, Resolution)> {
        let clean = clean_type_name(name);
        if clean.is_empty() {
            return None;
        }
        if let Some(node) = self.by_fqn(clean).filter(|n| !n.fqn.contains('(')) {
            return Some((node, Resolution::Exact));
        }

        let simple = clean.rsplit('.').next().unwrap_or(clean);
        let suffix = format!(".{}", simple);
        let imported = imports
            .iter()
            .map(|i| i.trim())
            .filter(|i| *i == clean || i.ends_with(&suffix))
            .find_map(|i| self.by_fqn(i));
        if let Some(node) = imported {
            return Some((node, Resolution::Import));
        }

        if let Some(pkg) = pkg.map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(node) = self.by_fqn(&format!("{}.{}", pkg, clean)) {
                return Some((node, Resolution::Package));
            }
        }

        self.by_simple(simple)
            .into_iter()
            .next()
            .map(|n| (n, Resolution::SimpleName))
    }

    /// Resolve an unresolved proposal target: a node FQN, or a type name.
    pub fn resolve_target(&self, target: &str) -> Option<&Node> {
        let target = target.trim();
        if let Some(node) = self.by_fqn(target) {
            return Some(node);
        }
        let clean = clean_type_name(target);
        self.by_fqn(clean).or_else(|| {
            let overloads = self.by_base_fqn(clean);
            if overloads.len() == 1 {
                overloads.into_iter().next()
            } else {
                None
            }
        })
    }
}

/// `com.foo.Bar<Baz>?` -> `com.foo.Bar`. Array suffixes and varargs dots are
/// dropped as well.
pub fn clean_type_name(raw: &str) -> &str {
    let head = raw.trim();
    let head = head.split('<').next().unwrap_or(head);
    head.trim()
        .trim_end_matches('?')
        .trim_end_matches("[]")
        .trim_end_matches("...")
        .trim()
}

/// Every type-looking identifier in a type expression:
/// `Map<String, List<Order>>?` -> `Map`, `String`, `List`, `Order`.
pub fn type_tokens(repr: &str) -> Vec<&str> {
    let mut out = Vec::new();
    for token in repr.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.')) {
        let token = token.trim_matches('.');
        if token.is_empty() {
            continue;
        }
        let simple = token.rsplit('.').next().unwrap_or(token);
        if simple.chars().next().is_some_and(|c| c.is_uppercase()) && !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

/// Virtual integration nodes (`endpoint://...`, `topic://...`).
pub fn is_virtual(fqn: &str) -> bool {
    fqn.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn node(app: Uuid, fqn: &str, kind: NodeKind) -> Node {
        let name = crate::types::base_fqn(fqn).rsplit('.').next().unwrap_or(fqn).to_string();
        Node::new(app, fqn, name, kind, "kotlin")
    }

    fn sample() -> NodeIndex {
        let app = Uuid::now_v7();
        NodeIndex::new(vec![
            node(app, "com.a.Order", NodeKind::Class),
            node(app, "com.b.Order", NodeKind::Class),
            node(app, "com.a.OrderService", NodeKind::Service),
            node(app, "com.a.OrderService.find(id)", NodeKind::Method),
            node(app, "com.a.OrderService.find(id,name)", NodeKind::Method),
            node(app, "com.a", NodeKind::Package),
            node(app, "topic://orders", NodeKind::Topic),
        ])
    }

    #[test]
    fn test_resolution_order() {
        let idx = sample();

        let (n, r) = idx.resolve_type("com.b.Order", &[], Some("com.a")).unwrap();
        assert_eq!((n.fqn.as_str(), r), ("com.b.Order", Resolution::Exact));

        let imports = vec!["com.b.Order".to_string()];
        let (n, r) = idx.resolve_type("Order?", &imports, Some("com.a")).unwrap();
        assert_eq!((n.fqn.as_str(), r), ("com.b.Order", Resolution::Import));

        let (n, r) = idx.resolve_type("Order", &[], Some("com.a")).unwrap();
        assert_eq!((n.fqn.as_str(), r), ("com.a.Order", Resolution::Package));

        let (n, r) = idx.resolve_type("OrderService", &[], None).unwrap();
        assert_eq!((n.fqn.as_str(), r), ("com.a.OrderService", Resolution::SimpleName));

        assert!(idx.resolve_type("Missing", &[], Some("com.a")).is_none());
        assert!(idx.resolve_type("  ", &[], None).is_none());
    }

    #[test]
    fn test_simple_name_fallback_is_first_by_fqn() {
        let idx = sample();
        let (n, r) = idx.resolve_type("Order", &[], Some("com.zzz")).unwrap();
        assert_eq!(n.fqn, "com.a.Order");
        assert_eq!(r, Resolution::SimpleName);
    }

    #[test]
    fn test_callable_lookups() {
        let idx = sample();
        assert_eq!(idx.by_base_fqn("com.a.OrderService.find").len(), 2);
        assert!(idx.by_simple("find").is_empty());
        assert!(idx.resolve_target("com.a.OrderService.find").is_none());
        assert!(idx.resolve_target("topic://orders").is_some());
        assert!(idx.by_simple("orders").is_empty());
    }

    #[test]
    fn test_type_tokens() {
        assert_eq!(type_tokens("Map<String, List<Order>>?"), vec!["Map", "String", "List", "Order"]);
        assert_eq!(type_tokens("com.a.Order[]"), vec!["com.a.Order"]);
        assert!(type_tokens("int").is_empty());
        assert_eq!(clean_type_name(" List<Order>? "), "List");
    }
}
