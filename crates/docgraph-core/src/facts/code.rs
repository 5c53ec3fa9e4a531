use crate::error::Result;
use crate::facts::{Fact, FactContext, FactKind, FactSource};
use crate::linker::NodeIndex;
use crate::types::{annotation_simple_name, Node, NodeKind, RawUsage};
use once_cell::sync::Lazy;
use regex::Regex;

static READ_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(delete\s+)?\b(?:from|join)\s+([A-Za-z_][A-Za-z0-9_.]*)").expect("valid read-table regex")
});

static WRITE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:insert\s+into|update|delete\s+from|merge\s+into)\s+([A-Za-z_][A-Za-z0-9_.]*)")
        .expect("valid write-table regex")
});

/// Structural and code-level facts read straight from node metadata.
pub struct CodeUsageSource;

impl FactSource for CodeUsageSource {
    fn name(&self) -> &'static str {
        "code_usage"
    }

    fn extract_facts(&self, ctx: &FactContext<'_>) -> Result<Vec<Fact>> {
        let mut facts = Vec::new();
        for node in ctx.index.nodes() {
            member_facts(node, &mut facts);
            for sup in node.meta.supertypes_resolved.iter().chain(&node.meta.supertypes_simple) {
                facts.push(Fact::new(FactKind::Supertype, node.id, sup.trim()));
            }
            for ann in &node.meta.annotations {
                facts.push(
                    Fact::new(FactKind::Annotation, node.id, annotation_type(ann))
                        .with_meta("raw", ann.clone()),
                );
            }
            type_reference_facts(node, &mut facts);
            call_site_facts(node, &mut facts);
            for thrown in &node.meta.throws {
                facts.push(Fact::new(FactKind::Throws, node.id, thrown.trim()));
            }
            sql_facts(node, ctx.index, &mut facts);
        }
        Ok(facts)
    }
}

fn member_facts(node: &Node, out: &mut Vec<Fact>) {
    let owner = node.meta.owner_fqn.as_deref().filter(|o| !o.is_empty());
    match owner {
        Some(owner) if node.kind.is_member_level() => {
            out.push(Fact::new(FactKind::Member, node.id, owner).with_meta("role", "owner"));
        }
        None if node.kind.is_type_level() => {
            if let Some(pkg) = node.meta.pkg_fqn.as_deref().filter(|p| !p.is_empty() && *p != node.fqn) {
                out.push(Fact::new(FactKind::Member, node.id, pkg).with_meta("role", "package"));
            }
        }
        _ => {}
    }
}

fn type_reference_facts(node: &Node, out: &mut Vec<Fact>) {
    let callable = node.fqn.contains('(');
    if callable {
        for ty in &node.meta.param_types {
            out.push(Fact::new(FactKind::TypeReference, node.id, ty.trim()).with_meta("role", "param"));
        }
        if let Some(ret) = node.meta.return_type.as_deref().filter(|r| !r.trim().is_empty()) {
            out.push(Fact::new(FactKind::TypeReference, node.id, ret.trim()).with_meta("role", "return"));
        }
    } else if node.kind == NodeKind::Field || node.meta.owner_fqn.is_some() {
        if let Some(ty) = node.meta.return_type.as_deref().filter(|r| !r.trim().is_empty()) {
            out.push(Fact::new(FactKind::TypeReference, node.id, ty.trim()).with_meta("role", "field"));
        }
    }
}

fn call_site_facts(node: &Node, out: &mut Vec<Fact>) {
    for usage in &node.meta.raw_usages {
        let fact = match usage {
            RawUsage::Dot {
                receiver,
                member,
                is_call,
            } => Fact::new(FactKind::CallSite, node.id, format!("{}.{}", receiver, member))
                .with_meta("usage", "dot")
                .with_meta("receiver", receiver.clone())
                .with_meta("member", member.clone())
                .with_meta("is_call", is_call.to_string()),
            RawUsage::Simple { name, is_call } => Fact::new(FactKind::CallSite, node.id, name.clone())
                .with_meta("usage", "simple")
                .with_meta("member", name.clone())
                .with_meta("is_call", is_call.to_string()),
        };
        out.push(fact);
    }
}

fn sql_facts(node: &Node, index: &NodeIndex, out: &mut Vec<Fact>) {
    let in_repository = node.kind == NodeKind::DbQuery
        || node
            .meta
            .owner_fqn
            .as_deref()
            .and_then(|o| index.by_fqn(o))
            .is_some_and(|o| o.kind == NodeKind::DbQuery);
    if !in_repository {
        return;
    }
    for ann in &node.meta.annotations {
        if annotation_simple_name(ann) != "query" {
            continue;
        }
        let Some(sql) = query_text(ann) else {
            continue;
        };
        let tables = sql_tables(&sql);
        for table in tables.reads {
            out.push(Fact::new(FactKind::SqlRead, node.id, table).with_meta("sql", sql.clone()));
        }
        for table in tables.writes {
            out.push(Fact::new(FactKind::SqlWrite, node.id, table).with_meta("sql", sql.clone()));
        }
    }
}

/// `@org.foo.Bar(x = 1)` -> `org.foo.Bar`
fn annotation_type(raw: &str) -> &str {
    let head = raw.trim().trim_start_matches('@');
    head.split('(').next().unwrap_or(head).trim()
}

/// The string literal inside `@Query(...)`, triple-quoted or not.
fn query_text(annotation: &str) -> Option<String> {
    let (_, args) = annotation.split_once('(')?;
    let start = args.find('"')?;
    let end = args.rfind('"')?;
    if end <= start {
        return None;
    }
    let text = args[start..=end].trim_matches('"').trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Tables a SQL statement reads from and writes to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlTables {
    pub reads: Vec<String>,
    pub writes: Vec<String>,
}

pub fn sql_tables(sql: &str) -> SqlTables {
    let mut tables = SqlTables::default();
    for cap in WRITE_TABLE.captures_iter(sql) {
        push_unique(&mut tables.writes, &cap[1]);
    }
    for cap in READ_TABLE.captures_iter(sql) {
        if cap.get(1).is_some() {
            continue;
        }
        push_unique(&mut tables.reads, &cap[2]);
    }
    tables
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n.eq_ignore_ascii_case(name)) {
        list.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_tables() {
        let t = sql_tables("SELECT o.* FROM orders o JOIN customers c ON c.id = o.customer_id");
        assert_eq!(t.reads, vec!["orders".to_string(), "customers".to_string()]);
        assert!(t.writes.is_empty());

        let t = sql_tables("delete from audit_log where ts < ?");
        assert_eq!(t.writes, vec!["audit_log".to_string()]);
        assert!(t.reads.is_empty());

        let t = sql_tables("INSERT INTO archive SELECT * FROM orders");
        assert_eq!(t.writes, vec!["archive".to_string()]);
        assert_eq!(t.reads, vec!["orders".to_string()]);
    }

    #[test]
    fn test_query_text() {
        assert_eq!(
            query_text(r#"@Query("select * from orders where id = :id")"#).as_deref(),
            Some("select * from orders where id = :id")
        );
        assert_eq!(
            query_text(r#"@Query(value = """update orders set state = 'x'""", nativeQuery = true)"#).as_deref(),
            Some("update orders set state = 'x'")
        );
        assert_eq!(query_text("@Query"), None);
    }

    #[test]
    fn test_annotation_type() {
        assert_eq!(annotation_type("@org.foo.Bar(x = 1)"), "org.foo.Bar");
        assert_eq!(annotation_type("Service"), "Service");
    }
}
