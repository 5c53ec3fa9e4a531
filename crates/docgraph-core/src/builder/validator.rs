use crate::error::{GraphError, Result};
use crate::types::{ApplicationId, LineSpan, Node};
use once_cell::sync::Lazy;
use regex::Regex;

static FQN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_.]*(?:\([a-zA-Z0-9_,. ]*\))?$").expect("valid FQN regex")
});

/// Checks applied to every node before it is written.
pub struct NodeValidator {
    max_fqn_length: usize,
}

impl NodeValidator {
    pub fn new(max_fqn_length: usize) -> Self {
        Self { max_fqn_length }
    }

    pub fn validate_fqn(&self, fqn: &str) -> Result<()> {
        if fqn.trim().is_empty() {
            return Err(GraphError::invalid_declaration(fqn, "FQN is blank"));
        }
        if fqn.len() > self.max_fqn_length {
            return Err(GraphError::invalid_declaration(
                truncate_for_log(fqn),
                format!("FQN longer than {} characters", self.max_fqn_length),
            ));
        }
        if !FQN_PATTERN.is_match(fqn) {
            return Err(GraphError::invalid_declaration(fqn, "FQN does not match identifier grammar"));
        }
        Ok(())
    }

    pub fn validate_span(&self, fqn: &str, span: Option<&LineSpan>) -> Result<()> {
        if let Some(span) = span {
            if span.start < 0 || span.end < 0 {
                return Err(GraphError::invalid_declaration(
                    fqn,
                    format!("negative line span {}..{}", span.start, span.end),
                ));
            }
            if span.start > span.end {
                return Err(GraphError::invalid_declaration(
                    fqn,
                    format!("line span start {} after end {}", span.start, span.end),
                ));
            }
        }
        Ok(())
    }

    /// Same-application and no-self-parenting rules. Ancestor cycles are
    /// checked by the builder, which can walk the chain.
    pub fn validate_parent(&self, fqn: &str, app: ApplicationId, parent: Option<&Node>) -> Result<()> {
        if let Some(parent) = parent {
            if parent.application_id != app {
                return Err(GraphError::invalid_declaration(
                    fqn,
                    format!("parent {} belongs to another application", parent.fqn),
                ));
            }
            if parent.fqn == fqn {
                return Err(GraphError::invalid_declaration(fqn, "node cannot be its own parent"));
            }
        }
        Ok(())
    }
}

fn truncate_for_log(fqn: &str) -> String {
    fqn.chars().take(80).collect::<String>() + "..."
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;
    use uuid::Uuid;

    #[test]
    fn test_fqn_grammar() {
        let v = NodeValidator::new(1000);
        assert!(v.validate_fqn("com.example.Foo").is_ok());
        assert!(v.validate_fqn("com.example.Foo.bar(id, name)").is_ok());
        assert!(v.validate_fqn("_private.x()").is_ok());
        assert!(v.validate_fqn("123Invalid").is_err());
        assert!(v.validate_fqn("").is_err());
        assert!(v.validate_fqn("a.b(c").is_err());
        assert!(v.validate_fqn("endpoint://GET /x").is_err());
    }

    #[test]
    fn test_fqn_length() {
        let v = NodeValidator::new(10);
        let err = v.validate_fqn("abcdefghijk").unwrap_err();
        assert!(err.is_declaration_scoped());
    }

    #[test]
    fn test_span() {
        let v = NodeValidator::new(1000);
        assert!(v.validate_span("a", Some(&LineSpan::new(1, 1))).is_ok());
        assert!(v.validate_span("a", Some(&LineSpan::new(-1, 3))).is_err());
        assert!(v.validate_span("a", Some(&LineSpan::new(5, 3))).is_err());
        assert!(v.validate_span("a", None).is_ok());
    }

    #[test]
    fn test_parent_rules() {
        let v = NodeValidator::new(1000);
        let app = Uuid::now_v7();
        let parent = Node::new(app, "com.example", "example", NodeKind::Package, "kotlin");
        assert!(v.validate_parent("com.example.Foo", app, Some(&parent)).is_ok());
        assert!(v.validate_parent("com.example", app, Some(&parent)).is_err());
        assert!(v
            .validate_parent("com.example.Foo", Uuid::now_v7(), Some(&parent))
            .is_err());
    }
}
