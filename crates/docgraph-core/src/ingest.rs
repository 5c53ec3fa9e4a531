use crate::declarations::RawDeclaration;
use crate::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

/// A pluggable declaration feed.
/// Implementations wrap a parsing front end (a JSONL dump, a language
/// server, ...) and emit its declarations in source order.
#[async_trait]
pub trait DeclarationSource: Send + Sync + 'static {
    /// Source name (used in log lines).
    fn name(&self) -> &str;

    /// Start producing declarations. The stream ends when the front end has
    /// nothing more to report.
    async fn declarations(&self) -> Result<BoxStream<'static, RawDeclaration>>;
}

/// Drain a source into memory, preserving order.
pub async fn collect_declarations(source: &dyn DeclarationSource) -> Result<Vec<RawDeclaration>> {
    let decls: Vec<RawDeclaration> = source.declarations().await?.collect().await;
    log::info!("Collected {} declarations from {}", decls.len(), source.name());
    Ok(decls)
}

/// Declarations held in memory.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    decls: Vec<RawDeclaration>,
}

impl VecSource {
    pub fn new(decls: Vec<RawDeclaration>) -> Self {
        Self { decls }
    }
}

#[async_trait]
impl DeclarationSource for VecSource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn declarations(&self) -> Result<BoxStream<'static, RawDeclaration>> {
        Ok(stream::iter(self.decls.clone()).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declarations::{RawPackage, RawType};
    use futures::executor::block_on;

    #[test]
    fn test_vec_source_keeps_order() {
        let decls = vec![
            RawDeclaration::Package(RawPackage {
                name: "com.a".into(),
                ..Default::default()
            }),
            RawDeclaration::Type(RawType {
                pkg_fqn: Some("com.a".into()),
                simple_name: "A".into(),
                kind_repr: "class".into(),
                ..Default::default()
            }),
        ];
        let source = VecSource::new(decls.clone());
        let collected = block_on(collect_declarations(&source)).unwrap();
        assert_eq!(collected, decls);
        assert_eq!(source.name(), "memory");
    }
}
