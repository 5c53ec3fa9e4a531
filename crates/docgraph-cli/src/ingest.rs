use async_trait::async_trait;
use docgraph_core::{DeclarationSource, GraphError, RawDeclaration};
use futures::stream::{self, BoxStream, StreamExt};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Reads one JSON [`RawDeclaration`] per line from a file, or from stdin
/// when no path is given. Blank lines are ignored; malformed lines are
/// logged and skipped.
pub struct JsonlSource {
    path: Option<PathBuf>,
}

impl JsonlSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl DeclarationSource for JsonlSource {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn declarations(&self) -> docgraph_core::Result<BoxStream<'static, RawDeclaration>> {
        let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &self.path {
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| GraphError::Validation(format!("cannot open {}: {}", path.display(), e)))?;
                Box::new(BufReader::new(file))
            }
            None => Box::new(BufReader::new(tokio::io::stdin())),
        };

        let s = stream::unfold((reader.lines(), 0usize), |(mut lines, line_no)| async move {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line_no = line_no + 1;
                    let decl = parse_line(&line, line_no);
                    Some((decl, (lines, line_no)))
                }
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!("Stopped reading declarations at line {}: {}", line_no + 1, e);
                    None
                }
            }
        })
        .filter_map(|opt| async move { opt });

        Ok(Box::pin(s))
    }
}

fn parse_line(line: &str, line_no: usize) -> Option<RawDeclaration> {
    if line.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<RawDeclaration>(line) {
        Ok(decl) => Some(decl),
        Err(e) => {
            tracing::warn!("Skipping malformed declaration on line {}: {}", line_no, e);
            None
        }
    }
}
