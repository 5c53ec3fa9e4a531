use crate::builder::{attribute, first_quoted};
use crate::error::Result;
use crate::facts::{Fact, FactContext, FactKind, FactSource};
use crate::types::{annotation_simple_name, Application};
use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}:]+)(?::([^}]*))?\}").expect("valid placeholder regex"));

/// A `${key:default}` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub key: String,
    pub default: Option<String>,
}

pub fn placeholders(text: &str) -> Vec<Placeholder> {
    PLACEHOLDER
        .captures_iter(text)
        .map(|c| Placeholder {
            key: c[1].trim().to_string(),
            default: c.get(2).map(|d| d.as_str().to_string()),
        })
        .filter(|p| !p.key.is_empty())
        .collect()
}

/// Substitute every placeholder that has a configured value or a default.
/// Unresolvable placeholders are left as written.
pub fn resolve_placeholders(text: &str, app: &Application) -> String {
    PLACEHOLDER
        .replace_all(text, |c: &regex::Captures<'_>| {
            let p = Placeholder {
                key: c[1].trim().to_string(),
                default: c.get(2).map(|d| d.as_str().to_string()),
            };
            resolve(app, &p).unwrap_or_else(|| c[0].to_string())
        })
        .into_owned()
}

/// Configuration references: placeholders in annotations and
/// `@ConfigurationProperties` prefix bindings.
pub struct ConfigSource;

impl FactSource for ConfigSource {
    fn name(&self) -> &'static str {
        "config"
    }

    fn extract_facts(&self, ctx: &FactContext<'_>) -> Result<Vec<Fact>> {
        let mut facts = Vec::new();
        for node in ctx.index.nodes() {
            for ann in &node.meta.annotations {
                if annotation_simple_name(ann) == "configurationproperties" {
                    if let Some(prefix) = attribute(ann, &["prefix", "value"]).or_else(|| first_quoted(ann)) {
                        facts.push(
                            Fact::new(FactKind::ConfigReference, node.id, prefix.trim())
                                .with_meta("role", "binding"),
                        );
                    }
                }
                for p in placeholders(ann) {
                    let mut fact = Fact::new(FactKind::ConfigReference, node.id, p.key.clone())
                        .with_meta("role", "placeholder")
                        .with_meta("annotation", ann.clone());
                    if let Some(value) = resolve(ctx.application, &p) {
                        fact = fact.with_meta("value", value);
                    }
                    if let Some(default) = p.default {
                        fact = fact.with_meta("default", default);
                    }
                    facts.push(fact);
                }
            }
        }
        Ok(facts)
    }
}

/// Value of the placeholder from the application config, else its default.
fn resolve(app: &Application, p: &Placeholder) -> Option<String> {
    app.config.get(&p.key).cloned().or_else(|| p.default.clone())
}
