use crate::error::Result;
use crate::facts::{resolve_placeholders, Fact, FactContext, FactKind, FactSource};
use crate::types::{topic_fqn, ApiMetadata, IntegrationPoint, Node, TopicOperation};

/// Integration facts: broker listeners declared in source, and the
/// integration points the enricher copied from library methods.
pub struct ApiMetadataSource;

impl FactSource for ApiMetadataSource {
    fn name(&self) -> &'static str {
        "api_metadata"
    }

    fn extract_facts(&self, ctx: &FactContext<'_>) -> Result<Vec<Fact>> {
        let mut facts = Vec::new();
        for node in ctx.index.nodes() {
            if let Some(ApiMetadata::MessageBroker {
                broker,
                topic,
                queue,
                consumer_group,
                ..
            }) = &node.meta.api_metadata
            {
                if let Some(name) = topic.as_deref().or(queue.as_deref()).filter(|t| !t.is_empty()) {
                    let name = resolve_placeholders(name, ctx.application);
                    let mut fact = Fact::new(FactKind::TopicConsume, node.id, topic_fqn(&name))
                        .with_meta("broker", format!("{:?}", broker))
                        .with_meta("origin", "api_metadata");
                    if let Some(group) = consumer_group {
                        fact = fact.with_meta("consumer_group", group.clone());
                    }
                    facts.push(fact);
                }
            }
            for point in &node.meta.integrations {
                if let Some(fact) = integration_fact(node, point) {
                    facts.push(fact);
                }
            }
        }
        Ok(facts)
    }
}

fn integration_fact(node: &Node, point: &IntegrationPoint) -> Option<Fact> {
    let target = point.virtual_fqn()?;
    let fact = match point {
        IntegrationPoint::HttpEndpoint {
            url,
            http_method,
            client_type,
            has_retry,
            has_timeout,
            has_circuit_breaker,
        } => {
            let mut fact = Fact::new(FactKind::HttpCall, node.id, target)
                .with_meta("has_retry", has_retry.to_string())
                .with_meta("has_timeout", has_timeout.to_string())
                .with_meta("has_circuit_breaker", has_circuit_breaker.to_string());
            if let Some(url) = url {
                fact = fact.with_meta("url", url.clone());
            }
            if let Some(method) = http_method {
                fact = fact.with_meta("http_method", method.to_uppercase());
            }
            if let Some(client) = client_type {
                fact = fact.with_meta("client_type", client.clone());
            }
            fact
        }
        IntegrationPoint::KafkaTopic { operation, .. } => {
            let kind = match operation {
                TopicOperation::Produce => FactKind::TopicProduce,
                TopicOperation::Consume => FactKind::TopicConsume,
            };
            Fact::new(kind, node.id, target)
        }
        IntegrationPoint::CamelRoute {
            uri,
            endpoint_type,
            direction,
        } => {
            let is_http = endpoint_type.as_deref() == Some("http")
                || uri.as_deref().is_some_and(|u| u.starts_with("http"));
            if !is_http {
                return None;
            }
            let mut fact = Fact::new(FactKind::HttpCall, node.id, target).with_meta("client_type", "camel");
            if let Some(direction) = direction {
                fact = fact.with_meta("direction", direction.clone());
            }
            fact
        }
    };
    Some(fact.with_meta("origin", "library"))
}
