//! Integration surface extraction from annotations: HTTP handlers, message
//! broker listeners and gRPC methods.

use crate::types::{annotation_simple_name, ApiMetadata, BrokerType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static FIRST_QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["']([^"']*)["']"#).expect("valid quoted-string regex"));

static REQUEST_METHOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"RequestMethod\.([A-Z]+)").expect("valid request-method regex"));

/// Whether metadata is extracted for a type or for one of its functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiLevel {
    Type,
    Function,
}

/// Inputs available to an extractor.
#[derive(Debug, Clone, Copy)]
pub struct ApiContext<'a> {
    pub level: ApiLevel,
    pub name: &'a str,
    pub annotations: &'a [String],
    /// Annotations of the owning type (empty at type level).
    pub owner_annotations: &'a [String],
    pub owner_name: Option<&'a str>,
    pub pkg: Option<&'a str>,
    pub imports: &'a [String],
}

impl<'a> ApiContext<'a> {
    fn find(&self, names: &[&str]) -> Option<&'a String> {
        self.annotations
            .iter()
            .find(|a| names.contains(&annotation_simple_name(a).as_str()))
    }

    fn find_on_owner(&self, names: &[&str]) -> Option<&'a String> {
        self.owner_annotations
            .iter()
            .find(|a| names.contains(&annotation_simple_name(a).as_str()))
    }

    fn imports_contain(&self, fragment: &str) -> bool {
        self.imports.iter().any(|i| i.contains(fragment))
    }
}

/// First quoted literal inside an annotation's argument list.
pub fn first_quoted(annotation: &str) -> Option<String> {
    let args = annotation.split_once('(').map(|(_, a)| a)?;
    FIRST_QUOTED.captures(args).map(|c| c[1].to_string())
}

/// Value of a named annotation attribute: `name = "x"`, `name = ["x"]`,
/// `name = {"x"}` or single-quoted forms.
pub fn attribute(annotation: &str, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        let pattern = format!(r#"(?:^|[\s(,]){}\s*=\s*[\[{{]?\s*["']([^"']*)["']"#, regex::escape(name));
        Regex::new(&pattern)
            .ok()
            .and_then(|re| re.captures(annotation).map(|c| c[1].to_string()))
    })
}

/// One extraction strategy.
pub trait ApiMetadataExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, ctx: &ApiContext<'_>) -> Option<ApiMetadata>;
}

pub struct HttpEndpointExtractor;

impl HttpEndpointExtractor {
    fn method_for(annotation: &str) -> String {
        match annotation_simple_name(annotation).as_str() {
            "getmapping" => "GET".into(),
            "postmapping" => "POST".into(),
            "putmapping" => "PUT".into(),
            "deletemapping" => "DELETE".into(),
            "patchmapping" => "PATCH".into(),
            _ => REQUEST_METHOD
                .captures(annotation)
                .map(|c| c[1].to_string())
                .unwrap_or_else(|| "GET".into()),
        }
    }

    fn list_attr(annotation: &str, name: &str) -> Vec<String> {
        attribute(annotation, &[name]).into_iter().collect()
    }
}

impl ApiMetadataExtractor for HttpEndpointExtractor {
    fn name(&self) -> &'static str {
        "http"
    }

    fn extract(&self, ctx: &ApiContext<'_>) -> Option<ApiMetadata> {
        match ctx.level {
            ApiLevel::Type => {
                let mapping = ctx.find(&["requestmapping"])?;
                let base = first_quoted(mapping)?;
                Some(ApiMetadata::HttpEndpoint {
                    method: "*".into(),
                    path: String::new(),
                    base_path: Some(base),
                    consumes: Self::list_attr(mapping, "consumes"),
                    produces: Self::list_attr(mapping, "produces"),
                    headers: BTreeMap::new(),
                })
            }
            ApiLevel::Function => {
                let mapping = ctx.find(&[
                    "getmapping",
                    "postmapping",
                    "putmapping",
                    "deletemapping",
                    "patchmapping",
                    "requestmapping",
                ])?;
                let base_path = ctx.find_on_owner(&["requestmapping"]).and_then(|a| first_quoted(a));
                let mut headers = BTreeMap::new();
                if let Some(h) = attribute(mapping, &["headers"]) {
                    if let Some((k, v)) = h.split_once('=') {
                        headers.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
                Some(ApiMetadata::HttpEndpoint {
                    method: Self::method_for(mapping),
                    path: first_quoted(mapping).unwrap_or_else(|| "/".into()),
                    base_path,
                    consumes: Self::list_attr(mapping, "consumes"),
                    produces: Self::list_attr(mapping, "produces"),
                    headers,
                })
            }
        }
    }
}

pub struct MessageBrokerExtractor;

impl ApiMetadataExtractor for MessageBrokerExtractor {
    fn name(&self) -> &'static str {
        "message_broker"
    }

    fn extract(&self, ctx: &ApiContext<'_>) -> Option<ApiMetadata> {
        if let Some(kafka) = ctx.find(&["kafkalistener"]) {
            return Some(ApiMetadata::MessageBroker {
                broker: BrokerType::Kafka,
                topic: attribute(kafka, &["topics", "topic"]),
                queue: None,
                consumer_group: attribute(kafka, &["groupId", "group"]),
                exchange: None,
                routing_key: None,
            });
        }
        if let Some(rabbit) = ctx.find(&["rabbitlistener"]) {
            return Some(ApiMetadata::MessageBroker {
                broker: BrokerType::RabbitMq,
                topic: None,
                queue: attribute(rabbit, &["queues", "queue"]),
                consumer_group: None,
                exchange: attribute(rabbit, &["exchange"]),
                routing_key: attribute(rabbit, &["routingKey", "key"]),
            });
        }
        let nats = ctx.find(&["natslistener"]).or_else(|| {
            if ctx.imports_contain("io.nats") {
                ctx.annotations.iter().find(|a| a.contains("subject"))
            } else {
                None
            }
        });
        if let Some(nats) = nats {
            return Some(ApiMetadata::MessageBroker {
                broker: BrokerType::Nats,
                topic: attribute(nats, &["subject"]).or_else(|| first_quoted(nats)),
                queue: attribute(nats, &["queue"]),
                consumer_group: None,
                exchange: None,
                routing_key: None,
            });
        }
        None
    }
}

pub struct GrpcEndpointExtractor;

impl GrpcEndpointExtractor {
    fn service_name(ctx: &ApiContext<'_>) -> String {
        if let Some(owner) = ctx.owner_name.filter(|o| !o.is_empty()) {
            return owner.to_string();
        }
        ctx.pkg
            .and_then(|p| p.rsplit('.').next())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| "UnknownService".to_string())
    }
}

impl ApiMetadataExtractor for GrpcEndpointExtractor {
    fn name(&self) -> &'static str {
        "grpc"
    }

    fn extract(&self, ctx: &ApiContext<'_>) -> Option<ApiMetadata> {
        match ctx.level {
            ApiLevel::Type => {
                ctx.find(&["grpcservice"])?;
                Some(ApiMetadata::GrpcEndpoint {
                    service: ctx.name.to_string(),
                    method: "*".into(),
                    package: ctx.pkg.map(str::to_string),
                })
            }
            ApiLevel::Function => {
                let applies = ctx.find(&["grpcmethod"]).is_some()
                    || ctx.find_on_owner(&["grpcservice"]).is_some()
                    || (ctx.imports_contain("io.grpc") && ctx.owner_name.is_some());
                if !applies {
                    return None;
                }
                Some(ApiMetadata::GrpcEndpoint {
                    service: Self::service_name(ctx),
                    method: ctx.name.to_string(),
                    package: ctx.pkg.map(str::to_string),
                })
            }
        }
    }
}

/// Ordered extractor registry; the first extractor returning metadata wins.
pub struct ApiMetadataCollector {
    extractors: Vec<Box<dyn ApiMetadataExtractor>>,
}

impl Default for ApiMetadataCollector {
    fn default() -> Self {
        Self::default_extractors()
    }
}

impl ApiMetadataCollector {
    pub fn default_extractors() -> Self {
        Self {
            extractors: vec![
                Box::new(HttpEndpointExtractor),
                Box::new(MessageBrokerExtractor),
                Box::new(GrpcEndpointExtractor),
            ],
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn ApiMetadataExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn collect(&self, ctx: &ApiContext<'_>) -> Option<ApiMetadata> {
        self.extractors.iter().find_map(|e| e.extract(ctx))
    }
}
