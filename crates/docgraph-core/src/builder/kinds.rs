//! Kind refinement: turn a base kind (CLASS, METHOD, FIELD) into a more
//! specific one from annotations, supertypes, imports and naming.
//!
//! Rules are tried in registry order and the first `Some` wins.

use crate::types::{annotation_simple_name, NodeKind};

/// What a rule can look at. All string lists are lowercased; annotations
/// and supertypes are reduced to their simple names.
#[derive(Debug, Clone, Default)]
pub struct KindContext {
    pub name: String,
    pub pkg: String,
    pub annotations: Vec<String>,
    pub supertypes: Vec<String>,
    pub imports: Vec<String>,
}

impl KindContext {
    pub fn new(
        name: &str,
        pkg: Option<&str>,
        annotations: &[String],
        supertypes: &[String],
        imports: &[String],
    ) -> Self {
        Self {
            name: name.to_string(),
            pkg: pkg.unwrap_or("").to_lowercase(),
            annotations: annotations.iter().map(|a| annotation_simple_name(a)).collect(),
            supertypes: supertypes.iter().map(|s| simple_type_name(s)).collect(),
            imports: imports.iter().map(|i| i.to_lowercase()).collect(),
        }
    }

    pub fn has_any_ann(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.annotations.iter().any(|a| a == n))
    }

    pub fn super_contains(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.supertypes.iter().any(|s| s == n))
    }

    pub fn imports_contain(&self, fragments: &[&str]) -> bool {
        fragments
            .iter()
            .any(|f| self.imports.iter().any(|i| i.contains(f)))
    }

    pub fn name_ends(&self, suffixes: &[&str]) -> bool {
        let name = self.name.to_lowercase();
        suffixes.iter().any(|s| name.ends_with(&s.to_lowercase()))
    }

    pub fn name_contains(&self, parts: &[&str]) -> bool {
        let name = self.name.to_lowercase();
        parts.iter().any(|p| name.contains(&p.to_lowercase()))
    }

    pub fn pkg_contains(&self, fragment: &str) -> bool {
        self.pkg.contains(fragment)
    }
}

/// `java.lang.RuntimeException` / `List<Foo>?` -> `runtimeexception` / `list`
fn simple_type_name(raw: &str) -> String {
    let head = raw.trim().trim_end_matches('?');
    let head = head.split('<').next().unwrap_or(head);
    let head = head.split('(').next().unwrap_or(head).trim();
    head.rsplit('.').next().unwrap_or(head).to_lowercase()
}

/// One refinement strategy.
pub trait KindRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// A more specific kind, or `None` to defer to the next rule.
    fn refine(&self, base: NodeKind, ctx: &KindContext) -> Option<NodeKind>;
}

/// Refinement rules shipped with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKindRule {
    Service,
    Endpoint,
    Job,
    Client,
    Migration,
    Test,
    Config,
    Topic,
    SpringBootApplication,
    Mapper,
    Exception,
    Schema,
    Repository,
    // Function level
    HandlerMethod,
    ScheduledMethod,
    ListenerMethod,
    TestMethod,
    // Field level
    ValueField,
}

const MQ_IMPORTS: &[&str] = &[
    "org.springframework.kafka",
    "org.apache.kafka",
    "org.springframework.amqp.rabbit",
    "io.nats",
];

const HTTP_MAPPINGS: &[&str] = &[
    "getmapping",
    "postmapping",
    "putmapping",
    "deletemapping",
    "patchmapping",
    "requestmapping",
];

impl KindRule for BuiltinKindRule {
    fn name(&self) -> &'static str {
        match self {
            BuiltinKindRule::Service => "service",
            BuiltinKindRule::Endpoint => "endpoint",
            BuiltinKindRule::Job => "job",
            BuiltinKindRule::Client => "client",
            BuiltinKindRule::Migration => "migration",
            BuiltinKindRule::Test => "test",
            BuiltinKindRule::Config => "config",
            BuiltinKindRule::Topic => "topic",
            BuiltinKindRule::SpringBootApplication => "spring_boot_application",
            BuiltinKindRule::Mapper => "mapper",
            BuiltinKindRule::Exception => "exception",
            BuiltinKindRule::Schema => "schema",
            BuiltinKindRule::Repository => "repository",
            BuiltinKindRule::HandlerMethod => "handler_method",
            BuiltinKindRule::ScheduledMethod => "scheduled_method",
            BuiltinKindRule::ListenerMethod => "listener_method",
            BuiltinKindRule::TestMethod => "test_method",
            BuiltinKindRule::ValueField => "value_field",
        }
    }

    fn refine(&self, _base: NodeKind, c: &KindContext) -> Option<NodeKind> {
        let hit = match self {
            BuiltinKindRule::Service => {
                c.has_any_ann(&["service"])
                    || (c.has_any_ann(&["component"]) && c.pkg_contains(".service"))
                    || (c.pkg_contains(".service") && c.name_ends(&["Service"]))
            }
            BuiltinKindRule::Endpoint => c.has_any_ann(&["restcontroller", "controller", "grpcservice"]),
            BuiltinKindRule::Job => {
                c.super_contains(&["job", "tasklet"])
                    || c.imports_contain(&["org.springframework.batch", "org.quartz"])
                    || (c.imports_contain(&["org.springframework.scheduling"])
                        && c.name_contains(&["Scheduler", "Job", "Worker", "Task"]))
                    || c.pkg_contains(".job")
                    || c.name_ends(&["Job", "Worker", "Task", "Scheduler"])
            }
            BuiltinKindRule::Client => {
                c.has_any_ann(&["feignclient"])
                    || c.imports_contain(&["io.grpc", "net.devh.boot.grpc.client"])
            }
            BuiltinKindRule::Migration => {
                c.super_contains(&["javamigration"])
                    || c.imports_contain(&["org.flywaydb.core.api.migration"])
                    || c.pkg_contains(".migration")
                    || c.name_ends(&["Migration"])
            }
            BuiltinKindRule::Test => {
                c.name_ends(&["Test", "IT", "Spec"])
                    || c.pkg_contains(".test")
                    || c.imports_contain(&["org.junit", "junit.jupiter", "io.kotest", "io.mockk"])
            }
            BuiltinKindRule::Config => {
                c.has_any_ann(&["configurationproperties", "configuration"])
                    || c.pkg_contains(".config")
                    || c.name_ends(&["Config", "Configuration", "Properties"])
            }
            BuiltinKindRule::Topic => {
                c.imports_contain(MQ_IMPORTS)
                    && (c.name_ends(&["Consumer", "Producer", "Listener"])
                        || c.pkg_contains(".kafka")
                        || c.pkg_contains(".messag")
                        || c.pkg_contains(".mq"))
            }
            BuiltinKindRule::SpringBootApplication => c.has_any_ann(&["springbootapplication"]),
            BuiltinKindRule::Mapper => {
                c.has_any_ann(&["mapper"]) || c.pkg_contains(".mapper") || c.name_ends(&["Mapper"])
            }
            BuiltinKindRule::Exception => {
                c.super_contains(&["throwable", "exception", "runtimeexception"])
                    || c.name_ends(&["Exception", "Error"])
            }
            BuiltinKindRule::Schema => {
                c.has_any_ann(&["schema"])
                    || c.imports_contain(&["io.swagger.v3.oas", "org.apache.avro", "io.confluent"])
                    || c.pkg_contains(".schema")
            }
            BuiltinKindRule::Repository => {
                c.has_any_ann(&["repository"])
                    || c.super_contains(&["jparepository", "crudrepository", "pagingandsortingrepository"])
                    || c.pkg_contains(".repository")
                    || c.name_ends(&["Repository", "Dao"])
            }
            BuiltinKindRule::HandlerMethod => c.has_any_ann(HTTP_MAPPINGS),
            BuiltinKindRule::ScheduledMethod => c.has_any_ann(&["scheduled"]),
            BuiltinKindRule::ListenerMethod => {
                c.has_any_ann(&["kafkalistener", "rabbitlistener", "natslistener"])
            }
            BuiltinKindRule::TestMethod => c.has_any_ann(&["test", "parameterizedtest"]),
            BuiltinKindRule::ValueField => c.has_any_ann(&["value"]),
        };
        hit.then(|| self.target())
    }
}

impl BuiltinKindRule {
    fn target(&self) -> NodeKind {
        match self {
            BuiltinKindRule::Service | BuiltinKindRule::SpringBootApplication => NodeKind::Service,
            BuiltinKindRule::Endpoint | BuiltinKindRule::HandlerMethod => NodeKind::Endpoint,
            BuiltinKindRule::Job | BuiltinKindRule::ScheduledMethod => NodeKind::Job,
            BuiltinKindRule::Client => NodeKind::Client,
            BuiltinKindRule::Migration => NodeKind::Migration,
            BuiltinKindRule::Test | BuiltinKindRule::TestMethod => NodeKind::Test,
            BuiltinKindRule::Config | BuiltinKindRule::ValueField => NodeKind::Config,
            BuiltinKindRule::Topic | BuiltinKindRule::ListenerMethod => NodeKind::Topic,
            BuiltinKindRule::Mapper => NodeKind::Mapper,
            BuiltinKindRule::Exception => NodeKind::Exception,
            BuiltinKindRule::Schema => NodeKind::Schema,
            BuiltinKindRule::Repository => NodeKind::DbQuery,
        }
    }
}

/// Ordered rule lists for types, functions and fields.
pub struct KindRefiner {
    type_rules: Vec<Box<dyn KindRule>>,
    function_rules: Vec<Box<dyn KindRule>>,
    field_rules: Vec<Box<dyn KindRule>>,
}

impl Default for KindRefiner {
    fn default() -> Self {
        Self::default_rules()
    }
}

impl KindRefiner {
    /// Empty registry: every declaration keeps its base kind.
    pub fn empty() -> Self {
        Self {
            type_rules: Vec::new(),
            function_rules: Vec::new(),
            field_rules: Vec::new(),
        }
    }

    pub fn default_rules() -> Self {
        use BuiltinKindRule::*;
        let boxed = |rules: Vec<BuiltinKindRule>| {
            rules
                .into_iter()
                .map(|r| Box::new(r) as Box<dyn KindRule>)
                .collect::<Vec<_>>()
        };
        Self {
            type_rules: boxed(vec![
                Service,
                Endpoint,
                Job,
                Client,
                Migration,
                Test,
                Config,
                Topic,
                SpringBootApplication,
                Mapper,
                Exception,
                Schema,
                Repository,
            ]),
            function_rules: boxed(vec![HandlerMethod, ScheduledMethod, ListenerMethod, TestMethod]),
            field_rules: boxed(vec![ValueField]),
        }
    }

    pub fn with_type_rule(mut self, rule: Box<dyn KindRule>) -> Self {
        self.type_rules.push(rule);
        self
    }

    pub fn with_function_rule(mut self, rule: Box<dyn KindRule>) -> Self {
        self.function_rules.push(rule);
        self
    }

    pub fn refine_type(&self, base: NodeKind, ctx: &KindContext) -> NodeKind {
        first_match(&self.type_rules, base, ctx)
    }

    pub fn refine_function(&self, base: NodeKind, ctx: &KindContext) -> NodeKind {
        first_match(&self.function_rules, base, ctx)
    }

    pub fn refine_field(&self, base: NodeKind, ctx: &KindContext) -> NodeKind {
        first_match(&self.field_rules, base, ctx)
    }
}

fn first_match(rules: &[Box<dyn KindRule>], base: NodeKind, ctx: &KindContext) -> NodeKind {
    for rule in rules {
        if let Some(kind) = rule.refine(base, ctx) {
            log::trace!("kind rule {} refined {} -> {} for {}", rule.name(), base, kind, ctx.name);
            return kind;
        }
    }
    base
}
