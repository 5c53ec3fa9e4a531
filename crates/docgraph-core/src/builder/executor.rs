use crate::builder::api_metadata::{ApiContext, ApiLevel, ApiMetadataCollector};
use crate::builder::kinds::{KindContext, KindRefiner};
use crate::builder::node_builder::{NodeBuilder, NodeDraft};
use crate::builder::normalize::derive_span;
use crate::builder::planner::{field_fqn, function_fqn, non_blank, type_fqn, MutationCommand};
use crate::builder::state::{BuildState, CacheSlot};
use crate::declarations::{RawField, RawFunction, RawType};
use crate::error::Result;
use crate::storage::GraphStore;
use crate::types::{Node, NodeKind, NodeMeta};
use std::collections::BTreeMap;

/// Applies mutation commands against one build's state.
pub struct CommandExecutor<'a> {
    builder: &'a mut NodeBuilder,
    refiner: &'a KindRefiner,
    api: &'a ApiMetadataCollector,
    store: &'a dyn GraphStore,
}

impl<'a> CommandExecutor<'a> {
    pub fn new(
        builder: &'a mut NodeBuilder,
        refiner: &'a KindRefiner,
        api: &'a ApiMetadataCollector,
        store: &'a dyn GraphStore,
    ) -> Self {
        Self {
            builder,
            refiner,
            api,
            store,
        }
    }

    pub fn record_failure(&mut self) {
        self.builder.record_failure();
    }

    /// Apply one command. Returns the node it produced, if any.
    pub fn execute(&mut self, state: &mut BuildState, cmd: MutationCommand) -> Result<Option<Node>> {
        match cmd {
            MutationCommand::RememberFileUnit(unit) => {
                state.remember_file(unit);
                Ok(None)
            }
            MutationCommand::EnsurePackage {
                pkg_fqn,
                lang,
                file_path,
                line_start,
                line_end,
                source,
            } => {
                // First creation in a build wins, whichever file declared it.
                if let Some(cached) = state.package(&pkg_fqn) {
                    return Ok(Some(cached.clone()));
                }
                let mut draft = NodeDraft::new(pkg_fqn.clone(), last_segment(&pkg_fqn), NodeKind::Package);
                draft.lang = lang;
                draft.span = derive_span(line_start, line_end, source.as_deref());
                draft.file_path = file_path;
                draft.source = source;
                draft.meta.pkg_fqn = Some(pkg_fqn);
                let (node, _) = self.builder.upsert(state, CacheSlot::Package, draft, None)?;
                Ok(Some(node))
            }
            MutationCommand::UpsertType { raw, base_kind } => self.upsert_type(state, raw, base_kind).map(Some),
            MutationCommand::UpsertField(raw) => self.upsert_field(state, raw).map(Some),
            MutationCommand::UpsertFunction(raw) => self.upsert_function(state, raw).map(Some),
        }
    }

    fn upsert_type(&mut self, state: &mut BuildState, raw: RawType, base_kind: NodeKind) -> Result<Node> {
        let pkg = self.package_of(state, raw.pkg_fqn.as_deref(), raw.file_path.as_deref());
        let fqn = type_fqn(pkg.as_deref(), &raw.simple_name);
        let parent = self.package_node(state, pkg.as_deref(), &raw.lang)?;
        let imports = state.imports_for(raw.file_path.as_deref());

        let ctx = KindContext::new(&raw.simple_name, pkg.as_deref(), &raw.annotations, &raw.supertypes, &imports);
        let kind = self.refiner.refine_type(base_kind, &ctx);
        let api_metadata = self.api.collect(&ApiContext {
            level: ApiLevel::Type,
            name: &raw.simple_name,
            annotations: &raw.annotations,
            owner_annotations: &[],
            owner_name: None,
            pkg: pkg.as_deref(),
            imports: &imports,
        });

        let mut draft = NodeDraft::new(fqn, raw.simple_name.clone(), kind);
        draft.lang = raw.lang;
        draft.file_path = raw.file_path;
        draft.span = derive_span(raw.line_start, raw.line_end, raw.text.as_deref());
        draft.doc = raw.doc.clone();
        draft.source = raw.text;
        draft.meta = NodeMeta {
            pkg_fqn: pkg,
            imports,
            annotations: raw.annotations,
            supertypes_simple: raw.supertypes,
            modifiers: raw.modifiers,
            doc_tags: parse_doc_tags(raw.doc.as_deref()),
            api_metadata,
            ..Default::default()
        };

        let (node, _) = self.builder.upsert(state, CacheSlot::Type, draft, parent.as_ref())?;
        Ok(node)
    }

    fn upsert_field(&mut self, state: &mut BuildState, raw: RawField) -> Result<Node> {
        let pkg = self.package_of(state, raw.pkg_fqn.as_deref(), raw.file_path.as_deref());
        let owner = self.owner_node(state, raw.owner_fqn.as_deref())?;
        let parent = match owner {
            Some(owner) => Some(owner),
            None => self.package_node(state, pkg.as_deref(), &raw.lang)?,
        };
        let fqn = field_fqn(raw.owner_fqn.as_deref(), pkg.as_deref(), &raw.name);
        let imports = state.imports_for(raw.file_path.as_deref());

        let ctx = KindContext::new(&raw.name, pkg.as_deref(), &raw.annotations, &[], &imports);
        let kind = self.refiner.refine_field(NodeKind::Field, &ctx);

        let mut draft = NodeDraft::new(fqn, raw.name.clone(), kind);
        draft.lang = raw.lang;
        draft.file_path = raw.file_path;
        draft.span = derive_span(raw.line_start, raw.line_end, raw.text.as_deref());
        draft.doc = raw.doc.clone();
        draft.source = raw.text;
        draft.signature = raw
            .type_repr
            .as_ref()
            .map(|t| format!("{}: {}", raw.name, t));
        draft.meta = NodeMeta {
            pkg_fqn: pkg,
            owner_fqn: raw.owner_fqn,
            imports,
            annotations: raw.annotations,
            return_type: raw.type_repr,
            modifiers: raw.modifiers,
            doc_tags: parse_doc_tags(raw.doc.as_deref()),
            ..Default::default()
        };

        let (node, _) = self.builder.upsert(state, CacheSlot::Field, draft, parent.as_ref())?;
        Ok(node)
    }

    fn upsert_function(&mut self, state: &mut BuildState, raw: RawFunction) -> Result<Node> {
        let pkg = self.package_of(state, raw.pkg_fqn.as_deref(), raw.file_path.as_deref());
        let owner = self.owner_node(state, raw.owner_fqn.as_deref())?;
        let fqn = function_fqn(raw.owner_fqn.as_deref(), pkg.as_deref(), &raw.name, &raw.param_names);
        let imports = state.imports_for(raw.file_path.as_deref());

        let ctx = KindContext::new(&raw.name, pkg.as_deref(), &raw.annotations, &[], &imports);
        let kind = self.refiner.refine_function(NodeKind::Method, &ctx);

        let owner_annotations = owner
            .as_ref()
            .map(|o| o.meta.annotations.clone())
            .unwrap_or_default();
        let owner_name = owner
            .as_ref()
            .map(|o| o.name.clone())
            .or_else(|| raw.owner_fqn.as_deref().map(last_segment));
        let api_metadata = self.api.collect(&ApiContext {
            level: ApiLevel::Function,
            name: &raw.name,
            annotations: &raw.annotations,
            owner_annotations: &owner_annotations,
            owner_name: owner_name.as_deref(),
            pkg: pkg.as_deref(),
            imports: &imports,
        });

        let parent = match owner {
            Some(owner) => Some(owner),
            None => self.package_node(state, pkg.as_deref(), &raw.lang)?,
        };

        let signature = non_blank(raw.signature_repr.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}({})", raw.name, raw.param_names.join(",")));

        let mut draft = NodeDraft::new(fqn, raw.name.clone(), kind);
        draft.lang = raw.lang;
        draft.file_path = raw.file_path;
        draft.span = derive_span(raw.line_start, raw.line_end, raw.text.as_deref());
        draft.doc = raw.doc.clone();
        draft.source = raw.text;
        draft.signature = Some(signature);
        draft.meta = NodeMeta {
            pkg_fqn: pkg,
            owner_fqn: raw.owner_fqn,
            imports,
            annotations: raw.annotations,
            params: raw.param_names,
            param_types: raw.param_types,
            return_type: raw.return_type,
            locals: raw.locals,
            modifiers: raw.modifiers,
            doc_tags: parse_doc_tags(raw.doc.as_deref()),
            raw_usages: raw.raw_usages,
            throws: raw.throws,
            api_metadata,
            ..Default::default()
        };

        let (node, _) = self.builder.upsert(state, CacheSlot::Function, draft, parent.as_ref())?;
        Ok(node)
    }

    /// Declared package, falling back to the one remembered for the file.
    fn package_of(&self, state: &BuildState, declared: Option<&str>, file: Option<&str>) -> Option<String> {
        non_blank(declared)
            .map(str::to_string)
            .or_else(|| state.package_for(file))
    }

    /// Package node for `pkg`, created on first use.
    fn package_node(&mut self, state: &mut BuildState, pkg: Option<&str>, lang: &str) -> Result<Option<Node>> {
        let Some(pkg) = non_blank(pkg) else {
            return Ok(None);
        };
        let cmd = MutationCommand::EnsurePackage {
            pkg_fqn: pkg.to_string(),
            lang: lang.to_string(),
            file_path: None,
            line_start: None,
            line_end: None,
            source: None,
        };
        self.execute(state, cmd)
    }

    /// Owning type, from this build's cache or from storage.
    fn owner_node(&self, state: &BuildState, owner: Option<&str>) -> Result<Option<Node>> {
        let Some(owner) = non_blank(owner) else {
            return Ok(None);
        };
        if let Some(node) = state.type_node(owner) {
            return Ok(Some(node.clone()));
        }
        self.store.find_node_by_fqn(state.application_id(), owner)
    }
}

fn last_segment(fqn: &str) -> String {
    fqn.rsplit('.').next().unwrap_or(fqn).to_string()
}

/// `@param id the id` / `@return x` lines of a doc comment. Repeated tags
/// are keyed by their first word (`param:id`).
pub fn parse_doc_tags(doc: Option<&str>) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    let Some(doc) = doc else {
        return tags;
    };
    for line in doc.lines() {
        let line = line.trim().trim_start_matches('*').trim();
        let Some(rest) = line.strip_prefix('@') else {
            continue;
        };
        let (tag, body) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let body = body.trim();
        let key = match tag {
            "param" | "throws" | "exception" | "property" => {
                let (name, desc) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
                tags.insert(format!("{}:{}", tag, name), desc.trim().to_string());
                continue;
            }
            other => other.to_string(),
        };
        tags.entry(key).or_insert_with(|| body.to_string());
    }
    tags
}
