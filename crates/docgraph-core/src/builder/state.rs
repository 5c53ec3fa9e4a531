use crate::declarations::RawFileUnit;
use crate::types::{ApplicationId, Node, NodeId};
use std::collections::HashMap;

/// Which cache a node lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheSlot {
    Package,
    Type,
    Field,
    Function,
}

/// Package and imports remembered for one source file.
#[derive(Debug, Clone, Default)]
pub struct FileContext {
    pub pkg_fqn: Option<String>,
    pub imports: Vec<String>,
    pub unit: Option<RawFileUnit>,
}

/// Caches owned by one build of one application. Created at the start of a
/// build and dropped with it.
#[derive(Debug)]
pub struct BuildState {
    application_id: ApplicationId,
    packages: HashMap<String, Node>,
    types: HashMap<String, Node>,
    fields: HashMap<String, Node>,
    functions: HashMap<String, Node>,
    files: HashMap<String, FileContext>,
}

impl BuildState {
    pub fn new(application_id: ApplicationId) -> Self {
        Self {
            application_id,
            packages: HashMap::new(),
            types: HashMap::new(),
            fields: HashMap::new(),
            functions: HashMap::new(),
            files: HashMap::new(),
        }
    }

    pub fn application_id(&self) -> ApplicationId {
        self.application_id
    }

    fn slot(&self, slot: CacheSlot) -> &HashMap<String, Node> {
        match slot {
            CacheSlot::Package => &self.packages,
            CacheSlot::Type => &self.types,
            CacheSlot::Field => &self.fields,
            CacheSlot::Function => &self.functions,
        }
    }

    fn slot_mut(&mut self, slot: CacheSlot) -> &mut HashMap<String, Node> {
        match slot {
            CacheSlot::Package => &mut self.packages,
            CacheSlot::Type => &mut self.types,
            CacheSlot::Field => &mut self.fields,
            CacheSlot::Function => &mut self.functions,
        }
    }

    pub fn get(&self, slot: CacheSlot, fqn: &str) -> Option<&Node> {
        self.slot(slot).get(fqn)
    }

    pub fn put(&mut self, slot: CacheSlot, node: Node) {
        self.slot_mut(slot).insert(node.fqn.clone(), node);
    }

    pub fn package(&self, fqn: &str) -> Option<&Node> {
        self.packages.get(fqn)
    }

    pub fn type_node(&self, fqn: &str) -> Option<&Node> {
        self.types.get(fqn)
    }

    /// Any cached node with this id, whatever its slot.
    pub fn by_id(&self, id: NodeId) -> Option<&Node> {
        self.packages
            .values()
            .chain(self.types.values())
            .chain(self.fields.values())
            .chain(self.functions.values())
            .find(|n| n.id == id)
    }

    pub fn remember_file(&mut self, unit: RawFileUnit) {
        let ctx = FileContext {
            pkg_fqn: unit.pkg_fqn.clone(),
            imports: unit.imports.clone(),
            unit: Some(unit.clone()),
        };
        self.files.insert(unit.file_path, ctx);
    }

    pub fn file(&self, path: &str) -> Option<&FileContext> {
        self.files.get(path)
    }

    /// Imports recorded for `path`, or nothing if the file was never seen.
    pub fn imports_for(&self, path: Option<&str>) -> Vec<String> {
        path.and_then(|p| self.files.get(p))
            .map(|f| f.imports.clone())
            .unwrap_or_default()
    }

    /// Package recorded for `path`.
    pub fn package_for(&self, path: Option<&str>) -> Option<String> {
        path.and_then(|p| self.files.get(p))
            .and_then(|f| f.pkg_fqn.clone())
    }

    pub fn cached_nodes(&self) -> usize {
        self.packages.len() + self.types.len() + self.fields.len() + self.functions.len()
    }
}
