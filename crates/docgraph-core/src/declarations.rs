//! Language-agnostic declaration records produced by a parsing front end.
//!
//! A front end emits one [`RawDeclaration`] per source construct, optionally
//! preceded by a [`RawFileUnit`] per file carrying the package and imports.
//! Records are immutable and only live for one parse pass.

use crate::types::RawUsage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One source construct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawDeclaration {
    FileUnit(RawFileUnit),
    Package(RawPackage),
    Type(RawType),
    Field(RawField),
    Function(RawFunction),
}

impl RawDeclaration {
    /// Best-effort identifier for log lines, before any FQN is built.
    pub fn label(&self) -> String {
        match self {
            RawDeclaration::FileUnit(u) => u.file_path.clone(),
            RawDeclaration::Package(p) => p.name.clone(),
            RawDeclaration::Type(t) => match t.pkg_fqn.as_deref() {
                Some(pkg) if !pkg.is_empty() => format!("{}.{}", pkg, t.simple_name),
                _ => t.simple_name.clone(),
            },
            RawDeclaration::Field(f) => match f.owner_fqn.as_deref() {
                Some(owner) => format!("{}.{}", owner, f.name),
                None => f.name.clone(),
            },
            RawDeclaration::Function(f) => match f.owner_fqn.as_deref() {
                Some(owner) => format!("{}.{}", owner, f.name),
                None => f.name.clone(),
            },
        }
    }
}

/// Per-file context: package and imports.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawFileUnit {
    pub lang: String,
    pub file_path: String,
    pub pkg_fqn: Option<String>,
    pub imports: Vec<String>,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawPackage {
    pub lang: String,
    pub file_path: Option<String>,
    pub name: String,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawType {
    pub lang: String,
    pub file_path: Option<String>,
    pub pkg_fqn: Option<String>,
    pub simple_name: String,
    /// `class`, `interface`, `enum`, `record`, `object`, ...
    pub kind_repr: String,
    pub supertypes: Vec<String>,
    pub annotations: Vec<String>,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub text: Option<String>,
    pub doc: Option<String>,
    pub modifiers: Vec<String>,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawField {
    pub lang: String,
    pub file_path: Option<String>,
    pub pkg_fqn: Option<String>,
    pub owner_fqn: Option<String>,
    pub name: String,
    pub type_repr: Option<String>,
    pub annotations: Vec<String>,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub text: Option<String>,
    pub doc: Option<String>,
    pub modifiers: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawFunction {
    pub lang: String,
    pub file_path: Option<String>,
    pub pkg_fqn: Option<String>,
    pub owner_fqn: Option<String>,
    pub name: String,
    pub signature_repr: Option<String>,
    pub param_names: Vec<String>,
    pub param_types: Vec<String>,
    pub return_type: Option<String>,
    pub annotations: Vec<String>,
    pub raw_usages: Vec<RawUsage>,
    pub throws: Vec<String>,
    pub locals: Vec<String>,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub text: Option<String>,
    pub doc: Option<String>,
    pub modifiers: Vec<String>,
}
