use crate::declarations::{RawDeclaration, RawField, RawFileUnit, RawFunction, RawType};
use crate::types::NodeKind;

/// Idempotent instruction derived from one declaration. Carries no side
/// effects until handed to the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationCommand {
    RememberFileUnit(RawFileUnit),
    EnsurePackage {
        pkg_fqn: String,
        lang: String,
        file_path: Option<String>,
        line_start: Option<i64>,
        line_end: Option<i64>,
        source: Option<String>,
    },
    UpsertType {
        raw: RawType,
        base_kind: NodeKind,
    },
    UpsertField(RawField),
    UpsertFunction(RawFunction),
}

impl MutationCommand {
    pub fn name(&self) -> &'static str {
        match self {
            MutationCommand::RememberFileUnit(_) => "remember_file_unit",
            MutationCommand::EnsurePackage { .. } => "ensure_package",
            MutationCommand::UpsertType { .. } => "upsert_type",
            MutationCommand::UpsertField(_) => "upsert_field",
            MutationCommand::UpsertFunction(_) => "upsert_function",
        }
    }
}

/// Turn one declaration into its ordered command list.
pub fn plan(decl: &RawDeclaration) -> Vec<MutationCommand> {
    match decl {
        RawDeclaration::FileUnit(unit) => {
            let mut out = vec![MutationCommand::RememberFileUnit(unit.clone())];
            if let Some(pkg) = non_blank(unit.pkg_fqn.as_deref()) {
                out.push(MutationCommand::EnsurePackage {
                    pkg_fqn: pkg.to_string(),
                    lang: unit.lang.clone(),
                    file_path: Some(unit.file_path.clone()),
                    line_start: Some(unit.line_start.unwrap_or(0)),
                    line_end: Some(unit.line_end.unwrap_or(1)),
                    source: unit.text.clone(),
                });
            }
            out
        }
        RawDeclaration::Package(pkg) => match non_blank(Some(pkg.name.as_str())) {
            Some(name) => vec![MutationCommand::EnsurePackage {
                pkg_fqn: name.to_string(),
                lang: pkg.lang.clone(),
                file_path: pkg.file_path.clone(),
                line_start: pkg.line_start,
                line_end: pkg.line_end,
                source: pkg.text.clone(),
            }],
            None => Vec::new(),
        },
        RawDeclaration::Type(raw) => {
            let mut out = ensure_package(raw.pkg_fqn.as_deref(), &raw.lang, raw.file_path.as_ref());
            out.push(MutationCommand::UpsertType {
                raw: raw.clone(),
                base_kind: base_kind(&raw.kind_repr),
            });
            out
        }
        RawDeclaration::Field(raw) => {
            let mut out = ensure_package(raw.pkg_fqn.as_deref(), &raw.lang, raw.file_path.as_ref());
            out.push(MutationCommand::UpsertField(raw.clone()));
            out
        }
        RawDeclaration::Function(raw) => {
            let mut out = ensure_package(raw.pkg_fqn.as_deref(), &raw.lang, raw.file_path.as_ref());
            out.push(MutationCommand::UpsertFunction(raw.clone()));
            out
        }
    }
}

fn ensure_package(pkg: Option<&str>, lang: &str, file_path: Option<&String>) -> Vec<MutationCommand> {
    match non_blank(pkg) {
        Some(pkg) => vec![MutationCommand::EnsurePackage {
            pkg_fqn: pkg.to_string(),
            lang: lang.to_string(),
            file_path: file_path.cloned(),
            line_start: None,
            line_end: None,
            source: None,
        }],
        None => Vec::new(),
    }
}

/// Base kind from the front end's kind keyword. Unknown keywords, including
/// `object`, are treated as classes.
pub fn base_kind(kind_repr: &str) -> NodeKind {
    match kind_repr.trim().to_lowercase().as_str() {
        "interface" => NodeKind::Interface,
        "enum" => NodeKind::Enum,
        "record" => NodeKind::Record,
        _ => NodeKind::Class,
    }
}

pub(crate) fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

// === FQN construction ===

pub fn type_fqn(pkg: Option<&str>, simple_name: &str) -> String {
    match non_blank(pkg) {
        Some(pkg) => format!("{}.{}", pkg, simple_name),
        None => simple_name.to_string(),
    }
}

pub fn field_fqn(owner: Option<&str>, pkg: Option<&str>, name: &str) -> String {
    match non_blank(owner).or_else(|| non_blank(pkg)) {
        Some(prefix) => format!("{}.{}", prefix, name),
        None => name.to_string(),
    }
}

pub fn function_fqn(owner: Option<&str>, pkg: Option<&str>, name: &str, params: &[String]) -> String {
    let params = params.join(",");
    match non_blank(owner).or_else(|| non_blank(pkg)) {
        Some(prefix) => format!("{}.{}({})", prefix, name, params),
        None => format!("{}({})", name, params),
    }
}
