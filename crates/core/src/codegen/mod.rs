//! Rust code generation from the IR.
//!
//! The pipeline for every pass is:
//! 1. Codegen: IR -> [`RsModule`] per output file (`models.rs`, `services.rs`, `builder.rs`)
//! 2. Emit: [`RsModule`] -> unformatted source (via the [`Emit`] trait)
//! 3. Format: handled by `crate::format`
//!
//! No naming or ownership decisions are made here; everything comes resolved
//! from the IR.

pub mod ast;
pub mod builder;
pub mod emit;
pub mod models;
pub mod services;

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::debug;

use crate::ir::types::{Model, ScalarType, TypeRef};
use ast::{RsModule, RsType};
pub use emit::Emit;

/// Module paths the generated code refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOptions {
    /// Where model types live, e.g. `crate::models`
    pub models_path: String,
    /// Where service functions live, e.g. `crate::services`
    pub services_path: String,
    /// SDK runtime module providing `Client`, `Response`, `Nothing`, `Result`
    /// and `encode_query`
    pub client_path: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            models_path: "crate::models".to_string(),
            services_path: "crate::services".to_string(),
            client_path: "crate::client".to_string(),
        }
    }
}

impl EmitOptions {
    /// Path of an item of the runtime client module.
    pub fn client(&self, item: &str) -> String {
        format!("{}::{item}", self.client_path)
    }
}

/// A generated file before formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Relative to the pass output directory.
    pub path: PathBuf,
    /// File contents.
    pub module: RsModule,
}

/// Maps IR type references to Rust types.
///
/// References to models that were not generated fall back to
/// `serde_json::Value` so the output still compiles.
#[derive(Debug)]
pub struct TypeMapper<'a> {
    known: BTreeSet<&'a str>,
    /// Path prefix for model names; `None` inside the models module itself.
    prefix: Option<&'a str>,
}

impl<'a> TypeMapper<'a> {
    /// Mapper over the generated `models`.
    pub fn new(models: &'a [Model], prefix: Option<&'a str>) -> Self {
        Self {
            known: models.iter().map(|m| m.name.as_str()).collect(),
            prefix,
        }
    }

    /// Whether a model with this type name is generated.
    pub fn is_known(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// Rust type for an IR type.
    pub fn rs_type(&self, ty: &TypeRef) -> RsType {
        match ty {
            TypeRef::String => RsType::path("String"),
            TypeRef::Timestamp => RsType::path("chrono::DateTime<chrono::Utc>"),
            TypeRef::Int32 => RsType::path("i32"),
            TypeRef::Int64 => RsType::path("i64"),
            TypeRef::Float32 => RsType::path("f32"),
            TypeRef::Float64 => RsType::path("f64"),
            TypeRef::Bool => RsType::path("bool"),
            TypeRef::Any => RsType::path("serde_json::Value"),
            TypeRef::Named(name) if self.is_known(name) => match self.prefix {
                Some(prefix) => RsType::path(format!("{prefix}::{name}")),
                None => RsType::path(name.clone()),
            },
            TypeRef::Named(name) => {
                debug!(type_name = %name, "Unknown model reference, using serde_json::Value");
                RsType::path("serde_json::Value")
            }
            TypeRef::Array(inner) => RsType::vec(self.rs_type(inner)),
            TypeRef::Map(inner) => RsType::map(self.rs_type(inner)),
        }
    }
}

/// Owned Rust type for a scalar parameter.
pub fn scalar_type(scalar: ScalarType) -> RsType {
    RsType::path(match scalar {
        ScalarType::String => "String",
        ScalarType::Int32 => "i32",
        ScalarType::Int64 => "i64",
        ScalarType::Float32 => "f32",
        ScalarType::Float64 => "f64",
        ScalarType::Bool => "bool",
    })
}

/// Borrowed-where-sensible Rust type for a scalar function argument.
pub fn scalar_arg_type(scalar: ScalarType) -> RsType {
    match scalar {
        ScalarType::String => RsType::reference(RsType::path("str")),
        other => scalar_type(other),
    }
}

/// Source lines shared by every generated doc block.
pub(crate) fn doc_block(summary: Option<&str>, description: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(summary) = summary {
        lines.extend(crate::ir::utils::doc_lines(summary));
    }
    if let Some(description) = description {
        let body = crate::ir::utils::doc_lines(description);
        if !body.is_empty() && summary.map(str::trim) != Some(description.trim()) {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.extend(body);
        }
    }
    lines
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ir::types::{ModelKind, Record};

    fn model(name: &str) -> Model {
        Model {
            name: name.into(),
            source_name: name.into(),
            description: None,
            kind: ModelKind::Record(Record::default()),
            implements: Vec::new(),
        }
    }

    #[test]
    fn test_type_mapper_prefixes_known_models() {
        let models = vec![model("Zone")];
        let mapper = TypeMapper::new(&models, Some("crate::models"));
        assert_eq!(
            mapper.rs_type(&TypeRef::array(TypeRef::named("Zone"))).emit(),
            "Vec<crate::models::Zone>"
        );
        assert_eq!(
            mapper.rs_type(&TypeRef::named("Missing")).emit(),
            "serde_json::Value"
        );

        let local = TypeMapper::new(&models, None);
        assert_eq!(
            local.rs_type(&TypeRef::map(TypeRef::named("Zone"))).emit(),
            "std::collections::HashMap<String, Zone>"
        );
    }

    #[test]
    fn test_doc_block_skips_repeated_description() {
        assert_eq!(doc_block(Some("Get a zone"), Some("Get a zone")), vec!["Get a zone"]);
        assert_eq!(
            doc_block(Some("Get a zone"), Some("Details.")),
            vec!["Get a zone", "", "Details."]
        );
        assert!(doc_block(None, None).is_empty());
    }
}
