//! Models pass: one file per model plus a `mod.rs` re-exporting them all.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;

use tracing::{info, warn};

use super::ast::{
    ImplItem, Receiver, RsConst, RsEnum, RsField, RsFn, RsImpl, RsItem, RsModule, RsParam,
    RsStmt, RsStruct, RsType, RsTypeAlias, RsVariant, StructShape,
};
use super::{SourceFile, TypeMapper};
use crate::ir::types::{EnumValues, Model, ModelKind, Record, TypeRef};
use crate::ir::utils::{
    doc_lines, string_literal, to_field_name, to_module_name, to_variant_name, unique_name,
    unique_type_name, unraw,
};

const SERDE_DERIVES: &str = "derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)";

/// One variant of a generated union enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionVariant {
    /// Variant name.
    pub name: String,
    /// Wrapped member type.
    pub member: TypeRef,
    /// Whether the payload is boxed to break a cycle.
    pub boxed: bool,
}

/// Generate every model file.
pub fn generate(models: &[Model]) -> Vec<SourceFile> {
    let mapper = TypeMapper::new(models, None);
    let graph = Reachability::new(models, &mapper);

    let unions: BTreeMap<&str, Vec<UnionVariant>> = models
        .iter()
        .filter_map(|m| match &m.kind {
            ModelKind::Union(members) => Some((m.name.as_str(), union_variants(m, members, &graph))),
            _ => None,
        })
        .collect();

    let mut files = Vec::with_capacity(models.len() + 1);
    let mut modules: Vec<(String, String)> = Vec::with_capacity(models.len());
    let mut used_modules = HashSet::new();
    used_modules.insert("mod".to_string());

    for model in models {
        let module = unique_name(&to_module_name(&model.name), &mut used_modules);
        let ctx = ModelContext {
            model,
            mapper: &mapper,
            graph: &graph,
            unions: &unions,
        };
        files.push(SourceFile {
            path: PathBuf::from(format!("{}.rs", unraw(&module))),
            module: ctx.module(),
        });
        modules.push((module, model.name.clone()));
    }

    let mut items: Vec<RsItem> = modules
        .iter()
        .map(|(module, _)| RsItem::Mod {
            is_pub: true,
            name: module.clone(),
        })
        .collect();
    items.extend(modules.iter().map(|(module, name)| RsItem::Use {
        is_pub: true,
        path: format!("{module}::{name}"),
    }));
    files.push(SourceFile {
        path: PathBuf::from("mod.rs"),
        module: RsModule {
            docs: vec!["Data types for every component schema.".to_string()],
            items,
        },
    });

    info!(models = models.len(), files = files.len(), "Generated model files");
    files
}

/// Variant list for a union, deduplicated by member type and by name.
pub fn union_variants(union: &Model, members: &[TypeRef], graph: &Reachability<'_>) -> Vec<UnionVariant> {
    let mut seen: Vec<&TypeRef> = Vec::new();
    let mut names = HashSet::new();
    let mut variants = Vec::new();
    for member in members {
        if seen.contains(&member) {
            continue;
        }
        seen.push(member);
        let base = match member {
            TypeRef::Named(name) => name.clone(),
            TypeRef::String => "String".to_string(),
            TypeRef::Timestamp => "Timestamp".to_string(),
            TypeRef::Int32 | TypeRef::Int64 => "Integer".to_string(),
            TypeRef::Float32 | TypeRef::Float64 => "Number".to_string(),
            TypeRef::Bool => "Boolean".to_string(),
            TypeRef::Any => "Value".to_string(),
            TypeRef::Array(_) => "List".to_string(),
            TypeRef::Map(_) => "Map".to_string(),
        };
        variants.push(UnionVariant {
            name: unique_type_name(&base, &mut names),
            member: member.clone(),
            boxed: graph.cycles_back(member, &union.name),
        });
    }
    variants
}

/// Which models can reach which through fields stored inline.
///
/// Edges are record fields and alias targets that name a model directly,
/// plus union members. Collections break the chain since they already
/// live on the heap.
#[derive(Debug)]
pub struct Reachability<'a> {
    reachable: BTreeMap<&'a str, BTreeSet<&'a str>>,
}

impl<'a> Reachability<'a> {
    /// Transitive closure of the inline edges of `models`.
    pub fn new(models: &'a [Model], mapper: &TypeMapper<'_>) -> Self {
        let mut edges: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for model in models {
            let targets = edges.entry(model.name.as_str()).or_default();
            let direct: Vec<&TypeRef> = match &model.kind {
                ModelKind::Record(record) => record.fields.iter().map(|f| &f.ty).collect(),
                ModelKind::Union(members) => members.iter().collect(),
                ModelKind::Alias(target) => vec![target],
                ModelKind::Enum(_) | ModelKind::Map(_) => Vec::new(),
            };
            targets.extend(
                direct
                    .into_iter()
                    .filter_map(TypeRef::direct_name)
                    .filter(|name| mapper.is_known(name)),
            );
        }

        let reachable = edges
            .keys()
            .map(|&start| {
                let mut seen = BTreeSet::new();
                let mut stack: Vec<&str> = edges.get(start).cloned().unwrap_or_default();
                while let Some(next) = stack.pop() {
                    if seen.insert(next)
                        && let Some(more) = edges.get(next)
                    {
                        stack.extend(more.iter().copied());
                    }
                }
                (start, seen)
            })
            .collect();

        Self { reachable }
    }

    /// Whether storing `ty` inline inside `owner` would make `owner` infinitely sized.
    pub fn cycles_back(&self, ty: &TypeRef, owner: &str) -> bool {
        let Some(target) = ty.direct_name() else {
            return false;
        };
        target == owner
            || self
                .reachable
                .get(target)
                .is_some_and(|set| set.contains(owner))
    }
}

struct ModelContext<'a> {
    model: &'a Model,
    mapper: &'a TypeMapper<'a>,
    graph: &'a Reachability<'a>,
    unions: &'a BTreeMap<&'a str, Vec<UnionVariant>>,
}

impl ModelContext<'_> {
    fn module(&self) -> RsModule {
        let model = self.model;
        let mut items = Vec::new();

        let imports = self.imports();
        match imports.len() {
            0 => {}
            1 => items.push(RsItem::Use {
                is_pub: false,
                path: format!("super::{}", imports[0]),
            }),
            _ => items.push(RsItem::Use {
                is_pub: false,
                path: format!("super::{{{}}}", imports.join(", ")),
            }),
        }

        let docs = model
            .description
            .as_deref()
            .map(doc_lines)
            .unwrap_or_default();

        match &model.kind {
            ModelKind::Record(record) => items.extend(self.record(record, docs)),
            ModelKind::Enum(values) => items.extend(self.enumeration(values, docs)),
            ModelKind::Alias(target) | ModelKind::Map(target) => {
                let ty = match &model.kind {
                    ModelKind::Map(_) => RsType::map(self.mapper.rs_type(target)),
                    _ => self.mapper.rs_type(target),
                };
                items.push(RsItem::TypeAlias(RsTypeAlias {
                    docs,
                    name: model.name.clone(),
                    ty,
                }));
            }
            ModelKind::Union(_) => items.extend(self.union(docs)),
        }

        RsModule {
            docs: vec![format!(
                "`{}` ({})",
                model.source_name,
                model.kind.label()
            )],
            items,
        }
    }

    /// Sibling models referenced from this file.
    fn imports(&self) -> Vec<String> {
        let model = self.model;
        let mut refs: Vec<&str> = Vec::new();
        match &model.kind {
            ModelKind::Record(record) => {
                for field in &record.fields {
                    field.ty.named_refs(&mut refs);
                }
                refs.extend(
                    model
                        .implements
                        .iter()
                        .map(String::as_str)
                        .filter(|u| self.unions.contains_key(u)),
                );
            }
            ModelKind::Union(members) => {
                for member in members {
                    member.named_refs(&mut refs);
                }
            }
            ModelKind::Alias(target) | ModelKind::Map(target) => target.named_refs(&mut refs),
            ModelKind::Enum(_) => {}
        }
        refs.into_iter()
            .filter(|name| *name != model.name && self.mapper.is_known(name))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn record(&self, record: &Record, docs: Vec<String>) -> Vec<RsItem> {
        let model = self.model;
        let mut used = HashSet::new();
        let fields = record
            .fields
            .iter()
            .map(|field| {
                let mut ty = self.mapper.rs_type(&field.ty);
                if self.graph.cycles_back(&field.ty, &model.name) {
                    ty = RsType::boxed(ty);
                }
                let rename = string_literal(&field.name);
                let attr = if field.is_nullable() {
                    ty = RsType::option(ty);
                    format!("serde(rename = {rename}, default, skip_serializing_if = \"Option::is_none\")")
                } else if field.ty.is_array() {
                    format!("serde(rename = {rename}, default)")
                } else {
                    format!("serde(rename = {rename})")
                };
                RsField {
                    docs: field.description.as_deref().map(doc_lines).unwrap_or_default(),
                    attrs: vec![attr],
                    is_pub: true,
                    name: unique_name(&to_field_name(&field.name), &mut used),
                    ty,
                }
            })
            .collect();

        let mut items = vec![RsItem::Struct(RsStruct {
            docs,
            attrs: vec![SERDE_DERIVES.to_string()],
            name: model.name.clone(),
            lifetimes: Vec::new(),
            shape: StructShape::Named(fields),
        })];

        if let Some(discriminator) = &record.discriminator {
            let mut get_type = RsFn::public("get_type");
            get_type.docs = vec![format!("Value of the `{}` discriminator.", discriminator.field)];
            get_type.receiver = Some(Receiver::Ref);
            get_type.ret = Some(RsType::path("&'static str"));
            get_type.body = vec![RsStmt::Raw("Self::TYPE".to_string())];

            items.push(RsItem::Impl(RsImpl {
                lifetimes: Vec::new(),
                trait_name: None,
                target: model.name.clone(),
                items: vec![
                    ImplItem::Const(RsConst {
                        docs: Vec::new(),
                        name: "TYPE".to_string(),
                        ty: RsType::path("&'static str"),
                        value: string_literal(&discriminator.value),
                    }),
                    ImplItem::Fn(get_type),
                ],
            }));
        }

        for union in &model.implements {
            let Some(variant) = self.unions.get(union.as_str()).and_then(|variants| {
                variants
                    .iter()
                    .find(|v| v.member.direct_name() == Some(model.name.as_str()))
            }) else {
                continue;
            };
            let value = if variant.boxed {
                "Box::new(value)"
            } else {
                "value"
            };
            let mut from = RsFn::public("from");
            from.is_pub = false;
            from.params = vec![RsParam::new("value", RsType::path(model.name.clone()))];
            from.ret = Some(RsType::path("Self"));
            from.body = vec![RsStmt::Raw(format!("Self::{}({value})", variant.name))];
            items.push(RsItem::Impl(RsImpl {
                lifetimes: Vec::new(),
                trait_name: Some(format!("From<{}>", model.name)),
                target: union.clone(),
                items: vec![ImplItem::Fn(from)],
            }));
        }

        items
    }

    fn enumeration(&self, values: &EnumValues, docs: Vec<String>) -> Vec<RsItem> {
        let name = self.model.name.clone();
        match values {
            EnumValues::String(literals) if literals.is_empty() => {
                warn!(model = %name, "Enum has no usable values, generating a String alias");
                vec![RsItem::TypeAlias(RsTypeAlias {
                    docs,
                    name,
                    ty: RsType::path("String"),
                })]
            }
            EnumValues::String(literals) => string_enum(name, literals, docs),
            EnumValues::Integer(v) => value_enum(
                name,
                docs,
                "i64",
                true,
                v.iter().map(|n| (format!("VALUE_{n}"), n.to_string())).collect(),
            ),
            EnumValues::Number(v) => value_enum(
                name,
                docs,
                "f64",
                false,
                v.iter()
                    .map(|n| {
                        let literal = format!("{n:?}");
                        (format!("VALUE_{literal}"), literal)
                    })
                    .collect(),
            ),
            EnumValues::Boolean(v) => value_enum(
                name,
                docs,
                "bool",
                true,
                v.iter().map(|b| (b.to_string(), b.to_string())).collect(),
            ),
        }
    }

    fn union(&self, docs: Vec<String>) -> Vec<RsItem> {
        let model = self.model;
        let variants = self.unions.get(model.name.as_str()).cloned().unwrap_or_default();
        if variants.is_empty() {
            warn!(model = %model.name, "Union has no usable members, generating a serde_json::Value alias");
            return vec![RsItem::TypeAlias(RsTypeAlias {
                docs,
                name: model.name.clone(),
                ty: RsType::path("serde_json::Value"),
            })];
        }

        let variants = variants
            .iter()
            .map(|variant| {
                let mut ty = self.mapper.rs_type(&variant.member);
                if variant.boxed {
                    ty = RsType::boxed(ty);
                }
                RsVariant {
                    docs: Vec::new(),
                    attrs: Vec::new(),
                    name: variant.name.clone(),
                    payload: Some(ty),
                }
            })
            .collect();

        vec![RsItem::Enum(RsEnum {
            docs,
            attrs: vec![SERDE_DERIVES.to_string(), "serde(untagged)".to_string()],
            name: model.name.clone(),
            variants,
        })]
    }
}

fn string_enum(name: String, literals: &[String], docs: Vec<String>) -> Vec<RsItem> {
    let mut used = HashSet::new();
    let variants: Vec<RsVariant> = literals
        .iter()
        .map(|literal| RsVariant {
            docs: Vec::new(),
            attrs: vec![format!("serde(rename = {})", string_literal(literal))],
            name: unique_type_name(&to_variant_name(literal), &mut used),
            payload: None,
        })
        .collect();

    let arms: String = variants
        .iter()
        .zip(literals)
        .map(|(variant, literal)| format!("Self::{} => {},\n", variant.name, string_literal(literal)))
        .collect();

    let mut as_str = RsFn::public("as_str");
    as_str.docs = vec!["Wire value of this variant.".to_string()];
    as_str.receiver = Some(Receiver::Ref);
    as_str.ret = Some(RsType::path("&'static str"));
    as_str.body = vec![RsStmt::Raw(format!("match self {{\n{arms}}}"))];

    let mut fmt = RsFn::public("fmt");
    fmt.is_pub = false;
    fmt.receiver = Some(Receiver::Ref);
    fmt.params = vec![RsParam::new("f", RsType::path("&mut std::fmt::Formatter<'_>"))];
    fmt.ret = Some(RsType::path("std::fmt::Result"));
    fmt.body = vec![RsStmt::Raw("f.write_str(self.as_str())".to_string())];

    vec![
        RsItem::Enum(RsEnum {
            docs,
            attrs: vec![
                "derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)"
                    .to_string(),
            ],
            name: name.clone(),
            variants,
        }),
        RsItem::Impl(RsImpl {
            lifetimes: Vec::new(),
            trait_name: None,
            target: name.clone(),
            items: vec![ImplItem::Fn(as_str)],
        }),
        RsItem::Impl(RsImpl {
            lifetimes: Vec::new(),
            trait_name: Some("std::fmt::Display".to_string()),
            target: name,
            items: vec![ImplItem::Fn(fmt)],
        }),
    ]
}

/// Newtype over a non-string base with one associated constant per value.
fn value_enum(
    name: String,
    docs: Vec<String>,
    base: &str,
    eq: bool,
    values: Vec<(String, String)>,
) -> Vec<RsItem> {
    let derives = if eq {
        "derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)"
    } else {
        "derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)"
    };

    let mut used = HashSet::new();
    let mut items: Vec<ImplItem> = values
        .into_iter()
        .map(|(const_name, literal)| {
            let const_name = const_name.to_ascii_uppercase().replace('-', "N").replace('.', "_");
            ImplItem::Const(RsConst {
                docs: Vec::new(),
                name: unique_name(&const_name, &mut used),
                ty: RsType::path("Self"),
                value: format!("Self({literal})"),
            })
        })
        .collect();

    let mut value = RsFn::public("value");
    value.receiver = Some(Receiver::Ref);
    value.ret = Some(RsType::path(base));
    value.body = vec![RsStmt::Raw("self.0".to_string())];
    items.push(ImplItem::Fn(value));

    vec![
        RsItem::Struct(RsStruct {
            docs,
            attrs: vec![derives.to_string(), "serde(transparent)".to_string()],
            name: name.clone(),
            lifetimes: Vec::new(),
            shape: StructShape::Newtype(RsType::path(base)),
        }),
        RsItem::Impl(RsImpl {
            lifetimes: Vec::new(),
            trait_name: None,
            target: name,
            items,
        }),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::codegen::Emit;
    use crate::ir::types::{Discriminator, Field};

    fn field(name: &str, ty: TypeRef, required: bool) -> Field {
        Field {
            name: name.into(),
            ty,
            required,
            constant: None,
            description: None,
        }
    }

    fn model(name: &str, kind: ModelKind) -> Model {
        Model {
            name: name.into(),
            source_name: name.into(),
            description: None,
            kind,
            implements: Vec::new(),
        }
    }

    fn source(files: &[SourceFile], path: &str) -> String {
        let file = files
            .iter()
            .find(|f| f.path == PathBuf::from(path))
            .unwrap_or_else(|| unreachable!("missing {path}"));
        let text = file.module.emit();
        syn::parse_file(&text).unwrap();
        text
    }

    fn fixture() -> Vec<Model> {
        let mut cat = model(
            "Cat",
            ModelKind::Record(Record {
                fields: vec![
                    field("kind", TypeRef::String, true),
                    field("name", TypeRef::String, false),
                    field("toys", TypeRef::array(TypeRef::named("Toy")), false),
                    field("parent", TypeRef::named("Cat"), false),
                    field("type", TypeRef::named("Missing"), true),
                ],
                discriminator: Some(Discriminator {
                    field: "kind".into(),
                    value: "cat".into(),
                }),
            }),
        );
        cat.implements = vec!["Pet".into()];
        vec![
            cat,
            model(
                "Level",
                ModelKind::Enum(EnumValues::Integer(vec![-1, 2])),
            ),
            model(
                "Pet",
                ModelKind::Union(vec![
                    TypeRef::named("Cat"),
                    TypeRef::String,
                    TypeRef::Int64,
                    TypeRef::named("Cat"),
                ]),
            ),
            model(
                "State",
                ModelKind::Enum(EnumValues::String(vec!["in-progress".into(), "IN_PROGRESS".into()])),
            ),
            model("Toy", ModelKind::Map(TypeRef::Any)),
        ]
    }

    #[test]
    fn test_record_file() {
        let files = generate(&fixture());
        let text = source(&files, "cat.rs");
        assert!(text.contains("use super::{Pet, Toy};"));
        assert!(text.contains("pub kind: String,"));
        assert!(text.contains(
            "#[serde(rename = \"name\", default, skip_serializing_if = \"Option::is_none\")]\npub name: Option<String>,"
        ));
        assert!(text.contains("#[serde(rename = \"toys\", default)]\npub toys: Vec<Toy>,"));
        assert!(text.contains("pub parent: Option<Box<Cat>>,"));
        assert!(text.contains("pub r#type: serde_json::Value,"));
        assert!(text.contains("pub const TYPE: &'static str = \"cat\";"));
        assert!(text.contains("impl From<Cat> for Pet {"));
        assert!(text.contains("Self::Cat(value)"));
    }

    #[test]
    fn test_union_file() {
        let files = generate(&fixture());
        let text = source(&files, "pet.rs");
        assert!(text.contains("#[serde(untagged)]"));
        assert!(text.contains("Cat(Cat),\nString(String),\nInteger(i64),\n}"));
    }

    #[test]
    fn test_enum_files() {
        let files = generate(&fixture());
        let state = source(&files, "state.rs");
        assert!(state.contains("#[serde(rename = \"in-progress\")]\nInProgress,"));
        assert!(state.contains("#[serde(rename = \"IN_PROGRESS\")]\nInProgress2,"));
        assert!(state.contains("Self::InProgress2 => \"IN_PROGRESS\","));

        let level = source(&files, "level.rs");
        assert!(level.contains("pub struct Level(pub i64);"));
        assert!(level.contains("pub const VALUE_N1: Self = Self(-1);"));
        assert!(level.contains("pub const VALUE_2: Self = Self(2);"));
    }

    #[test]
    fn test_map_and_mod_files() {
        let files = generate(&fixture());
        let toy = source(&files, "toy.rs");
        assert!(toy.contains("pub type Toy = std::collections::HashMap<String, serde_json::Value>;"));

        let module = source(&files, "mod.rs");
        assert!(module.contains("pub mod cat;"));
        assert!(module.contains("pub use cat::Cat;"));
        assert_eq!(files.len(), 6);
    }

    #[test]
    fn test_carriage_returns_in_descriptions_still_format() {
        use crate::format::{Formatter, PrettyFormatter};

        let mut zone = model(
            "Zone",
            ModelKind::Record(Record {
                fields: vec![Field {
                    description: Some("Zone id\rstable across\r\nrenames".into()),
                    ..field("id", TypeRef::String, true)
                }],
                discriminator: None,
            }),
        );
        zone.description = Some("A zone.\rSee the console\u{7}.".into());
        let files = generate(&[zone]);
        let text = source(&files, "zone.rs");
        assert!(!text.contains('\r'));
        assert!(text.contains("/// A zone.\n/// See the console ."));
        assert!(text.contains("/// Zone id\n/// stable across\n/// renames"));
        assert!(PrettyFormatter.format(&text).is_ok());
    }

    #[test]
    fn test_mutual_recursion_is_boxed() {
        let models = vec![
            model(
                "Node",
                ModelKind::Record(Record {
                    fields: vec![field("edge", TypeRef::named("Edge"), true)],
                    discriminator: None,
                }),
            ),
            model(
                "Edge",
                ModelKind::Record(Record {
                    fields: vec![
                        field("target", TypeRef::named("Node"), false),
                        field("all", TypeRef::array(TypeRef::named("Node")), true),
                    ],
                    discriminator: None,
                }),
            ),
        ];
        let files = generate(&models);
        assert!(source(&files, "node.rs").contains("pub edge: Box<Edge>,"));
        let edge = source(&files, "edge.rs");
        assert!(edge.contains("pub target: Option<Box<Node>>,"));
        assert!(edge.contains("pub all: Vec<Node>,"));
    }
}
