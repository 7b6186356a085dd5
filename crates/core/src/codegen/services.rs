//! Services pass: one async function per operation, grouped by package.
//!
//! Layout:
//! - `<package>/<fn_name>.rs`: the operation function
//! - `<package>/options.rs`: query options for the package
//! - `<package>/mod.rs` and `mod.rs`: module wiring

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use tracing::{info, warn};

use super::ast::{
    ImplItem, Receiver, RsExpr, RsField, RsFn, RsImpl, RsItem, RsModule, RsParam, RsStmt,
    RsStruct, RsType, StructShape,
};
use super::{EmitOptions, SourceFile, TypeMapper, doc_block, scalar_arg_type, scalar_type};
use crate::ir::api::{ApiIr, Operation, QueryParam, ResponseType};
use crate::ir::types::{Model, ScalarType};
use crate::ir::utils::{
    RUST_RESERVED_WORDS, string_literal, to_field_name, to_module_name, unique_name, unraw,
};

/// Names every operation function reserves for its own arguments.
const RESERVED_ARGS: [&str; 3] = ["client", "options", "path"];

/// Signature pieces shared by the services and builder passes.
#[derive(Debug, Clone)]
pub struct Signature {
    /// Path parameter argument names, in template order.
    pub path_args: Vec<String>,
    /// Scalar type of each path argument.
    pub path_types: Vec<ScalarType>,
    /// Argument name of the request body, when there is one.
    pub body_arg: Option<String>,
    /// Request body type; the argument takes it by reference.
    pub body_type: Option<RsType>,
    /// Full return type, `Result<Response<T>>`.
    pub response: RsType,
}

impl Signature {
    /// Argument names and types of `op`.
    pub fn new(op: &Operation, mapper: &TypeMapper<'_>, options: &EmitOptions) -> Self {
        let mut used: HashSet<String> = RESERVED_ARGS.iter().map(|s| (*s).to_string()).collect();
        let path_args = op
            .path_params
            .iter()
            .map(|p| unique_name(&to_field_name(&p.name), &mut used))
            .collect();
        let path_types = op.path_params.iter().map(|p| p.ty.scalar()).collect();

        let body_arg = op
            .body
            .as_ref()
            .map(|_| unique_name("request_body", &mut used));
        let body_type = op.body.as_ref().map(|ty| mapper.rs_type(ty));

        let payload = match &op.response {
            ResponseType::Empty => RsType::path(options.client("Nothing")),
            ResponseType::Body(ty) => mapper.rs_type(ty),
        };
        let response = RsType::generic(
            options.client("Result"),
            vec![RsType::generic(options.client("Response"), vec![payload])],
        );

        Self {
            path_args,
            path_types,
            body_arg,
            body_type,
            response,
        }
    }
}

/// Generate every services file.
pub fn generate(api: &ApiIr, models: &[Model], options: &EmitOptions) -> Vec<SourceFile> {
    let mapper = TypeMapper::new(models, Some(options.models_path.as_str()));
    let mut files = Vec::new();
    let mut packages = Vec::new();

    for (package, ops) in api.by_package() {
        let module = to_module_name(package);
        let dir = PathBuf::from(unraw(&module));

        let mut items = vec![
            RsItem::Mod {
                is_pub: true,
                name: "options".to_string(),
            },
            RsItem::Use {
                is_pub: true,
                path: "options::Options".to_string(),
            },
        ];

        for op in &ops {
            files.push(SourceFile {
                path: dir.join(format!("{}.rs", unraw(&op.fn_name))),
                module: operation_module(op, &mapper, options),
            });
            items.push(RsItem::Mod {
                is_pub: true,
                name: op.fn_name.clone(),
            });
            items.push(RsItem::Use {
                is_pub: true,
                path: format!("{0}::{0}", op.fn_name),
            });
        }

        files.push(SourceFile {
            path: dir.join("options.rs"),
            module: options_module(package, &ops, options),
        });
        files.push(SourceFile {
            path: dir.join("mod.rs"),
            module: RsModule {
                docs: vec![format!("Operations owned by the `{package}` service package.")],
                items,
            },
        });

        info!(package = %package, operations = ops.len(), "Generated service package");
        packages.push(module);
    }

    files.push(SourceFile {
        path: PathBuf::from("mod.rs"),
        module: RsModule {
            docs: vec!["API operations, one module per service package.".to_string()],
            items: packages
                .into_iter()
                .map(|name| RsItem::Mod { is_pub: true, name })
                .collect(),
        },
    });
    files
}

fn operation_module(op: &Operation, mapper: &TypeMapper<'_>, options: &EmitOptions) -> RsModule {
    let sig = Signature::new(op, mapper, options);

    let mut params = vec![RsParam::new(
        "client",
        RsType::reference(RsType::path(options.client("Client"))),
    )];
    for (name, scalar) in sig.path_args.iter().zip(&sig.path_types) {
        params.push(RsParam::new(name.clone(), scalar_arg_type(*scalar)));
    }
    if let (Some(name), Some(ty)) = (&sig.body_arg, &sig.body_type) {
        params.push(RsParam::new(name.clone(), RsType::reference(ty.clone())));
    }
    if op.has_query() {
        params.push(RsParam::new(
            "options",
            RsType::reference(RsType::path("super::Options")),
        ));
    }

    let fields: Vec<String> = sig
        .path_args
        .iter()
        .map(|arg| format!("{} = %{arg}", span_field(arg)))
        .collect();
    let instrument = if fields.is_empty() {
        format!("tracing::instrument(name = {}, skip_all)", string_literal(&op.id))
    } else {
        format!(
            "tracing::instrument(name = {}, skip_all, fields({}))",
            string_literal(&op.id),
            fields.join(", ")
        )
    };

    let mut body = Vec::new();
    let path_init = if sig.path_args.is_empty() {
        RsExpr::call("String::from", vec![RsExpr::Str(op.path.clone())])
    } else {
        let mut args = vec![RsExpr::Str(format_template(&op.path))];
        args.extend(sig.path_args.iter().map(|a| RsExpr::path(a.clone())));
        RsExpr::Macro {
            name: "format".to_string(),
            args,
        }
    };
    body.push(RsStmt::Let {
        name: "path".to_string(),
        mutable: op.has_query(),
        ty: None,
        init: path_init,
    });
    if op.has_query() {
        body.push(RsStmt::Expr(RsExpr::method(
            RsExpr::path("path"),
            "push_str",
            vec![RsExpr::reference(RsExpr::method(
                RsExpr::path("options"),
                "build_query_string",
                Vec::new(),
            ))],
        )));
    }
    let payload = match &sig.body_arg {
        Some(arg) => RsExpr::call("Some", vec![RsExpr::path(arg.clone())]),
        None => RsExpr::path("None::<&()>"),
    };
    body.push(RsStmt::Tail(RsExpr::awaited(RsExpr::method(
        RsExpr::path("client"),
        "execute",
        vec![
            RsExpr::Str(op.method.as_str().to_string()),
            RsExpr::reference(RsExpr::path("path")),
            payload,
        ],
    ))));

    let mut docs = doc_block(op.summary.as_deref(), op.description.as_deref());
    if docs.is_empty() {
        docs.push(format!("Calls `{}`.", op.id));
    }

    RsModule {
        docs: vec![format!("`{} {}`", op.method, op.path)],
        items: vec![RsItem::Fn(RsFn {
            docs,
            attrs: vec![instrument],
            is_pub: true,
            is_async: true,
            name: op.fn_name.clone(),
            receiver: None,
            params,
            ret: Some(sig.response),
            body,
        })],
    }
}

/// Replace each `{name}` placeholder with a positional `{}`.
pub fn format_template(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        out.push_str("{}");
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

/// Span field key for an argument; keywords get a trailing underscore.
fn span_field(arg: &str) -> String {
    let bare = unraw(arg);
    if RUST_RESERVED_WORDS.contains(bare) {
        format!("{bare}_")
    } else {
        bare.to_string()
    }
}

/// Union of the package's query parameters, first declaration wins.
fn package_query_params<'a>(package: &str, ops: &[&'a Operation]) -> Vec<(&'a QueryParam, ScalarType)> {
    let mut merged: BTreeMap<&str, (&QueryParam, ScalarType)> = BTreeMap::new();
    for op in ops {
        for param in &op.query_params {
            let scalar = param.ty.scalar();
            match merged.get_mut(param.name.as_str()) {
                None => {
                    merged.insert(param.name.as_str(), (param, scalar));
                }
                Some((_, existing)) if *existing != scalar => {
                    warn!(
                        package = %package,
                        param = %param.name,
                        "Query parameter declared with different types, using string"
                    );
                    *existing = ScalarType::String;
                }
                Some(_) => {}
            }
        }
    }
    merged.into_values().collect()
}

fn options_module(package: &str, ops: &[&Operation], options: &EmitOptions) -> RsModule {
    let params = package_query_params(package, ops);

    let mut used = HashSet::new();
    let named: Vec<(String, &QueryParam, ScalarType)> = params
        .into_iter()
        .map(|(param, scalar)| (unique_name(&to_field_name(&param.name), &mut used), param, scalar))
        .collect();

    let fields = named
        .iter()
        .map(|(field, param, scalar)| RsField {
            docs: param
                .description
                .as_deref()
                .map(crate::ir::utils::doc_lines)
                .unwrap_or_default(),
            attrs: Vec::new(),
            is_pub: true,
            name: field.clone(),
            ty: RsType::option(scalar_type(*scalar)),
        })
        .collect();

    let mut methods = Vec::with_capacity(named.len() + 2);
    let mut new = RsFn::public("new");
    new.ret = Some(RsType::path("Self"));
    new.body = vec![RsStmt::Tail(RsExpr::call("Self::default", Vec::new()))];
    methods.push(ImplItem::Fn(new));

    for (field, param, scalar) in &named {
        let mut setter = RsFn::public(format!("with_{}", unraw(field)));
        setter.docs = vec![format!("Set the `{}` query parameter.", param.name)];
        setter.receiver = Some(Receiver::MutValue);
        setter.ret = Some(RsType::path("Self"));
        let value = match scalar {
            ScalarType::String => {
                setter.params = vec![RsParam::new("value", RsType::impl_into(RsType::path("String")))];
                "value.into()"
            }
            other => {
                setter.params = vec![RsParam::new("value", scalar_type(*other))];
                "value"
            }
        };
        setter.body = vec![
            RsStmt::Raw(format!("self.{field} = Some({value});")),
            RsStmt::Tail(RsExpr::path("self")),
        ];
        methods.push(ImplItem::Fn(setter));
    }

    let mut build = RsFn::public("build_query_string");
    build.docs = vec![
        "Query string for the parameters that are set, with a leading `?`.".to_string(),
        String::new(),
        "Returns an empty string when nothing is set.".to_string(),
    ];
    build.receiver = Some(Receiver::Ref);
    build.ret = Some(RsType::path("String"));
    build.body = if named.is_empty() {
        vec![RsStmt::Tail(RsExpr::call("String::new", Vec::new()))]
    } else {
        let mut body = vec![RsStmt::Let {
            name: "pairs".to_string(),
            mutable: true,
            ty: Some(RsType::vec(RsType::path("String"))),
            init: RsExpr::call("Vec::new", Vec::new()),
        }];
        for (field, param, scalar) in &named {
            let rendered = match scalar {
                ScalarType::String => RsExpr::call(options.client("encode_query"), vec![RsExpr::path("value")]),
                _ => RsExpr::path("value"),
            };
            body.push(RsStmt::IfLet {
                pattern: "Some(value)".to_string(),
                value: RsExpr::reference(RsExpr::path(format!("self.{field}"))),
                then_body: vec![RsStmt::Expr(RsExpr::method(
                    RsExpr::path("pairs"),
                    "push",
                    vec![RsExpr::Macro {
                        name: "format".to_string(),
                        args: vec![
                            RsExpr::Str(format!(
                                "{}={{}}",
                                param.name.replace('{', "{{").replace('}', "}}")
                            )),
                            rendered,
                        ],
                    }],
                ))],
            });
        }
        body.push(RsStmt::If {
            cond: RsExpr::method(RsExpr::path("pairs"), "is_empty", Vec::new()),
            then_body: vec![RsStmt::Tail(RsExpr::call("String::new", Vec::new()))],
            else_body: Some(vec![RsStmt::Tail(RsExpr::Macro {
                name: "format".to_string(),
                args: vec![
                    RsExpr::Str("?{}".to_string()),
                    RsExpr::method(RsExpr::path("pairs"), "join", vec![RsExpr::Str("&".to_string())]),
                ],
            })]),
        });
        body
    };
    methods.push(ImplItem::Fn(build));

    RsModule {
        docs: vec![format!("Query options for the `{package}` package.")],
        items: vec![
            RsItem::Struct(RsStruct {
                docs: vec!["Optional query parameters, all unset by default.".to_string()],
                attrs: vec!["derive(Debug, Clone, Default, PartialEq)".to_string()],
                name: "Options".to_string(),
                lifetimes: Vec::new(),
                shape: StructShape::Named(fields),
            }),
            RsItem::Impl(RsImpl {
                lifetimes: Vec::new(),
                trait_name: None,
                target: "Options".to_string(),
                items: methods,
            }),
        ],
    }
}
