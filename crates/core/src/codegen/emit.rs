//! Rust source emission via the Emit trait.
//!
//! Output is syntactically complete but unformatted; layout is left to the
//! formatter in `format.rs`.

use super::ast::{
    ImplItem, Receiver, RsConst, RsEnum, RsExpr, RsField, RsFn, RsImpl, RsItem, RsModule,
    RsParam, RsStmt, RsStruct, RsType, RsTypeAlias, RsVariant, StructShape,
};
use crate::ir::utils::string_literal;

/// Convert an AST node to Rust source text.
pub trait Emit {
    /// Unformatted source text of this node.
    fn emit(&self) -> String;
}

fn join<T: Emit>(items: &[T], sep: &str) -> String {
    items.iter().map(Emit::emit).collect::<Vec<_>>().join(sep)
}

fn docs(lines: &[String], inner: bool) -> String {
    let marker = if inner { "//!" } else { "///" };
    lines
        .iter()
        .map(|line| {
            if line.is_empty() {
                format!("{marker}\n")
            } else {
                format!("{marker} {line}\n")
            }
        })
        .collect()
}

fn attrs(attrs: &[String]) -> String {
    attrs.iter().map(|a| format!("#[{a}]\n")).collect()
}

fn generics(lifetimes: &[String]) -> String {
    if lifetimes.is_empty() {
        String::new()
    } else {
        format!("<{}>", lifetimes.join(", "))
    }
}

// =============================================================================
// Types
// =============================================================================

impl Emit for RsType {
    fn emit(&self) -> String {
        match self {
            RsType::Path(p) => p.clone(),
            RsType::Option(inner) => format!("Option<{}>", inner.emit()),
            RsType::Vec(inner) => format!("Vec<{}>", inner.emit()),
            RsType::Box(inner) => format!("Box<{}>", inner.emit()),
            RsType::Map(inner) => {
                format!("std::collections::HashMap<String, {}>", inner.emit())
            }
            RsType::Ref(lifetime, inner) => match lifetime {
                Some(l) => format!("&{l} {}", inner.emit()),
                None => format!("&{}", inner.emit()),
            },
            RsType::ImplInto(inner) => format!("impl Into<{}>", inner.emit()),
            RsType::Generic(base, args) => format!("{base}<{}>", join(args, ", ")),
        }
    }
}

// =============================================================================
// Expressions
// =============================================================================

impl Emit for RsExpr {
    fn emit(&self) -> String {
        match self {
            RsExpr::Path(p) => p.clone(),
            RsExpr::Str(s) => string_literal(s),
            RsExpr::Call { callee, args } => format!("{callee}({})", join(args, ", ")),
            RsExpr::MethodCall {
                receiver,
                method,
                args,
            } => format!("{}.{method}({})", receiver.emit(), join(args, ", ")),
            RsExpr::Macro { name, args } => format!("{name}!({})", join(args, ", ")),
            RsExpr::Ref(inner) => format!("&{}", inner.emit()),
            RsExpr::Await(inner) => format!("{}.await", inner.emit()),
            RsExpr::Struct { name, fields } => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(field, value)| match value {
                        RsExpr::Path(p) if p == field => field.clone(),
                        _ => format!("{field}: {}", value.emit()),
                    })
                    .collect();
                format!("{name} {{ {} }}", parts.join(", "))
            }
            RsExpr::Raw(code) => code.clone(),
        }
    }
}

// =============================================================================
// Statements
// =============================================================================

impl Emit for RsStmt {
    fn emit(&self) -> String {
        match self {
            RsStmt::Let {
                name,
                mutable,
                ty,
                init,
            } => {
                let mutability = if *mutable { "mut " } else { "" };
                let annotation = ty
                    .as_ref()
                    .map(|t| format!(": {}", t.emit()))
                    .unwrap_or_default();
                format!("let {mutability}{name}{annotation} = {};\n", init.emit())
            }
            RsStmt::Expr(expr) => format!("{};\n", expr.emit()),
            RsStmt::Tail(expr) => format!("{}\n", expr.emit()),
            RsStmt::IfLet {
                pattern,
                value,
                then_body,
            } => format!(
                "if let {pattern} = {} {{\n{}}}\n",
                value.emit(),
                join(then_body, "")
            ),
            RsStmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let mut output = format!("if {} {{\n{}}}", cond.emit(), join(then_body, ""));
                if let Some(else_body) = else_body {
                    output.push_str(&format!(" else {{\n{}}}", join(else_body, "")));
                }
                output.push('\n');
                output
            }
            RsStmt::Raw(code) => format!("{code}\n"),
        }
    }
}

// =============================================================================
// Items
// =============================================================================

impl Emit for RsField {
    fn emit(&self) -> String {
        let vis = if self.is_pub { "pub " } else { "" };
        format!(
            "{}{}{vis}{}: {},\n",
            docs(&self.docs, false),
            attrs(&self.attrs),
            self.name,
            self.ty.emit()
        )
    }
}

impl Emit for RsStruct {
    fn emit(&self) -> String {
        let head = format!(
            "{}{}pub struct {}{}",
            docs(&self.docs, false),
            attrs(&self.attrs),
            self.name,
            generics(&self.lifetimes)
        );
        match &self.shape {
            StructShape::Named(fields) => format!("{head} {{\n{}}}\n", join(fields, "")),
            StructShape::Newtype(ty) => format!("{head}(pub {});\n", ty.emit()),
            StructShape::Unit => format!("{head};\n"),
        }
    }
}

impl Emit for RsVariant {
    fn emit(&self) -> String {
        let payload = self
            .payload
            .as_ref()
            .map(|t| format!("({})", t.emit()))
            .unwrap_or_default();
        format!(
            "{}{}{}{payload},\n",
            docs(&self.docs, false),
            attrs(&self.attrs),
            self.name
        )
    }
}

impl Emit for RsEnum {
    fn emit(&self) -> String {
        format!(
            "{}{}pub enum {} {{\n{}}}\n",
            docs(&self.docs, false),
            attrs(&self.attrs),
            self.name,
            join(&self.variants, "")
        )
    }
}

impl Emit for RsTypeAlias {
    fn emit(&self) -> String {
        format!(
            "{}pub type {} = {};\n",
            docs(&self.docs, false),
            self.name,
            self.ty.emit()
        )
    }
}

impl Emit for RsConst {
    fn emit(&self) -> String {
        format!(
            "{}pub const {}: {} = {};\n",
            docs(&self.docs, false),
            self.name,
            self.ty.emit(),
            self.value
        )
    }
}

impl Emit for RsParam {
    fn emit(&self) -> String {
        format!("{}: {}", self.name, self.ty.emit())
    }
}

impl Emit for RsFn {
    fn emit(&self) -> String {
        let vis = if self.is_pub { "pub " } else { "" };
        let asyncness = if self.is_async { "async " } else { "" };

        let mut params: Vec<String> = Vec::with_capacity(self.params.len() + 1);
        match self.receiver {
            Some(Receiver::Ref) => params.push("&self".to_string()),
            Some(Receiver::MutValue) => params.push("mut self".to_string()),
            None => {}
        }
        params.extend(self.params.iter().map(Emit::emit));

        let ret = self
            .ret
            .as_ref()
            .map(|t| format!(" -> {}", t.emit()))
            .unwrap_or_default();

        format!(
            "{}{}{vis}{asyncness}fn {}({}){ret} {{\n{}}}\n",
            docs(&self.docs, false),
            attrs(&self.attrs),
            self.name,
            params.join(", "),
            join(&self.body, "")
        )
    }
}

impl Emit for ImplItem {
    fn emit(&self) -> String {
        match self {
            ImplItem::Const(c) => c.emit(),
            ImplItem::Fn(f) => f.emit(),
        }
    }
}

impl Emit for RsImpl {
    fn emit(&self) -> String {
        let lifetimes = generics(&self.lifetimes);
        let head = match &self.trait_name {
            Some(t) => format!("impl{lifetimes} {t} for {}", self.target),
            None => format!("impl{lifetimes} {}", self.target),
        };
        format!("{head} {{\n{}}}\n", join(&self.items, "\n"))
    }
}

impl Emit for RsItem {
    fn emit(&self) -> String {
        match self {
            RsItem::Use { is_pub, path } => {
                let vis = if *is_pub { "pub " } else { "" };
                format!("{vis}use {path};\n")
            }
            RsItem::Mod { is_pub, name } => {
                let vis = if *is_pub { "pub " } else { "" };
                format!("{vis}mod {name};\n")
            }
            RsItem::Struct(s) => s.emit(),
            RsItem::Enum(e) => e.emit(),
            RsItem::TypeAlias(t) => t.emit(),
            RsItem::Impl(i) => i.emit(),
            RsItem::Fn(f) => f.emit(),
        }
    }
}

// =============================================================================
// Module
// =============================================================================

impl Emit for RsModule {
    fn emit(&self) -> String {
        let mut output = docs(&self.docs, true);
        if !self.docs.is_empty() {
            output.push('\n');
        }
        for item in &self.items {
            output.push_str(&item.emit());
            output.push('\n');
        }
        output
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_types() {
        assert_eq!(RsType::option(RsType::path("String")).emit(), "Option<String>");
        assert_eq!(
            RsType::map(RsType::vec(RsType::path("i64"))).emit(),
            "std::collections::HashMap<String, Vec<i64>>"
        );
        assert_eq!(
            RsType::reference_with("'a", RsType::path("crate::client::Client")).emit(),
            "&'a crate::client::Client"
        );
        assert_eq!(RsType::impl_into(RsType::path("String")).emit(), "impl Into<String>");
        assert_eq!(
            RsType::generic("Result", vec![RsType::path("Response")]).emit(),
            "Result<Response>"
        );
    }

    #[test]
    fn test_emit_struct_literal_shorthand() {
        let expr = RsExpr::Struct {
            name: "ZonesBuilder".into(),
            fields: vec![
                ("client".into(), RsExpr::path("self.client")),
                ("id".into(), RsExpr::path("id")),
            ],
        };
        assert_eq!(expr.emit(), "ZonesBuilder { client: self.client, id }");
    }

    #[test]
    fn test_emit_string_literal_escapes() {
        assert_eq!(RsExpr::Str("a\"b".into()).emit(), "\"a\\\"b\"");
    }

    #[test]
    fn test_emit_struct_with_docs_and_attrs() {
        let s = RsStruct {
            docs: vec!["A zone.".into(), String::new(), "Second paragraph.".into()],
            attrs: vec!["derive(Debug)".into()],
            name: "Zone".into(),
            lifetimes: Vec::new(),
            shape: StructShape::Named(vec![RsField {
                docs: Vec::new(),
                attrs: vec!["serde(rename = \"id\")".into()],
                is_pub: true,
                name: "id".into(),
                ty: RsType::path("String"),
            }]),
        };
        assert_eq!(
            s.emit(),
            "/// A zone.\n///\n/// Second paragraph.\n#[derive(Debug)]\npub struct Zone {\n#[serde(rename = \"id\")]\npub id: String,\n}\n"
        );
    }

    #[test]
    fn test_emit_fn() {
        let f = RsFn {
            docs: Vec::new(),
            attrs: Vec::new(),
            is_pub: true,
            is_async: true,
            name: "get_zone".into(),
            receiver: Some(Receiver::Ref),
            params: vec![RsParam::new("id", RsType::reference(RsType::path("str")))],
            ret: Some(RsType::path("u8")),
            body: vec![RsStmt::Tail(RsExpr::Raw("0".into()))],
        };
        assert_eq!(
            f.emit(),
            "pub async fn get_zone(&self, id: &str) -> u8 {\n0\n}\n"
        );
    }

    #[test]
    fn test_emit_module_parses() {
        let module = RsModule {
            docs: vec!["Generated.".into()],
            items: vec![
                RsItem::Use {
                    is_pub: false,
                    path: "super::Zone".into(),
                },
                RsItem::TypeAlias(RsTypeAlias {
                    docs: Vec::new(),
                    name: "Zones".into(),
                    ty: RsType::vec(RsType::path("Zone")),
                }),
                RsItem::Impl(RsImpl {
                    lifetimes: Vec::new(),
                    trait_name: None,
                    target: "Thing".into(),
                    items: vec![ImplItem::Const(RsConst {
                        docs: Vec::new(),
                        name: "TYPE".into(),
                        ty: RsType::path("&'static str"),
                        value: "\"thing\"".into(),
                    })],
                }),
            ],
        };
        let text = module.emit();
        assert!(text.starts_with("//! Generated.\n\nuse super::Zone;\n"));
        syn::parse_file(&text).unwrap();
    }
}
