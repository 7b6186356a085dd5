//! Rust AST used by the code generators.
//!
//! The AST is deliberately small: it covers exactly the items the three passes
//! produce. Expression-heavy bodies use [`RsExpr::Raw`] where a dedicated node
//! would add nothing.

/// A type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RsType {
    /// Path type such as `String` or `crate::models::Zone`
    Path(String),
    /// `Option<T>`
    Option(Box<RsType>),
    /// `Vec<T>`
    Vec(Box<RsType>),
    /// `Box<T>`
    Box(Box<RsType>),
    /// `std::collections::HashMap<String, T>`
    Map(Box<RsType>),
    /// `&T`, with an optional lifetime
    Ref(Option<String>, Box<RsType>),
    /// `impl Into<T>`
    ImplInto(Box<RsType>),
    /// Path type with generic arguments, e.g. `Response<T>`
    Generic(String, Vec<RsType>),
}

impl RsType {
    /// [`RsType::Path`]
    pub fn path(p: impl Into<String>) -> Self {
        Self::Path(p.into())
    }

    /// [`RsType::Option`]
    pub fn option(inner: Self) -> Self {
        Self::Option(Box::new(inner))
    }

    /// [`RsType::Vec`]
    pub fn vec(inner: Self) -> Self {
        Self::Vec(Box::new(inner))
    }

    /// [`RsType::Box`]
    pub fn boxed(inner: Self) -> Self {
        Self::Box(Box::new(inner))
    }

    /// [`RsType::Map`]
    pub fn map(inner: Self) -> Self {
        Self::Map(Box::new(inner))
    }

    /// `&T` without a lifetime.
    pub fn reference(inner: Self) -> Self {
        Self::Ref(None, Box::new(inner))
    }

    /// `&'lifetime T`
    pub fn reference_with(lifetime: &str, inner: Self) -> Self {
        Self::Ref(Some(lifetime.to_string()), Box::new(inner))
    }

    /// [`RsType::ImplInto`]
    pub fn impl_into(inner: Self) -> Self {
        Self::ImplInto(Box::new(inner))
    }

    /// [`RsType::Generic`]
    pub fn generic(base: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Generic(base.into(), args)
    }
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RsExpr {
    /// Path or local binding.
    Path(String),
    /// String literal; emitted escaped
    Str(String),
    /// `callee(args)`
    Call {
        /// Function path.
        callee: String,
        /// Arguments in order.
        args: Vec<RsExpr>,
    },
    /// `receiver.method(args)`
    MethodCall {
        /// Expression the method is called on.
        receiver: Box<RsExpr>,
        /// Method name.
        method: String,
        /// Arguments in order.
        args: Vec<RsExpr>,
    },
    /// `name!(args)`
    Macro {
        /// Macro name without `!`.
        name: String,
        /// Arguments in order.
        args: Vec<RsExpr>,
    },
    /// `&expr`
    Ref(Box<RsExpr>),
    /// `expr.await`
    Await(Box<RsExpr>),
    /// `Name { field: value, .. }`, shorthand when field == value
    Struct {
        /// Struct path.
        name: String,
        /// Field names and values in order.
        fields: Vec<(String, RsExpr)>,
    },
    /// Source text emitted as is.
    Raw(String),
}

impl RsExpr {
    /// [`RsExpr::Path`]
    pub fn path(p: impl Into<String>) -> Self {
        Self::Path(p.into())
    }

    /// [`RsExpr::Call`]
    pub fn call(callee: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Call {
            callee: callee.into(),
            args,
        }
    }

    /// [`RsExpr::MethodCall`]
    pub fn method(receiver: Self, method: impl Into<String>, args: Vec<Self>) -> Self {
        Self::MethodCall {
            receiver: Box::new(receiver),
            method: method.into(),
            args,
        }
    }

    /// [`RsExpr::Ref`]
    pub fn reference(inner: Self) -> Self {
        Self::Ref(Box::new(inner))
    }

    /// [`RsExpr::Await`]
    pub fn awaited(inner: Self) -> Self {
        Self::Await(Box::new(inner))
    }
}

/// A statement in a function body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RsStmt {
    /// `let [mut] name[: ty] = init;`
    Let {
        /// Binding name.
        name: String,
        /// Whether the binding is `mut`.
        mutable: bool,
        /// Optional type annotation.
        ty: Option<RsType>,
        /// Initializer.
        init: RsExpr,
    },
    /// Expression statement (`expr;`)
    Expr(RsExpr),
    /// Trailing expression (no semicolon)
    Tail(RsExpr),
    /// `if let pattern = value { .. }`
    IfLet {
        /// Pattern text.
        pattern: String,
        /// Scrutinee.
        value: RsExpr,
        /// Statements run on a match.
        then_body: Vec<RsStmt>,
    },
    /// `if cond { .. } else { .. }`
    If {
        /// Condition.
        cond: RsExpr,
        /// Statements run when `cond` holds.
        then_body: Vec<RsStmt>,
        /// Statements run otherwise.
        else_body: Option<Vec<RsStmt>>,
    },
    /// Statement text emitted as is, followed by a newline.
    Raw(String),
}

/// A named struct field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsField {
    /// `///` lines.
    pub docs: Vec<String>,
    /// Attribute bodies, without `#[..]`.
    pub attrs: Vec<String>,
    /// Whether the field is `pub`.
    pub is_pub: bool,
    /// Field name, possibly raw (`r#type`).
    pub name: String,
    /// Field type.
    pub ty: RsType,
}

/// Body of a struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructShape {
    /// `{ field: T, .. }`
    Named(Vec<RsField>),
    /// Single public field newtype
    Newtype(RsType),
    /// `struct Name;`
    Unit,
}

/// A `pub struct`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsStruct {
    /// `///` lines.
    pub docs: Vec<String>,
    /// Attribute bodies, without `#[..]`.
    pub attrs: Vec<String>,
    /// Type name.
    pub name: String,
    /// Lifetime parameters, e.g. `'a`.
    pub lifetimes: Vec<String>,
    /// Fields.
    pub shape: StructShape,
}

/// One enum variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsVariant {
    /// `///` lines.
    pub docs: Vec<String>,
    /// Attribute bodies, without `#[..]`.
    pub attrs: Vec<String>,
    /// Variant name.
    pub name: String,
    /// Single tuple payload, if any.
    pub payload: Option<RsType>,
}

/// A `pub enum`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsEnum {
    /// `///` lines.
    pub docs: Vec<String>,
    /// Attribute bodies, without `#[..]`.
    pub attrs: Vec<String>,
    /// Type name.
    pub name: String,
    /// Variants in order.
    pub variants: Vec<RsVariant>,
}

/// A `pub type` alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsTypeAlias {
    /// `///` lines.
    pub docs: Vec<String>,
    /// Alias name.
    pub name: String,
    /// Target type.
    pub ty: RsType,
}

/// An associated `pub const`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsConst {
    /// `///` lines.
    pub docs: Vec<String>,
    /// Constant name.
    pub name: String,
    /// Constant type.
    pub ty: RsType,
    /// Value expression text.
    pub value: String,
}

/// The `self` parameter of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    /// `&self`
    Ref,
    /// `mut self`
    MutValue,
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsParam {
    /// Binding name.
    pub name: String,
    /// Parameter type.
    pub ty: RsType,
}

impl RsParam {
    /// Parameter `name: ty`.
    pub fn new(name: impl Into<String>, ty: RsType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A free function or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsFn {
    /// `///` lines.
    pub docs: Vec<String>,
    /// Attribute bodies, without `#[..]`.
    pub attrs: Vec<String>,
    /// Whether the function is `pub`.
    pub is_pub: bool,
    /// Whether the function is `async`.
    pub is_async: bool,
    /// Function name.
    pub name: String,
    /// `self` parameter of a method.
    pub receiver: Option<Receiver>,
    /// Parameters after the receiver.
    pub params: Vec<RsParam>,
    /// Return type, `None` for `()`.
    pub ret: Option<RsType>,
    /// Statements.
    pub body: Vec<RsStmt>,
}

impl RsFn {
    /// A `pub fn` with no docs or attributes.
    pub fn public(name: impl Into<String>) -> Self {
        Self {
            docs: Vec::new(),
            attrs: Vec::new(),
            is_pub: true,
            is_async: false,
            name: name.into(),
            receiver: None,
            params: Vec::new(),
            ret: None,
            body: Vec::new(),
        }
    }
}

/// An item inside an `impl` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImplItem {
    /// Associated constant.
    Const(RsConst),
    /// Method or associated function.
    Fn(RsFn),
}

/// An `impl` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsImpl {
    /// Lifetime parameters of the block.
    pub lifetimes: Vec<String>,
    /// `Trait` in `impl Trait for Target`
    pub trait_name: Option<String>,
    /// Implementing type, generics included.
    pub target: String,
    /// Items in order.
    pub items: Vec<ImplItem>,
}

/// A module-level item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RsItem {
    /// `[pub] use path;`
    Use {
        /// Whether the import is re-exported.
        is_pub: bool,
        /// Import path.
        path: String,
    },
    /// `[pub] mod name;`
    Mod {
        /// Whether the module is public.
        is_pub: bool,
        /// Module name.
        name: String,
    },
    /// Struct definition.
    Struct(RsStruct),
    /// Enum definition.
    Enum(RsEnum),
    /// Type alias.
    TypeAlias(RsTypeAlias),
    /// `impl` block.
    Impl(RsImpl),
    /// Free function.
    Fn(RsFn),
}

/// One generated source file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RsModule {
    /// Inner `//!` docs
    pub docs: Vec<String>,
    /// Items in order.
    pub items: Vec<RsItem>,
}
