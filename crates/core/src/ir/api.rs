//! API-level IR for extracted operations.
//!
//! Operations carry everything the services and builder passes need, with
//! naming and ownership already resolved. Nothing downstream re-derives them.

use std::collections::BTreeMap;
use std::fmt;

use super::types::TypeRef;
use crate::naming::OwnershipRule;

/// HTTP method, ordered the way operations are emitted for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    /// `DELETE`
    Delete,
    /// `GET`
    Get,
    /// `PATCH`
    Patch,
    /// `POST`
    Post,
    /// `PUT`
    Put,
}

impl HttpMethod {
    /// Emission order within one path.
    pub const ALL: [Self; 5] = [Self::Delete, Self::Get, Self::Patch, Self::Post, Self::Put];

    /// Upper-case name, as in override keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::Patch => "PATCH",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }

    /// Lower-case name, used to synthesize operation ids.
    pub fn as_lower(&self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Get => "get",
            Self::Patch => "patch",
            Self::Post => "post",
            Self::Put => "put",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A path placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParam {
    /// Name as written in the path template.
    pub name: String,
    /// Declared type, `String` when the schema says nothing.
    pub ty: TypeRef,
    /// Free text description.
    pub description: Option<String>,
}

/// A query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    /// Name on the wire.
    pub name: String,
    /// Declared type.
    pub ty: TypeRef,
    /// Whether the parameter must be sent.
    pub required: bool,
    /// Free text description.
    pub description: Option<String>,
}

/// What a successful call returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseType {
    /// The response has no body.
    Empty,
    /// The decoded body type.
    Body(TypeRef),
}

/// A fully resolved operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Operation id after overrides.
    pub id: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Path template, e.g. `/v4/products/{productId}`.
    pub path: String,
    /// In order of appearance in `path`.
    pub path_params: Vec<PathParam>,
    /// Unique by name, sorted.
    pub query_params: Vec<QueryParam>,
    /// Request body type, when the operation takes one.
    pub body: Option<TypeRef>,
    /// Success response.
    pub response: ResponseType,
    /// Owning service.
    pub service: String,
    /// Package the service maps to.
    pub package: String,
    /// Which ownership rule assigned `service`.
    pub rule: OwnershipRule,
    /// Function name, unique within `package`.
    pub fn_name: String,
    /// One-line summary.
    pub summary: Option<String>,
    /// Longer description.
    pub description: Option<String>,
}

impl Operation {
    /// Whether the operation takes query parameters.
    pub fn has_query(&self) -> bool {
        !self.query_params.is_empty()
    }

    /// The `METHOD:path` key used by the override table.
    pub fn key(&self) -> String {
        format!("{}:{}", self.method, self.path)
    }
}

/// An operation that was dropped because no rule assigned it a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    /// HTTP method.
    pub method: HttpMethod,
    /// Path template.
    pub path: String,
    /// Resolved operation id.
    pub operation_id: String,
    /// Why the operation was left out.
    pub reason: String,
}

/// Extracted operations plus the ones that were left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiIr {
    /// Sorted by path, then method.
    pub operations: Vec<Operation>,
    /// Operations no ownership rule claimed.
    pub excluded: Vec<Exclusion>,
}

impl ApiIr {
    /// Operations grouped by package, packages sorted.
    pub fn by_package(&self) -> BTreeMap<&str, Vec<&Operation>> {
        let mut packages: BTreeMap<&str, Vec<&Operation>> = BTreeMap::new();
        for op in &self.operations {
            packages.entry(op.package.as_str()).or_default().push(op);
        }
        packages
    }

    /// Operation with the given id.
    pub fn find(&self, id: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.id == id)
    }
}
