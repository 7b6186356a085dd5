//! Model IR: the canonical shape of every component schema.
//!
//! - TypeRef: field and parameter types (primitives, named refs, collections)
//! - Model: one classified schema with a kind-specific payload
//! - Field: a record property

/// Reference to a type, as used by fields, parameters and bodies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// `string`
    String,
    /// `string` with `format: date-time`
    Timestamp,
    /// `integer` with `format: int32`
    Int32,
    /// Any other `integer`
    Int64,
    /// `number` with `format: float`
    Float32,
    /// Any other `number`
    Float64,
    /// `boolean`
    Bool,
    /// Unconstrained value
    Any,
    /// Reference to another model by its type name
    Named(String),
    /// Sequence of the inner type
    Array(Box<TypeRef>),
    /// String-keyed map of the inner type
    Map(Box<TypeRef>),
}

impl TypeRef {
    /// Reference to a model by type name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Sequence of `inner`.
    pub fn array(inner: Self) -> Self {
        Self::Array(Box::new(inner))
    }

    /// String-keyed map of `inner`.
    pub fn map(inner: Self) -> Self {
        Self::Map(Box::new(inner))
    }

    /// Whether this is a sequence.
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// The model name this type points at without any collection in between.
    pub fn direct_name(&self) -> Option<&str> {
        match self {
            Self::Named(n) => Some(n),
            _ => None,
        }
    }

    /// Every model name mentioned anywhere in this type.
    pub fn named_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Named(n) => out.push(n),
            Self::Array(inner) | Self::Map(inner) => inner.named_refs(out),
            _ => {}
        }
    }

    /// Collapse to a scalar suitable for a path or query parameter.
    ///
    /// References and composite types become strings.
    pub fn scalar(&self) -> ScalarType {
        match self {
            Self::Int32 => ScalarType::Int32,
            Self::Int64 => ScalarType::Int64,
            Self::Float32 => ScalarType::Float32,
            Self::Float64 => ScalarType::Float64,
            Self::Bool => ScalarType::Bool,
            _ => ScalarType::String,
        }
    }
}

/// Simplified parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Text, also used for references and collections.
    String,
    /// `i32`
    Int32,
    /// `i64`
    Int64,
    /// `f32`
    Float32,
    /// `f64`
    Float64,
    /// `bool`
    Bool,
}

/// A classified component schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Type name after casing.
    pub name: String,
    /// Key in `components.schemas`.
    pub source_name: String,
    /// Schema description.
    pub description: Option<String>,
    /// Classified shape.
    pub kind: ModelKind,
    /// Unions that list this model as a member, sorted.
    pub implements: Vec<String>,
}

/// The five canonical model kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelKind {
    /// Object with fixed properties.
    Record(Record),
    /// Closed set of literals.
    Enum(EnumValues),
    /// Another name for an existing type.
    Alias(TypeRef),
    /// Object with only `additionalProperties`, mapping to this value type.
    Map(TypeRef),
    /// `oneOf` alternatives in declaration order.
    Union(Vec<TypeRef>),
}

impl ModelKind {
    /// Lower-case kind name used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Record(_) => "record",
            Self::Enum(_) => "enum",
            Self::Alias(_) => "alias",
            Self::Map(_) => "map",
            Self::Union(_) => "union",
        }
    }
}

/// Object schema with fixed properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    /// Sorted by property name.
    pub fields: Vec<Field>,
    /// Property carrying a constant value, used as the type discriminator.
    pub discriminator: Option<Discriminator>,
}

/// Constant-valued property that tells union members apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discriminator {
    /// Property name on the wire.
    pub field: String,
    /// The constant.
    pub value: String,
}

/// A record property.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Property name as it appears on the wire.
    pub name: String,
    /// Property type.
    pub ty: TypeRef,
    /// Listed in the schema's `required`.
    pub required: bool,
    /// `const` value of a string property.
    pub constant: Option<String>,
    /// Property description.
    pub description: Option<String>,
}

impl Field {
    /// Optional fields are nullable, except arrays which default to empty.
    pub fn is_nullable(&self) -> bool {
        !self.required && !self.ty.is_array()
    }
}

/// Enum literal set, typed by the enum's base type.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumValues {
    /// `type: string`
    String(Vec<String>),
    /// `type: integer`
    Integer(Vec<i64>),
    /// `type: number`
    Number(Vec<f64>),
    /// `type: boolean`
    Boolean(Vec<bool>),
}

impl EnumValues {
    /// Number of literals.
    pub fn len(&self) -> usize {
        match self {
            Self::String(v) => v.len(),
            Self::Integer(v) => v.len(),
            Self::Number(v) => v.len(),
            Self::Boolean(v) => v.len(),
        }
    }

    /// Whether there are no literals.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_array_is_not_nullable() {
        let mut field = Field {
            name: "tags".into(),
            ty: TypeRef::array(TypeRef::String),
            required: false,
            constant: None,
            description: None,
        };
        assert!(!field.is_nullable());

        field.ty = TypeRef::String;
        assert!(field.is_nullable());

        field.required = true;
        assert!(!field.is_nullable());
    }

    #[test]
    fn test_scalar_collapses_composites() {
        assert_eq!(TypeRef::Int32.scalar(), ScalarType::Int32);
        assert_eq!(TypeRef::Bool.scalar(), ScalarType::Bool);
        assert_eq!(TypeRef::named("Owner").scalar(), ScalarType::String);
        assert_eq!(TypeRef::array(TypeRef::Int64).scalar(), ScalarType::String);
        assert_eq!(TypeRef::Timestamp.scalar(), ScalarType::String);
    }

    #[test]
    fn test_named_refs_walks_collections() {
        let ty = TypeRef::map(TypeRef::array(TypeRef::named("Flavor")));
        let mut refs = Vec::new();
        ty.named_refs(&mut refs);
        assert_eq!(refs, vec!["Flavor"]);
    }
}
