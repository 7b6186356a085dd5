//! OpenAPI document structs for serde deserialization.
//!
//! Only the subset of OpenAPI 3.x the generator reads is modelled. Component
//! schemas and object properties stay as raw JSON values until the modeler
//! converts them one at a time, so a single malformed schema can be skipped
//! without rejecting the whole document.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};

/// Prefix of local component schema references.
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// Root OpenAPI document.
#[derive(Debug, Deserialize)]
pub struct OpenApiSpec {
    /// Path templates to their operations.
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    /// `components` section, when present.
    pub components: Option<Components>,
}

/// Reusable components.
#[derive(Debug, Default, Deserialize)]
pub struct Components {
    /// Named schemas, kept raw.
    #[serde(default)]
    pub schemas: BTreeMap<String, serde_json::Value>,
    /// Parameters addressed by `#/components/parameters/<name>`.
    #[serde(default)]
    pub parameters: BTreeMap<String, Parameter>,
    /// Responses addressed by `#/components/responses/<name>`.
    #[serde(default)]
    pub responses: BTreeMap<String, Response>,
}

/// Operations bound to one path.
#[derive(Debug, Deserialize)]
pub struct PathItem {
    /// `GET` operation.
    pub get: Option<Operation>,
    /// `POST` operation.
    pub post: Option<Operation>,
    /// `PUT` operation.
    pub put: Option<Operation>,
    /// `PATCH` operation.
    pub patch: Option<Operation>,
    /// `DELETE` operation.
    pub delete: Option<Operation>,
    /// Path-level parameters shared by all operations.
    #[serde(default)]
    pub parameters: Vec<ParameterOrRef>,
}

/// A single API operation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// `operationId`, missing on some paths of real documents.
    pub operation_id: Option<String>,
    /// One-line summary.
    pub summary: Option<String>,
    /// Longer description.
    pub description: Option<String>,
    /// Tags in document order; the first one can name the service.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Vendor extension naming the owning service.
    #[serde(rename = "x-service")]
    pub x_service: Option<String>,
    /// Operation-level parameters, overriding path-level ones by name.
    #[serde(default)]
    pub parameters: Vec<ParameterOrRef>,
    /// Request body, when the operation takes one.
    pub request_body: Option<RequestBody>,
    /// Status code to response.
    #[serde(default)]
    pub responses: BTreeMap<String, ResponseOrRef>,
}

/// A `$ref` object.
#[derive(Debug, Clone, Deserialize)]
pub struct Reference {
    /// Target, e.g. `#/components/parameters/ownerId`.
    #[serde(rename = "$ref")]
    pub ref_path: String,
}

/// A parameter, inline or by reference.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ParameterOrRef {
    /// `$ref` into `components.parameters`.
    Ref(Reference),
    /// Parameter declared in place.
    Inline(Parameter),
}

/// A path, query, header or cookie parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    /// Parameter name as it appears in the path or query string.
    pub name: String,
    /// `path`, `query`, `header` or `cookie`.
    #[serde(rename = "in")]
    pub location: String,
    /// Whether the parameter must be sent.
    #[serde(default)]
    pub required: bool,
    /// Free text description.
    pub description: Option<String>,
    /// Value schema.
    pub schema: Option<Schema>,
}

/// A request body definition.
#[derive(Debug, Deserialize)]
pub struct RequestBody {
    /// Whether the body must be sent.
    #[serde(default)]
    pub required: bool,
    /// Media types in document order.
    #[serde(default)]
    pub content: Ordered<MediaType>,
}

/// A response, inline or by reference.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ResponseOrRef {
    /// `$ref` into `components.responses`.
    Ref(Reference),
    /// Response declared in place.
    Inline(Response),
}

/// A response definition.
#[derive(Debug, Deserialize)]
pub struct Response {
    /// Free text description.
    pub description: Option<String>,
    /// Media types in document order.
    pub content: Option<Ordered<MediaType>>,
}

/// Media type content (e.g. application/json).
#[derive(Debug, Deserialize)]
pub struct MediaType {
    /// Payload schema.
    pub schema: Option<Schema>,
}

/// JSON Schema node as used by OpenAPI.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// `type`, a name or a list of names.
    #[serde(rename = "type")]
    pub schema_type: Option<SchemaType>,

    /// `$ref` target.
    #[serde(rename = "$ref")]
    pub ref_path: Option<String>,

    /// Title, used to name inline schemas.
    pub title: Option<String>,

    /// Free text description.
    pub description: Option<String>,

    /// Format hint (e.g. date-time, int32).
    pub format: Option<String>,

    /// Kept raw so each property converts independently.
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,

    /// Names of the required properties.
    #[serde(default)]
    pub required: Vec<String>,

    /// Element schema of an array.
    pub items: Option<Box<Schema>>,

    /// Allowed literal values.
    #[serde(rename = "enum")]
    pub enum_values: Option<Vec<serde_json::Value>>,

    /// Union alternatives.
    pub one_of: Option<Vec<Schema>>,

    /// Value schema of a map.
    pub additional_properties: Option<AdditionalProperties>,

    /// Single allowed value.
    #[serde(rename = "const")]
    pub const_value: Option<serde_json::Value>,

    /// OpenAPI 3.0 nullable flag (3.1 uses type arrays instead).
    pub nullable: Option<bool>,
}

/// Schema type can be a single type or an array of types (for nullable).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    /// `"type": "string"`
    Single(String),
    /// `"type": ["string", "null"]`
    Multiple(Vec<String>),
}

/// Additional properties can be a boolean or a schema.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    /// `true` allows any value, `false` none.
    Bool(bool),
    /// Schema every value follows.
    Schema(Box<Schema>),
}

/// A map that keeps document order.
///
/// Used where "first declared" matters, such as picking the media type of a
/// request body or response.
#[derive(Debug, Clone)]
pub struct Ordered<V>(pub Vec<(String, V)>);

impl<V> Default for Ordered<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> Ordered<V> {
    /// Entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First declared entry.
    pub fn first(&self) -> Option<(&str, &V)> {
        self.0.first().map(|(k, v)| (k.as_str(), v))
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Ordered<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = Ordered<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(Ordered(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// Input document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    /// `.json`
    Json,
    /// `.yaml` or `.yml`
    Yaml,
}

impl SpecFormat {
    /// Format implied by the file extension, if any.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }
}

impl OpenApiSpec {
    /// Read and parse a document, choosing the format from the extension.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let spec = Self::parse(
            &contents,
            SpecFormat::from_path(path),
            &path.display().to_string(),
        )?;
        debug!(
            spec_path = %path.display(),
            paths = spec.paths.len(),
            schemas = spec.schemas().len(),
            "Loaded OpenAPI document"
        );
        Ok(spec)
    }

    /// Parse `contents` in the given format, or try JSON then YAML when unknown.
    pub fn parse(contents: &str, format: Option<SpecFormat>, origin: &str) -> Result<Self> {
        match format {
            Some(format) => {
                Self::parse_as(contents, format).map_err(|message| Error::ParseFormat {
                    origin: origin.to_string(),
                    format: format.name(),
                    message,
                })
            }
            None => Self::parse_as(contents, SpecFormat::Json).or_else(|json| {
                Self::parse_as(contents, SpecFormat::Yaml).map_err(|yaml| Error::Parse {
                    origin: origin.to_string(),
                    json,
                    yaml,
                })
            }),
        }
    }

    fn parse_as(contents: &str, format: SpecFormat) -> std::result::Result<Self, String> {
        match format {
            SpecFormat::Json => serde_json::from_str(contents).map_err(|e| e.to_string()),
            SpecFormat::Yaml => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
        }
    }

    /// Component schemas, empty when the document has none.
    pub fn schemas(&self) -> &BTreeMap<String, serde_json::Value> {
        static EMPTY: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        self.components.as_ref().map_or(&EMPTY, |c| &c.schemas)
    }

    /// Follow a parameter reference into `components.parameters`.
    pub fn resolve_parameter<'a>(&'a self, param: &'a ParameterOrRef) -> Option<&'a Parameter> {
        match param {
            ParameterOrRef::Inline(p) => Some(p),
            ParameterOrRef::Ref(r) => {
                let name = r.ref_path.strip_prefix("#/components/parameters/")?;
                self.components.as_ref()?.parameters.get(name)
            }
        }
    }

    /// Follow a response reference into `components.responses`.
    pub fn resolve_response<'a>(&'a self, response: &'a ResponseOrRef) -> Option<&'a Response> {
        match response {
            ResponseOrRef::Inline(r) => Some(r),
            ResponseOrRef::Ref(r) => {
                let name = r.ref_path.strip_prefix("#/components/responses/")?;
                self.components.as_ref()?.responses.get(name)
            }
        }
    }
}

impl Schema {
    /// Convert a raw schema node.
    pub fn from_value(value: &serde_json::Value) -> std::result::Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// The first declared non-null type.
    pub fn primary_type(&self) -> Option<&str> {
        match self.schema_type.as_ref()? {
            SchemaType::Single(t) => Some(t.as_str()),
            SchemaType::Multiple(types) => {
                types.iter().map(String::as_str).find(|t| *t != "null")
            }
        }
    }

    /// Whether the node carries an enumerated literal set.
    pub fn has_enum(&self) -> bool {
        self.enum_values.as_ref().is_some_and(|v| !v.is_empty())
    }

    /// Whether the node carries a `oneOf` composition.
    pub fn has_one_of(&self) -> bool {
        self.one_of.as_ref().is_some_and(|v| !v.is_empty())
    }

    /// The item reference of an array schema.
    pub fn items_ref(&self) -> Option<&str> {
        if self.primary_type() != Some("array") {
            return None;
        }
        self.items.as_ref()?.ref_path.as_deref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const JSON_DOC: &str = r##"{
        "openapi": "3.1.0",
        "paths": {
            "/v4/things/{id}": {
                "parameters": [{"$ref": "#/components/parameters/Id"}],
                "post": {
                    "operationId": "createThing",
                    "x-service": "things",
                    "requestBody": {
                        "content": {
                            "text/plain": {"schema": {"type": "string"}},
                            "application/json": {"schema": {"$ref": "#/components/schemas/Thing"}}
                        }
                    },
                    "responses": {"204": {"description": "done"}}
                }
            }
        },
        "components": {
            "schemas": {"Thing": {"type": "object"}},
            "parameters": {"Id": {"name": "id", "in": "path", "required": true}}
        }
    }"##;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SpecFormat::from_path(Path::new("a.json")), Some(SpecFormat::Json));
        assert_eq!(SpecFormat::from_path(Path::new("a.YAML")), Some(SpecFormat::Yaml));
        assert_eq!(SpecFormat::from_path(Path::new("a.yml")), Some(SpecFormat::Yaml));
        assert_eq!(SpecFormat::from_path(Path::new("openapi")), None);
        assert_eq!(SpecFormat::from_path(Path::new("a.txt")), None);
    }

    #[test]
    fn test_content_keeps_document_order() {
        let spec = OpenApiSpec::parse(JSON_DOC, Some(SpecFormat::Json), "test").unwrap();
        let op = spec.paths["/v4/things/{id}"].post.as_ref().unwrap();
        let body = op.request_body.as_ref().unwrap();
        let keys: Vec<_> = body.content.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["text/plain", "application/json"]);
        assert_eq!(op.x_service.as_deref(), Some("things"));
    }

    #[test]
    fn test_resolves_parameter_refs() {
        let spec = OpenApiSpec::parse(JSON_DOC, None, "test").unwrap();
        let item = &spec.paths["/v4/things/{id}"];
        let param = spec.resolve_parameter(&item.parameters[0]).unwrap();
        assert_eq!(param.name, "id");
        assert_eq!(param.location, "path");
    }

    #[test]
    fn test_yaml_fallback_without_extension() {
        let yaml = r#"
paths:
  /v4/things:
    get:
      operationId: listThings
      tags: [things]
      responses:
        200:
          description: ok
"#;
        let spec = OpenApiSpec::parse(yaml, None, "test").unwrap();
        let op = spec.paths["/v4/things"].get.as_ref().unwrap();
        assert_eq!(op.operation_id.as_deref(), Some("listThings"));
        assert!(op.responses.contains_key("200"));
    }

    #[test]
    fn test_parse_error_reports_both_formats() {
        let err = OpenApiSpec::parse("paths: [", None, "broken.spec").unwrap_err();
        match err {
            Error::Parse { origin, json, yaml } => {
                assert_eq!(origin, "broken.spec");
                assert!(!json.is_empty());
                assert!(!yaml.is_empty());
            }
            other => unreachable!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_primary_type_skips_null() {
        let schema: Schema =
            serde_json::from_value(serde_json::json!({"type": ["null", "integer"]})).unwrap();
        assert_eq!(schema.primary_type(), Some("integer"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = OpenApiSpec::load(Path::new("/nonexistent/openapi.json")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }
}
