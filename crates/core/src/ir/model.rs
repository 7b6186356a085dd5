//! Classification of component schemas into models.
//!
//! Classification order, first match wins:
//! 1. `enum` -> Enum
//! 2. `oneOf` -> Union
//! 3. object with only `additionalProperties` -> Map
//! 4. object -> Record
//! 5. scalar with a `title` -> Alias
//!
//! Anything else is skipped with a warning. A schema or property that fails
//! to convert is skipped the same way; the pass never aborts on one bad node.

use std::collections::{BTreeMap, HashSet};

use sdkgen_common::TypesConfig;
use tracing::{debug, info, warn};

use super::types::{
    Discriminator, EnumValues, Field, Model, ModelKind, Record, TypeRef,
};
use super::utils::to_type_name;
use crate::spec::{AdditionalProperties, OpenApiSpec, Schema};

/// Why a schema node could not be mapped to a type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// A `$ref` whose last segment is empty.
    #[error("reference '{0}' has no type name")]
    EmptyReference(String),

    /// A node that is structurally unusable.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

/// Converts schema nodes into models and type references.
#[derive(Debug, Clone)]
pub struct SchemaModeler<'a> {
    preserved: &'a [String],
}

impl<'a> SchemaModeler<'a> {
    /// Modeler honoring the preserved names of `types`.
    pub fn new(types: &'a TypesConfig) -> Self {
        Self {
            preserved: &types.preserved_names,
        }
    }

    /// Type name for a schema key or title. Preserved names are kept verbatim.
    pub fn type_name(&self, raw: &str) -> String {
        if self.preserved.iter().any(|p| p == raw) {
            return raw.to_string();
        }
        to_type_name(raw)
    }

    /// Type name referenced by a `$ref`: its final path segment.
    pub fn ref_name(&self, ref_path: &str) -> Result<String, TypeError> {
        let last = ref_path.rsplit('/').next().unwrap_or_default();
        if last.is_empty() || last.starts_with('#') {
            return Err(TypeError::EmptyReference(ref_path.to_string()));
        }
        Ok(self.type_name(last))
    }

    /// Classify every component schema.
    ///
    /// Models are returned sorted by type name with union membership filled in.
    pub fn model_all(&self, spec: &OpenApiSpec) -> Vec<Model> {
        let mut models: BTreeMap<String, Model> = BTreeMap::new();

        for (name, raw) in spec.schemas() {
            let schema = match Schema::from_value(raw) {
                Ok(schema) => schema,
                Err(e) => {
                    warn!(schema = %name, error = %e, "Skipping malformed schema");
                    continue;
                }
            };

            let model = match self.classify(name, &schema) {
                Ok(Some(model)) => model,
                Ok(None) => {
                    warn!(schema = %name, "Skipping schema that matches no model kind");
                    continue;
                }
                Err(e) => {
                    warn!(schema = %name, error = %e, "Failed to process schema");
                    continue;
                }
            };

            if let Some(existing) = models.get(&model.name) {
                warn!(
                    schema = %name,
                    type_name = %model.name,
                    existing = %existing.source_name,
                    "Skipping schema whose type name is already taken"
                );
                continue;
            }
            models.insert(model.name.clone(), model);
        }

        let mut models: Vec<Model> = models.into_values().collect();
        link_unions(&mut models);

        info!(
            models = models.len(),
            records = count(&models, "record"),
            enums = count(&models, "enum"),
            unions = count(&models, "union"),
            "Classified component schemas"
        );
        models
    }

    /// Classify one schema. `Ok(None)` means it matches no model kind.
    pub fn classify(&self, name: &str, schema: &Schema) -> Result<Option<Model>, TypeError> {
        let kind = if schema.has_enum() {
            Some(ModelKind::Enum(self.enum_values(name, schema)))
        } else if schema.has_one_of() {
            Some(ModelKind::Union(self.union_members(schema)?))
        } else if self.is_object(schema) {
            match (&schema.additional_properties, schema.properties.is_empty()) {
                (Some(AdditionalProperties::Bool(true)), true) => {
                    Some(ModelKind::Map(TypeRef::Any))
                }
                (Some(AdditionalProperties::Schema(values)), true) => {
                    Some(ModelKind::Map(self.map_type(values)?))
                }
                _ => Some(ModelKind::Record(self.record(name, schema))),
            }
        } else if schema.primary_type().is_some() && schema.title.is_some() {
            let mut untitled = schema.clone();
            untitled.title = None;
            Some(ModelKind::Alias(self.map_type(&untitled)?))
        } else {
            None
        };

        Ok(kind.map(|kind| Model {
            name: self.type_name(name),
            source_name: name.to_string(),
            description: schema.description.clone(),
            kind,
            implements: Vec::new(),
        }))
    }

    fn is_object(&self, schema: &Schema) -> bool {
        match schema.primary_type() {
            Some(t) => t == "object",
            None => !schema.properties.is_empty(),
        }
    }

    fn enum_values(&self, name: &str, schema: &Schema) -> EnumValues {
        let raw = schema.enum_values.as_deref().unwrap_or_default();
        let mut skipped = 0usize;
        let values = match schema.primary_type() {
            Some("integer") => EnumValues::Integer(collect(raw, |v| v.as_i64(), &mut skipped)),
            Some("number") => EnumValues::Number(collect(raw, |v| v.as_f64(), &mut skipped)),
            Some("boolean") => EnumValues::Boolean(collect(raw, |v| v.as_bool(), &mut skipped)),
            _ => EnumValues::String(collect(
                raw,
                |v| v.as_str().map(str::to_string),
                &mut skipped,
            )),
        };
        if skipped > 0 {
            warn!(schema = %name, skipped, "Dropped enum values that do not match the base type");
        }
        values
    }

    fn union_members(&self, schema: &Schema) -> Result<Vec<TypeRef>, TypeError> {
        let mut members = Vec::new();
        for alternative in schema.one_of.as_deref().unwrap_or_default() {
            if let Some(ref_path) = &alternative.ref_path {
                members.push(TypeRef::Named(self.ref_name(ref_path)?));
            } else if alternative.primary_type().is_some() {
                members.push(self.map_type(alternative)?);
            } else {
                debug!("Skipping untyped oneOf alternative");
            }
        }
        Ok(members)
    }

    fn record(&self, name: &str, schema: &Schema) -> Record {
        let required: HashSet<&str> = schema.required.iter().map(String::as_str).collect();
        let mut record = Record::default();

        for (prop_name, raw) in &schema.properties {
            let field = Schema::from_value(raw)
                .map_err(|e| TypeError::InvalidSchema(e.to_string()))
                .and_then(|prop| self.field(prop_name, &prop, required.contains(prop_name.as_str())));
            let field = match field {
                Ok(field) => field,
                Err(e) => {
                    warn!(
                        property = %format!("{name}.{prop_name}"),
                        error = %e,
                        "Failed to process property"
                    );
                    continue;
                }
            };

            if record.discriminator.is_none()
                && let Some(value) = &field.constant
            {
                record.discriminator = Some(Discriminator {
                    field: field.name.clone(),
                    value: value.clone(),
                });
            }
            record.fields.push(field);
        }

        record
    }

    fn field(&self, name: &str, schema: &Schema, required: bool) -> Result<Field, TypeError> {
        Ok(Field {
            name: name.to_string(),
            ty: self.map_type(schema)?,
            required,
            constant: schema
                .const_value
                .as_ref()
                .and_then(|v| v.as_str())
                .map(str::to_string),
            description: schema.description.clone(),
        })
    }

    /// Map a schema node to a type reference.
    pub fn map_type(&self, schema: &Schema) -> Result<TypeRef, TypeError> {
        if let Some(ref_path) = &schema.ref_path {
            return Ok(TypeRef::Named(self.ref_name(ref_path)?));
        }

        let Some(schema_type) = schema.primary_type() else {
            return Ok(match &schema.title {
                Some(title) => TypeRef::Named(self.type_name(title)),
                None => TypeRef::Any,
            });
        };

        let format = schema.format.as_deref();
        Ok(match schema_type {
            "string" if format == Some("date-time") => TypeRef::Timestamp,
            "string" => match &schema.title {
                Some(title) => TypeRef::Named(self.type_name(title)),
                None => TypeRef::String,
            },
            "integer" if format == Some("int32") => TypeRef::Int32,
            "integer" => TypeRef::Int64,
            "number" if format == Some("float") => TypeRef::Float32,
            "number" => TypeRef::Float64,
            "boolean" => TypeRef::Bool,
            "array" => match &schema.items {
                Some(items) => TypeRef::array(self.map_type(items)?),
                None => TypeRef::array(TypeRef::Any),
            },
            "object" => TypeRef::map(TypeRef::Any),
            _ => TypeRef::Any,
        })
    }
}

fn collect<T>(
    raw: &[serde_json::Value],
    convert: impl Fn(&serde_json::Value) -> Option<T>,
    skipped: &mut usize,
) -> Vec<T> {
    raw.iter()
        .filter_map(|v| {
            let converted = convert(v);
            if converted.is_none() {
                *skipped += 1;
            }
            converted
        })
        .collect()
}

fn count(models: &[Model], kind: &str) -> usize {
    models.iter().filter(|m| m.kind.label() == kind).count()
}

/// Fill `implements` from union membership.
fn link_unions(models: &mut [Model]) {
    let mut memberships: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for model in models.iter() {
        if let ModelKind::Union(members) = &model.kind {
            for member in members {
                if let Some(name) = member.direct_name() {
                    memberships
                        .entry(name.to_string())
                        .or_default()
                        .push(model.name.clone());
                }
            }
        }
    }

    for model in models.iter_mut() {
        if let Some(unions) = memberships.remove(&model.name) {
            let mut unions = unions;
            unions.sort();
            unions.dedup();
            model.implements = unions;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::spec::SpecFormat;
    use serde_json::json;

    fn schema(value: serde_json::Value) -> Schema {
        Schema::from_value(&value).unwrap()
    }

    fn classify(name: &str, value: serde_json::Value) -> Option<Model> {
        let types = TypesConfig::default();
        SchemaModeler::new(&types).classify(name, &schema(value)).unwrap()
    }

    #[test]
    fn test_enum_wins_over_object() {
        let model = classify(
            "state",
            json!({"type": "string", "enum": ["ACTIVE", "DELETED"], "title": "State"}),
        )
        .unwrap();
        assert_eq!(model.name, "State");
        assert_eq!(
            model.kind,
            ModelKind::Enum(EnumValues::String(vec!["ACTIVE".into(), "DELETED".into()]))
        );
    }

    #[test]
    fn test_integer_enum() {
        let model = classify("Level", json!({"type": "integer", "enum": [1, 2, "x"]})).unwrap();
        assert_eq!(model.kind, ModelKind::Enum(EnumValues::Integer(vec![1, 2])));
    }

    #[test]
    fn test_union_members() {
        let model = classify(
            "Payload",
            json!({"oneOf": [
                {"$ref": "#/components/schemas/TextPayload"},
                {"type": "integer"},
                {"description": "untyped"}
            ]}),
        )
        .unwrap();
        assert_eq!(
            model.kind,
            ModelKind::Union(vec![TypeRef::named("TextPayload"), TypeRef::Int64])
        );
    }

    #[test]
    fn test_map_kinds() {
        let any = classify("Labels", json!({"type": "object", "additionalProperties": true}))
            .unwrap();
        assert_eq!(any.kind, ModelKind::Map(TypeRef::Any));

        let typed = classify(
            "Quotas",
            json!({"type": "object", "additionalProperties": {"type": "integer"}}),
        )
        .unwrap();
        assert_eq!(typed.kind, ModelKind::Map(TypeRef::Int64));

        // Fixed properties make it a record even with additionalProperties.
        let mixed = classify(
            "Mixed",
            json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "additionalProperties": true
            }),
        )
        .unwrap();
        assert!(matches!(mixed.kind, ModelKind::Record(_)));
    }

    #[test]
    fn test_record_fields_and_nullability() {
        let model = classify(
            "Application",
            json!({
                "type": "object",
                "required": ["id", "zones"],
                "properties": {
                    "zones": {"type": "array", "items": {"type": "string"}},
                    "id": {"type": "string"},
                    "tags": {"type": "array", "items": {"$ref": "#/components/schemas/Tag"}},
                    "createdAt": {"type": "string", "format": "date-time"},
                    "owner": {"$ref": "#/components/schemas/Owner"},
                    "kind": {"type": "string", "const": "application"}
                }
            }),
        )
        .unwrap();
        let ModelKind::Record(record) = model.kind else {
            unreachable!("expected a record");
        };
        let names: Vec<_> = record.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["createdAt", "id", "kind", "owner", "tags", "zones"]);

        let by_name = |n: &str| record.fields.iter().find(|f| f.name == n).unwrap();
        assert_eq!(by_name("createdAt").ty, TypeRef::Timestamp);
        assert!(by_name("createdAt").is_nullable());
        assert!(!by_name("id").is_nullable());
        assert!(!by_name("tags").is_nullable());
        assert_eq!(by_name("tags").ty, TypeRef::array(TypeRef::named("Tag")));
        assert!(by_name("owner").is_nullable());
        assert_eq!(
            record.discriminator,
            Some(Discriminator {
                field: "kind".into(),
                value: "application".into()
            })
        );
    }

    #[test]
    fn test_empty_object_is_record() {
        let model = classify("Empty", json!({"type": "object"})).unwrap();
        assert_eq!(model.kind, ModelKind::Record(Record::default()));
    }

    #[test]
    fn test_titled_scalar_is_alias() {
        let model = classify("OwnerId", json!({"type": "string", "title": "OwnerId"})).unwrap();
        assert_eq!(model.kind, ModelKind::Alias(TypeRef::String));

        let model = classify("Count", json!({"type": "integer", "format": "int32", "title": "C"}))
            .unwrap();
        assert_eq!(model.kind, ModelKind::Alias(TypeRef::Int32));
    }

    #[test]
    fn test_unclassifiable_is_none() {
        assert!(classify("Bare", json!({"type": "string"})).is_none());
        assert!(classify("Ref", json!({"$ref": "#/components/schemas/Other"})).is_none());
    }

    #[test]
    fn test_map_type_rules() {
        let types = TypesConfig::default();
        let modeler = SchemaModeler::new(&types);
        let map = |v| modeler.map_type(&schema(v)).unwrap();

        assert_eq!(map(json!({"type": "string", "title": "Zone"})), TypeRef::named("Zone"));
        assert_eq!(map(json!({"title": "flavor-name"})), TypeRef::named("FlavorName"));
        assert_eq!(map(json!({})), TypeRef::Any);
        assert_eq!(map(json!({"type": "number", "format": "float"})), TypeRef::Float32);
        assert_eq!(map(json!({"type": "number"})), TypeRef::Float64);
        assert_eq!(map(json!({"type": "boolean"})), TypeRef::Bool);
        assert_eq!(map(json!({"type": "array"})), TypeRef::array(TypeRef::Any));
        assert_eq!(map(json!({"type": "object"})), TypeRef::map(TypeRef::Any));
        assert_eq!(map(json!({"type": ["string", "null"]})), TypeRef::String);
        assert_eq!(
            map(json!({"$ref": "#/components/schemas/WireGuard"})),
            TypeRef::named("WireGuard")
        );
        assert_eq!(
            map(json!({"$ref": "#/components/schemas/wire-guard_peer"})),
            TypeRef::named("WireGuardPeer")
        );
        assert!(modeler.map_type(&schema(json!({"$ref": "#/components/schemas/"}))).is_err());
    }

    #[test]
    fn test_model_all_skips_bad_schemas_and_links_unions() {
        let doc = r##"{
            "paths": {},
            "components": {"schemas": {
                "Pet": {"oneOf": [
                    {"$ref": "#/components/schemas/Cat"},
                    {"$ref": "#/components/schemas/Dog"}
                ]},
                "Animal": {"oneOf": [{"$ref": "#/components/schemas/Cat"}]},
                "Cat": {"type": "object", "properties": {
                    "name": {"type": "string"},
                    "broken": {"type": "object", "required": "yes"}
                }},
                "Dog": {"type": "object"},
                "Broken": {"type": "object", "properties": []},
                "Plain": {"type": "string"},
                "dog": {"type": "object"}
            }}
        }"##;
        let spec = OpenApiSpec::parse(doc, Some(SpecFormat::Json), "test").unwrap();
        let types = TypesConfig::default();
        let models = SchemaModeler::new(&types).model_all(&spec);

        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Animal", "Cat", "Dog", "Pet"]);

        let cat = models.iter().find(|m| m.name == "Cat").unwrap();
        assert_eq!(cat.implements, vec!["Animal", "Pet"]);
        let ModelKind::Record(record) = &cat.kind else {
            unreachable!("expected a record");
        };
        assert_eq!(record.fields.len(), 1);

        let dog = models.iter().find(|m| m.name == "Dog").unwrap();
        assert_eq!(dog.source_name, "Dog");
        assert_eq!(dog.implements, vec!["Pet"]);
    }
}
