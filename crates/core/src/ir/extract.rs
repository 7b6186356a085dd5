//! Path x method walk producing the operation IR.
//!
//! Every operation leaves here with its final id, package and function name.
//! The services and builder passes both read this output, never the raw spec.

use std::collections::{BTreeMap, HashMap, HashSet};

use sdkgen_common::TypesConfig;
use tracing::{debug, info, warn};

use super::api::{ApiIr, Exclusion, HttpMethod, Operation, PathParam, QueryParam, ResponseType};
use super::model::SchemaModeler;
use super::types::TypeRef;
use super::utils::{to_fn_name, unique_name};
use crate::naming::{NamePolicy, OwnershipHints};
use crate::spec::{self, MediaType, OpenApiSpec, Ordered, Parameter, PathItem};

/// Success codes checked for the response type, in order.
const SUCCESS_CODES: [&str; 4] = ["200", "201", "202", "204"];

/// Module names every service package already uses.
const RESERVED_FN_NAMES: [&str; 2] = ["options", "r#mod"];

/// Placeholder names in a path template, in order of appearance.
///
/// `"/x/{id}/y/{id}"` yields `["id", "id"]`.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        names.push(&after[..close]);
        rest = &after[close + 1..];
    }
    names
}

/// Builds [`ApiIr`] from a parsed document.
#[derive(Debug)]
pub struct OperationExtractor<'a> {
    spec: &'a OpenApiSpec,
    policy: &'a NamePolicy<'a>,
    modeler: SchemaModeler<'a>,
}

impl<'a> OperationExtractor<'a> {
    /// Extractor naming operations through `policy`.
    pub fn new(spec: &'a OpenApiSpec, policy: &'a NamePolicy<'a>, types: &'a TypesConfig) -> Self {
        Self {
            spec,
            policy,
            modeler: SchemaModeler::new(types),
        }
    }

    /// Walk every path and method, sorted by path then method.
    pub fn extract(&self) -> ApiIr {
        let mut ir = ApiIr::default();
        let mut fn_names: HashMap<String, HashSet<String>> = HashMap::new();

        for (path, item) in &self.spec.paths {
            for method in HttpMethod::ALL {
                let Some(op) = operation_for(item, method) else {
                    continue;
                };

                let id = self
                    .policy
                    .resolve_operation_id(method, path, op.operation_id.as_deref());

                let hints = OwnershipHints {
                    x_service: op.x_service.as_deref(),
                    tags: &op.tags,
                };
                let Some(owner) = self.policy.resolve_package(&id, path, hints) else {
                    warn!(
                        operation_id = %id,
                        method = %method,
                        path = %path,
                        "Excluding operation with no owning service"
                    );
                    ir.excluded.push(Exclusion {
                        method,
                        path: path.clone(),
                        operation_id: id,
                        reason: "no service matched".to_string(),
                    });
                    continue;
                };

                let base = to_fn_name(&id);
                let used = fn_names.entry(owner.package.clone()).or_insert_with(|| {
                    RESERVED_FN_NAMES.iter().map(|s| (*s).to_string()).collect()
                });
                let fn_name = unique_name(&base, used);
                if fn_name != base {
                    warn!(
                        operation_id = %id,
                        package = %owner.package,
                        fn_name = %fn_name,
                        "Function name already taken in package, renamed"
                    );
                }

                let params = self.merged_parameters(item, op);
                debug!(operation_id = %id, rule = %owner.rule, package = %owner.package, "Resolved owner");

                ir.operations.push(Operation {
                    path_params: self.path_params(&id, path, &params),
                    query_params: self.query_params(&params),
                    body: op.request_body.as_ref().and_then(|b| self.body_type(&id, &b.content)),
                    response: self.response_type(&id, op),
                    id,
                    method,
                    path: path.clone(),
                    service: owner.service,
                    package: owner.package,
                    rule: owner.rule,
                    fn_name,
                    summary: op.summary.clone(),
                    description: op.description.clone(),
                });
            }
        }

        let packages = ir.by_package().len();
        info!(
            operations = ir.operations.len(),
            excluded = ir.excluded.len(),
            packages,
            "Extracted operations"
        );
        ir
    }

    /// Path-level parameters overlaid with operation-level ones.
    fn merged_parameters(&self, item: &'a PathItem, op: &'a spec::Operation) -> Vec<&'a Parameter> {
        let mut merged: Vec<&Parameter> = Vec::new();
        for param in item.parameters.iter().chain(&op.parameters) {
            let Some(param) = self.spec.resolve_parameter(param) else {
                warn!(operation_id = ?op.operation_id, "Skipping unresolvable parameter reference");
                continue;
            };
            match merged
                .iter_mut()
                .find(|p| p.name == param.name && p.location == param.location)
            {
                Some(slot) => *slot = param,
                None => merged.push(param),
            }
        }
        merged
    }

    fn path_params(&self, id: &str, path: &str, params: &[&Parameter]) -> Vec<PathParam> {
        let declared: BTreeMap<&str, &Parameter> = params
            .iter()
            .filter(|p| p.location == "path")
            .map(|p| (p.name.as_str(), *p))
            .collect();

        let names = placeholders(path);
        for name in declared.keys() {
            if !names.contains(name) {
                warn!(operation_id = %id, param = %name, "Dropping path parameter missing from template");
            }
        }

        names
            .into_iter()
            .map(|name| match declared.get(name) {
                Some(param) => PathParam {
                    name: name.to_string(),
                    ty: self.param_type(id, param),
                    description: param.description.clone(),
                },
                None => {
                    debug!(operation_id = %id, param = %name, "Synthesizing undeclared path parameter");
                    PathParam {
                        name: name.to_string(),
                        ty: TypeRef::String,
                        description: None,
                    }
                }
            })
            .collect()
    }

    fn query_params(&self, params: &[&Parameter]) -> Vec<QueryParam> {
        let mut by_name: BTreeMap<&str, QueryParam> = BTreeMap::new();
        for param in params.iter().filter(|p| p.location == "query") {
            by_name.entry(param.name.as_str()).or_insert_with(|| QueryParam {
                name: param.name.clone(),
                ty: self.param_type(&param.name, param),
                required: param.required,
                description: param.description.clone(),
            });
        }
        by_name.into_values().collect()
    }

    fn param_type(&self, context: &str, param: &Parameter) -> TypeRef {
        let Some(schema) = &param.schema else {
            return TypeRef::String;
        };
        self.modeler.map_type(schema).unwrap_or_else(|e| {
            warn!(context = %context, param = %param.name, error = %e, "Parameter type defaults to string");
            TypeRef::String
        })
    }

    /// First media type that references a model, directly or as array items.
    fn body_type(&self, id: &str, content: &Ordered<MediaType>) -> Option<TypeRef> {
        content.iter().find_map(|(media, mt)| {
            let schema = mt.schema.as_ref()?;
            let resolved = if let Some(r) = &schema.ref_path {
                self.modeler.ref_name(r).map(TypeRef::Named)
            } else if let Some(r) = schema.items_ref() {
                self.modeler.ref_name(r).map(|n| TypeRef::array(TypeRef::Named(n)))
            } else {
                return None;
            };
            resolved
                .inspect_err(|e| {
                    warn!(operation_id = %id, media = %media, error = %e, "Skipping request body media type");
                })
                .ok()
        })
    }

    fn response_type(&self, id: &str, op: &spec::Operation) -> ResponseType {
        let Some((code, response)) = SUCCESS_CODES
            .iter()
            .find_map(|code| op.responses.get(*code).map(|r| (*code, r)))
        else {
            return ResponseType::Body(TypeRef::Any);
        };

        let Some(response) = self.spec.resolve_response(response) else {
            warn!(operation_id = %id, status = code, "Unresolvable response reference, using any");
            return ResponseType::Body(TypeRef::Any);
        };

        let Some((_, media)) = response.content.as_ref().and_then(Ordered::first) else {
            return ResponseType::Empty;
        };
        let Some(schema) = &media.schema else {
            return ResponseType::Empty;
        };

        let named = if let Some(r) = &schema.ref_path {
            self.modeler.ref_name(r).map(TypeRef::Named)
        } else if let Some(r) = schema.items_ref() {
            self.modeler.ref_name(r).map(|n| TypeRef::array(TypeRef::Named(n)))
        } else {
            Ok(TypeRef::Any)
        };
        match named {
            Ok(ty) => ResponseType::Body(ty),
            Err(e) => {
                warn!(operation_id = %id, status = code, error = %e, "Response type defaults to any");
                ResponseType::Body(TypeRef::Any)
            }
        }
    }
}

fn operation_for(item: &PathItem, method: HttpMethod) -> Option<&spec::Operation> {
    match method {
        HttpMethod::Delete => item.delete.as_ref(),
        HttpMethod::Get => item.get.as_ref(),
        HttpMethod::Patch => item.patch.as_ref(),
        HttpMethod::Post => item.post.as_ref(),
        HttpMethod::Put => item.put.as_ref(),
    }
}
