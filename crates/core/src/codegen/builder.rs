//! Builder pass: a navigation struct per path tree node.
//!
//! Literal segments become no-argument methods, parameter segments become
//! methods that capture a value, and every operation ending at a node becomes
//! an async method that forwards all captured values to the services function.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, info, warn};

use super::ast::{ImplItem, Receiver, RsExpr, RsField, RsFn, RsImpl, RsItem, RsModule, RsParam, RsStmt, RsStruct, RsType, StructShape};
use super::services::Signature;
use super::{EmitOptions, TypeMapper, doc_block, scalar_arg_type, scalar_type};
use crate::ir::api::{ApiIr, Operation};
use crate::ir::extract::placeholders;
use crate::ir::tree::{NodeId, PathTree, Segment};
use crate::ir::types::{Model, ScalarType};
use crate::ir::utils::{to_field_name, to_fn_name, to_module_name, to_variant_name, unique_name, unique_type_name};

/// Name of the entry point struct.
pub const ROOT_BUILDER: &str = "ApiBuilder";

/// A value a builder carries from an ancestor parameter segment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Captured {
    field: String,
    scalar: ScalarType,
    node: NodeId,
}

#[derive(Debug, Clone)]
struct NodePlan {
    struct_name: String,
    prefix: String,
    captured: Vec<Captured>,
}

/// Generate the builder module.
pub fn generate(
    api: &ApiIr,
    models: &[Model],
    root_segment: &str,
    options: &EmitOptions,
) -> RsModule {
    let tree = PathTree::build(&api.operations);
    let start = start_node(&tree, root_segment);
    let order = tree.walk(start);

    let reachable: BTreeSet<usize> = order
        .iter()
        .flat_map(|&id| tree.node(id).operations.iter().copied())
        .collect();
    for (index, op) in api.operations.iter().enumerate() {
        if !reachable.contains(&index) {
            warn!(
                operation_id = %op.id,
                path = %op.path,
                root_segment = %root_segment,
                "Operation is outside the builder root, no builder method generated"
            );
        }
    }

    let plans = plan_nodes(&tree, start, &order);
    let mapper = TypeMapper::new(models, Some(options.models_path.as_str()));
    let ctx = BuilderContext {
        api,
        tree: &tree,
        plans: &plans,
        mapper: &mapper,
        options,
    };

    let mut items = Vec::with_capacity(order.len() * 2);
    for &id in &order {
        items.push(ctx.node_struct(id, id == start));
        items.push(ctx.node_impl(id, id == start));
    }

    info!(
        builders = order.len(),
        operations = reachable.len(),
        "Generated builder"
    );

    RsModule {
        docs: vec![
            "Fluent navigation over the API path structure.".to_string(),
            String::new(),
            format!("Start from [`{ROOT_BUILDER}::new`] and follow the URL segments."),
        ],
        items,
    }
}

fn start_node(tree: &PathTree, root_segment: &str) -> NodeId {
    if root_segment.is_empty() {
        return PathTree::ROOT;
    }
    match tree.find(&[root_segment]) {
        Some(id) => id,
        None => {
            debug!(root_segment = %root_segment, "Root segment not found, starting at the path root");
            PathTree::ROOT
        }
    }
}

/// Struct names and captured fields, parents before children.
fn plan_nodes(tree: &PathTree, start: NodeId, order: &[NodeId]) -> HashMap<NodeId, NodePlan> {
    let mut plans = HashMap::with_capacity(order.len());
    let mut names = HashSet::new();
    names.insert(ROOT_BUILDER.to_string());
    plans.insert(
        start,
        NodePlan {
            struct_name: ROOT_BUILDER.to_string(),
            prefix: String::new(),
            captured: Vec::new(),
        },
    );

    for &id in order {
        let Some(parent) = plans.get(&id).cloned() else {
            continue;
        };
        for (_, child) in tree.children(id) {
            let (label, captured) = match &tree.node(child).segment {
                Segment::Param { name, ty } => {
                    let mut used: HashSet<String> =
                        parent.captured.iter().map(|c| c.field.clone()).collect();
                    used.insert("client".to_string());
                    let mut captured = parent.captured.clone();
                    captured.push(Captured {
                        field: unique_name(&to_field_name(name), &mut used),
                        scalar: ty.scalar(),
                        node: child,
                    });
                    (to_variant_name(name), captured)
                }
                Segment::Literal(text) => (to_variant_name(text), parent.captured.clone()),
                Segment::Root => continue,
            };
            let prefix = format!("{}{label}", parent.prefix);
            plans.insert(
                child,
                NodePlan {
                    struct_name: unique_type_name(&format!("{prefix}Builder"), &mut names),
                    prefix,
                    captured,
                },
            );
        }
    }
    plans
}

struct BuilderContext<'a> {
    api: &'a ApiIr,
    tree: &'a PathTree,
    plans: &'a HashMap<NodeId, NodePlan>,
    mapper: &'a TypeMapper<'a>,
    options: &'a EmitOptions,
}

impl BuilderContext<'_> {
    fn plan(&self, id: NodeId) -> &NodePlan {
        &self.plans[&id]
    }

    fn client_type(&self) -> RsType {
        RsType::reference_with("'a", RsType::path(self.options.client("Client")))
    }

    fn node_struct(&self, id: NodeId, is_start: bool) -> RsItem {
        let plan = self.plan(id);
        let mut fields = vec![RsField {
            docs: Vec::new(),
            attrs: Vec::new(),
            is_pub: false,
            name: "client".to_string(),
            ty: self.client_type(),
        }];
        fields.extend(plan.captured.iter().map(|c| RsField {
            docs: Vec::new(),
            attrs: Vec::new(),
            is_pub: false,
            name: c.field.clone(),
            ty: scalar_type(c.scalar),
        }));

        let docs = if is_start {
            vec!["Entry point of the API navigation.".to_string()]
        } else {
            vec![format!("`{}`", self.route(id))]
        };

        RsItem::Struct(RsStruct {
            docs,
            attrs: vec!["derive(Clone)".to_string()],
            name: plan.struct_name.clone(),
            lifetimes: vec!["'a".to_string()],
            shape: StructShape::Named(fields),
        })
    }

    /// Path template of a node, e.g. `/v4/products/{id}`.
    fn route(&self, id: NodeId) -> String {
        let segments: Vec<String> = self
            .tree
            .lineage(id)
            .into_iter()
            .map(|node| match &self.tree.node(node).segment {
                Segment::Literal(text) => text.clone(),
                Segment::Param { name, .. } => format!("{{{name}}}"),
                Segment::Root => String::new(),
            })
            .collect();
        format!("/{}", segments.join("/"))
    }

    fn node_impl(&self, id: NodeId, is_start: bool) -> RsItem {
        let plan = self.plan(id);
        let mut used = HashSet::new();
        let mut methods = Vec::new();

        if is_start {
            used.insert("new".to_string());
            let mut new = RsFn::public("new");
            new.params = vec![RsParam::new("client", self.client_type())];
            new.ret = Some(RsType::path("Self"));
            new.body = vec![RsStmt::Tail(RsExpr::Struct {
                name: "Self".to_string(),
                fields: vec![("client".to_string(), RsExpr::path("client"))],
            })];
            methods.push(ImplItem::Fn(new));
        }

        for (_, child) in self.tree.children(id) {
            methods.push(ImplItem::Fn(self.child_method(plan, child, &mut used)));
        }

        for &index in &self.tree.node(id).operations {
            let op = &self.api.operations[index];
            methods.push(ImplItem::Fn(self.operation_method(id, plan, op, &mut used)));
        }

        RsItem::Impl(RsImpl {
            lifetimes: vec!["'a".to_string()],
            trait_name: None,
            target: format!("{}<'a>", plan.struct_name),
            items: methods,
        })
    }

    fn child_method(&self, parent: &NodePlan, child: NodeId, used: &mut HashSet<String>) -> RsFn {
        let plan = self.plan(child);
        let mut fields = vec![("client".to_string(), RsExpr::path("self.client"))];
        fields.extend(parent.captured.iter().map(|c| {
            let value = match c.scalar {
                ScalarType::String => format!("self.{}.clone()", c.field),
                _ => format!("self.{}", c.field),
            };
            (c.field.clone(), RsExpr::Raw(value))
        }));

        let (method, params) = match &self.tree.node(child).segment {
            Segment::Param { name, .. } => {
                // The newest capture belongs to this segment.
                let own = plan.captured.last().filter(|c| c.node == child);
                match own {
                    Some(own) => {
                        let (ty, value) = match own.scalar {
                            ScalarType::String => (
                                RsType::impl_into(RsType::path("String")),
                                RsExpr::Raw(format!("{}.into()", own.field)),
                            ),
                            other => (scalar_type(other), RsExpr::path(own.field.clone())),
                        };
                        fields.push((own.field.clone(), value));
                        (to_fn_name(name), vec![RsParam::new(own.field.clone(), ty)])
                    }
                    None => (to_fn_name(name), Vec::new()),
                }
            }
            Segment::Literal(text) => (to_fn_name(text), Vec::new()),
            Segment::Root => ("root".to_string(), Vec::new()),
        };

        let mut f = RsFn::public(unique_name(&method, used));
        f.docs = vec![format!("`{}`", self.route(child))];
        f.receiver = Some(Receiver::Ref);
        f.params = params;
        f.ret = Some(RsType::path(format!("{}<'a>", plan.struct_name)));
        f.body = vec![RsStmt::Tail(RsExpr::Struct {
            name: plan.struct_name.clone(),
            fields,
        })];
        f
    }

    fn operation_method(
        &self,
        node: NodeId,
        plan: &NodePlan,
        op: &Operation,
        used: &mut HashSet<String>,
    ) -> RsFn {
        let sig = Signature::new(op, self.mapper, self.options);
        let captured: HashMap<NodeId, &Captured> = plan.captured.iter().map(|c| (c.node, c)).collect();

        // Node that owns each path parameter, in template order.
        let mut owners: Vec<Option<NodeId>> = Vec::with_capacity(op.path_params.len());
        let segments = op.path.split('/').filter(|s| !s.is_empty());
        for (segment, node_id) in segments.zip(self.tree.lineage(node)) {
            for (i, _) in placeholders(segment).iter().enumerate() {
                owners.push((i == 0).then_some(node_id));
            }
        }

        let mut params = Vec::new();
        let mut args = vec![RsExpr::path("self.client")];
        for (k, (arg, scalar)) in sig.path_args.iter().zip(&sig.path_types).enumerate() {
            let field = owners
                .get(k)
                .copied()
                .flatten()
                .and_then(|owner| captured.get(&owner));
            let value = match field {
                Some(c) if c.scalar == *scalar => match scalar {
                    ScalarType::String => Some(format!("&self.{}", c.field)),
                    _ => Some(format!("self.{}", c.field)),
                },
                Some(c) if *scalar == ScalarType::String => Some(format!("&self.{}.to_string()", c.field)),
                _ => None,
            };
            match value {
                Some(value) => args.push(RsExpr::Raw(value)),
                None => {
                    params.push(RsParam::new(arg.clone(), scalar_arg_type(*scalar)));
                    args.push(RsExpr::path(arg.clone()));
                }
            }
        }

        if let (Some(arg), Some(ty)) = (&sig.body_arg, &sig.body_type) {
            params.push(RsParam::new(arg.clone(), RsType::reference(ty.clone())));
            args.push(RsExpr::path(arg.clone()));
        }

        let package = format!("{}::{}", self.options.services_path, to_module_name(&op.package));
        if op.has_query() {
            params.push(RsParam::new(
                "options",
                RsType::reference(RsType::path(format!("{package}::Options"))),
            ));
            args.push(RsExpr::path("options"));
        }

        let mut docs = doc_block(op.summary.as_deref(), op.description.as_deref());
        if !docs.is_empty() {
            docs.push(String::new());
        }
        docs.push(format!("`{} {}`", op.method, op.path));

        let mut f = RsFn::public(unique_name(&op.fn_name, used));
        f.docs = docs;
        f.is_async = true;
        f.receiver = Some(Receiver::Ref);
        f.params = params;
        f.ret = Some(sig.response);
        f.body = vec![RsStmt::Tail(RsExpr::awaited(RsExpr::call(
            format!("{package}::{}", op.fn_name),
            args,
        )))];
        f
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::codegen::Emit;
    use crate::ir::api::{HttpMethod, PathParam, QueryParam, ResponseType};
    use crate::ir::types::TypeRef;
    use crate::naming::OwnershipRule;

    fn op(id: &str, method: HttpMethod, path: &str, params: &[(&str, TypeRef)]) -> Operation {
        Operation {
            id: id.to_string(),
            method,
            path: path.to_string(),
            path_params: params
                .iter()
                .map(|(name, ty)| PathParam {
                    name: (*name).to_string(),
                    ty: ty.clone(),
                    description: None,
                })
                .collect(),
            query_params: Vec::new(),
            body: None,
            response: ResponseType::Empty,
            service: "product".into(),
            package: "product".into(),
            rule: OwnershipRule::Tag,
            fn_name: to_fn_name(id),
            summary: None,
            description: None,
        }
    }

    fn render(ops: Vec<Operation>) -> String {
        let api = ApiIr {
            operations: ops,
            excluded: Vec::new(),
        };
        let text = generate(&api, &[], "v4", &EmitOptions::default()).emit();
        syn::parse_file(&text).unwrap();
        text
    }

    #[test]
    fn test_builder_starts_at_root_segment() {
        let mut list = op("listProducts", HttpMethod::Get, "/v4/products", &[]);
        list.query_params = vec![QueryParam {
            name: "limit".into(),
            ty: TypeRef::Int64,
            required: false,
            description: None,
        }];
        let text = render(vec![
            list,
            op("getProduct", HttpMethod::Get, "/v4/products/{productId}", &[("productId", TypeRef::String)]),
            op("getSelf", HttpMethod::Get, "/v2/self", &[]),
        ]);

        assert!(text.contains("pub struct ApiBuilder<'a> {\nclient: &'a crate::client::Client,\n}"));
        assert!(text.contains("pub fn new(client: &'a crate::client::Client) -> Self {\nSelf { client }\n}"));
        assert!(text.contains("pub fn products(&self) -> ProductsBuilder<'a> {\nProductsBuilder { client: self.client }\n}"));
        assert!(text.contains(
            "pub fn product_id(&self, product_id: impl Into<String>) -> ProductsProductIdBuilder<'a> {"
        ));
        assert!(text.contains("product_id: product_id.into()"));
        assert!(text.contains(
            "pub async fn list_products(&self, options: &crate::services::product::Options)"
        ));
        assert!(text.contains("crate::services::product::list_products(self.client, options).await"));
        assert!(text.contains("crate::services::product::get_product(self.client, &self.product_id).await"));
        // Outside the v4 subtree.
        assert!(!text.contains("get_self"));
    }

    #[test]
    fn test_duplicate_param_names_are_both_kept() {
        let text = render(vec![op(
            "getThing",
            HttpMethod::Get,
            "/v4/x/{id}/y/{id}",
            &[("id", TypeRef::String), ("id", TypeRef::Int64)],
        )]);
        assert!(text.contains("pub fn id(&self, id_2: i64) -> XIdYIdBuilder<'a> {"));
        assert!(text.contains("XIdYIdBuilder { client: self.client, id: self.id.clone(), id_2 }"));
        assert!(text.contains("crate::services::product::get_thing(self.client, &self.id, self.id_2).await"));
    }

    #[test]
    fn test_merged_params_keep_each_operation_working() {
        let text = render(vec![
            op("getA", HttpMethod::Get, "/v4/things/{a}", &[("a", TypeRef::Int64)]),
            op("deleteB", HttpMethod::Delete, "/v4/things/{b}", &[("b", TypeRef::String)]),
            op("putC", HttpMethod::Put, "/v4/things/{c}", &[("c", TypeRef::Bool)]),
        ]);
        assert!(text.contains("pub fn a(&self, a: i64) -> ThingsABuilder<'a>"));
        assert!(text.contains("crate::services::product::get_a(self.client, self.a).await"));
        // String parameters accept the captured value as text.
        assert!(text.contains("crate::services::product::delete_b(self.client, &self.a.to_string()).await"));
        // Incompatible types become method arguments.
        assert!(text.contains("pub async fn put_c(&self, c: bool)"));
        assert!(text.contains("crate::services::product::put_c(self.client, c).await"));
    }

    #[test]
    fn test_partial_placeholder_segment_takes_method_argument() {
        let text = render(vec![
            op("getFile", HttpMethod::Get, "/v4/files/{name}.json", &[("name", TypeRef::String)]),
            op("getDir", HttpMethod::Get, "/v4/files/{name}", &[("name", TypeRef::String)]),
        ]);
        assert!(text.contains("/// `/v4/files/{name}.json`\n#[derive(Clone)]\npub struct FilesNameJsonBuilder<'a>"));
        assert!(text.contains("pub fn name_json(&self) -> FilesNameJsonBuilder<'a>"));
        assert!(text.contains("pub async fn get_file(&self, name: &str)"));
        assert!(text.contains("crate::services::product::get_file(self.client, name).await"));
        assert!(text.contains("pub fn name(&self, name: impl Into<String>) -> FilesNameBuilder<'a>"));
        assert!(text.contains("crate::services::product::get_dir(self.client, &self.name).await"));
    }

    #[test]
    fn test_missing_root_segment_starts_at_path_root() {
        let api = ApiIr {
            operations: vec![op("getSelf", HttpMethod::Get, "/self", &[])],
            excluded: Vec::new(),
        };
        let text = generate(&api, &[], "v4", &EmitOptions::default()).emit();
        assert!(text.contains("pub fn self_(&self) -> SelfValueBuilder<'a>"));
        assert!(text.contains("pub async fn get_self(&self)"));
    }
}
